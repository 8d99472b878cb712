//! Stream pipe: the typed FIFO connecting a channel to user code.
//!
//! Multiple producers (ingress, user loops) and multiple consumers
//! (egress, user loops) may share one pipe, so the backing queue is a
//! `parking_lot::Mutex`-guarded `VecDeque` rather than a single-consumer
//! channel — any number of tasks may lock, push, or drain it.

use crate::schema::{Record, RecordDescriptor};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

struct Inner {
    descriptor: RecordDescriptor,
    queue: Mutex<VecDeque<Record>>,
}

/// A cloneable handle to one named stream's FIFO plus its record layout.
#[derive(Clone)]
pub struct StreamPipe {
    key: String,
    inner: Arc<Inner>,
}

impl StreamPipe {
    pub fn new(key: impl Into<String>, descriptor: RecordDescriptor) -> Self {
        StreamPipe {
            key: key.into(),
            inner: Arc::new(Inner {
                descriptor,
                queue: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn descriptor(&self) -> &RecordDescriptor {
        &self.inner.descriptor
    }

    /// Non-blocking enqueue; the queue is unbounded so this never waits.
    pub fn push(&self, record: Record) {
        self.inner.queue.lock().push_back(record);
    }

    pub fn push_many(&self, records: impl IntoIterator<Item = Record>) {
        self.inner.queue.lock().extend(records);
    }

    pub fn pop(&self) -> Option<Record> {
        self.inner.queue.lock().pop_front()
    }

    /// Removes and returns up to `n` records, in FIFO order.
    pub fn drain_up_to(&self, n: usize) -> Vec<Record> {
        let mut queue = self.inner.queue.lock();
        let take = n.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Empties the queue entirely (used by the background purge worker).
    pub fn drain_all(&self) -> Vec<Record> {
        self.inner.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldValue;

    fn descriptor() -> RecordDescriptor {
        RecordDescriptor::parse("uint32").unwrap()
    }

    #[test]
    fn preserves_fifo_order() {
        let pipe = StreamPipe::new("raw", descriptor());
        for i in 0..5u32 {
            pipe.push(vec![FieldValue::UInt32(i)]);
        }
        let drained = pipe.drain_up_to(10);
        let values: Vec<u32> = drained
            .into_iter()
            .map(|r| match r[0] {
                FieldValue::UInt32(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn drain_up_to_partial_leaves_remainder() {
        let pipe = StreamPipe::new("raw", descriptor());
        for i in 0..5u32 {
            pipe.push(vec![FieldValue::UInt32(i)]);
        }
        assert_eq!(pipe.drain_up_to(3).len(), 3);
        assert_eq!(pipe.len(), 2);
    }
}
