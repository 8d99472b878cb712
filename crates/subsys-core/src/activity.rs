//! Per-channel activity counters and the six-slot rolling window
//! the controller uses to derive the `Rates` topic's throughput/error
//! indicators.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// One entry per inbound/outbound batch; the value is the record count
/// in that batch.
#[derive(Default)]
pub struct ActivityQueue(Mutex<VecDeque<usize>>);

impl ActivityQueue {
    pub fn new() -> Self {
        ActivityQueue(Mutex::new(VecDeque::new()))
    }

    pub fn record(&self, count: usize) {
        self.0.lock().push_back(count);
    }

    /// Drains every sample and returns their sum — the per-tick
    /// throughput figure fed into the [`RollingWindow`].
    pub fn drain_total(&self) -> usize {
        self.0.lock().drain(..).sum()
    }
}

const WINDOW_SIZE: usize = 6;

/// A fixed-size rolling window over the last six controller ticks,
/// tracked separately for throughput and error samples.
pub struct RollingWindow {
    throughput: Mutex<[u32; WINDOW_SIZE]>,
    errors: Mutex<[u32; WINDOW_SIZE]>,
}

impl RollingWindow {
    pub fn new() -> Self {
        RollingWindow {
            throughput: Mutex::new([0; WINDOW_SIZE]),
            errors: Mutex::new([0; WINDOW_SIZE]),
        }
    }

    /// Shifts the window and inserts this tick's samples at the head.
    pub fn advance(&self, throughput_sample: u32, error_sample: u32) {
        shift_in(&mut self.throughput.lock(), throughput_sample);
        shift_in(&mut self.errors.lock(), error_sample);
    }

    /// A 6-character string, each digit the sample at that slot
    /// normalized to `[0..5]` relative to the window's peak value.
    pub fn throughput_indicator(&self) -> String {
        render(&self.throughput.lock())
    }

    pub fn error_indicator(&self) -> String {
        render(&self.errors.lock())
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new()
    }
}

fn shift_in(slots: &mut [u32; WINDOW_SIZE], sample: u32) {
    slots.rotate_right(1);
    slots[0] = sample;
}

fn render(slots: &[u32; WINDOW_SIZE]) -> String {
    let peak = *slots.iter().max().unwrap_or(&0);
    slots
        .iter()
        .rev() // oldest first, newest last, matching the tick order they arrived in
        .map(|&v| {
            let digit = if peak == 0 {
                0
            } else {
                ((v as u64 * 5) / peak as u64).min(5) as u8
            };
            char::from(b'0' + digit)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_is_always_six_characters() {
        let window = RollingWindow::new();
        assert_eq!(window.throughput_indicator().len(), 6);
        window.advance(10, 0);
        assert_eq!(window.throughput_indicator().len(), 6);
    }

    #[test]
    fn peak_sample_renders_as_five() {
        let window = RollingWindow::new();
        for _ in 0..6 {
            window.advance(0, 0);
        }
        window.advance(100, 0);
        let indicator = window.throughput_indicator();
        assert_eq!(indicator.chars().last(), Some('5'));
    }

    #[test]
    fn activity_queue_sums_batches() {
        let queue = ActivityQueue::new();
        queue.record(3);
        queue.record(7);
        assert_eq!(queue.drain_total(), 10);
        assert_eq!(queue.drain_total(), 0);
    }
}
