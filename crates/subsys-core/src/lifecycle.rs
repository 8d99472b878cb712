//! Shared start/stop machinery for channel workers:
//! the background purge loop that keeps a pipe empty while its channel
//! is stopped, and the join-with-timeout used to abandon a worker that
//! won't exit promptly.

use crate::context::ChannelHandle;
use crate::intervals::{FORCED_QUEUE_CLEANUP_INTERVAL, WORKER_JOIN_TIMEOUT};
use crate::pipe::StreamPipe;
use tokio::task::JoinHandle;

/// Spawns a task that drains `pipe` every `FORCED_QUEUE_CLEANUP_INTERVAL`
/// until the channel's generation advances again (i.e. a new `start()`
/// happens). One purge task is spawned per `halt()`; it self-terminates,
/// it is never explicitly cancelled.
pub fn spawn_purge(pipe: StreamPipe, handle: ChannelHandle) -> JoinHandle<()> {
    let generation_at_halt = handle.generation.current();
    tokio::spawn(async move {
        loop {
            pipe.drain_all();
            if handle.generation.current() != generation_at_halt {
                break;
            }
            tokio::time::sleep(FORCED_QUEUE_CLEANUP_INTERVAL).await;
        }
    })
}

/// Awaits `worker` for up to `WORKER_JOIN_TIMEOUT`; a timed-out worker is
/// abandoned rather than awaited further (daemon semantics).
pub async fn join_with_timeout(worker: JoinHandle<()>) {
    if tokio::time::timeout(WORKER_JOIN_TIMEOUT, worker)
        .await
        .is_err()
    {
        tracing::warn!("worker join timed out after {WORKER_JOIN_TIMEOUT:?}; abandoning task");
    }
}
