//! Generation/cancellation token: replaces the source's
//! `(is_started, loop_iteration)` pair of plain fields with one atomic
//! object a worker captures on entry and re-checks at every suspension.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner {
    started: AtomicBool,
    iteration: AtomicU64,
    notify: Notify,
}

/// Shared, cloneable handle to a channel's start/stop generation.
#[derive(Clone)]
pub struct GenerationToken(Arc<Inner>);

/// A snapshot taken by a worker at spawn time; used to detect a newer
/// `start()` racing the current worker.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

impl GenerationToken {
    pub fn new() -> Self {
        GenerationToken(Arc::new(Inner {
            started: AtomicBool::new(false),
            iteration: AtomicU64::new(0),
            notify: Notify::new(),
        }))
    }

    /// Increments the generation and marks the channel started; returns
    /// the generation the newly spawned worker should capture.
    pub fn start(&self) -> Generation {
        self.0.started.store(true, Ordering::Release);
        let gen = self.0.iteration.fetch_add(1, Ordering::AcqRel) + 1;
        self.0.notify.notify_waiters();
        Generation(gen)
    }

    /// Clears the started flag and bumps the generation so any worker
    /// still running exits at its next suspension (`halt()`).
    pub fn halt(&self) -> Generation {
        self.0.started.store(false, Ordering::Release);
        let gen = self.0.iteration.fetch_add(1, Ordering::AcqRel) + 1;
        self.0.notify.notify_waiters();
        Generation(gen)
    }

    pub fn is_started(&self) -> bool {
        self.0.started.load(Ordering::Acquire)
    }

    pub fn current(&self) -> Generation {
        Generation(self.0.iteration.load(Ordering::Acquire))
    }

    /// True while `captured` is still the live generation and the
    /// channel remains started — the condition every worker loop polls.
    pub fn is_current(&self, captured: Generation) -> bool {
        self.is_started() && self.current() == captured
    }

    /// Resolves as soon as the generation changes (a `start()` or
    /// `halt()` occurred), letting a worker wake immediately instead of
    /// waiting out its full sleep interval.
    pub async fn changed(&self) {
        self.0.notify.notified().await;
    }
}

impl Default for GenerationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_stop_start_leaves_only_the_latest_generation_current() {
        let token = GenerationToken::new();
        let g1 = token.start();
        assert!(token.is_current(g1));
        let g2 = token.halt();
        assert!(!token.is_current(g1));
        assert!(!token.is_current(g2)); // halted: not started even though current
        let g3 = token.start();
        assert!(token.is_current(g3));
        assert!(!token.is_current(g1));
        assert_ne!(g1.0, g3.0);
    }
}
