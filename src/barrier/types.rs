//! Type definitions for the barrier handler
//!
//! Outcomes returned to callers, sweep reports and the statistics snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// What happened to a message passed to `handle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Admitted; its group is still waiting
    Held,
    /// Admitted and `count` messages were dispatched as a result; `count`
    /// is never zero
    Released { count: usize },
    /// Not admitted (a straggler or a rejected message), or admitted into a
    /// group that finalized without releasing anything
    Discarded,
}

/// Result of one reaper sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Barriers looked at
    pub examined: usize,
    /// Barriers evicted because they exceeded the timeout
    pub expired: usize,
    /// Messages handed to the router as partial results
    pub released: usize,
    /// Messages routed to the discard channel
    pub discarded: usize,
    /// Per-barrier failures (poisoned locks, failed deliveries)
    pub errors: usize,
}

/// Snapshot of handler state and cumulative counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarrierStats {
    /// Groups currently waiting
    pub live_barriers: usize,
    /// Keys currently remembered as finished
    pub tracked_keys: usize,
    /// Messages added to a group
    pub admitted: u64,
    /// Messages handed to the router
    pub released: u64,
    /// Messages discarded (stragglers, rejections, timeouts)
    pub discarded: u64,
    /// Groups evicted by the reaper
    pub timed_out: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    admitted: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
    timed_out: AtomicU64,
}

impl StatCounters {
    pub(crate) fn add_admitted(&self, n: u64) {
        self.admitted.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_released(&self, n: u64) {
        self.released.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_discarded(&self, n: u64) {
        self.discarded.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_timed_out(&self, n: u64) {
        self.timed_out.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, live_barriers: usize, tracked_keys: usize) -> BarrierStats {
        BarrierStats {
            live_barriers,
            tracked_keys,
            admitted: self.admitted.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}
