//! Tiered refresh scheduling for the poll loop.
//!
//! Two rate-limited tiers gate the slow-changing endpoint groups; the fast
//! group runs every cycle. Each tier's timestamp advances only after that
//! tier's reads complete, whether or not they succeeded, so a failing tier
//! keeps its cadence instead of spinning at the full cycle rate. The clock
//! is injected so tests drive the gating with synthetic instants.

use std::time::{Duration, Instant};

/// Gates for the medium (~5 s) and slow (~10 s) refresh groups.
#[derive(Debug)]
pub struct TierTimers {
    medium_interval: Duration,
    slow_interval: Duration,
    medium_last: Option<Instant>,
    slow_last: Option<Instant>,
}

impl TierTimers {
    /// New timers; both tiers are due immediately.
    pub fn new(medium_interval: Duration, slow_interval: Duration) -> Self {
        Self {
            medium_interval,
            slow_interval,
            medium_last: None,
            slow_last: None,
        }
    }

    /// True when the medium group should refresh.
    pub fn medium_due(&self, now: Instant) -> bool {
        match self.medium_last {
            None => true,
            Some(last) => now.duration_since(last) >= self.medium_interval,
        }
    }

    /// True when the slow group should refresh.
    pub fn slow_due(&self, now: Instant) -> bool {
        match self.slow_last {
            None => true,
            Some(last) => now.duration_since(last) >= self.slow_interval,
        }
    }

    /// Record a completed medium refresh.
    pub fn mark_medium(&mut self, now: Instant) {
        self.medium_last = Some(now);
    }

    /// Record a completed slow refresh.
    pub fn mark_slow(&mut self, now: Instant) {
        self.slow_last = Some(now);
    }
}
