//! # Last-success timestamps for the supervisor's liveness checks.
//!
//! Each timestamp is stored as milliseconds since the tracker's origin in an
//! [`AtomicU64`], so a single update never tears and needs no lock. The time
//! base is [`tokio::time::Instant`], which is monotonic and follows paused time
//! in tests.
//!
//! Workers beat only after a **successful** unit of work; the supervisor also
//! rewinds a heartbeat to "now" when it respawns a worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Which worker a heartbeat belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    Producer,
    Consumer,
}

/// Producer and consumer last-success timestamps.
#[derive(Debug)]
pub struct HeartbeatTracker {
    origin: Instant,
    producer_ms: AtomicU64,
    consumer_ms: AtomicU64,
}

impl HeartbeatTracker {
    /// Creates a tracker whose both heartbeats read "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            producer_ms: AtomicU64::new(0),
            consumer_ms: AtomicU64::new(0),
        }
    }

    /// Records a success for `who` at the current instant.
    pub fn beat(&self, who: Beat) {
        self.slot(who).store(self.now_ms(), Ordering::Release);
    }

    /// Instant of the last recorded success for `who`.
    pub fn last_success(&self, who: Beat) -> Instant {
        self.origin + Duration::from_millis(self.slot(who).load(Ordering::Acquire))
    }

    /// Time elapsed since the last recorded success for `who`.
    pub fn age(&self, who: Beat) -> Duration {
        let last = self.slot(who).load(Ordering::Acquire);
        Duration::from_millis(self.now_ms().saturating_sub(last))
    }

    /// True if `who` has not succeeded for strictly longer than `limit`.
    pub fn is_stale(&self, who: Beat, limit: Duration) -> bool {
        self.age(who) > limit
    }

    fn slot(&self, who: Beat) -> &AtomicU64 {
        match who {
            Beat::Producer => &self.producer_ms,
            Beat::Consumer => &self.consumer_ms,
        }
    }

    fn now_ms(&self) -> u64 {
        let ms = self.origin.elapsed().as_millis();
        u64::try_from(ms).unwrap_or(u64::MAX)
    }
}

impl Default for HeartbeatTracker {
    fn default() -> Self {
        Self::new()
    }
}
