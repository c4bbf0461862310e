//! # Task watchdog.
//!
//! Software model of a hardware task watchdog. A worker registers once with
//! [`Watchdog::subscribe`] and must call [`WatchdogLease::feed`] at least once
//! per `timeout`. If any lease goes unfed for longer, the monitor pulls the
//! [`ResetLine`]; there is no local recovery.
//!
//! ## Lifecycle
//! ```text
//! subscribe(name) ──► lease ──feed()──► last_feed = now
//!                       │
//!                       └─ drop ──► unsubscribed (worker deleted or exited)
//!
//! monitor: every timeout/4 ─► any lease with now - last_feed > timeout?
//!                                └─► WatchdogExpired ─► ResetLine::trigger
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::reset::{ResetLine, ResetReason};
use crate::events::{Bus, Event, EventKind};

struct LeaseState {
    name: Arc<str>,
    last_feed: Instant,
}

struct Inner {
    timeout: Duration,
    next_id: AtomicU64,
    leases: Mutex<HashMap<u64, LeaseState>>,
}

impl Inner {
    fn leases(&self) -> MutexGuard<'_, HashMap<u64, LeaseState>> {
        self.leases.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared watchdog; cheap to clone.
#[derive(Clone)]
pub struct Watchdog {
    inner: Arc<Inner>,
}

/// Registration of one worker. Unsubscribes on drop.
pub struct WatchdogLease {
    id: u64,
    inner: Arc<Inner>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                timeout,
                next_id: AtomicU64::new(0),
                leases: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Configured feed deadline.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Registers `name`; the deadline starts now.
    pub fn subscribe(&self, name: impl Into<Arc<str>>) -> WatchdogLease {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.leases().insert(
            id,
            LeaseState {
                name: name.into(),
                last_feed: Instant::now(),
            },
        );
        WatchdogLease {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of live leases.
    pub fn subscribed(&self) -> usize {
        self.inner.leases().len()
    }

    /// Name of the first lease past its deadline, if any.
    pub fn overdue(&self) -> Option<Arc<str>> {
        let now = Instant::now();
        self.inner
            .leases()
            .values()
            .find(|l| now.saturating_duration_since(l.last_feed) > self.inner.timeout)
            .map(|l| Arc::clone(&l.name))
    }

    /// Checks the leases until one expires or `token` is cancelled.
    ///
    /// On expiry publishes `WatchdogExpired` and pulls `reset`.
    pub async fn monitor(self, bus: Bus, reset: ResetLine, token: CancellationToken) {
        let period = (self.inner.timeout / 4).max(Duration::from_millis(1));
        let mut tick = time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = token.cancelled() => return,
            }
            if let Some(task) = self.overdue() {
                bus.publish(
                    Event::new(EventKind::WatchdogExpired)
                        .with_task(Arc::clone(&task))
                        .with_timeout(self.inner.timeout),
                );
                reset.trigger(ResetReason::WatchdogExpired { task });
                return;
            }
        }
    }
}

impl WatchdogLease {
    /// Confirms liveness; restarts the deadline.
    pub fn feed(&self) {
        if let Some(lease) = self.inner.leases().get_mut(&self.id) {
            lease.last_feed = Instant::now();
        }
    }
}

impl Drop for WatchdogLease {
    fn drop(&mut self) {
        self.inner.leases().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fed_lease_never_expires() {
        let wd = Watchdog::new(Duration::from_secs(5));
        let lease = wd.subscribe("producer");
        for _ in 0..20 {
            time::advance(Duration::from_secs(4)).await;
            assert!(wd.overdue().is_none());
            lease.feed();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_unsubscribes() {
        let wd = Watchdog::new(Duration::from_secs(5));
        let lease = wd.subscribe("consumer");
        assert_eq!(wd.subscribed(), 1);
        drop(lease);
        assert_eq!(wd.subscribed(), 0);
        time::advance(Duration::from_secs(60)).await;
        assert!(wd.overdue().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_resets_on_missed_deadline() {
        let bus = Bus::new(16);
        let reset = ResetLine::new(bus.clone());
        let wd = Watchdog::new(Duration::from_secs(5));
        let _lease = wd.subscribe("consumer");

        let start = Instant::now();
        let token = CancellationToken::new();
        tokio::spawn(wd.clone().monitor(bus, reset.clone(), token));

        let reason = reset.triggered().await;
        assert_eq!(
            reason,
            ResetReason::WatchdogExpired {
                task: "consumer".into()
            }
        );
        let elapsed = start.elapsed();
        assert!(elapsed > Duration::from_secs(5));
        assert!(elapsed <= Duration::from_millis(6250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_stops_on_cancel() {
        let bus = Bus::new(4);
        let reset = ResetLine::new(bus.clone());
        let wd = Watchdog::new(Duration::from_secs(5));
        let token = CancellationToken::new();
        let join = tokio::spawn(wd.monitor(bus, reset.clone(), token.clone()));
        token.cancel();
        join.await.unwrap();
        assert!(!reset.is_triggered());
    }
}
