//! # Runtime events emitted by the workers, the supervisor and the runtime.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Worker lifecycle**: a worker was started, stopped, failed or respawned
//! - **Data path**: items sent, dropped, received; receive timeouts; channel resets
//! - **Audit**: periodic health report, memory alert, restart ceiling
//! - **Runtime**: watchdog expiry, system reset, graceful shutdown
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker
//! name, escalation state and counters.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use streamvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ValueDropped)
//!     .with_task("producer")
//!     .with_value(11);
//!
//! assert_eq!(ev.kind, EventKind::ValueDropped);
//! assert_eq!(ev.task.as_deref(), Some("producer"));
//! assert_eq!(ev.value, Some(11));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::ResetReason;
use crate::shared::{MemorySample, StatusSnapshot};
use crate::tasks::{EscalationState, Placement};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic info)
    SubscriberPanicked,

    /// Subscriber queue started dropping events (queue full or worker closed).
    ///
    /// Published once per streak of drops.
    /// Sets: `task` (subscriber name), `reason`, `dropped` (total this boot)
    SubscriberOverflow,

    // === Worker lifecycle ===
    /// Worker was created.
    ///
    /// Sets: `task`, `placement`
    WorkerStarted,

    /// Worker exited cleanly or was cancelled.
    ///
    /// Sets: `task`
    WorkerStopped,

    /// Worker exited with an error (terminated, fatal, panicked).
    ///
    /// Sets: `task`, `reason`
    WorkerFailed,

    /// Supervisor deleted a stale worker and created a fresh one.
    ///
    /// Sets: `task`, `count` (respawns of this worker since boot; 0 when uncounted)
    WorkerRespawned,

    // === Data path ===
    /// Producer enqueued a value.
    ///
    /// Sets: `task`, `value`
    ValueSent,

    /// Producer found the channel full; the value is discarded.
    ///
    /// Sets: `task`, `value`
    ValueDropped,

    /// Consumer dequeued and transmitted a value.
    ///
    /// Sets: `task`, `value`
    ValueReceived,

    /// Consumer receive timed out.
    ///
    /// Sets: `task`, `count` (consecutive timeouts), `escalation` (state after the timeout)
    ReceiveTimeout,

    /// Consumer discarded the channel contents as a recovery step.
    ///
    /// Sets: `task`, `dropped` (items discarded)
    ChannelReset,

    /// Consumer gave up after persistent starvation.
    ///
    /// Sets: `task`, `count` (timeouts)
    ConsumerTerminated,

    /// Consumer could not allocate its per-iteration scratch slot.
    ///
    /// Sets: `task`, `delay_ms` (retry delay), `reason`
    AllocationFailed,

    // === Audit ===
    /// Periodic snapshot taken by the supervisor.
    ///
    /// Sets: `status`, `memory` (when the probe can tell)
    HealthReport,

    /// Lowest available memory ever observed fell below the configured floor.
    ///
    /// Sets: `memory`
    MemoryLow,

    /// A worker exhausted its respawn budget; a system reset follows after the grace delay.
    ///
    /// Sets: `task`, `count`, `delay_ms`
    RestartCeilingReached,

    // === Runtime ===
    /// A watchdog-subscribed worker missed its feed deadline.
    ///
    /// Sets: `task`, `timeout_ms`
    WatchdogExpired,

    /// The runtime is being torn down for a full restart.
    ///
    /// Sets: `reset`
    SystemReset,

    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// All workers stopped within configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some workers did not stop in time.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the worker (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Data value moved through the channel.
    pub value: Option<u64>,
    /// Counter relevant to the kind (timeouts, respawns).
    pub count: Option<u32>,
    /// Items discarded by a channel reset, or events a subscriber missed.
    pub dropped: Option<usize>,
    /// Consumer escalation state.
    pub escalation: Option<EscalationState>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Flag snapshot for health reports.
    pub status: Option<StatusSnapshot>,
    /// Memory sample for audits.
    pub memory: Option<MemorySample>,
    /// Scheduling metadata of a started worker.
    pub placement: Option<Placement>,
    /// Why the system resets.
    pub reset: Option<ResetReason>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            value: None,
            count: None,
            dropped: None,
            escalation: None,
            delay_ms: None,
            timeout_ms: None,
            status: None,
            memory: None,
            placement: None,
            reset: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_value(mut self, value: u64) -> Self {
        self.value = Some(value);
        self
    }

    #[inline]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    #[inline]
    pub fn with_dropped(mut self, dropped: usize) -> Self {
        self.dropped = Some(dropped);
        self
    }

    #[inline]
    pub fn with_escalation(mut self, state: EscalationState) -> Self {
        self.escalation = Some(state);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    #[inline]
    pub fn with_status(mut self, status: StatusSnapshot) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn with_memory(mut self, memory: MemorySample) -> Self {
        self.memory = Some(memory);
        self
    }

    #[inline]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }

    #[inline]
    pub fn with_reset(mut self, reason: ResetReason) -> Self {
        self.reset = Some(reason);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ValueSent);
        let b = Event::new(EventKind::ValueSent);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_durations_are_compacted() {
        let ev = Event::new(EventKind::RestartCeilingReached)
            .with_delay(Duration::from_millis(1000))
            .with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(1000));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
