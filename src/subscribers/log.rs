//! # LogWriter: render runtime events through `tracing`
//!
//! A subscriber that turns every [`Event`] into one `tracing` record. The level
//! follows the severity of the event:
//!
//! | level   | kinds                                                               |
//! |---------|---------------------------------------------------------------------|
//! | `debug` | `ValueSent`, `ValueReceived`                                        |
//! | `info`  | worker lifecycle, `HealthReport`, `AllStoppedWithin`, shutdown       |
//! | `warn`  | `ValueDropped`, `ReceiveTimeout`, `ChannelReset`, `AllocationFailed`, overflow |
//! | `error` | termination, ceiling, memory, watchdog, reset, grace, panics        |
//!
//! ## Example output
//! ```text
//! INFO  worker started task="producer" priority=5 unit=1 stack=3072
//! WARN  receive timeout task="consumer" timeouts=3 state=recovery(1)
//! ERROR restart ceiling reached, resetting task="consumer" restarts=5 delay_ms=1000
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed event writer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ValueSent => {
                debug!(task, value = e.value, "value sent");
            }
            EventKind::ValueReceived => {
                debug!(task, value = e.value, "transmitting value");
            }
            EventKind::ValueDropped => {
                warn!(task, value = e.value, "channel full, value discarded");
            }
            EventKind::ReceiveTimeout => {
                let state = e.escalation.map(|s| s.to_string()).unwrap_or_default();
                warn!(task, timeouts = e.count, %state, "receive timeout");
            }
            EventKind::ChannelReset => {
                warn!(task, dropped = e.dropped, "channel reset");
            }
            EventKind::AllocationFailed => {
                warn!(task, retry_ms = e.delay_ms, reason = e.reason.as_deref(), "scratch allocation failed");
            }
            EventKind::ConsumerTerminated => {
                error!(task, timeouts = e.count, "persistent starvation, consumer terminating");
            }
            EventKind::WorkerStarted => match e.placement {
                Some(p) => info!(
                    task,
                    priority = p.priority,
                    unit = p.unit,
                    stack = p.stack_size,
                    "worker started"
                ),
                None => info!(task, "worker started"),
            },
            EventKind::WorkerStopped => {
                info!(task, "worker stopped");
            }
            EventKind::WorkerFailed => {
                warn!(task, reason = e.reason.as_deref(), "worker failed");
            }
            EventKind::WorkerRespawned => {
                warn!(task, restarts = e.count, "worker respawned");
            }
            EventKind::HealthReport => {
                let (producer, consumer) = e
                    .status
                    .map(|s| (s.producer().as_label(), s.consumer().as_label()))
                    .unwrap_or(("unknown", "unknown"));
                let available = e.memory.map(|m| m.available);
                let min_ever = e.memory.map(|m| m.min_ever);
                info!(producer, consumer, available, min_ever, "system status");
            }
            EventKind::MemoryLow => {
                error!(min_ever = e.memory.map(|m| m.min_ever), "historical minimum memory below floor");
            }
            EventKind::RestartCeilingReached => {
                error!(task, restarts = e.count, delay_ms = e.delay_ms, "restart ceiling reached, resetting");
            }
            EventKind::WatchdogExpired => {
                error!(task, timeout_ms = e.timeout_ms, "watchdog expired");
            }
            EventKind::SystemReset => {
                let reason = e.reset.as_ref().map(|r| r.to_string()).unwrap_or_default();
                error!(%reason, "system reset");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!("all workers stopped within grace");
            }
            EventKind::GraceExceeded => {
                error!("grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(
                    subscriber = task,
                    reason = e.reason.as_deref(),
                    dropped = e.dropped,
                    "subscriber overflow"
                );
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = task, info = e.reason.as_deref(), "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
