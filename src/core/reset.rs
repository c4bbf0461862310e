//! # System reset line.
//!
//! [`ResetLine`] is the terminal escalation: the first [`ResetLine::trigger`]
//! records its [`ResetReason`], publishes `SystemReset` and fires the line's
//! own token. Later triggers are ignored. [`System::run`](crate::System::run)
//! waits on that token, then cancels the runtime token (supervisor, workers,
//! watchdog monitor) and returns [`Exit::Reset`](crate::Exit::Reset); the boot
//! loop then rebuilds every component from initial state.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};

/// Why the system is being reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    /// A worker was respawned too many times without recovering.
    RestartCeiling {
        /// Worker name.
        task: Arc<str>,
        /// Respawns performed since boot.
        restarts: u32,
    },
    /// A watchdog-subscribed worker missed its feed deadline.
    WatchdogExpired {
        /// Worker name.
        task: Arc<str>,
    },
    /// The supervisor task itself ended unexpectedly.
    SupervisorLost,
}

impl ResetReason {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResetReason::RestartCeiling { .. } => "reset_restart_ceiling",
            ResetReason::WatchdogExpired { .. } => "reset_watchdog_expired",
            ResetReason::SupervisorLost => "reset_supervisor_lost",
        }
    }
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::RestartCeiling { task, restarts } => {
                write!(f, "{task} respawned {restarts} times without recovering")
            }
            ResetReason::WatchdogExpired { task } => write!(f, "watchdog expired for {task}"),
            ResetReason::SupervisorLost => f.write_str("supervisor exited unexpectedly"),
        }
    }
}

/// One-shot, first-wins reset trigger shared by the supervisor and the watchdog.
#[derive(Clone, Debug)]
pub struct ResetLine {
    token: CancellationToken,
    reason: Arc<OnceLock<ResetReason>>,
    bus: Bus,
}

impl ResetLine {
    pub fn new(bus: Bus) -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
            bus,
        }
    }

    /// Pulls the line. Returns `false` if it was already pulled.
    pub fn trigger(&self, reason: ResetReason) -> bool {
        if self.reason.set(reason.clone()).is_err() {
            return false;
        }
        self.bus
            .publish(Event::new(EventKind::SystemReset).with_reset(reason));
        self.token.cancel();
        true
    }

    /// True once the line was pulled.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason recorded by the first trigger.
    pub fn reason(&self) -> Option<ResetReason> {
        self.reason.get().cloned()
    }

    /// Waits until the line is pulled and returns the reason.
    pub async fn triggered(&self) -> ResetReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(ResetReason::SupervisorLost)
    }
}
