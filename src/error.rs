//! Error types used by the streamvisor runtime, its workers and the shared channel.
//!
//! - [`RuntimeError`] errors raised by the orchestration runtime itself.
//! - [`TaskError`] errors raised by a worker run (producer / consumer).
//! - [`SendError`] / [`RecvError`] outcomes of [`BoundedChannel`](crate::BoundedChannel) operations.
//! - [`ConfigError`] rejected [`Config`](crate::Config) values.
//!
//! Every type provides `as_label` (stable snake_case) for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the streamvisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some workers had to be aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of workers that did not stop in time.
        stuck: Vec<String>,
    },

    /// Configuration rejected before boot.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Config(_) => "runtime_invalid_config",
        }
    }
}

/// # Errors produced by a worker run.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The consumer gave up after too many consecutive receive timeouts.
    ///
    /// Terminal: the worker does not come back on its own.
    #[error("terminated after {timeouts} consecutive receive timeouts")]
    Terminated {
        /// Timeout count at the moment of termination.
        timeouts: u32,
    },

    /// Non-recoverable fatal error.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Worker was cancelled (shutdown, reset or supervisor termination).
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::TaskError;
    ///
    /// let err = TaskError::Terminated { timeouts: 10 };
    /// assert_eq!(err.as_label(), "task_terminated");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Terminated { .. } => "task_terminated",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Canceled => "task_canceled",
        }
    }
}

/// Failed [`BoundedChannel::send`](crate::BoundedChannel::send).
///
/// The rejected item is handed back to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError<T> {
    /// Channel stayed at capacity for the whole send timeout.
    #[error("channel full")]
    Full(T),
}

impl<T> SendError<T> {
    /// Returns the item that could not be enqueued.
    pub fn into_inner(self) -> T {
        match self {
            SendError::Full(item) => item,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SendError::Full(_) => "channel_full",
        }
    }
}

/// Failed [`BoundedChannel::recv`](crate::BoundedChannel::recv).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// No item arrived within the receive timeout.
    #[error("timed out after {timeout:?}")]
    TimedOut {
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

impl RecvError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RecvError::TimedOut { .. } => "channel_recv_timeout",
        }
    }
}

/// A [`Config`](crate::Config) value that cannot drive the runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field that must be non-zero is zero.
    #[error("`{field}` must be greater than zero")]
    Zero {
        /// Field name.
        field: &'static str,
    },

    /// Escalation thresholds must satisfy `0 < warning < recovery < shutdown`.
    #[error("thresholds must be strictly increasing (warning={warning}, recovery={recovery}, shutdown={shutdown})")]
    Thresholds {
        /// Warning threshold.
        warning: u32,
        /// Recovery threshold.
        recovery: u32,
        /// Shutdown threshold.
        shutdown: u32,
    },

    /// A watchdog-subscribed worker would miss its feed deadline by design.
    #[error("`{field}` ({interval:?}) must be below the watchdog timeout ({watchdog:?})")]
    WatchdogDeadline {
        /// Field name.
        field: &'static str,
        /// Worst-case gap between two feeds.
        interval: Duration,
        /// Configured watchdog timeout.
        watchdog: Duration,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Zero { .. } => "config_zero",
            ConfigError::Thresholds { .. } => "config_thresholds",
            ConfigError::WatchdogDeadline { .. } => "config_watchdog_deadline",
        }
    }
}
