//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the control loop. Every
//! interval, threshold and ceiling is a public field;
//! [`Config::default`] carries the reference constants.
//!
//! ## Sentinel values
//! - `send_timeout = 0s` → pure non-blocking send (drop-newest on full)
//! - `producer_restart_ceiling = None` → producer respawns are unbounded

use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::BackoffPolicy;
use crate::tasks::Placement;

/// Global configuration for the control loop.
///
/// ## Field groups
/// - **Channel**: `capacity`, `send_timeout`, `recv_timeout`
/// - **Workers**: `produce_interval`, `consume_interval`, `alloc_backoff`, placements
/// - **Escalation**: `warning_threshold`, `recovery_threshold`, `shutdown_threshold`
/// - **Supervision**: `supervisor_period`, `consumer_restart_ceiling`,
///   `producer_restart_ceiling`, `restart_grace`, `memory_floor`
/// - **Runtime**: `watchdog_timeout`, `grace`, `bus_capacity`
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of queued items in the data channel.
    pub capacity: usize,
    /// How long the producer may wait for space (`0s` = never blocks).
    pub send_timeout: Duration,
    /// How long the consumer waits for an item per iteration.
    pub recv_timeout: Duration,

    /// Sleep between two producer iterations.
    pub produce_interval: Duration,
    /// Sleep between two consumer iterations.
    pub consume_interval: Duration,
    /// Retry delay after a failed scratch allocation in the consumer.
    pub alloc_backoff: BackoffPolicy,

    /// Timeout count at which the consumer leaves `Warning` for `Recovery`.
    pub warning_threshold: u32,
    /// Timeout count at which the consumer leaves `Recovery` for `ShutdownPrep`.
    pub recovery_threshold: u32,
    /// Timeout count at which the consumer terminates.
    pub shutdown_threshold: u32,

    /// Period of the supervisor audit loop.
    pub supervisor_period: Duration,
    /// Consumer respawn count that triggers a full system reset.
    pub consumer_restart_ceiling: u32,
    /// Producer respawn count that triggers a full system reset.
    ///
    /// `None` keeps the reference behaviour: a stale producer is respawned
    /// forever and never escalates.
    pub producer_restart_ceiling: Option<u32>,
    /// Delay between reaching a restart ceiling and resetting the system.
    pub restart_grace: Duration,
    /// Historical-minimum available memory below which a critical alert fires.
    pub memory_floor: usize,

    /// Maximum gap between two feeds of a watchdog-subscribed worker.
    pub watchdog_timeout: Duration,
    /// Maximum wait for workers to stop on an OS shutdown signal.
    pub grace: Duration,
    /// Capacity of the event bus ring buffer (min 1; clamped by Bus).
    pub bus_capacity: usize,

    /// Scheduling metadata of the producer.
    pub producer: Placement,
    /// Scheduling metadata of the consumer.
    pub consumer: Placement,
    /// Scheduling metadata of the supervisor.
    pub supervisor: Placement,
}

impl Config {
    /// Heartbeat age after which a worker is considered stalled (2 × supervisor period).
    #[inline]
    pub fn stale_after(&self) -> Duration {
        self.supervisor_period.saturating_mul(2)
    }

    /// Returns the send timeout as an `Option`.
    ///
    /// - `None` → non-blocking attempt
    /// - `Some(d)` → wait up to `d` for space
    #[inline]
    pub fn send_wait(&self) -> Option<Duration> {
        if self.send_timeout == Duration::ZERO {
            None
        } else {
            Some(self.send_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks that the configuration can drive the runtime.
    ///
    /// Rejects zero capacity/periods, non-increasing thresholds, a zero restart
    /// ceiling, and worker loops whose worst-case feed gap reaches the watchdog timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Zero { field: "capacity" });
        }
        if self.recv_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "recv_timeout",
            });
        }
        if self.supervisor_period.is_zero() {
            return Err(ConfigError::Zero {
                field: "supervisor_period",
            });
        }
        if self.watchdog_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "watchdog_timeout",
            });
        }
        if self.consumer_restart_ceiling == 0 || self.producer_restart_ceiling == Some(0) {
            return Err(ConfigError::Zero {
                field: "restart_ceiling",
            });
        }
        if !(0 < self.warning_threshold
            && self.warning_threshold < self.recovery_threshold
            && self.recovery_threshold < self.shutdown_threshold)
        {
            return Err(ConfigError::Thresholds {
                warning: self.warning_threshold,
                recovery: self.recovery_threshold,
                shutdown: self.shutdown_threshold,
            });
        }

        let producer_gap = self.produce_interval + self.send_timeout;
        if producer_gap >= self.watchdog_timeout {
            return Err(ConfigError::WatchdogDeadline {
                field: "produce_interval",
                interval: producer_gap,
                watchdog: self.watchdog_timeout,
            });
        }
        let consumer_gap = self.consume_interval + self.recv_timeout;
        if consumer_gap >= self.watchdog_timeout {
            return Err(ConfigError::WatchdogDeadline {
                field: "recv_timeout",
                interval: consumer_gap,
                watchdog: self.watchdog_timeout,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    /// Reference configuration:
    ///
    /// - channel: `capacity = 10`, `send_timeout = 0s`, `recv_timeout = 2s`
    /// - workers: produce every 200ms, consume every 50ms, alloc retry 100ms
    /// - escalation: `3 / 5 / 10`
    /// - supervision: period 3s, consumer ceiling 5, producer unbounded,
    ///   restart grace 1s, memory floor 10 KiB
    /// - runtime: watchdog 5s, shutdown grace 5s, bus 1024
    fn default() -> Self {
        Self {
            capacity: 10,
            send_timeout: Duration::ZERO,
            recv_timeout: Duration::from_millis(2000),
            produce_interval: Duration::from_millis(200),
            consume_interval: Duration::from_millis(50),
            alloc_backoff: BackoffPolicy::default(),
            warning_threshold: 3,
            recovery_threshold: 5,
            shutdown_threshold: 10,
            supervisor_period: Duration::from_millis(3000),
            consumer_restart_ceiling: 5,
            producer_restart_ceiling: None,
            restart_grace: Duration::from_millis(1000),
            memory_floor: 10 * 1024,
            watchdog_timeout: Duration::from_secs(5),
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            producer: Placement::new(5, 1, 3072),
            consumer: Placement::new(4, 1, 4096),
            supervisor: Placement::new(6, 0, 3072),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_stale_after_is_two_periods() {
        let cfg = Config::default();
        assert_eq!(cfg.stale_after(), Duration::from_millis(6000));
    }

    #[test]
    fn test_zero_send_timeout_means_no_wait() {
        let mut cfg = Config::default();
        assert_eq!(cfg.send_wait(), None);
        cfg.send_timeout = Duration::from_millis(5);
        assert_eq!(cfg.send_wait(), Some(Duration::from_millis(5)));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let cfg = Config {
            capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Zero { field: "capacity" }));
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let cfg = Config {
            warning_threshold: 5,
            recovery_threshold: 5,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Thresholds { .. })
        ));
    }

    #[test]
    fn test_rejects_recv_timeout_beyond_watchdog() {
        let cfg = Config {
            recv_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "config_watchdog_deadline");
    }

    #[test]
    fn test_rejects_zero_producer_ceiling() {
        let cfg = Config {
            producer_restart_ceiling: Some(0),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
