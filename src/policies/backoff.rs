//! # Retry delay after a failed scratch allocation.
//!
//! [`BackoffPolicy`] controls how long the consumer waits before retrying after
//! its per-iteration allocation failed. The delay for the `n`-th consecutive
//! failure (0-indexed) is `first × factor^n`, clamped to `max`, then jittered.
//! The base is derived from `n` alone, so jitter never feeds back into later delays.
//!
//! The default is a constant 100ms: short enough that the consumer stays well
//! inside its watchdog deadline while memory recovers.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_millis(400),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! assert_eq!(backoff.next(5), Duration::from_millis(400));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor per consecutive failure (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped base.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 100ms, capped at 1s, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A constant delay without jitter.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay before retrying after `failures` previous consecutive failures.
    pub fn next(&self, failures: u32) -> Duration {
        let exp = failures.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_constant_100ms() {
        let policy = BackoffPolicy::default();
        for failures in [0, 1, 7, 1000] {
            assert_eq!(policy.next(failures), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_growth_is_capped() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(50),
            max: Duration::from_millis(300),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(50));
        assert_eq!(policy.next(2), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(300));
        assert_eq!(policy.next(u32::MAX), Duration::from_millis(300));
    }

    #[test]
    fn test_first_above_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(3),
            max: Duration::from_secs(1),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_below_base() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..BackoffPolicy::constant(Duration::from_millis(100))
        };
        for failures in 0..50 {
            let d = policy.next(failures);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(100));
        }
    }
}
