//! # Consumer escalation ladder.
//!
//! [`Escalation`] turns a stream of receive outcomes into an
//! [`EscalationState`]. It is owned by one consumer run and dies with it, so a
//! respawned consumer always starts at `Ok` with zero timeouts.
//!
//! ## Ladder
//! With thresholds `W < R < S` and `n` consecutive timeouts:
//! ```text
//!   success            → Ok                       (n reset to 0)
//!   1 ≤ n < W          → Warning(n)
//!   W ≤ n < R          → Recovery(n - W + 1)      (channel reset)
//!   R ≤ n < S          → ShutdownPrep(n - R + 1)
//!   n ≥ S              → Terminated               (absorbing)
//! ```
//! The payload is the 1-based position inside the current stage. The state
//! after `n` timeouts depends only on `n` and the thresholds.

use std::fmt;

use crate::config::Config;

/// Timeout counts at which the ladder moves up one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: u32,
    pub recovery: u32,
    pub shutdown: u32,
}

impl Thresholds {
    /// Reference thresholds `3 / 5 / 10`.
    pub const REFERENCE: Thresholds = Thresholds {
        warning: 3,
        recovery: 5,
        shutdown: 10,
    };

    /// Stage reached after `timeouts` consecutive timeouts.
    pub fn classify(&self, timeouts: u32) -> EscalationState {
        match timeouts {
            0 => EscalationState::Ok,
            n if n < self.warning => EscalationState::Warning(n),
            n if n < self.recovery => EscalationState::Recovery(n - self.warning + 1),
            n if n < self.shutdown => EscalationState::ShutdownPrep(n - self.recovery + 1),
            _ => EscalationState::Terminated,
        }
    }
}

impl From<&Config> for Thresholds {
    fn from(cfg: &Config) -> Self {
        Self {
            warning: cfg.warning_threshold,
            recovery: cfg.recovery_threshold,
            shutdown: cfg.shutdown_threshold,
        }
    }
}

/// Consumer health as a tagged state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    /// Last receive succeeded.
    Ok,
    /// Timing out; nothing done yet.
    Warning(u32),
    /// Timing out; the channel is reset on each step.
    Recovery(u32),
    /// Timing out; about to give up.
    ShutdownPrep(u32),
    /// Gave up. The run ends and only the supervisor can bring the consumer back.
    Terminated,
}

impl EscalationState {
    pub fn as_label(&self) -> &'static str {
        match self {
            EscalationState::Ok => "ok",
            EscalationState::Warning(_) => "warning",
            EscalationState::Recovery(_) => "recovery",
            EscalationState::ShutdownPrep(_) => "shutdown_prep",
            EscalationState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for EscalationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationState::Warning(n)
            | EscalationState::Recovery(n)
            | EscalationState::ShutdownPrep(n) => write!(f, "{}({n})", self.as_label()),
            EscalationState::Ok | EscalationState::Terminated => f.write_str(self.as_label()),
        }
    }
}

/// Per-run escalation state machine.
#[derive(Debug, Clone)]
pub struct Escalation {
    thresholds: Thresholds,
    timeouts: u32,
    state: EscalationState,
}

impl Escalation {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            timeouts: 0,
            state: EscalationState::Ok,
        }
    }

    /// A receive succeeded: back to `Ok`, counter cleared.
    ///
    /// Has no effect once `Terminated`.
    pub fn on_success(&mut self) -> EscalationState {
        if self.state != EscalationState::Terminated {
            self.timeouts = 0;
            self.state = EscalationState::Ok;
        }
        self.state
    }

    /// A receive timed out: count it and reclassify.
    pub fn on_timeout(&mut self) -> EscalationState {
        if self.state != EscalationState::Terminated {
            self.timeouts = self.timeouts.saturating_add(1);
            self.state = self.thresholds.classify(self.timeouts);
        }
        self.state
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    /// Consecutive timeouts since the last success.
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EscalationState::*;

    fn run(timeouts: u32) -> Escalation {
        let mut e = Escalation::new(Thresholds::REFERENCE);
        for _ in 0..timeouts {
            e.on_timeout();
        }
        e
    }

    #[test]
    fn test_reference_ladder() {
        let expected = [
            Warning(1),
            Warning(2),
            Recovery(1),
            Recovery(2),
            ShutdownPrep(1),
            ShutdownPrep(2),
            ShutdownPrep(3),
            ShutdownPrep(4),
            ShutdownPrep(5),
            Terminated,
        ];
        let mut e = Escalation::new(Thresholds::REFERENCE);
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(e.on_timeout(), *want, "after {} timeouts", i + 1);
        }
        assert_eq!(e.timeouts(), 10);
    }

    #[test]
    fn test_state_is_pure_function_of_count() {
        for n in 0..20 {
            assert_eq!(run(n).state(), Thresholds::REFERENCE.classify(n));
        }
    }

    #[test]
    fn test_success_resets_from_any_live_stage() {
        for n in 1..10 {
            let mut e = run(n);
            assert_eq!(e.on_success(), Ok);
            assert_eq!(e.timeouts(), 0);
            assert_eq!(e.on_timeout(), Warning(1));
        }
    }

    #[test]
    fn test_terminated_is_absorbing() {
        let mut e = run(10);
        assert_eq!(e.state(), Terminated);
        assert_eq!(e.on_success(), Terminated);
        assert_eq!(e.on_timeout(), Terminated);
        assert_eq!(e.timeouts(), 10);
    }

    #[test]
    fn test_custom_thresholds() {
        let th = Thresholds {
            warning: 1,
            recovery: 2,
            shutdown: 3,
        };
        assert_eq!(th.classify(1), Recovery(1));
        assert_eq!(th.classify(2), ShutdownPrep(1));
        assert_eq!(th.classify(3), Terminated);
    }

    #[test]
    fn test_display() {
        assert_eq!(Recovery(2).to_string(), "recovery(2)");
        assert_eq!(Terminated.to_string(), "terminated");
    }
}
