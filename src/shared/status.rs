//! # Cross-task health flags.
//!
//! [`StatusRegister`] is a lock-free bitset: every [`StatusFlag`] can be set,
//! cleared and read independently and atomically. There is no transaction
//! across flags; readers may observe any interleaving of individual updates.
//!
//! ## Writers
//! ```text
//! Producer ──► GeneratorOk
//! Consumer ──► ReceiverOk | ReceiverWarning | ReceiverRecovery | ReceiverShutdown
//! Supervisor ─► clears Receiver{Warning,Recovery,Shutdown} after a respawn
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// One health bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusFlag {
    /// Producer enqueued at least one item.
    GeneratorOk = 1 << 0,
    /// Last consumer receive succeeded.
    ReceiverOk = 1 << 1,
    /// Consumer is timing out (warning stage).
    ReceiverWarning = 1 << 2,
    /// Consumer reset the channel (recovery stage).
    ReceiverRecovery = 1 << 3,
    /// Consumer is preparing to stop or has stopped.
    ReceiverShutdown = 1 << 4,
}

impl StatusFlag {
    /// Escalation flags cleared together on success and after a consumer respawn.
    pub const RECEIVER_ESCALATION: [StatusFlag; 3] = [
        StatusFlag::ReceiverWarning,
        StatusFlag::ReceiverRecovery,
        StatusFlag::ReceiverShutdown,
    ];

    #[inline]
    fn bit(self) -> u8 {
        self as u8
    }
}

/// Process-wide set of independent atomic health flags.
#[derive(Debug, Default)]
pub struct StatusRegister {
    bits: AtomicU8,
}

impl StatusRegister {
    /// Creates a register with every flag cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asserts `flag`.
    pub fn set(&self, flag: StatusFlag) {
        self.bits.fetch_or(flag.bit(), Ordering::AcqRel);
    }

    /// Clears `flag`.
    pub fn clear(&self, flag: StatusFlag) {
        self.bits.fetch_and(!flag.bit(), Ordering::AcqRel);
    }

    /// Clears every flag in `flags` with a single atomic update.
    pub fn clear_all(&self, flags: &[StatusFlag]) {
        let mask = flags.iter().fold(0u8, |acc, f| acc | f.bit());
        self.bits.fetch_and(!mask, Ordering::AcqRel);
    }

    /// True if `flag` is asserted.
    pub fn contains(&self, flag: StatusFlag) -> bool {
        self.snapshot().contains(flag)
    }

    /// Reads all flags at once.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot(self.bits.load(Ordering::Acquire))
    }
}

/// Point-in-time copy of the register.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot(u8);

impl StatusSnapshot {
    /// True if `flag` was asserted when the snapshot was taken.
    pub fn contains(self, flag: StatusFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Producer health as reported by the flags.
    pub fn producer(self) -> ProducerHealth {
        if self.contains(StatusFlag::GeneratorOk) {
            ProducerHealth::Ok
        } else {
            ProducerHealth::Unresponsive
        }
    }

    /// Consumer health as reported by the flags.
    ///
    /// The first asserted flag in `Ok > Warning > Recovery > Shutdown` order wins;
    /// none asserted is the indeterminate transient.
    pub fn consumer(self) -> ConsumerHealth {
        if self.contains(StatusFlag::ReceiverOk) {
            ConsumerHealth::Ok
        } else if self.contains(StatusFlag::ReceiverWarning) {
            ConsumerHealth::Warning
        } else if self.contains(StatusFlag::ReceiverRecovery) {
            ConsumerHealth::Recovering
        } else if self.contains(StatusFlag::ReceiverShutdown) {
            ConsumerHealth::Critical
        } else {
            ConsumerHealth::Unknown
        }
    }
}

impl fmt::Debug for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all = [
            StatusFlag::GeneratorOk,
            StatusFlag::ReceiverOk,
            StatusFlag::ReceiverWarning,
            StatusFlag::ReceiverRecovery,
            StatusFlag::ReceiverShutdown,
        ];
        f.debug_set()
            .entries(all.iter().filter(|flag| self.contains(**flag)))
            .finish()
    }
}

/// Producer status derived from [`StatusFlag::GeneratorOk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerHealth {
    Ok,
    Unresponsive,
}

/// Consumer status derived from the receiver flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerHealth {
    Ok,
    Warning,
    Recovering,
    Critical,
    Unknown,
}

impl ProducerHealth {
    pub fn as_label(self) -> &'static str {
        match self {
            ProducerHealth::Ok => "ok",
            ProducerHealth::Unresponsive => "unresponsive",
        }
    }
}

impl ConsumerHealth {
    pub fn as_label(self) -> &'static str {
        match self {
            ConsumerHealth::Ok => "ok",
            ConsumerHealth::Warning => "warning",
            ConsumerHealth::Recovering => "recovering",
            ConsumerHealth::Critical => "critical",
            ConsumerHealth::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let reg = StatusRegister::new();
        reg.set(StatusFlag::GeneratorOk);
        reg.set(StatusFlag::ReceiverWarning);
        reg.clear(StatusFlag::ReceiverWarning);
        assert!(reg.contains(StatusFlag::GeneratorOk));
        assert!(!reg.contains(StatusFlag::ReceiverWarning));
    }

    #[test]
    fn test_clear_all_leaves_other_flags() {
        let reg = StatusRegister::new();
        reg.set(StatusFlag::ReceiverOk);
        reg.set(StatusFlag::ReceiverRecovery);
        reg.set(StatusFlag::ReceiverShutdown);
        reg.clear_all(&StatusFlag::RECEIVER_ESCALATION);
        let snap = reg.snapshot();
        assert!(snap.contains(StatusFlag::ReceiverOk));
        assert!(!snap.contains(StatusFlag::ReceiverRecovery));
        assert!(!snap.contains(StatusFlag::ReceiverShutdown));
    }

    #[test]
    fn test_derived_health() {
        let reg = StatusRegister::new();
        assert_eq!(reg.snapshot().consumer(), ConsumerHealth::Unknown);
        assert_eq!(reg.snapshot().producer(), ProducerHealth::Unresponsive);

        reg.set(StatusFlag::ReceiverShutdown);
        assert_eq!(reg.snapshot().consumer(), ConsumerHealth::Critical);
        reg.set(StatusFlag::ReceiverRecovery);
        assert_eq!(reg.snapshot().consumer(), ConsumerHealth::Recovering);
        reg.set(StatusFlag::ReceiverOk);
        assert_eq!(reg.snapshot().consumer(), ConsumerHealth::Ok);
    }

    #[test]
    fn test_concurrent_set_clear_do_not_tear() {
        let reg = std::sync::Arc::new(StatusRegister::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if i % 2 == 0 {
                            reg.set(StatusFlag::GeneratorOk);
                        } else {
                            reg.set(StatusFlag::ReceiverWarning);
                            reg.clear(StatusFlag::ReceiverWarning);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(reg.contains(StatusFlag::GeneratorOk));
        assert!(!reg.contains(StatusFlag::ReceiverWarning));
    }
}
