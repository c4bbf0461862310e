//! # Worker specification.
//!
//! [`WorkerSpec`] is the "create" half of the scheduler contract: which task to
//! run and where. [`Placement`] carries the priority, execution unit and stack
//! budget of the reference scheduler.
//!
//! ## Rules
//! - Placement is reported on every `WorkerStarted` event.
//! - The tokio runtime schedules cooperatively and does not pin tasks, so the
//!   values are metadata; the ordering `supervisor > producer > consumer` is
//!   still validated by tests against [`Config::default`](crate::Config).

use crate::tasks::task::TaskRef;

/// Scheduling metadata of one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Relative priority; higher preempts lower.
    pub priority: u8,
    /// Hardware execution unit the worker is assigned to.
    pub unit: u8,
    /// Stack budget in bytes.
    pub stack_size: usize,
}

impl Placement {
    pub const fn new(priority: u8, unit: u8, stack_size: usize) -> Self {
        Self {
            priority,
            unit,
            stack_size,
        }
    }
}

/// A task bundled with its placement.
#[derive(Clone)]
pub struct WorkerSpec {
    task: TaskRef,
    placement: Placement,
}

impl WorkerSpec {
    pub fn new(task: TaskRef, placement: Placement) -> Self {
        Self { task, placement }
    }

    /// Returns reference to the task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Convenience: returns the task name.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }
}

#[cfg(test)]
mod tests {
    use crate::Config;

    #[test]
    fn test_reference_priorities_and_units() {
        let cfg = Config::default();
        assert!(cfg.supervisor.priority > cfg.producer.priority);
        assert!(cfg.producer.priority > cfg.consumer.priority);
        assert_eq!(cfg.producer.unit, cfg.consumer.unit);
        assert_ne!(cfg.supervisor.unit, cfg.producer.unit);
    }
}
