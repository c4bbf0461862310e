//! # Workers and their building blocks.
//!
//! - [`Task`] trait for a cancelable worker body, shared as [`TaskRef`]
//! - [`TaskFn`] closure-backed task, mostly for custom or scripted workers
//! - [`WorkerSpec`] / [`Placement`] what to run and where
//! - [`Producer`] / [`Consumer`] the two built-in workers of the data path
//! - [`Escalation`] the consumer's timeout ladder

mod consumer;
mod escalation;
mod producer;
mod spec;
mod task;
mod task_fn;

pub use consumer::Consumer;
pub use escalation::{Escalation, EscalationState, Thresholds};
pub use producer::Producer;
pub use spec::{Placement, WorkerSpec};
pub use task::{BoxTaskFuture, Task, TaskRef};
pub use task_fn::TaskFn;
