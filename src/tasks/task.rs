//! # Task abstraction.
//!
//! A [`Task`] is the body of a supervised worker. Every call to
//! [`Task::spawn`] produces a **fresh** future with fresh local state, which is
//! what gives a respawned consumer a brand-new escalation ladder.
//!
//! The common handle type is [`TaskRef`], an `Arc<dyn Task>` suitable for sharing across the runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Boxed future returned by [`Task::spawn`].
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable worker body.
///
/// Implementors should observe `ctx` at their sleep points and return
/// `Err(TaskError::Canceled)` promptly when it fires.
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Creates one run of the task.
    fn spawn(&self, ctx: CancellationToken) -> BoxTaskFuture;
}
