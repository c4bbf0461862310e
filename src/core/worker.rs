//! # Spawned worker handle.
//!
//! [`WorkerHandle`] is the runtime half of the scheduler contract: it owns one
//! running instance of a [`WorkerSpec`] and lets the supervisor check and
//! delete it.
//!
//! ## Event flow
//! ```text
//! spawn()     → WorkerStarted (with placement)
//! run ends:
//!   Ok(()) | Err(Canceled) → WorkerStopped
//!   Err(Terminated/Fatal)  → WorkerFailed
//!   panic                  → WorkerFailed ("panicked: ...")
//! terminate() on a live run → WorkerStopped (the run is aborted)
//! ```
//!
//! ## Rules
//! - Each handle runs under a **child token** of the parent, so cancelling the
//!   runtime reaches every worker while terminating one worker reaches only it.
//! - A handle whose run already ended is **not alive**; the supervisor treats
//!   it exactly like a missing worker.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;
use crate::tasks::WorkerSpec;

/// One running worker.
pub struct WorkerHandle {
    name: Arc<str>,
    token: CancellationToken,
    join: JoinHandle<()>,
    bus: Bus,
}

impl WorkerHandle {
    /// Starts a fresh run of `spec` under a child of `parent`.
    pub fn spawn(spec: &WorkerSpec, parent: &CancellationToken, bus: &Bus) -> Self {
        let name: Arc<str> = Arc::from(spec.name());
        let token = parent.child_token();

        bus.publish(
            Event::new(EventKind::WorkerStarted)
                .with_task(Arc::clone(&name))
                .with_placement(spec.placement()),
        );

        let fut = spec.task().spawn(token.clone());
        let join = {
            let bus = bus.clone();
            let name = Arc::clone(&name);
            tokio::spawn(async move {
                let res = AssertUnwindSafe(fut).catch_unwind().await;
                match res {
                    Ok(res) => report(&bus, &name, res),
                    Err(panic) => bus.publish(
                        Event::new(EventKind::WorkerFailed)
                            .with_task(name)
                            .with_reason(format!("panicked: {}", panic_message(&*panic))),
                    ),
                }
            })
        };

        Self {
            name,
            token,
            join,
            bus: bus.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the run has not finished.
    pub fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    /// Deletes the worker: cancels, aborts and waits for the run to be gone.
    pub async fn terminate(self) {
        let was_alive = self.is_alive();
        self.token.cancel();
        self.join.abort();
        if self.join.await.is_err() && was_alive {
            self.bus
                .publish(Event::new(EventKind::WorkerStopped).with_task(self.name));
        }
    }
}

fn report(bus: &Bus, name: &Arc<str>, res: Result<(), TaskError>) {
    match res {
        Ok(()) | Err(TaskError::Canceled) => {
            bus.publish(Event::new(EventKind::WorkerStopped).with_task(Arc::clone(name)));
        }
        Err(e) => {
            bus.publish(
                Event::new(EventKind::WorkerFailed)
                    .with_task(Arc::clone(name))
                    .with_reason(e.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::tasks::{Placement, TaskFn, TaskRef};

    fn spec(task: TaskRef) -> WorkerSpec {
        WorkerSpec::new(task, Placement::new(4, 1, 4096))
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn test_failed_run_is_not_alive() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task: TaskRef = TaskFn::arc("consumer", |_ctx: CancellationToken| async {
            Err::<(), _>(TaskError::Terminated { timeouts: 10 })
        });

        let handle = WorkerHandle::spawn(&spec(task), &CancellationToken::new(), &bus);
        while handle.is_alive() {
            tokio::task::yield_now().await;
        }
        handle.terminate().await;

        assert_eq!(
            drain(&mut rx),
            vec![EventKind::WorkerStarted, EventKind::WorkerFailed]
        );
    }

    #[tokio::test]
    async fn test_terminate_stops_live_worker() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task: TaskRef = TaskFn::arc("producer", |_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), TaskError>(())
        });

        let handle = WorkerHandle::spawn(&spec(task), &CancellationToken::new(), &bus);
        assert!(handle.is_alive());
        handle.terminate().await;

        assert_eq!(
            drain(&mut rx),
            vec![EventKind::WorkerStarted, EventKind::WorkerStopped]
        );
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task: TaskRef = TaskFn::arc("consumer", |_ctx: CancellationToken| async {
            if true {
                panic!("boom");
            }
            Ok::<(), TaskError>(())
        });

        let handle = WorkerHandle::spawn(&spec(task), &CancellationToken::new(), &bus);
        while handle.is_alive() {
            tokio::task::yield_now().await;
        }

        let _ = rx.recv().await.unwrap();
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::WorkerFailed);
        assert!(failed.reason.as_deref().unwrap_or("").contains("boom"));
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_worker() {
        let bus = Bus::new(16);
        let parent = CancellationToken::new();
        let task: TaskRef = TaskFn::arc("producer", |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(TaskError::Canceled)
        });

        let handle = WorkerHandle::spawn(&spec(task), &parent, &bus);
        parent.cancel();
        while handle.is_alive() {
            tokio::task::yield_now().await;
        }
        assert_eq!(handle.name(), "producer");
    }
}
