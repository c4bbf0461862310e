//! # Consumer worker.
//!
//! Drains the data channel and degrades through the [`Escalation`] ladder when
//! nothing arrives. Every run starts with a fresh ladder, so a respawned
//! consumer is back at `Ok`.
//!
//! ## Iteration
//! ```text
//! reserve scratch ──fail──► AllocationFailed, sleep(backoff), retry (no feed)
//!       │
//! recv(recv_timeout)
//!   ├─ Ok(v)      → ReceiverOk, escalation flags cleared, heartbeat
//!   └─ timed out  → ReceiverOk cleared, then by stage:
//!        Warning       → ReceiverWarning
//!        Recovery      → channel reset, ReceiverRecovery
//!        ShutdownPrep  → ReceiverShutdown
//!        Terminated    → ReceiverShutdown, return Err(Terminated)
//! release scratch, feed watchdog, sleep(consume_interval)
//! ```
//! At most one of the four receiver flags is asserted after any iteration.

use std::collections::TryReserveError;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::shared::{Beat, Context, Item, StatusFlag};
use crate::tasks::escalation::{Escalation, EscalationState, Thresholds};
use crate::tasks::task::{BoxTaskFuture, Task};

/// Built-in consumer task.
pub struct Consumer {
    ctx: Arc<Context>,
    scratch_len: usize,
}

impl Consumer {
    pub const NAME: &'static str = "consumer";

    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx, scratch_len: 1 }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(ctx: Arc<Context>) -> Arc<Self> {
        Arc::new(Self::new(ctx))
    }

    /// Number of items reserved per iteration (default 1).
    #[must_use]
    pub fn with_scratch_len(mut self, len: usize) -> Self {
        self.scratch_len = len;
        self
    }
}

impl Task for Consumer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn spawn(&self, token: CancellationToken) -> BoxTaskFuture {
        Box::pin(run(Arc::clone(&self.ctx), self.scratch_len, token))
    }
}

fn reserve(len: usize) -> Result<Vec<Item>, TryReserveError> {
    let mut scratch = Vec::new();
    scratch.try_reserve_exact(len)?;
    Ok(scratch)
}

async fn run(ctx: Arc<Context>, scratch_len: usize, token: CancellationToken) -> Result<(), TaskError> {
    let lease = ctx.watchdog.subscribe(Consumer::NAME);
    let mut escalation = Escalation::new(Thresholds::from(&ctx.cfg));
    let mut alloc_failures: u32 = 0;

    loop {
        let mut scratch = match reserve(scratch_len) {
            Ok(scratch) => {
                alloc_failures = 0;
                scratch
            }
            Err(err) => {
                let delay = ctx.cfg.alloc_backoff.next(alloc_failures);
                alloc_failures = alloc_failures.saturating_add(1);
                ctx.bus.publish(
                    Event::new(EventKind::AllocationFailed)
                        .with_task(Consumer::NAME)
                        .with_reason(err.to_string())
                        .with_count(alloc_failures)
                        .with_delay(delay),
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => continue,
                    _ = token.cancelled() => return Err(TaskError::Canceled),
                }
            }
        };

        let received = tokio::select! {
            res = ctx.channel.recv(ctx.cfg.recv_timeout) => res,
            _ = token.cancelled() => return Err(TaskError::Canceled),
        };

        match received {
            Ok(value) => {
                scratch.push(value);
                escalation.on_success();
                ctx.status.set(StatusFlag::ReceiverOk);
                ctx.status.clear_all(&StatusFlag::RECEIVER_ESCALATION);
                ctx.heartbeats.beat(Beat::Consumer);
                ctx.bus.publish(
                    Event::new(EventKind::ValueReceived)
                        .with_task(Consumer::NAME)
                        .with_value(value),
                );
            }
            Err(_) => {
                let state = escalation.on_timeout();
                ctx.status.clear(StatusFlag::ReceiverOk);
                ctx.bus.publish(
                    Event::new(EventKind::ReceiveTimeout)
                        .with_task(Consumer::NAME)
                        .with_count(escalation.timeouts())
                        .with_escalation(state)
                        .with_timeout(ctx.cfg.recv_timeout),
                );
                if let Err(err) = escalate(&ctx, state, escalation.timeouts()) {
                    drop(scratch);
                    return Err(err);
                }
            }
        }

        drop(scratch);
        lease.feed();

        tokio::select! {
            _ = tokio::time::sleep(ctx.cfg.consume_interval) => {}
            _ = token.cancelled() => return Err(TaskError::Canceled),
        }
    }
}

/// Applies the side effects of entering `state` after a timeout.
fn escalate(ctx: &Context, state: EscalationState, timeouts: u32) -> Result<(), TaskError> {
    match state {
        EscalationState::Ok => {}
        EscalationState::Warning(_) => {
            ctx.status.set(StatusFlag::ReceiverWarning);
        }
        EscalationState::Recovery(_) => {
            let dropped = ctx.channel.reset();
            ctx.bus.publish(
                Event::new(EventKind::ChannelReset)
                    .with_task(Consumer::NAME)
                    .with_dropped(dropped),
            );
            ctx.status.set(StatusFlag::ReceiverRecovery);
            ctx.status.clear(StatusFlag::ReceiverWarning);
        }
        EscalationState::ShutdownPrep(_) => {
            ctx.status.set(StatusFlag::ReceiverShutdown);
            ctx.status
                .clear_all(&[StatusFlag::ReceiverWarning, StatusFlag::ReceiverRecovery]);
        }
        EscalationState::Terminated => {
            ctx.status.set(StatusFlag::ReceiverShutdown);
            ctx.status
                .clear_all(&[StatusFlag::ReceiverWarning, StatusFlag::ReceiverRecovery]);
            ctx.bus.publish(
                Event::new(EventKind::ConsumerTerminated)
                    .with_task(Consumer::NAME)
                    .with_count(timeouts),
            );
            return Err(TaskError::Terminated { timeouts });
        }
    }
    Ok(())
}
