//! # Producer worker.
//!
//! Emits a monotonically increasing counter into the data channel every
//! `produce_interval`. The counter lives in the run, so a respawned producer
//! starts again from 1.
//!
//! ## Iteration
//! ```text
//! value += 1
//! send(value, send_wait)
//!   ├─ Ok   → GeneratorOk set, heartbeat, ValueSent
//!   └─ Full → ValueDropped (value lost, nothing else changes)
//! feed watchdog
//! sleep(produce_interval)  ← cancellation point
//! ```
//! A full channel never advances the producer heartbeat, which is what the
//! supervisor uses to detect a producer stuck behind a dead consumer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::shared::{Beat, Context, Item, StatusFlag};
use crate::tasks::task::{BoxTaskFuture, Task};

/// Built-in producer task.
pub struct Producer {
    ctx: Arc<Context>,
}

impl Producer {
    pub const NAME: &'static str = "producer";

    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(ctx: Arc<Context>) -> Arc<Self> {
        Arc::new(Self::new(ctx))
    }
}

impl Task for Producer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn spawn(&self, token: CancellationToken) -> BoxTaskFuture {
        Box::pin(run(Arc::clone(&self.ctx), token))
    }
}

async fn run(ctx: Arc<Context>, token: CancellationToken) -> Result<(), TaskError> {
    let lease = ctx.watchdog.subscribe(Producer::NAME);
    let mut value: Item = 0;

    loop {
        value = value.wrapping_add(1);

        match ctx.channel.send(value, ctx.cfg.send_wait()).await {
            Ok(()) => {
                ctx.status.set(StatusFlag::GeneratorOk);
                ctx.heartbeats.beat(Beat::Producer);
                ctx.bus.publish(
                    Event::new(EventKind::ValueSent)
                        .with_task(Producer::NAME)
                        .with_value(value),
                );
            }
            Err(err) => {
                let reason = err.as_label();
                ctx.bus.publish(
                    Event::new(EventKind::ValueDropped)
                        .with_task(Producer::NAME)
                        .with_value(err.into_inner())
                        .with_reason(reason),
                );
            }
        }

        lease.feed();

        tokio::select! {
            _ = tokio::time::sleep(ctx.cfg.produce_interval) => {}
            _ = token.cancelled() => return Err(TaskError::Canceled),
        }
    }
}
