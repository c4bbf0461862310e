//! # streamvisor
//!
//! **Streamvisor** is a self-supervising producer/consumer control loop.
//!
//! A producer pushes a numbered stream into a bounded channel, a consumer
//! drains it and degrades through an escalation ladder when starved, and a
//! supervisor audits both, respawns stalled workers and finally resets the
//! whole system when respawning does not help. A watchdog sits underneath as
//! the last-resort safety net.
//!
//! ## Architecture
//! ```text
//!            ┌───────────────────────── Context (one per boot) ─────────────────────────┐
//!            │  BoundedChannel<u64>   StatusRegister   HeartbeatTracker   Bus   Watchdog │
//!            └────────▲──────────────────────▲───────────────▲─────────────────▲────────┘
//!                     │ send / recv          │ flags         │ beats           │ feed
//!        ┌────────────┴───┐          ┌───────┴────────┐      │                 │
//!        │    Producer    │─────────►│    Consumer    │      │                 │
//!        │ every 200 ms   │  items   │ recv ≤ 2000 ms │      │                 │
//!        └────────▲───────┘          └───────▲────────┘      │                 │
//!                 │ spawn / terminate        │               │                 │
//!        ┌────────┴──────────────────────────┴───────────────┴──┐   ┌──────────┴───────┐
//!        │  Supervisor (every 3000 ms)                          │   │ Watchdog monitor │
//!        │  report · consumer check · producer check · memory   │   │  5 s deadline    │
//!        └───────────────────────────┬──────────────────────────┘   └────────┬─────────┘
//!                                    │ ceiling reached                       │ expired
//!                                    ▼                                       ▼
//!                            ┌─────────────────────── ResetLine ─────────────────────┐
//!                            │ first trigger wins → System::run returns Exit::Reset  │
//!                            └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Escalation ladder (consumer)
//! ```text
//! timeouts:  0    1..3        3..5          5..10            10
//! state:     Ok → Warning  →  Recovery   →  ShutdownPrep  →  Terminated
//! action:    -    flag        reset chan    flag             exit (supervisor respawns)
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use streamvisor::{Config, Exit, LogWriter, Subscribe, System};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let system = System::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     loop {
//!         match system.run().await? {
//!             Exit::Shutdown => break,
//!             Exit::Reset(reason) => eprintln!("rebooting: {reason}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//! | Feature     | Description                                   |
//! |-------------|-----------------------------------------------|
//! | `logging`   | Built-in [`LogWriter`] rendering via `tracing` |

mod config;
mod core;
mod error;
mod events;
mod policies;
mod shared;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{
    Audit, Exit, ResetLine, ResetReason, Supervisor, System, SystemBuilder, Watchdog,
    WatchdogLease, WorkerFactory, WorkerHandle,
};
pub use error::{ConfigError, RecvError, RuntimeError, SendError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use shared::{
    Beat, BoundedChannel, ConsumerHealth, Context, HeartbeatTracker, Item, MemoryProbe,
    MemorySample, MemoryWatermark, ProducerHealth, StatusFlag, StatusRegister, StatusSnapshot,
    SystemMemory,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    BoxTaskFuture, Consumer, Escalation, EscalationState, Placement, Producer, Task, TaskFn,
    TaskRef, Thresholds, WorkerSpec,
};

// Built-in `tracing` subscriber.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
