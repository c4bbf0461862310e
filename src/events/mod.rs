//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the workers, the supervisor,
//! the watchdog and the runtime itself.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Producer`, `Consumer`, `Supervisor`, `Watchdog`, `WorkerHandle`,
//!   `System`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `System::subscriber_listener()` fans out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
