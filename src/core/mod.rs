//! Runtime core: supervision, liveness and lifecycle of one boot.
//!
//! The public entry point is [`System`]; the rest is exported for callers that
//! assemble their own loop or want to test one piece in isolation.
//!
//! Internal modules:
//! - [`worker`]: one spawned worker (`spawn` / `terminate` / `is_alive`);
//! - [`supervisor`]: periodic audit, respawn and restart ceiling;
//! - [`watchdog`]: feed deadlines and their monitor;
//! - [`reset`]: first-wins system reset line;
//! - [`system`]: boot, subscriber wiring, graceful shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod reset;
mod shutdown;
mod supervisor;
mod system;
mod watchdog;
mod worker;

pub use builder::{SystemBuilder, WorkerFactory};
pub use reset::{ResetLine, ResetReason};
pub use supervisor::{Audit, Supervisor};
pub use system::{Exit, System};
pub use watchdog::{Watchdog, WatchdogLease};
pub use worker::WorkerHandle;
