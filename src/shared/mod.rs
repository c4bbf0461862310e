//! Shared primitives and the context object handed to every worker.
//!
//! - [`BoundedChannel`] data path producer → consumer
//! - [`StatusRegister`] atomic health flags
//! - [`HeartbeatTracker`] last-success timestamps
//! - [`MemoryProbe`] / [`MemoryWatermark`] resource audit inputs
//!
//! [`Context`] bundles one instance of each, built once per boot and shared
//! through `Arc`. Nothing here is a global: a system reset drops the context
//! and the next boot starts from a fresh one.

mod channel;
mod heartbeat;
mod memory;
mod status;

pub use channel::BoundedChannel;
pub use heartbeat::{Beat, HeartbeatTracker};
pub use memory::{MemoryProbe, MemorySample, MemoryWatermark, SystemMemory};
pub use status::{ConsumerHealth, ProducerHealth, StatusFlag, StatusRegister, StatusSnapshot};

use crate::config::Config;
use crate::core::Watchdog;
use crate::events::Bus;

/// Payload type carried by the data channel.
pub type Item = u64;

/// Per-boot shared state.
///
/// The supervisor never touches `channel`; it only observes `status` and `heartbeats`.
pub struct Context {
    /// Runtime configuration.
    pub cfg: Config,
    /// Producer → consumer data path.
    pub channel: BoundedChannel<Item>,
    /// Cross-task health flags.
    pub status: StatusRegister,
    /// Last-success timestamps.
    pub heartbeats: HeartbeatTracker,
    /// Event bus for observability.
    pub bus: Bus,
    /// Liveness deadline enforcement.
    pub watchdog: Watchdog,
}

impl Context {
    /// Builds a fresh context from `cfg`.
    pub fn new(cfg: Config, bus: Bus, watchdog: Watchdog) -> Self {
        Self {
            channel: BoundedChannel::new(cfg.capacity),
            status: StatusRegister::new(),
            heartbeats: HeartbeatTracker::new(),
            cfg,
            bus,
            watchdog,
        }
    }
}
