//! # Event subscribers for the streamvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Worker ── publish(Event) ──► Bus ──► System listener ──► SubscriberSet::emit
//!                                                                │
//!                                                    ┌───────────┼───────────┐
//!                                                    ▼           ▼           ▼
//!                                                LogWriter    Metrics     Custom
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
