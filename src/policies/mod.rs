//! Retry timing policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] delay before the consumer retries a failed scratch allocation
//! - [`JitterPolicy`] randomization applied to that delay
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → constant 100ms, max 1s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
