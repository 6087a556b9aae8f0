//! Reconnect timing policies.
//!
//! - [`BackoffPolicy`] how long a stream worker waits before re-opening its source
//! - [`JitterPolicy`] optional randomisation so many cameras that drop together do not
//!   reconnect in lock-step
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=15s, factor=1.0 (fixed delay), max=15s, jitter=None.
//! - `JitterPolicy::None`.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
