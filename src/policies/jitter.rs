//! # Jitter for reconnect delays.
//!
//! When a switch or NVR restarts, every camera behind it drops at the same moment and every
//! stream worker schedules its reconnect at the same moment too. [`JitterPolicy`] spreads
//! those retries out.
//!
//! - [`JitterPolicy::None`] exact delay
//! - [`JitterPolicy::Full`] uniform in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + uniform[0, delay/2]`

use rand::Rng;
use std::time::Duration;

/// Randomisation applied on top of a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the computed delay as is.
    #[default]
    None,
    /// Uniform delay in `[0, delay]`.
    Full,
    /// Half the delay plus a uniform share of the other half.
    Equal,
}

impl JitterPolicy {
    /// Applies this jitter to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        let mut rng = rand::rng();
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rng.random_range(0..=ms - half))
            }
        }
    }
}
