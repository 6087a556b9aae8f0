//! # Reconnect backoff for stream workers.
//!
//! [`BackoffPolicy`] decides how long a stream worker sleeps before it re-opens its source.
//! The delay for the `n`-th consecutive failure (0-indexed) is `first × factor^n`, clamped
//! to `max`, then jittered. Each value is derived from the failure count alone, so jitter
//! never feeds back into later delays.
//!
//! The default is a fixed 15 second delay (`factor = 1.0`): camera outages tend to last
//! long enough that a growing delay only postpones recovery.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{BackoffPolicy, JitterPolicy};
//!
//! let fixed = BackoffPolicy::fixed(Duration::from_secs(15));
//! assert_eq!(fixed.next(0), Duration::from_secs(15));
//! assert_eq!(fixed.next(7), Duration::from_secs(15));
//!
//! let growing = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(growing.next(3), Duration::from_secs(8));
//! assert_eq!(growing.next(10), Duration::from_secs(30));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Reconnect delay policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth per consecutive failure (`1.0` = fixed delay).
    pub factor: f64,
    /// Randomisation applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Fixed 15 second delay without jitter.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(15))
    }
}

impl BackoffPolicy {
    /// A constant delay without jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay after `failures` consecutive failures (0-indexed).
    pub fn next(&self, failures: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = failures.min(i32::MAX as u32) as i32;
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_fifteen_seconds() {
        let policy = BackoffPolicy::default();
        for failures in [0, 1, 2, 50, u32::MAX] {
            assert_eq!(policy.next(failures), Duration::from_secs(15));
        }
    }

    #[test]
    fn exponential_growth_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(10), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn equal_jitter_keeps_fixed_delay_in_upper_half() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..BackoffPolicy::fixed(Duration::from_secs(15))
        };
        for failures in 0..50 {
            let delay = policy.next(failures);
            assert!(delay >= Duration::from_millis(7_500));
            assert!(delay <= Duration::from_secs(15));
        }
    }
}
