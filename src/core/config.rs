//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the supervisor runtime. It is passed to
//! [`Supervisor::builder`](crate::Supervisor::builder) and read by the registry, every stream
//! worker and the health monitor.
//!
//! ## Sentinel values
//! - `detection_stride = 0` → treated as 1 (detect on every frame)
//! - `bus_capacity = 0` → treated as 1
//! - `stop_grace = 0s` → no wait, force immediately

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `reconnect`: delay before a stream worker re-opens its source
/// - `confirm_window`: how long a new process must stay alive before `start` accepts it
/// - `stop_grace`: how long `stop`/`shutdown_all` wait before forcing a worker down
/// - `monitor_interval`: health monitor period (first check one period after build)
/// - `detection_stride`: run detection on every N-th frame
/// - `bus_capacity`: event bus ring buffer size
/// - `diagnostics_limit`: characters of process output kept for error reports
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid sprinkling
/// sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Reconnect delay policy for stream workers.
    pub reconnect: BackoffPolicy,

    /// Time a freshly spawned process must survive to count as started.
    ///
    /// A process that exits inside the window is reported to the caller as
    /// `LaunchError::ExitedEarly` and never enters the registry.
    pub confirm_window: Duration,

    /// Maximum time to wait for a worker to release its resource.
    ///
    /// Process workers get SIGTERM, then SIGKILL after `stop_grace`. Stream workers are
    /// cancelled, then aborted after `stop_grace`.
    pub stop_grace: Duration,

    /// Period of the health monitor.
    pub monitor_interval: Duration,

    /// Detection cadence stride.
    pub detection_stride: u32,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` messages observe `Lagged` and skip
    /// older items.
    pub bus_capacity: usize,

    /// Characters of diagnostic output kept for launch failures and crash reports.
    pub diagnostics_limit: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the detection stride clamped to a minimum of 1.
    #[inline]
    pub fn stride_clamped(&self) -> u32 {
        self.detection_stride.max(1)
    }

    /// Returns the monitor period, never shorter than 1 ms.
    ///
    /// `tokio::time::interval` panics on a zero period.
    #[inline]
    pub fn monitor_interval_clamped(&self) -> Duration {
        self.monitor_interval.max(Duration::from_millis(1))
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `reconnect = 15s` fixed, no jitter
    /// - `confirm_window = 1s`
    /// - `stop_grace = 5s`
    /// - `monitor_interval = 5s`
    /// - `detection_stride = 10`
    /// - `bus_capacity = 1024`
    /// - `diagnostics_limit = 500`
    fn default() -> Self {
        Self {
            reconnect: BackoffPolicy::default(),
            confirm_window: Duration::from_secs(1),
            stop_grace: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(5),
            detection_stride: 10,
            bus_capacity: 1024,
            diagnostics_limit: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_clamped() {
        let cfg = Config {
            detection_stride: 0,
            bus_capacity: 0,
            monitor_interval: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(cfg.stride_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.monitor_interval_clamped(), Duration::from_millis(1));
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.reconnect.next(0), Duration::from_secs(15));
        assert_eq!(cfg.confirm_window, Duration::from_secs(1));
        assert_eq!(cfg.stop_grace, Duration::from_secs(5));
        assert_eq!(cfg.monitor_interval, Duration::from_secs(5));
        assert_eq!(cfg.stride_clamped(), 10);
    }
}
