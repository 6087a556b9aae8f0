//! # Runtime events emitted by workers, the registry and the monitor.
//!
//! [`EventKind`] falls into four groups:
//! - **Worker lifecycle**: the state machine of one worker (starting, running,
//!   reconnecting, stop requested, stopped, crashed)
//! - **Registry**: admission results (added, start rejected)
//! - **Shutdown**: process-wide teardown
//! - **Subscriber**: health of the fan-out pipeline itself
//!
//! Each event carries a process-wide monotonic `seq` so receivers can restore order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use streamvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_worker("camera-7")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_secs(15))
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.worker.as_deref(), Some("camera-7"));
//! assert_eq!(ev.delay_ms, Some(15_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// A worker entered `Starting` (first open/spawn attempt).
    ///
    /// Sets: `worker`
    WorkerStarting,

    /// A worker's resource is connected and delivering.
    ///
    /// Sets: `worker`, `pid` (process workers)
    WorkerRunning,

    /// A stream worker lost or failed to open its source.
    ///
    /// Sets: `worker`, `attempt` (consecutive failures), `reason`
    WorkerReconnecting,

    /// A reconnect attempt has been scheduled.
    ///
    /// Sets: `worker`, `attempt`, `delay_ms`, `reason`
    BackoffScheduled,

    /// Stop was requested; the worker is releasing its resource.
    ///
    /// Sets: `worker`
    StopRequested,

    /// The worker released its resource and left the registry.
    ///
    /// Sets: `worker`, `reason` (`"forced"` when the grace period ran out)
    WorkerStopped,

    /// The health monitor found the worker's resource dead and reaped it.
    ///
    /// Sets: `worker`, `pid`, `reason` (diagnostics tail)
    WorkerCrashed,

    // === Registry ===
    /// A worker passed admission and was inserted into the registry.
    ///
    /// Sets: `worker`, `pid` (process workers)
    WorkerAdded,

    /// A start request was refused.
    ///
    /// Sets: `worker`, `reason` (error label)
    StartRejected,

    // === Shutdown ===
    /// Process-wide shutdown began.
    ShutdownRequested,

    /// Every worker released its resource within the grace period.
    AllStoppedWithin,

    /// At least one worker had to be killed or aborted.
    ///
    /// Sets: `reason` (comma separated keys)
    GraceExceeded,

    // === Subscriber pipeline ===
    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `worker` (subscriber name), `reason`
    SubscriberPanicked,

    /// An event was dropped for one subscriber (queue full or closed).
    ///
    /// Sets: `worker` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide monotonic sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Worker key (or subscriber name for pipeline events).
    pub worker: Option<Arc<str>>,
    /// Human-readable cause or diagnostics.
    pub reason: Option<Arc<str>>,
    /// Consecutive failure count.
    pub attempt: Option<u32>,
    /// Scheduled delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// OS process id, for process workers.
    pub pid: Option<u32>,
}

impl Event {
    /// Creates an event stamped with the current time and the next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            pid: None,
        }
    }

    /// Attaches a worker key.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a failure count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches an OS process id when one is known.
    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }
}
