//! # Worker state and its observable snapshot.
//!
//! Each worker owns one [`StatusCell`], shared between the registry handle and (for stream
//! workers) the worker loop. Every transition goes through the cell, which publishes the
//! matching lifecycle event, so the bus and `list()` can never disagree.
//!
//! ```text
//!            ┌────────────── open ok ──────────────┐
//!            │                                     ▼
//! Starting ──┴─ open fails ─► Reconnecting ◄──► Running
//!     │                            │               │
//!     └────────────┬───────────────┴───────────────┘
//!                  ▼                               ▼ (monitor)
//!          StoppingRequested ──► Stopped        Crashed
//! ```
//!
//! `StoppingRequested`, `Stopped` and `Crashed` are sticky: a worker loop that races a stop
//! cannot move its handle back to `Running` or `Reconnecting`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};
use tokio::sync::watch;

use crate::events::{Bus, Event, EventKind};
use crate::resources::CommandSpec;

/// Lifecycle state of a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// First open/spawn in progress.
    Starting,
    /// Resource connected and delivering.
    Running,
    /// Source lost or unreachable; waiting to re-open.
    Reconnecting,
    /// Stop requested; resource being released.
    StoppingRequested,
    /// Resource released.
    Stopped,
    /// Resource found dead by the health monitor.
    Crashed,
}

impl WorkerState {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Reconnecting => "reconnecting",
            WorkerState::StoppingRequested => "stopping_requested",
            WorkerState::Stopped => "stopped",
            WorkerState::Crashed => "crashed",
        }
    }

    /// Whether a stop has been requested or the worker is already gone.
    pub fn is_winding_down(&self) -> bool {
        matches!(
            self,
            WorkerState::StoppingRequested | WorkerState::Stopped | WorkerState::Crashed
        )
    }
}

/// What a worker owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// A frame-reading loop over a network stream.
    Stream,
    /// An external OS process.
    Process,
}

/// Parameters of a stream worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    /// Address handed to the stream source (e.g. an RTSP URL).
    pub address: String,
}

/// What to start under a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerSpec {
    /// Read frames from `address` and run detection on them.
    Stream(StreamSpec),
    /// Spawn and supervise a process.
    Process(CommandSpec),
}

impl WorkerSpec {
    /// A stream worker reading from `address`.
    pub fn stream(address: impl Into<String>) -> Self {
        WorkerSpec::Stream(StreamSpec {
            address: address.into(),
        })
    }

    /// A process worker running `cmd`.
    pub fn process(cmd: CommandSpec) -> Self {
        WorkerSpec::Process(cmd)
    }

    pub(crate) fn kind(&self) -> WorkerKind {
        match self {
            WorkerSpec::Stream(_) => WorkerKind::Stream,
            WorkerSpec::Process(_) => WorkerKind::Process,
        }
    }
}

/// Point-in-time view of one worker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkerInfo {
    /// Registry key.
    pub key: String,
    /// Worker kind.
    pub kind: WorkerKind,
    /// Current state.
    pub state: WorkerState,
    /// OS process id (process workers).
    pub pid: Option<u32>,
    /// When the worker was registered (serialized as unix milliseconds).
    #[serde(serialize_with = "unix_millis")]
    pub started_at: SystemTime,
    /// Most recent failure; cleared on a successful (re)connect.
    pub last_error: Option<String>,
    /// Number of failed open attempts over the worker's lifetime.
    pub reconnects: u32,
}

fn unix_millis<S: Serializer>(at: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0);
    s.serialize_u64(millis)
}

/// Mutable part of a worker's status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct WorkerStatus {
    pub(crate) state: WorkerState,
    pub(crate) last_error: Option<String>,
    pub(crate) reconnects: u32,
}

/// Shared, event-publishing status of one worker.
pub(crate) struct StatusCell {
    key: Arc<str>,
    bus: Bus,
    tx: watch::Sender<WorkerStatus>,
}

impl StatusCell {
    pub(crate) fn new(key: Arc<str>, bus: Bus) -> Arc<Self> {
        let (tx, _rx) = watch::channel(WorkerStatus {
            state: WorkerState::Starting,
            last_error: None,
            reconnects: 0,
        });
        Arc::new(Self { key, bus, tx })
    }

    pub(crate) fn key(&self) -> &Arc<str> {
        &self.key
    }

    pub(crate) fn snapshot(&self) -> WorkerStatus {
        self.tx.borrow().clone()
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.tx.borrow().state
    }

    #[cfg(test)]
    pub(crate) fn watch(&self) -> watch::Receiver<WorkerStatus> {
        self.tx.subscribe()
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_worker(Arc::clone(&self.key))
    }

    /// Applies `f` unless the worker is already winding down. Returns whether it applied.
    fn advance(&self, f: impl FnOnce(&mut WorkerStatus)) -> bool {
        self.tx.send_if_modified(|status| {
            if status.state.is_winding_down() {
                return false;
            }
            f(status);
            true
        })
    }

    pub(crate) fn starting(&self) {
        self.bus.publish(self.event(EventKind::WorkerStarting));
    }

    pub(crate) fn running(&self, pid: Option<u32>) {
        let applied = self.advance(|status| {
            status.state = WorkerState::Running;
            status.last_error = None;
        });
        if applied {
            self.bus
                .publish(self.event(EventKind::WorkerRunning).with_pid(pid));
        }
    }

    /// Records a failed open or a lost stream; returns the lifetime failure count.
    pub(crate) fn reconnecting(&self, failures: u32, reason: &str) -> u32 {
        let mut total = 0;
        let applied = self.advance(|status| {
            status.state = WorkerState::Reconnecting;
            status.last_error = Some(reason.to_string());
            status.reconnects = status.reconnects.saturating_add(1);
            total = status.reconnects;
        });
        if applied {
            self.bus.publish(
                self.event(EventKind::WorkerReconnecting)
                    .with_attempt(failures)
                    .with_reason(reason),
            );
        }
        total
    }

    /// Moves to `StoppingRequested`; returns `false` when already winding down.
    pub(crate) fn stopping(&self) -> bool {
        let applied = self.advance(|status| status.state = WorkerState::StoppingRequested);
        if applied {
            self.bus.publish(self.event(EventKind::StopRequested));
        }
        applied
    }

    pub(crate) fn stopped(&self, forced: bool) {
        self.tx.send_modify(|status| status.state = WorkerState::Stopped);
        let mut ev = self.event(EventKind::WorkerStopped);
        if forced {
            ev = ev.with_reason("forced");
        }
        self.bus.publish(ev);
    }

    pub(crate) fn crashed(&self, pid: Option<u32>, diagnostics: &str) {
        self.tx.send_modify(|status| {
            status.state = WorkerState::Crashed;
            status.last_error = Some(diagnostics.to_string());
        });
        self.bus.publish(
            self.event(EventKind::WorkerCrashed)
                .with_pid(pid)
                .with_reason(diagnostics),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn winding_down_states_are_sticky() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let cell = StatusCell::new(Arc::from("camera-1"), bus);

        cell.reconnecting(1, "connection refused");
        assert_eq!(cell.state(), WorkerState::Reconnecting);
        assert!(cell.stopping());
        assert!(!cell.stopping());

        cell.running(None);
        cell.reconnecting(2, "late failure");
        assert_eq!(cell.state(), WorkerState::StoppingRequested);
        assert_eq!(
            cell.snapshot().last_error.as_deref(),
            Some("connection refused")
        );

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::WorkerReconnecting, EventKind::StopRequested]
        );
    }

    #[test]
    fn running_clears_last_error_and_keeps_count() {
        let cell = StatusCell::new(Arc::from("camera-1"), Bus::new(4));
        assert_eq!(cell.reconnecting(1, "timeout"), 1);
        assert_eq!(cell.reconnecting(2, "timeout"), 2);
        cell.running(None);

        let status = cell.snapshot();
        assert_eq!(status.state, WorkerState::Running);
        assert_eq!(status.last_error, None);
        assert_eq!(status.reconnects, 2);
    }

    #[test]
    fn info_serializes_state_and_time_compactly() {
        let info = WorkerInfo {
            key: "lobby".into(),
            kind: WorkerKind::Process,
            state: WorkerState::Running,
            pid: Some(42),
            started_at: UNIX_EPOCH + std::time::Duration::from_millis(1_500),
            last_error: None,
            reconnects: 0,
        };
        let json = serde_json::to_value(&info).expect("serialize");
        assert_eq!(json["state"], "running");
        assert_eq!(json["kind"], "process");
        assert_eq!(json["started_at"], 1_500);
    }
}
