//! # Event log subscriber.
//!
//! [`EventLog`] turns bus events into `tracing` records under the `streamvisor::events`
//! target, one line per event:
//!
//! ```text
//! DEBUG streamvisor::events: worker starting worker=camera-7
//! INFO  streamvisor::events: worker reconnecting worker=camera-7 attempt=2 reason="cannot open rtsp://***@cam/7: ..."
//! WARN  streamvisor::events: worker crashed worker=lobby pid=4242 reason="exit code 1: Connection refused"
//! ```
//!
//! The registry and the stream loop already log their own decisions; this subscriber is for
//! deployments that want the event stream itself in the log (for example with
//! `RUST_LOG=streamvisor::events=debug`).

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Writes every event as a `tracing` record.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventLog;

#[async_trait]
impl Subscribe for EventLog {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::WorkerStarting | EventKind::StopRequested | EventKind::WorkerAdded => {
                tracing::debug!(target: "streamvisor::events", seq = e.seq, worker, "{}", label(e.kind));
            }
            EventKind::WorkerRunning => {
                tracing::info!(target: "streamvisor::events", seq = e.seq, worker, pid = ?e.pid, "worker running");
            }
            EventKind::WorkerReconnecting | EventKind::StartRejected => {
                tracing::info!(target: "streamvisor::events", seq = e.seq, worker, attempt = ?e.attempt, reason, "{}", label(e.kind));
            }
            EventKind::BackoffScheduled => {
                tracing::debug!(target: "streamvisor::events", seq = e.seq, worker, attempt = ?e.attempt, delay_ms = ?e.delay_ms, "backoff scheduled");
            }
            EventKind::WorkerStopped => {
                tracing::info!(target: "streamvisor::events", seq = e.seq, worker, reason, "worker stopped");
            }
            EventKind::WorkerCrashed => {
                tracing::warn!(target: "streamvisor::events", seq = e.seq, worker, pid = ?e.pid, reason, "worker crashed");
            }
            EventKind::ShutdownRequested | EventKind::AllStoppedWithin => {
                tracing::info!(target: "streamvisor::events", seq = e.seq, "{}", label(e.kind));
            }
            EventKind::GraceExceeded | EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
                tracing::warn!(target: "streamvisor::events", seq = e.seq, worker, reason, "{}", label(e.kind));
            }
        }
    }

    fn name(&self) -> &'static str {
        "event-log"
    }
}

fn label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::WorkerStarting => "worker starting",
        EventKind::WorkerRunning => "worker running",
        EventKind::WorkerReconnecting => "worker reconnecting",
        EventKind::BackoffScheduled => "backoff scheduled",
        EventKind::StopRequested => "stop requested",
        EventKind::WorkerStopped => "worker stopped",
        EventKind::WorkerCrashed => "worker crashed",
        EventKind::WorkerAdded => "worker added",
        EventKind::StartRejected => "start rejected",
        EventKind::ShutdownRequested => "shutdown requested",
        EventKind::AllStoppedWithin => "all workers stopped within grace",
        EventKind::GraceExceeded => "shutdown grace exceeded",
        EventKind::SubscriberPanicked => "subscriber panicked",
        EventKind::SubscriberOverflow => "subscriber queue overflow",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_label() {
        let kinds = [
            EventKind::WorkerStarting,
            EventKind::WorkerRunning,
            EventKind::WorkerReconnecting,
            EventKind::BackoffScheduled,
            EventKind::StopRequested,
            EventKind::WorkerStopped,
            EventKind::WorkerCrashed,
            EventKind::WorkerAdded,
            EventKind::StartRejected,
            EventKind::ShutdownRequested,
            EventKind::AllStoppedWithin,
            EventKind::GraceExceeded,
            EventKind::SubscriberPanicked,
            EventKind::SubscriberOverflow,
        ];
        let labels: std::collections::HashSet<_> = kinds.iter().map(|k| label(*k)).collect();
        assert_eq!(labels.len(), kinds.len());
    }

    #[tokio::test]
    async fn logs_without_a_subscriber_installed() {
        let ev = Event::new(EventKind::WorkerCrashed)
            .with_worker("lobby")
            .with_pid(Some(7))
            .with_reason("exit code 1");
        EventLog.on_event(&ev).await;
    }
}
