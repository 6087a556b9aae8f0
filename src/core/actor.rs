//! # StreamActor: the supervisor loop of one stream worker.
//!
//! Owns one address and keeps a connection to it for as long as the worker lives:
//! open, pump frames through the detection cadence into the sink, and on any failure wait
//! out the reconnect backoff and open again.
//!
//! ## Event flow
//! ```text
//! WorkerStarting
//!   → open ok   → WorkerRunning → [frames] → stream lost → WorkerReconnecting
//!   → open fail → WorkerReconnecting
//!
//! Before every re-open:
//!   → BackoffScheduled → [sleep] → (next open)
//! ```
//!
//! ## Architecture
//! ```text
//! loop {
//!   ├─► failures > 0 → publish BackoffScheduled, sleep(backoff.next(failures - 1))
//!   ├─► open(address) ───────────► Err → failures += 1, Reconnecting, continue
//!   ├─► Running (failures = 0)
//!   ├─► pump:
//!   │     read_next() → cadence.step() → sink.publish()
//!   │     until read fails (→ Reconnecting) or cancel
//!   └─► close()
//! }
//! ```
//!
//! ## Rules
//! - Cancellation is observed before each open, during each open, during each read, during
//!   detection and during each backoff sleep.
//! - An opened stream is closed on every exit path.
//! - No error leaves the loop; each failure is logged with the worker key and its cause.

use std::sync::Arc;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::{
    core::status::StatusCell,
    detect::{Cadence, Detector, FrameSink},
    error::SourceError,
    events::{Bus, Event, EventKind},
    policies::BackoffPolicy,
    resources::{FrameStream, StreamSource, redact_credentials},
};

/// Parameters of a stream actor, taken from the runtime [`Config`](crate::Config).
#[derive(Clone, Copy, Debug)]
pub(crate) struct StreamActorParams {
    /// Reconnect delay policy.
    pub backoff: BackoffPolicy,
    /// Detection cadence stride.
    pub stride: u32,
}

/// Supervises one stream: connect, process, detect failure, back off, retry.
pub(crate) struct StreamActor {
    address: String,
    source: Arc<dyn StreamSource>,
    detector: Arc<dyn Detector>,
    sink: Arc<dyn FrameSink>,
    status: Arc<StatusCell>,
    params: StreamActorParams,
    bus: Bus,
}

impl StreamActor {
    pub(crate) fn new(
        address: String,
        source: Arc<dyn StreamSource>,
        detector: Arc<dyn Detector>,
        sink: Arc<dyn FrameSink>,
        status: Arc<StatusCell>,
        params: StreamActorParams,
        bus: Bus,
    ) -> Self {
        Self {
            address,
            source,
            detector,
            sink,
            status,
            params,
            bus,
        }
    }

    /// Runs until `cancel` fires.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        let key = Arc::clone(self.status.key());
        let shown = redact_credentials(&self.address);
        let mut cadence = Cadence::new(Arc::clone(&key), self.params.stride);
        let mut failures: u32 = 0;

        self.status.starting();
        tracing::info!(worker = %key, address = %shown, "stream worker starting");

        loop {
            if failures > 0 {
                let delay = self.params.backoff.next(failures - 1);
                self.bus.publish(
                    Event::new(EventKind::BackoffScheduled)
                        .with_worker(Arc::clone(&key))
                        .with_attempt(failures)
                        .with_delay(delay),
                );
                tracing::debug!(worker = %key, ?delay, failures, "reconnect scheduled");

                let sleep = time::sleep(delay);
                tokio::pin!(sleep);
                select! {
                    _ = &mut sleep => {}
                    _ = cancel.cancelled() => break,
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            let opened = select! {
                res = self.source.open(&self.address) => res,
                _ = cancel.cancelled() => break,
            };
            let mut stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(worker = %key, error = %e, failures, "cannot open stream");
                    self.status.reconnecting(failures, &e.to_string());
                    continue;
                }
            };

            failures = 0;
            self.status.running(None);
            tracing::info!(worker = %key, address = %shown, "stream connected");

            let lost = self.pump(&key, stream.as_mut(), &mut cadence, &cancel).await;
            stream.close().await;

            match lost {
                Some(e) => {
                    failures = 1;
                    tracing::warn!(worker = %key, error = %e, "stream lost");
                    self.status.reconnecting(failures, &e.to_string());
                }
                None => break,
            }
        }

        tracing::info!(worker = %key, "stream worker exited");
    }

    /// Reads frames until the stream fails (`Some`) or the worker is cancelled (`None`).
    async fn pump(
        &self,
        key: &str,
        stream: &mut dyn FrameStream,
        cadence: &mut Cadence,
        cancel: &CancellationToken,
    ) -> Option<SourceError> {
        loop {
            let read = select! {
                res = stream.read_next() => res,
                _ = cancel.cancelled() => return None,
            };
            let frame = match read {
                Ok(frame) => frame,
                Err(e) => return Some(e),
            };
            let output = select! {
                out = cadence.step(frame, self.detector.as_ref()) => out,
                _ = cancel.cancelled() => return None,
            };
            self.sink.publish(key, output);
        }
    }
}
