//! # streamvisor
//!
//! **Streamvisor** keeps a keyed set of long-running media workers alive and accountable.
//!
//! Two kinds of worker live side by side under unique keys:
//! - **stream workers** read frames from a network address, run object detection on every
//!   N-th frame and publish the newest annotated frame. A lost connection is retried on a
//!   fixed delay until the worker is stopped.
//! - **process workers** own an external OS process (an RTSP relay). A start is only
//!   accepted once the process survived a short confirmation window; a later crash is
//!   noticed by a periodic health monitor and the worker is removed.
//!
//! ## Architecture
//! ```text
//!   control surface (axum, feature `http`)   or   your own code
//!                      │  start / stop / list / get / shutdown_all
//!                      ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Registry (key → worker handle, one mutex, never held on await) │
//! │  - health monitor (reaps dead workers every monitor_interval)     │
//! │  - Bus (broadcast events) ──► SubscriberSet (per-sub queues)      │
//! └──────┬─────────────────────────────────────────┬──────────────────┘
//!        ▼                                         ▼
//! ┌──────────────────────────┐          ┌──────────────────────────┐
//! │ StreamActor              │          │ ManagedProcess           │
//! │ open ─► read ─► Cadence  │          │ spawn ─► confirm window  │
//! │   ▲           ─► sink    │          │ ─► running ─► terminate  │
//! │   └── backoff on failure │          │     (grace) ─► kill      │
//! └──────────────────────────┘          └──────────────────────────┘
//!     StreamSource / Detector /               ProcessLauncher
//!     FrameSink capabilities
//! ```
//!
//! ### Stream worker lifecycle
//! ```text
//! Starting ──open ok──► Running ──stream lost──► Reconnecting ──backoff──► open ...
//!     │                    │                          ▲
//!     └──open failed───────┼──────────────────────────┘
//!                          └──stop──► StoppingRequested ──► Stopped
//! ```
//!
//! ### Process worker lifecycle
//! ```text
//! spawn ──survives confirm_window──► Running ──stop──► StoppingRequested ──► Stopped
//!   └──dies early──► rejected with diagnostics       └──dies──► Crashed (reaped)
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                        |
//! |-------------------|-------------------------------------------------------------|-------------------------------------------|
//! | **Supervision**   | Keyed start/stop/list of workers, shutdown of all           | [`Supervisor`], [`WorkerSpec`]            |
//! | **Resources**     | Stream and process capabilities with OS/ffmpeg adapters     | [`StreamSource`], [`ProcessLauncher`]     |
//! | **Detection**     | Detector seam, stride cadence, output sinks                 | [`Detector`], [`Cadence`], [`FrameSink`]  |
//! | **Events**        | Lifecycle events for programmatic observation               | [`Event`], [`Subscribe`], [`EventLog`]    |
//! | **Policies**      | Reconnect delay                                             | [`BackoffPolicy`], [`JitterPolicy`]       |
//! | **Errors**        | Typed errors with stable labels                             | [`RegistryError`], [`LaunchError`]        |
//! | **Configuration** | Centralized runtime settings                                | [`Config`]                                |
//!
//! ## Optional features
//! - `http` (default): the axum [`control`] router and the `streamvisord` binary.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use streamvisor::{CommandSpec, Config, LatestFrameSink, Supervisor, WorkerSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let frames = Arc::new(LatestFrameSink::new());
//!     let sup = Supervisor::builder(Config::default())
//!         .with_sink(frames.clone())
//!         .build();
//!
//!     sup.start("camera-7", WorkerSpec::stream("rtsp://10.0.0.7/stream1")).await?;
//!     sup.start(
//!         "lobby",
//!         WorkerSpec::process(
//!             CommandSpec::new("ffmpeg").args(["-i", "rtsp://10.0.0.8/live", "-c", "copy", "-f", "rtsp", "rtsp://localhost:8554/lobby"]),
//!         ),
//!     )
//!     .await?;
//!
//!     if let Some(latest) = frames.get("camera-7") {
//!         println!("{} detections", latest.detections.len());
//!     }
//!
//!     sup.run_until_signal().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod detect;
mod error;
mod events;
mod policies;
mod resources;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use core::{
    Config, ShutdownSignal, StreamSpec, Supervisor, SupervisorBuilder, WorkerInfo, WorkerKind,
    WorkerSpec, WorkerState, wait_for_shutdown_signal,
};
pub use detect::{
    AnnotatedFrame, BoundingBox, Cadence, Detection, Detector, DiscardSink, FrameSink,
    LatestFrameSink, NoopDetector,
};
pub use error::{DetectError, LaunchError, RegistryError, RuntimeError, SourceError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use resources::{
    CommandSpec, DiagnosticsBuffer, FfmpegSource, FfmpegSourceConfig, Frame, FrameStream,
    ManagedProcess, OsProcessLauncher, ProcessLauncher, RelayConfig, RelayRequest, StreamSource,
    redact_credentials,
};
pub use subscribers::{EventLog, Subscribe, SubscriberSet};

// HTTP control surface.
// Enable with: `--features http` (on by default)
#[cfg(feature = "http")]
pub mod control;
