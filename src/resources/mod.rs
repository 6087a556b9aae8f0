//! External resources owned by workers.
//!
//! The engine never talks to a network stream or an OS process directly; it goes through
//! two capability seams:
//! - [`StreamSource`] / [`FrameStream`]: open an address, read frames, close.
//! - [`ProcessLauncher`] / [`ManagedProcess`]: spawn a command, poll liveness, read recent
//!   diagnostics, terminate gracefully, kill.
//!
//! Shipped implementations:
//! - [`OsProcessLauncher`]: `tokio::process` with a bounded stderr buffer.
//! - [`FfmpegSource`]: raw-frame decoding through an `ffmpeg` child.
//! - [`RelayRequest`]: builds the RTSP relay command line for a camera.

mod diagnostics;
mod ffmpeg;
mod process;
mod relay;
mod source;

pub use diagnostics::DiagnosticsBuffer;
pub use ffmpeg::{FfmpegSource, FfmpegSourceConfig};
pub use process::{CommandSpec, ManagedProcess, OsProcessLauncher, ProcessLauncher};
pub use relay::{RelayConfig, RelayRequest, redact_credentials};
pub use source::{Frame, FrameStream, StreamSource};
