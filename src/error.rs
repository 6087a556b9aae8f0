//! Error types used by the streamvisor runtime, its workers and their resources.
//!
//! - [`RegistryError`]: synchronous failures of `start`/`stop` calls.
//! - [`LaunchError`]: a managed process could not be brought up (surfaced to the caller).
//! - [`SourceError`]: a stream could not be opened or ended (recoverable, stays inside the loop).
//! - [`DetectError`]: the detection capability failed for one frame.
//! - [`RuntimeError`]: failures of the runtime itself (shutdown exceeded its grace).
//!
//! Every enum provides `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Some workers did not release their resources within the grace period and had to be
    /// killed or aborted.
    #[error("shutdown grace {grace:?} exceeded; forced: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Keys of the workers that needed forceful termination.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors returned by registry operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A live worker already holds this key (or a start for it is in flight).
    #[error("worker '{key}' is already active")]
    AlreadyActive {
        /// The conflicting key.
        key: String,
    },

    /// No active worker holds this key.
    #[error("no active worker for '{key}'")]
    NotFound {
        /// The requested key.
        key: String,
    },

    /// The worker's process could not be started; it was never registered.
    #[error("worker '{key}' failed to start: {source}")]
    Launch {
        /// The requested key.
        key: String,
        /// Underlying launch failure (carries diagnostics when available).
        #[source]
        source: LaunchError,
    },

    /// The supervisor is shutting down and accepts no new workers.
    #[error("supervisor is shutting down")]
    ShuttingDown,
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::AlreadyActive { .. } => "worker_already_active",
            RegistryError::NotFound { .. } => "worker_not_found",
            RegistryError::Launch { .. } => "worker_launch_failed",
            RegistryError::ShuttingDown => "supervisor_shutting_down",
        }
    }
}

/// # Errors produced while launching a managed process.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum LaunchError {
    /// The executable does not exist or is not on `PATH`.
    #[error("`{program}` is not installed or not on PATH")]
    Unavailable {
        /// Program that was looked up.
        program: String,
    },

    /// The OS refused to spawn the process.
    #[error("failed to spawn `{program}`: {reason}")]
    Spawn {
        /// Program that was spawned.
        program: String,
        /// OS error text.
        reason: String,
    },

    /// The process exited inside the confirmation window.
    #[error("process exited during startup (code {code:?}): {diagnostics}")]
    ExitedEarly {
        /// Exit code, when the platform reports one.
        code: Option<i32>,
        /// Recent diagnostic output (stderr tail).
        diagnostics: String,
    },
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::LaunchError;
    ///
    /// let err = LaunchError::Unavailable { program: "ffmpeg".into() };
    /// assert_eq!(err.as_label(), "launch_unavailable");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::Unavailable { .. } => "launch_unavailable",
            LaunchError::Spawn { .. } => "launch_spawn_failed",
            LaunchError::ExitedEarly { .. } => "launch_exited_early",
        }
    }

    /// Diagnostic text captured from the process, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            LaunchError::ExitedEarly { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

/// # Errors produced by a stream source.
///
/// Both variants are recoverable: the worker loop converts them into a
/// `Reconnecting` transition and never lets them escape.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The stream could not be opened.
    #[error("cannot open {address}: {reason}")]
    Connection {
        /// Address that was opened (credentials redacted).
        address: String,
        /// Human-readable cause.
        reason: String,
    },

    /// An open stream stopped delivering frames.
    #[error("stream ended: {reason}")]
    StreamEnded {
        /// Human-readable cause.
        reason: String,
    },
}

impl SourceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceError::Connection { .. } => "source_connection",
            SourceError::StreamEnded { .. } => "source_stream_ended",
        }
    }
}

/// # Errors produced by the detection capability.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum DetectError {
    /// Detection failed for a single frame.
    #[error("detection failed: {reason}")]
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

impl DetectError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DetectError::Failed { .. } => "detect_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_error_exposes_diagnostics_only_for_early_exit() {
        let early = LaunchError::ExitedEarly {
            code: Some(1),
            diagnostics: "Connection refused".into(),
        };
        assert_eq!(early.diagnostics(), Some("Connection refused"));
        assert!(early.to_string().contains("Connection refused"));

        let missing = LaunchError::Unavailable {
            program: "ffmpeg".into(),
        };
        assert_eq!(missing.diagnostics(), None);
    }

    #[test]
    fn registry_error_wraps_launch_source() {
        let err = RegistryError::Launch {
            key: "cam".into(),
            source: LaunchError::Spawn {
                program: "ffmpeg".into(),
                reason: "permission denied".into(),
            },
        };
        assert_eq!(err.as_label(), "worker_launch_failed");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("failed to spawn `ffmpeg`: permission denied")
        );
    }
}
