//! # Process termination signals.
//!
//! [`wait_for_shutdown_signal`] completes on the first of:
//! - **unix**: `SIGINT`, `SIGTERM` (systemd, container runtimes), `SIGQUIT`
//! - **elsewhere**: Ctrl-C
//!
//! It reports which signal arrived so the daemon can log it before tearing workers down.

use std::fmt;

/// The signal that requested shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// `SIGINT` or Ctrl-C.
    Interrupt,
    /// `SIGTERM`.
    Terminate,
    /// `SIGQUIT`.
    Quit,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Quit => "SIGQUIT",
        })
    }
}

/// Waits for a termination signal.
///
/// Each call installs its own listeners. Fails only if a listener cannot be registered.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let received = tokio::select! {
        _ = sigint.recv() => ShutdownSignal::Interrupt,
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        _ = sigquit.recv() => ShutdownSignal::Quit,
    };
    Ok(received)
}

/// Waits for a termination signal.
///
/// Each call installs its own listener. Fails only if the listener cannot be registered.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}
