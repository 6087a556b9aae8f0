//! # Managed process capability.
//!
//! [`ProcessLauncher::spawn`] turns a [`CommandSpec`] into a [`ManagedProcess`]. The registry
//! owns the returned process for the worker's whole lifetime: the health monitor polls
//! [`ManagedProcess::is_alive`] under the registry lock, and `stop` takes it out to run the
//! terminate → grace → kill sequence.
//!
//! [`OsProcessLauncher`] is the `tokio::process` implementation. Children are spawned with
//! `kill_on_drop`, so a process can never outlive the handle that owns it.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::error::LaunchError;
use crate::resources::diagnostics::DiagnosticsBuffer;

/// Program plus arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Starts managed processes.
#[async_trait]
pub trait ProcessLauncher: Send + Sync + 'static {
    /// Spawns `cmd`.
    async fn spawn(&self, cmd: &CommandSpec) -> Result<Box<dyn ManagedProcess>, LaunchError>;
}

/// A running (or exited) child process.
#[async_trait]
pub trait ManagedProcess: Send + Sync + 'static {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Non-blocking liveness check.
    fn is_alive(&mut self) -> bool;

    /// Exit code once the process has exited and the platform reports one.
    fn exit_code(&self) -> Option<i32>;

    /// Recent diagnostic output (stderr tail).
    async fn diagnostics(&self) -> String;

    /// Requests a graceful exit (SIGTERM on unix).
    fn terminate(&mut self) -> io::Result<()>;

    /// Forces the process down.
    fn kill(&mut self) -> io::Result<()>;

    /// Waits for the process to exit.
    async fn wait(&mut self) -> io::Result<()>;
}

/// [`ProcessLauncher`] backed by `tokio::process`.
#[derive(Clone, Debug)]
pub struct OsProcessLauncher {
    diagnostics_lines: usize,
    diagnostics_chars: usize,
}

impl Default for OsProcessLauncher {
    fn default() -> Self {
        Self::new(500)
    }
}

impl OsProcessLauncher {
    /// Creates a launcher whose diagnostics render at most `diagnostics_chars` characters.
    pub fn new(diagnostics_chars: usize) -> Self {
        Self {
            diagnostics_lines: 64,
            diagnostics_chars,
        }
    }
}

#[async_trait]
impl ProcessLauncher for OsProcessLauncher {
    async fn spawn(&self, cmd: &CommandSpec) -> Result<Box<dyn ManagedProcess>, LaunchError> {
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| launch_error(&cmd.program, e))?;
        Ok(Box::new(OsProcess::new(
            child,
            DiagnosticsBuffer::new(self.diagnostics_lines, self.diagnostics_chars),
        )))
    }
}

pub(crate) fn launch_error(program: &str, e: io::Error) -> LaunchError {
    match e.kind() {
        io::ErrorKind::NotFound => LaunchError::Unavailable {
            program: program.to_string(),
        },
        _ => LaunchError::Spawn {
            program: program.to_string(),
            reason: e.to_string(),
        },
    }
}

/// A `tokio::process::Child` with its stderr drained into a [`DiagnosticsBuffer`].
pub(crate) struct OsProcess {
    child: Child,
    pid: Option<u32>,
    exit_code: Option<i32>,
    exited: bool,
    stderr: Arc<DiagnosticsBuffer>,
}

impl OsProcess {
    pub(crate) fn new(mut child: Child, stderr: DiagnosticsBuffer) -> Self {
        let stderr = Arc::new(stderr);
        if let Some(pipe) = child.stderr.take() {
            let buf = Arc::clone(&stderr);
            tokio::spawn(async move { buf.drain_from(pipe).await });
        }
        Self {
            pid: child.id(),
            child,
            exit_code: None,
            exited: false,
            stderr,
        }
    }

    pub(crate) fn stderr(&self) -> &Arc<DiagnosticsBuffer> {
        &self.stderr
    }

    fn mark_exited(&mut self, code: Option<i32>) {
        self.exited = true;
        self.exit_code = code;
    }
}

#[async_trait]
impl ManagedProcess for OsProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.mark_exited(status.code());
                false
            }
            Err(_) => {
                self.mark_exited(None);
                false
            }
        }
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    async fn diagnostics(&self) -> String {
        if self.exited {
            self.stderr.wait_drained(Duration::from_millis(250)).await;
        }
        self.stderr.render().await
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.exited {
            return Ok(());
        }
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            let pid = i32::try_from(pid)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
            return kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::from);
        }
        self.child.start_kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        if self.exited {
            return Ok(());
        }
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<()> {
        if self.exited {
            return Ok(());
        }
        let status = self.child.wait().await?;
        self.mark_exited(status.code());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let launcher = OsProcessLauncher::default();
        let err = launcher
            .spawn(&CommandSpec::new("streamvisor-definitely-not-installed"))
            .await
            .err()
            .expect("spawn must fail");
        assert_eq!(err.as_label(), "launch_unavailable");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exited_process_reports_stderr_and_code() {
        let launcher = OsProcessLauncher::default();
        let cmd = CommandSpec::new("sh").args(["-c", "echo 'Connection refused' >&2; exit 3"]);
        let mut process = launcher.spawn(&cmd).await.expect("spawn sh");

        process.wait().await.expect("wait");
        assert!(!process.is_alive());
        assert_eq!(process.exit_code(), Some(3));
        assert!(process.diagnostics().await.contains("Connection refused"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_on_stderr_does_not_kill_the_child() {
        let launcher = OsProcessLauncher::default();
        let script = "printf 'bad \\377 byte\\n' >&2; sleep 1; echo still-running >&2; sleep 30";
        let mut process = launcher
            .spawn(&CommandSpec::new("sh").args(["-c", script]))
            .await
            .expect("spawn sh");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(process.is_alive());
        let diagnostics = process.diagnostics().await;
        assert!(diagnostics.contains("bad"));
        assert!(diagnostics.contains("still-running"));

        process.kill().expect("kill");
        process.wait().await.expect("wait");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_stops_a_long_running_child() {
        let launcher = OsProcessLauncher::default();
        let mut process = launcher
            .spawn(&CommandSpec::new("sleep").arg("30"))
            .await
            .expect("spawn sleep");
        assert!(process.is_alive());

        process.terminate().expect("sigterm");
        tokio::time::timeout(Duration::from_secs(5), process.wait())
            .await
            .expect("exits after SIGTERM")
            .expect("wait");
        assert!(!process.is_alive());
    }
}
