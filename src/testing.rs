//! Scripted fakes for the resource and detection capabilities.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::detect::{Detection, Detector};
use crate::error::{DetectError, LaunchError, SourceError};
use crate::resources::{CommandSpec, Frame, FrameStream, ManagedProcess, ProcessLauncher, StreamSource};

/// Interval between frames of a scripted stream.
pub(crate) const FRAME_INTERVAL: Duration = Duration::from_millis(40);

/// What the next `open` call does.
#[derive(Clone, Copy, Debug)]
pub(crate) enum OpenOutcome {
    /// Fails with a connection error.
    Refuse,
    /// Opens a stream that yields this many frames, then ends.
    Frames(u32),
    /// Never completes.
    Hang,
}

/// [`StreamSource`] that follows a script; once exhausted every open is refused.
pub(crate) struct ScriptedSource {
    script: Mutex<VecDeque<OpenOutcome>>,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub(crate) fn new(script: impl IntoIterator<Item = OpenOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn open(&self, address: &str) -> Result<Box<dyn FrameStream>, SourceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(OpenOutcome::Refuse);
        match next {
            OpenOutcome::Refuse => Err(SourceError::Connection {
                address: address.to_string(),
                reason: "connection refused".into(),
            }),
            OpenOutcome::Frames(total) => Ok(Box::new(ScriptedStream {
                next: 0,
                total,
                closes: Arc::clone(&self.closes),
            })),
            OpenOutcome::Hang => std::future::pending().await,
        }
    }
}

struct ScriptedStream {
    next: u32,
    total: u32,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn read_next(&mut self) -> Result<Frame, SourceError> {
        tokio::time::sleep(FRAME_INTERVAL).await;
        if self.next >= self.total {
            return Err(SourceError::StreamEnded {
                reason: "end of stream".into(),
            });
        }
        // Width carries the frame's position in the stream.
        let frame = Frame::new(self.next, 1, vec![0u8; 3]);
        self.next += 1;
        Ok(frame)
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Detector that records the width of every frame it sees.
#[derive(Default)]
pub(crate) struct CountingDetector {
    seen: Mutex<Vec<u32>>,
    failing: Vec<u32>,
}

impl CountingDetector {
    /// Fails for frames whose width is in `widths`.
    pub(crate) fn failing_on(widths: impl IntoIterator<Item = u32>) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            failing: widths.into_iter().collect(),
        }
    }

    pub(crate) fn seen(&self) -> Vec<u32> {
        self.seen.lock().expect("seen lock").clone()
    }
}

#[async_trait]
impl Detector for CountingDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        self.seen.lock().expect("seen lock").push(frame.width);
        if self.failing.contains(&frame.width) {
            return Err(DetectError::Failed {
                reason: "model error".into(),
            });
        }
        Ok(Vec::new())
    }
}

/// Behaviour of one fake process.
#[derive(Clone, Debug, Default)]
pub(crate) struct ProcessPlan {
    /// Exits before the confirmation window ends.
    pub dies_at_start: bool,
    /// SIGTERM is ignored; only kill stops it.
    pub ignores_terminate: bool,
    /// Text returned by `diagnostics`.
    pub diagnostics: String,
}

/// Shared view into a fake process, for tests to poke and inspect.
pub(crate) struct ProcessProbe {
    pub pid: u32,
    dead: watch::Sender<bool>,
    terminated: AtomicBool,
    killed: AtomicBool,
}

impl ProcessProbe {
    /// Makes the process exit on its own.
    pub(crate) fn crash(&self) {
        self.dead.send_replace(true);
    }

    pub(crate) fn is_dead(&self) -> bool {
        *self.dead.borrow()
    }

    pub(crate) fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

enum LaunchPlan {
    Spawn(ProcessPlan),
    Fail(LaunchError),
}

/// [`ProcessLauncher`] that follows a script; once exhausted it spawns healthy processes.
pub(crate) struct FakeLauncher {
    script: Mutex<VecDeque<LaunchPlan>>,
    probes: Mutex<Vec<Arc<ProcessProbe>>>,
    next_pid: AtomicU32,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            probes: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(1000),
        }
    }
}

impl FakeLauncher {
    pub(crate) fn with_plans(plans: impl IntoIterator<Item = ProcessPlan>) -> Self {
        let launcher = Self::default();
        launcher
            .script
            .lock()
            .expect("script lock")
            .extend(plans.into_iter().map(LaunchPlan::Spawn));
        launcher
    }

    /// Every spawn fails as if the program were not installed.
    pub(crate) fn unavailable(program: &str) -> Self {
        let launcher = Self::default();
        launcher
            .script
            .lock()
            .expect("script lock")
            .push_back(LaunchPlan::Fail(LaunchError::Unavailable {
                program: program.to_string(),
            }));
        launcher
    }

    pub(crate) fn probes(&self) -> Vec<Arc<ProcessProbe>> {
        self.probes.lock().expect("probes lock").clone()
    }

    pub(crate) fn spawns(&self) -> usize {
        self.probes.lock().expect("probes lock").len()
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn spawn(&self, _cmd: &CommandSpec) -> Result<Box<dyn ManagedProcess>, LaunchError> {
        let next = self
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(LaunchPlan::Spawn(ProcessPlan::default()));
        let plan = match next {
            LaunchPlan::Spawn(plan) => plan,
            LaunchPlan::Fail(e) => return Err(e),
        };

        let (dead, _) = watch::channel(false);
        let probe = Arc::new(ProcessProbe {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            dead,
            terminated: AtomicBool::new(false),
            killed: AtomicBool::new(false),
        });
        self.probes
            .lock()
            .expect("probes lock")
            .push(Arc::clone(&probe));

        if plan.dies_at_start {
            let probe = Arc::clone(&probe);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                probe.crash();
            });
        }
        Ok(Box::new(FakeProcess { plan, probe }))
    }
}

struct FakeProcess {
    plan: ProcessPlan,
    probe: Arc<ProcessProbe>,
}

#[async_trait]
impl ManagedProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.probe.pid)
    }

    fn is_alive(&mut self) -> bool {
        !self.probe.is_dead()
    }

    fn exit_code(&self) -> Option<i32> {
        self.probe.is_dead().then_some(1)
    }

    async fn diagnostics(&self) -> String {
        self.plan.diagnostics.clone()
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        self.probe.terminated.store(true, Ordering::SeqCst);
        if !self.plan.ignores_terminate {
            self.probe.crash();
        }
        Ok(())
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.probe.killed.store(true, Ordering::SeqCst);
        self.probe.crash();
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<()> {
        let mut rx = self.probe.dead.subscribe();
        let _ = rx.wait_for(|dead| *dead).await;
        Ok(())
    }
}
