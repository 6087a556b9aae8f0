use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{
    monitor::spawn_monitor,
    registry::Registry,
    supervisor::{Supervisor, spawn_subscriber_listener},
};
use crate::{
    core::Config,
    detect::{Detector, DiscardSink, FrameSink, NoopDetector},
    events::Bus,
    resources::{FfmpegSource, OsProcessLauncher, ProcessLauncher, StreamSource},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for a [`Supervisor`] with its capabilities.
///
/// Every capability has a default:
/// - stream source: [`FfmpegSource`]
/// - detector: [`NoopDetector`]
/// - frame sink: [`DiscardSink`]
/// - process launcher: [`OsProcessLauncher`] (diagnostics limited to `Config::diagnostics_limit`)
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    source: Option<Arc<dyn StreamSource>>,
    detector: Option<Arc<dyn Detector>>,
    sink: Option<Arc<dyn FrameSink>>,
    launcher: Option<Arc<dyn ProcessLauncher>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            source: None,
            detector: None,
            sink: None,
            launcher: None,
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events (worker lifecycle, admissions, crashes) through
    /// dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the source stream workers read frames from.
    pub fn with_stream_source(mut self, source: Arc<dyn StreamSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the detector shared by all stream workers.
    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Sets where stream workers publish their output frames.
    pub fn with_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the launcher used for process workers.
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Builds the Supervisor. Must be called inside a tokio runtime.
    ///
    /// Spawns the subscriber workers, the bus → subscribers listener and the health monitor.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let runtime_token = CancellationToken::new();

        let launcher = self.launcher.unwrap_or_else(|| {
            Arc::new(OsProcessLauncher::new(self.cfg.diagnostics_limit))
        });
        let registry = Registry::new(
            self.cfg.clone(),
            bus.clone(),
            runtime_token.clone(),
            self.source
                .unwrap_or_else(|| Arc::new(FfmpegSource::default())),
            self.detector.unwrap_or_else(|| Arc::new(NoopDetector)),
            self.sink.unwrap_or_else(|| Arc::new(DiscardSink)),
            launcher,
        );

        let mut background = vec![spawn_monitor(
            Arc::clone(&registry),
            self.cfg.monitor_interval_clamped(),
            runtime_token.clone(),
        )];
        background.extend(spawn_subscriber_listener(&bus, subs, runtime_token.clone()));

        Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            registry,
            runtime_token,
            background,
        ))
    }
}
