//! `streamvisord`: the stream supervisor behind an HTTP control surface.
//!
//! Every flag has a `STREAMVISOR_*` environment fallback. Logging is controlled by
//! `RUST_LOG` (default `streamvisor=info,streamvisord=info`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::oneshot;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use streamvisor::control::{self, ControlState};
use streamvisor::{
    BackoffPolicy, Config, EventLog, FfmpegSource, FfmpegSourceConfig, LatestFrameSink,
    RelayConfig, Subscribe, Supervisor, wait_for_shutdown_signal,
};

#[derive(Debug, Parser)]
#[command(name = "streamvisord", version, about = "Supervises camera detection loops and RTSP relays")]
struct Args {
    /// Address the control API listens on.
    #[arg(long, env = "STREAMVISOR_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Executable used for relays and frame decoding.
    #[arg(long, env = "STREAMVISOR_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: String,

    /// Media server base URL relays publish to.
    #[arg(long, env = "STREAMVISOR_OUTPUT_BASE", default_value = "rtsp://localhost:8554")]
    output_base: String,

    /// Seconds a relay must survive before its start is confirmed.
    #[arg(long, env = "STREAMVISOR_CONFIRM_SECS", default_value_t = 1.0)]
    confirm_secs: f64,

    /// Seconds a worker gets to exit before it is killed.
    #[arg(long, env = "STREAMVISOR_GRACE_SECS", default_value_t = 5.0)]
    grace_secs: f64,

    /// Seconds between relay liveness checks.
    #[arg(long, env = "STREAMVISOR_MONITOR_SECS", default_value_t = 5.0)]
    monitor_secs: f64,

    /// Seconds between reconnect attempts of a camera stream.
    #[arg(long, env = "STREAMVISOR_RECONNECT_SECS", default_value_t = 15.0)]
    reconnect_secs: f64,

    /// Run detection on every n-th frame.
    #[arg(long, env = "STREAMVISOR_STRIDE", default_value_t = 10)]
    stride: u32,

    /// Width frames are decoded at.
    #[arg(long, env = "STREAMVISOR_FRAME_WIDTH", default_value_t = 640)]
    frame_width: u32,

    /// Height frames are decoded at.
    #[arg(long, env = "STREAMVISOR_FRAME_HEIGHT", default_value_t = 360)]
    frame_height: u32,

    /// Seconds to wait for the first frame of a camera stream.
    #[arg(long, env = "STREAMVISOR_OPEN_TIMEOUT_SECS", default_value_t = 10.0)]
    open_timeout_secs: f64,

    /// Also write every runtime event to the log (target `streamvisor::events`).
    #[arg(long, env = "STREAMVISOR_LOG_EVENTS")]
    log_events: bool,
}

impl Args {
    fn config(&self) -> Result<Config> {
        Ok(Config {
            reconnect: BackoffPolicy::fixed(secs("reconnect-secs", self.reconnect_secs)?),
            confirm_window: secs("confirm-secs", self.confirm_secs)?,
            stop_grace: secs("grace-secs", self.grace_secs)?,
            monitor_interval: secs("monitor-secs", self.monitor_secs)?,
            detection_stride: self.stride,
            ..Config::default()
        })
    }

    fn source(&self) -> Result<FfmpegSourceConfig> {
        Ok(FfmpegSourceConfig {
            program: self.ffmpeg.clone(),
            width: self.frame_width,
            height: self.frame_height,
            open_timeout: secs("open-timeout-secs", self.open_timeout_secs)?,
        })
    }

    fn relay(&self) -> RelayConfig {
        RelayConfig {
            program: self.ffmpeg.clone(),
            output_base: self.output_base.clone(),
        }
    }
}

fn secs(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("--{flag}: invalid duration {value}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("streamvisor=info,streamvisord=info")),
        )
        .init();

    let args = Args::parse();
    let cfg = args.config()?;
    let frames = Arc::new(LatestFrameSink::new());
    let subscribers: Vec<Arc<dyn Subscribe>> = if args.log_events {
        vec![Arc::new(EventLog)]
    } else {
        Vec::new()
    };

    let supervisor = Supervisor::builder(cfg)
        .with_stream_source(Arc::new(FfmpegSource::new(args.source()?)))
        .with_sink(frames.clone())
        .with_subscribers(subscribers)
        .build();
    let app = control::router(
        ControlState::new(Arc::clone(&supervisor))
            .with_relay(args.relay())
            .with_frames(frames),
    );

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    tracing::info!(addr = %args.bind, version = env!("CARGO_PKG_VERSION"), "control API listening");

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let shutdown = async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => tracing::info!(%signal, "termination signal received"),
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for termination signals");
                std::future::pending::<()>().await;
            }
        }
        let _ = signalled_tx.send(());
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("control API failed")?;
    if signalled_rx.await.is_err() {
        tracing::warn!("control API stopped without a signal");
    }

    if let Err(e) = supervisor.shutdown_all().await {
        tracing::warn!(error = %e, label = e.as_label(), "workers had to be forced down");
    }
    tracing::info!("bye");
    Ok(())
}
