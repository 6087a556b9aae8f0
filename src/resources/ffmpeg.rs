//! # Frame source backed by an `ffmpeg` decoder process.
//!
//! Decoding and rescaling are delegated to `ffmpeg`, which writes fixed-size BGR24 frames to
//! stdout. The decoder runs with `-fflags nobuffer -flags low_delay` so frames arrive as soon
//! as they are decoded, and the stream reads exactly one frame per call, so nothing piles up
//! on our side of the pipe.
//!
//! `open` only succeeds once the first frame has arrived: an RTSP URL that cannot be reached
//! makes `ffmpeg` exit, and that must surface as a connection failure rather than as an
//! open stream that immediately ends.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStdout, Command};

use crate::error::SourceError;
use crate::resources::diagnostics::DiagnosticsBuffer;
use crate::resources::process::{ManagedProcess, OsProcess};
use crate::resources::relay::redact_credentials;
use crate::resources::source::{Frame, FrameStream, StreamSource};

/// Decoder settings for [`FfmpegSource`].
#[derive(Clone, Debug)]
pub struct FfmpegSourceConfig {
    /// Decoder executable.
    pub program: String,
    /// Output frame width.
    pub width: u32,
    /// Output frame height.
    pub height: u32,
    /// How long `open` waits for the first frame.
    pub open_timeout: Duration,
}

impl Default for FfmpegSourceConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            width: 640,
            height: 360,
            open_timeout: Duration::from_secs(10),
        }
    }
}

impl FfmpegSourceConfig {
    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    fn args(&self, address: &str) -> Vec<String> {
        let scale = format!("scale={}:{}", self.width, self.height);
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-rtsp_transport",
            "tcp",
            "-fflags",
            "nobuffer",
            "-flags",
            "low_delay",
            "-i",
            address,
            "-an",
            "-vf",
            scale.as_str(),
            "-pix_fmt",
            "bgr24",
            "-f",
            "rawvideo",
            "pipe:1",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

/// [`StreamSource`] that decodes through an `ffmpeg` child.
#[derive(Clone, Debug, Default)]
pub struct FfmpegSource {
    cfg: FfmpegSourceConfig,
}

impl FfmpegSource {
    /// Creates a source with the given decoder settings.
    pub fn new(cfg: FfmpegSourceConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl StreamSource for FfmpegSource {
    async fn open(&self, address: &str) -> Result<Box<dyn FrameStream>, SourceError> {
        let shown = redact_credentials(address);
        let connection = |reason: String| SourceError::Connection {
            address: shown.clone(),
            reason,
        };

        let mut child = Command::new(&self.cfg.program)
            .args(self.cfg.args(address))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| connection(format!("cannot start `{}`: {e}", self.cfg.program)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| connection("decoder stdout unavailable".to_string()))?;

        let mut stream = FfmpegStream {
            process: OsProcess::new(child, DiagnosticsBuffer::new(32, 500)),
            stdout,
            frame_len: self.cfg.frame_len(),
            width: self.cfg.width,
            height: self.cfg.height,
            pending: None,
        };

        let first = tokio::time::timeout(self.cfg.open_timeout, stream.read_frame()).await;
        match first {
            Ok(Ok(frame)) => {
                stream.pending = Some(frame);
                Ok(Box::new(stream))
            }
            Ok(Err(e)) => {
                stream.close().await;
                let diagnostics = stream.process.diagnostics().await;
                Err(connection(if diagnostics.is_empty() {
                    e.to_string()
                } else {
                    diagnostics
                }))
            }
            Err(_elapsed) => {
                stream.close().await;
                Err(connection(format!(
                    "no frame within {:?}",
                    self.cfg.open_timeout
                )))
            }
        }
    }
}

struct FfmpegStream {
    process: OsProcess,
    stdout: ChildStdout,
    frame_len: usize,
    width: u32,
    height: u32,
    pending: Option<Frame>,
}

impl FfmpegStream {
    async fn read_frame(&mut self) -> std::io::Result<Frame> {
        let mut buf = vec![0u8; self.frame_len];
        self.stdout.read_exact(&mut buf).await?;
        Ok(Frame::new(self.width, self.height, Arc::<[u8]>::from(buf)))
    }
}

#[async_trait]
impl FrameStream for FfmpegStream {
    async fn read_next(&mut self) -> Result<Frame, SourceError> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }
        match self.read_frame().await {
            Ok(frame) => Ok(frame),
            Err(e) => {
                let diagnostics = self.process.stderr().render().await;
                Err(SourceError::StreamEnded {
                    reason: if diagnostics.is_empty() {
                        e.to_string()
                    } else {
                        diagnostics
                    },
                })
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.process.kill() {
            tracing::debug!(error = %e, "decoder kill failed");
        }
        let _ = tokio::time::timeout(Duration::from_secs(2), self.process.wait()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_args_request_raw_bgr_at_configured_size() {
        let cfg = FfmpegSourceConfig {
            width: 320,
            height: 180,
            ..FfmpegSourceConfig::default()
        };
        let args = cfg.args("rtsp://cam/1");
        assert!(args.windows(2).any(|w| w[0] == "-vf" && w[1] == "scale=320:180"));
        assert!(args.windows(2).any(|w| w[0] == "-pix_fmt" && w[1] == "bgr24"));
        assert!(args.windows(2).any(|w| w[0] == "-fflags" && w[1] == "nobuffer"));
        assert_eq!(cfg.frame_len(), 320 * 180 * 3);
    }

    #[tokio::test]
    async fn missing_decoder_is_a_connection_error() {
        let source = FfmpegSource::new(FfmpegSourceConfig {
            program: "streamvisor-no-such-decoder".into(),
            ..FfmpegSourceConfig::default()
        });
        let err = source
            .open("rtsp://admin:pw@cam/1")
            .await
            .err()
            .expect("open must fail");
        match err {
            SourceError::Connection { address, .. } => assert_eq!(address, "rtsp://***@cam/1"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
