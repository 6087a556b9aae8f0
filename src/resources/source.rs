//! # Stream source capability.
//!
//! A [`StreamSource`] opens an address and hands back a [`FrameStream`] that the worker
//! owns exclusively until it calls [`FrameStream::close`]. Implementations should keep as
//! little buffered as possible: the worker always wants the most recent frame, and a deep
//! buffer turns into seconds of latency on a busy camera.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::SourceError;

/// One decoded video frame.
///
/// Pixel data is shared (`Arc<[u8]>`), so cloning a frame is cheap.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Packed pixel data (layout defined by the source, BGR24 for [`FfmpegSource`](crate::FfmpegSource)).
    pub data: Arc<[u8]>,
    /// When the frame was read from the source.
    pub captured_at: Instant,
}

impl Frame {
    /// Wraps raw pixel data captured now.
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            captured_at: Instant::now(),
        }
    }
}

/// Factory for frame streams.
#[async_trait]
pub trait StreamSource: Send + Sync + 'static {
    /// Opens `address`.
    ///
    /// Returns [`SourceError::Connection`] when the stream cannot be reached.
    async fn open(&self, address: &str) -> Result<Box<dyn FrameStream>, SourceError>;
}

/// An open stream, exclusively owned by one worker.
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Reads the next frame.
    ///
    /// Returns [`SourceError::StreamEnded`] once the stream stops delivering.
    async fn read_next(&mut self) -> Result<Frame, SourceError>;

    /// Releases the underlying connection. Called exactly once, on every exit path.
    async fn close(&mut self);
}
