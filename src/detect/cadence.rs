//! # Detection cadence.
//!
//! Running the model on every frame is wasteful and would make a worker fall behind its
//! camera. [`Cadence`] runs detection on every `stride`-th frame (frame `i` with
//! `i % stride == 0`) and reuses the last annotated frame in between.
//!
//! ```text
//! frame:    0   1   2  ...  9   10  11 ...  19  20  21
//! detect:   ✓   ·   ·       ·   ✓   ·       ·   ✓   ·
//! output:  A0  A0  A0      A0  A10 A10     A10 A20 A20
//! ```
//!
//! Before the first successful detection there is nothing to reuse, so the raw frame goes
//! out unannotated. A failed detection is logged and the previous output is kept; the
//! counter still advances so the stride stays aligned.

use std::sync::Arc;

use crate::detect::detector::{Detection, Detector};
use crate::resources::Frame;

/// A frame together with the detections found on it.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    /// The frame detection ran on (or the raw frame when nothing was annotated yet).
    pub frame: Frame,
    /// Detections for `frame`; empty when `annotated` is false.
    pub detections: Arc<[Detection]>,
    /// Position of `frame` in the worker's frame sequence (wrapping).
    pub frame_index: u64,
    /// Whether a detection pass produced this frame.
    pub annotated: bool,
}

/// Per-worker detection cadence state.
pub struct Cadence {
    key: Arc<str>,
    stride: u64,
    counter: u64,
    last: Option<Arc<AnnotatedFrame>>,
}

impl Cadence {
    /// Creates a cadence for worker `key`; `stride = 0` is treated as 1.
    pub fn new(key: impl Into<Arc<str>>, stride: u32) -> Self {
        Self {
            key: key.into(),
            stride: u64::from(stride.max(1)),
            counter: 0,
            last: None,
        }
    }

    /// Effective stride.
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// The most recent annotated frame, if any detection has succeeded.
    pub fn last_annotated(&self) -> Option<&Arc<AnnotatedFrame>> {
        self.last.as_ref()
    }

    /// Feeds one frame and returns the frame to publish.
    pub async fn step(&mut self, raw: Frame, detector: &dyn Detector) -> Arc<AnnotatedFrame> {
        let index = self.counter;
        self.counter = self.counter.wrapping_add(1);

        if index % self.stride == 0 {
            match detector.detect(&raw).await {
                Ok(found) => {
                    if !found.is_empty() {
                        tracing::debug!(worker = %self.key, frame = index, count = found.len(), "objects detected");
                    }
                    let annotated = Arc::new(AnnotatedFrame {
                        frame: raw,
                        detections: found.into(),
                        frame_index: index,
                        annotated: true,
                    });
                    self.last = Some(Arc::clone(&annotated));
                    return annotated;
                }
                Err(e) => {
                    tracing::warn!(worker = %self.key, frame = index, error = %e, "detection failed");
                    if let Some(last) = &self.last {
                        return Arc::clone(last);
                    }
                    return Arc::new(Self::passthrough(raw, index));
                }
            }
        }

        match &self.last {
            Some(last) => Arc::clone(last),
            None => Arc::new(Self::passthrough(raw, index)),
        }
    }

    fn passthrough(frame: Frame, index: u64) -> AnnotatedFrame {
        AnnotatedFrame {
            frame,
            detections: Arc::from(Vec::new()),
            frame_index: index,
            annotated: false,
        }
    }
}
