use async_trait::async_trait;
use serde::Serialize;

use crate::error::DetectError;
use crate::resources::Frame;

/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
}

/// One detected object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    /// Model class index.
    pub class_id: u32,
    /// Human-readable class name.
    pub label: String,
    /// Score in `0.0..=1.0`.
    pub confidence: f32,
    /// Object location.
    pub bbox: BoundingBox,
}

/// Object detection capability.
///
/// Implementations are shared by every stream worker, so `detect` must not assume exclusive
/// access to the model.
#[async_trait]
pub trait Detector: Send + Sync + 'static {
    /// Runs detection over `frame`.
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectError>;
}

/// Detector that never finds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopDetector;

#[async_trait]
impl Detector for NoopDetector {
    async fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        Ok(Vec::new())
    }
}
