//! Detection boundary and the per-worker cadence controller.
//!
//! - [`Detector`]: runs a model over one frame (no model ships with the crate; [`NoopDetector`]
//!   is the default).
//! - [`Cadence`]: decides which frames are worth a detection pass and which reuse the last
//!   annotated result.
//! - [`FrameSink`]: receives every output frame of a stream worker.

mod cadence;
mod detector;
mod sink;

pub use cadence::{AnnotatedFrame, Cadence};
pub use detector::{BoundingBox, Detection, Detector, NoopDetector};
pub use sink::{DiscardSink, FrameSink, LatestFrameSink};
