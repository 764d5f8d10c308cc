#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod types;

// Pipeline stages – public for tools and tests, but considered unstable
// internals.
pub mod area;
pub mod builder;
pub mod column;
pub mod context;
pub mod extract;
pub mod linker;
pub mod matrix;
pub mod orientation;
pub mod preprocess;
pub mod refine;
pub mod rtree;
pub mod util;

// --- High-level re-exports -------------------------------------------------

// Main entry points: detector + results.
pub use crate::detector::{ColumnDetector, DetectOptions, DetectorParams};
pub use crate::error::DetectError;
pub use crate::types::{ColorPolarity, DetectedArea, DetectedColumn, Orientation, Point, Rect};

// High-level diagnostics returned by the detector.
pub use crate::detector::DetectionReport;
pub use crate::diagnostics::{PipelineTrace, Snapshot, SnapshotOptions, TimingBreakdown};

/// Small prelude for quick experiments.
///
/// ```no_run
/// use column_detector::prelude::*;
///
/// # fn main() {
/// let image = RgbImage::filled(640, 480, [255, 255, 255]);
/// let detector = ColumnDetector::new(DetectorParams::default()).unwrap();
/// let report = detector.detect(&image, &DetectOptions::default()).unwrap();
/// println!(
///     "columns={} latency_ms={:.3}",
///     report.columns.len(),
///     report.trace.timings.total_ms
/// );
/// # }
/// ```
pub mod prelude {
    pub use crate::image::RgbImage;
    pub use crate::types::{ColorPolarity, Orientation, Point, Rect};
    pub use crate::{ColumnDetector, DetectOptions, DetectionReport, DetectorParams};
}
