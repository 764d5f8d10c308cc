use crate::types::Rect;
use thiserror::Error;

/// Errors aborting detection of the current image. No stage retries; the
/// pipeline is deterministic, so any failure reproduces on the same input.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Input image has zero width or height.
    #[error("input image has zero area ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    /// A rectangle was inserted into a spatial index that cannot hold it.
    /// Internal invariant violation; detection of this image is aborted.
    #[error("rectangle {rect:?} outside spatial index bounds {bounds:?}")]
    IndexOutOfBounds { rect: Rect, bounds: Rect },

    /// Detector parameters violate an ordering constraint.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}
