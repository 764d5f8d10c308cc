//! Column detector orchestrating the text detection pipeline.
//!
//! Overview
//! - Preprocesses the intensity plane (unsharp mask, binarization, polarity
//!   inversion of light-on-dark regions).
//! - Extracts connected components and filters out dither noise, speech
//!   bubble outlines and oversized blobs.
//! - Grows components into column candidates once per candidate reading
//!   orientation, refines them (punctuation, splitting, merging, furigana)
//!   and links columns that continue each other's text.
//! - Resolves the reading orientation per image zone and assembles the
//!   final report, including optional per-stage snapshot overlays.
//!
//! Modules
//! - [`params`] – configuration types aggregating every stage's parameters.
//! - `pipeline` – the main [`ColumnDetector`] implementation and the
//!   [`DetectionReport`] it produces.

pub mod params;
mod pipeline;

pub use params::{DetectOptions, DetectorParams};
pub use pipeline::{ColumnDetector, DetectionReport};
