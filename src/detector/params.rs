//! Parameter types configuring the detector stages.
//!
//! Defaults are tuned for scanned manga and book pages at typical reading
//! resolutions. For tuning, start with the binarizer threshold and the
//! builder's end-density gate.

use serde::Deserialize;

use crate::builder::BuilderParams;
use crate::diagnostics::SnapshotOptions;
use crate::error::DetectError;
use crate::extract::ExtractParams;
use crate::linker::LinkerParams;
use crate::orientation::OrientationParams;
use crate::preprocess::{BinarizeParams, InvertParams, SharpenParams};
use crate::refine::{FuriganaParams, MergeParams, PunctuationParams, SplitParams};
use crate::types::{ColorPolarity, Orientation, Point};

/// Detector-wide parameters controlling the multi-stage pipeline.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub sharpen: SharpenParams,
    pub binarize: BinarizeParams,
    pub invert: InvertParams,
    pub extract: ExtractParams,
    pub builder: BuilderParams,
    pub punctuation: PunctuationParams,
    pub split: SplitParams,
    pub merge: MergeParams,
    pub furigana: FuriganaParams,
    pub linker: LinkerParams,
    pub orientation: OrientationParams,
    /// Per-stage overlay images, disabled by default.
    pub snapshots: SnapshotOptions,
}

impl DetectorParams {
    /// Rejects parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), DetectError> {
        let invalid = |msg: &str| Err(DetectError::InvalidParams(msg.to_string()));

        if self.sharpen.radius == 0 {
            return invalid("sharpen.radius must be at least 1");
        }
        if self.invert.block_size < 2 {
            return invalid("invert.block_size must be at least 2");
        }
        if self.extract.min_pixels == 0 {
            return invalid("extract.min_pixels must be at least 1");
        }
        if self.extract.window_size <= self.extract.window_overlap {
            return invalid("extract.window_size must exceed extract.window_overlap");
        }
        if self.builder.length_iterations == 0 {
            return invalid("builder.length_iterations must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.builder.contained_ratio) {
            return invalid("builder.contained_ratio must be within 0..=1");
        }
        if self.split.scan_from >= self.split.scan_to {
            return invalid("split.scan_from must be below split.scan_to");
        }
        if self.merge.max_chunk_size == 0 || self.merge.max_chunk_size > 16 {
            return invalid("merge.max_chunk_size must be within 1..=16");
        }
        if self.furigana.min_minor_ratio >= self.furigana.max_minor_ratio {
            return invalid("furigana.min_minor_ratio must be below max_minor_ratio");
        }
        if !(0.0..=1.0).contains(&self.linker.min_width_ratio) {
            return invalid("linker.min_width_ratio must be within 0..=1");
        }
        Ok(())
    }
}

/// Per-image options.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    pub orientation: Orientation,
    pub polarity: ColorPolarity,
    /// When set, the report's `nearest_column` points at the column closest
    /// to this point (reading aids place the cursor there).
    pub point_of_interest: Option<Point>,
}
