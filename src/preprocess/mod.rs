//! Image preparation: sharpen, binarize, polarity inversion.

pub mod binarize;
pub mod invert;
pub mod sharpen;

pub use binarize::{binarize, BinarizeParams};
pub use invert::{apply_polarity, InvertParams};
pub use sharpen::{sharpen, SharpenParams};
