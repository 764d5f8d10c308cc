//! Column refinement passes, run per orientation after the builder:
//! punctuation marking, oversized-area splitting, fragment merging and
//! furigana detection.

pub mod furigana;
pub mod merge;
pub mod punctuation;
pub mod split;

pub use furigana::{find_furigana, FuriganaParams};
pub use merge::{merge_areas, MergeParams};
pub use punctuation::{mark_punctuation, PunctuationParams};
pub use split::{split_areas, SplitParams};
