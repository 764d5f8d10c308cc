//! Structured diagnostics returned alongside detection results, plus the
//! optional per-stage snapshot overlays.

use serde::{Deserialize, Serialize};

use crate::context::DetectionContext;
use crate::image::RgbImage;
use crate::types::Rect;

/// Per-stage elapsed milliseconds.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TimingBreakdown {
    pub preprocess_ms: f64,
    pub extract_ms: f64,
    pub vertical_ms: f64,
    pub horizontal_ms: f64,
    pub orientation_ms: f64,
    pub total_ms: f64,
}

/// Counters describing what each stage produced.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineTrace {
    pub input_width: usize,
    pub input_height: usize,
    /// Number of blocks flipped by automatic polarity detection.
    pub inverted_blocks: usize,
    pub areas_extracted: usize,
    pub vertical_columns: usize,
    pub horizontal_columns: usize,
    pub columns_final: usize,
    pub timings: TimingBreakdown,
}

/// Which stages get an overlay image recorded.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SnapshotOptions {
    /// Stage names to record (`"binarize"`, `"columns"`, ...). Empty means
    /// no snapshots.
    pub stages: Vec<String>,
    /// Hard cap on recorded images.
    pub max_images: usize,
}

impl SnapshotOptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all_stages(max_images: usize) -> Self {
        Self {
            stages: STAGE_NAMES.iter().map(|s| s.to_string()).collect(),
            max_images,
        }
    }
}

pub const STAGE_NAMES: &[&str] = &[
    "sharpen",
    "binarize",
    "invert",
    "areas",
    "columns",
    "punctuation",
    "split",
    "merge",
    "furigana",
    "connections",
    "combined",
];

/// One recorded overlay.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub stage: String,
    /// Orientation the stage ran in, `None` for orientation-independent
    /// stages.
    pub vertical: Option<bool>,
    pub image: RgbImage,
}

/// Collects snapshots during a pipeline run.
#[derive(Debug, Default)]
pub struct SnapshotRecorder {
    options: SnapshotOptions,
    snapshots: Vec<Snapshot>,
}

impl SnapshotRecorder {
    pub fn new(options: SnapshotOptions) -> Self {
        Self {
            options,
            snapshots: Vec::new(),
        }
    }

    pub fn wants(&self, stage: &str) -> bool {
        self.snapshots.len() < self.options.max_images
            && self.options.stages.iter().any(|s| s == stage)
    }

    /// Renders and stores an overlay if the stage is allow-listed.
    pub fn record(&mut self, stage: &str, vertical: Option<bool>, ctx: &DetectionContext) {
        if !self.wants(stage) {
            return;
        }
        self.snapshots.push(Snapshot {
            stage: stage.to_string(),
            vertical,
            image: render_overlay(ctx),
        });
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.snapshots
    }
}

const BINARY_GRAY: [u8; 3] = [64, 64, 64];
const BACKGROUND_GRAY: [u8; 3] = [200, 200, 200];
const BORDER_RED: [u8; 3] = [220, 64, 64];
const AREA_BLUE: [u8; 3] = [64, 64, 220];
const AREA_CHANGED: [u8; 3] = [220, 140, 0];
const PUNCTUATION_MAGENTA: [u8; 3] = [200, 0, 200];
const SOURCE_RECT_TAN: [u8; 3] = [230, 190, 140];
const COLUMN_GREEN: [u8; 3] = [0, 160, 0];
const FURIGANA_CYAN: [u8; 3] = [0, 170, 170];

/// Paints the pixel matrices and current area/column rectangles into an RGB
/// image. Changed items are highlighted so stage effects stand out when
/// stepping through the snapshot sequence.
pub fn render_overlay(ctx: &DetectionContext) -> RgbImage {
    let (w, h) = (ctx.width() as usize, ctx.height() as usize);
    let mut image = RgbImage::filled(w, h, [255, 255, 255]);

    for y in 0..h as i32 {
        for x in 0..w as i32 {
            if ctx.background.get(x, y) {
                image.set(x as usize, y as usize, BACKGROUND_GRAY);
            }
            if ctx.binary.get(x, y) {
                image.set(x as usize, y as usize, BINARY_GRAY);
            }
            if ctx.border.get(x, y) {
                image.set(x as usize, y as usize, BORDER_RED);
            }
        }
    }

    for area in &ctx.areas {
        let color = if area.punctuation {
            PUNCTUATION_MAGENTA
        } else if area.changed {
            AREA_CHANGED
        } else {
            AREA_BLUE
        };
        outline(&mut image, &area.rect, color);
    }

    for (_, col) in ctx.columns.iter() {
        for area in &col.areas {
            // fragments a merged area was built from, under its own outline
            for source in &area.source_rects {
                outline(&mut image, source, SOURCE_RECT_TAN);
            }
            let color = if area.punctuation {
                PUNCTUATION_MAGENTA
            } else if area.changed {
                AREA_CHANGED
            } else {
                AREA_BLUE
            };
            outline(&mut image, &area.rect, color);
        }
        let color = if col.furigana {
            FURIGANA_CYAN
        } else {
            COLUMN_GREEN
        };
        outline(&mut image, &col.rect, color);
    }

    image
}

fn outline(image: &mut RgbImage, rect: &Rect, color: [u8; 3]) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let clamp_x = move |x: i32| x.clamp(0, w - 1) as usize;
    let clamp_y = move |y: i32| y.clamp(0, h - 1) as usize;
    for x in rect.x..=rect.max_x() {
        image.set(clamp_x(x), clamp_y(rect.y), color);
        image.set(clamp_x(x), clamp_y(rect.max_y()), color);
    }
    for y in rect.y..=rect.max_y() {
        image.set(clamp_x(rect.x), clamp_y(y), color);
        image.set(clamp_x(rect.max_x()), clamp_y(y), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use crate::column::Column;

    #[test]
    fn recorder_respects_allow_list_and_cap() {
        let image = RgbImage::filled(10, 10, [255, 255, 255]);
        let ctx = DetectionContext::new(&image).unwrap();
        let mut rec = SnapshotRecorder::new(SnapshotOptions {
            stages: vec!["binarize".into()],
            max_images: 1,
        });
        rec.record("sharpen", None, &ctx);
        rec.record("binarize", None, &ctx);
        rec.record("binarize", None, &ctx); // over cap
        let snaps = rec.into_snapshots();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].stage, "binarize");
    }

    #[test]
    fn overlay_paints_matrices_and_outlines() {
        let image = RgbImage::filled(20, 20, [255, 255, 255]);
        let mut ctx = DetectionContext::new(&image).unwrap();
        ctx.binary.set(5, 5, true);
        ctx.background.set(6, 5, true);
        ctx.columns.insert(Column::from_area(
            Area::new(Rect::new(2, 2, 8, 8), 30, 0),
            true,
        ));
        let overlay = render_overlay(&ctx);
        assert_eq!(overlay.get(5, 5), BINARY_GRAY);
        assert_eq!(overlay.get(6, 5), BACKGROUND_GRAY);
        assert_eq!(overlay.get(2, 2), COLUMN_GREEN);
    }
}
