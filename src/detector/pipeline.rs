//! The main detector entry point and the report it produces.

use std::time::Instant;

use log::debug;

use crate::builder::build_columns;
use crate::column::Column;
use crate::context::{DetectionContext, Inversion};
use crate::diagnostics::{PipelineTrace, Snapshot, SnapshotRecorder, TimingBreakdown};
use crate::error::DetectError;
use crate::extract::extract_areas;
use crate::image::RgbImage;
use crate::linker::link_columns;
use crate::matrix::BitMatrix;
use crate::orientation::resolve_orientation;
use crate::preprocess::{apply_polarity, binarize, sharpen};
use crate::refine::{find_furigana, mark_punctuation, merge_areas, split_areas};
use crate::types::{ColorPolarity, DetectedArea, DetectedColumn, Orientation, Point, Rect};

use super::params::{DetectOptions, DetectorParams};

/// Detects text columns in raster images. Construction validates the
/// parameters once; `detect` holds no state between images.
#[derive(Clone, Debug)]
pub struct ColumnDetector {
    params: DetectorParams,
}

impl ColumnDetector {
    pub fn new(params: DetectorParams) -> Result<Self, DetectError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Runs the full pipeline over one image.
    pub fn detect(
        &self,
        image: &RgbImage,
        options: &DetectOptions,
    ) -> Result<DetectionReport, DetectError> {
        let total_start = Instant::now();
        let mut ctx = DetectionContext::new(image)?;
        let mut recorder = SnapshotRecorder::new(self.params.snapshots.clone());
        let mut timings = TimingBreakdown::default();

        debug!(
            "detect: {}x{} orientation={:?} polarity={:?}",
            ctx.width(),
            ctx.height(),
            options.orientation,
            options.polarity
        );

        // preprocess. fixed-level mode measures absolute ink color, so both
        // sharpening and automatic inversion are skipped there.
        let preprocess_start = Instant::now();
        let fixed_level = self.params.binarize.fixed_level.is_some();
        if !fixed_level {
            sharpen(&mut ctx, &self.params.sharpen);
            recorder.record("sharpen", None, &ctx);
        }
        binarize(&mut ctx, &self.params.binarize);
        recorder.record("binarize", None, &ctx);
        let polarity = match options.polarity {
            ColorPolarity::Auto if fixed_level => ColorPolarity::DarkOnLight,
            p => p,
        };
        apply_polarity(&mut ctx, polarity, &self.params.invert);
        recorder.record("invert", None, &ctx);
        timings.preprocess_ms = preprocess_start.elapsed().as_secs_f64() * 1000.0;

        // areas
        let extract_start = Instant::now();
        extract_areas(&mut ctx, &self.params.extract)?;
        recorder.record("areas", None, &ctx);
        timings.extract_ms = extract_start.elapsed().as_secs_f64() * 1000.0;
        let areas_extracted = ctx.areas.len();
        debug!("detect: {areas_extracted} areas extracted");

        // per-orientation column runs
        if options.orientation != Orientation::Horizontal {
            let start = Instant::now();
            self.run_orientation(&mut ctx, true, &mut recorder)?;
            timings.vertical_ms = start.elapsed().as_secs_f64() * 1000.0;
        }
        if options.orientation != Orientation::Vertical {
            let start = Instant::now();
            self.run_orientation(&mut ctx, false, &mut recorder)?;
            timings.horizontal_ms = start.elapsed().as_secs_f64() * 1000.0;
        }
        let vertical_columns = ctx.vertical_columns.len();
        let horizontal_columns = ctx.horizontal_columns.len();

        // orientation resolution
        let start = Instant::now();
        let columns = resolve_orientation(&mut ctx, options.orientation, &self.params.orientation)?;
        timings.orientation_ms = start.elapsed().as_secs_f64() * 1000.0;
        if recorder.wants("combined") {
            let mut slab = crate::column::ColumnSlab::new();
            for col in &columns {
                slab.insert(col.clone());
            }
            ctx.columns = slab;
            recorder.record("combined", None, &ctx);
        }

        timings.total_ms = total_start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "detect: {} columns (v={} h={}) in {:.3} ms",
            columns.len(),
            vertical_columns,
            horizontal_columns,
            timings.total_ms
        );

        let trace = PipelineTrace {
            input_width: ctx.width() as usize,
            input_height: ctx.height() as usize,
            inverted_blocks: inverted_block_count(&ctx),
            areas_extracted,
            vertical_columns,
            horizontal_columns,
            columns_final: columns.len(),
            timings,
        };

        let mut report = DetectionReport::new(columns, ctx.binary.clone(), trace);
        report.snapshots = recorder.into_snapshots();
        if let Some(point) = options.point_of_interest {
            report.nearest_column = report.nearest_area(point).map(|(col, _)| col);
        }
        Ok(report)
    }

    /// Builder, refinement and linking for one reading orientation.
    fn run_orientation(
        &self,
        ctx: &mut DetectionContext,
        vertical: bool,
        recorder: &mut SnapshotRecorder,
    ) -> Result<(), DetectError> {
        ctx.vertical = vertical;
        build_columns(ctx, &self.params.builder)?;
        recorder.record("columns", Some(vertical), ctx);
        mark_punctuation(ctx, &self.params.punctuation);
        recorder.record("punctuation", Some(vertical), ctx);
        split_areas(ctx, &self.params.split);
        recorder.record("split", Some(vertical), ctx);
        merge_areas(ctx, &self.params.merge);
        recorder.record("merge", Some(vertical), ctx);
        find_furigana(ctx, &self.params.furigana)?;
        recorder.record("furigana", Some(vertical), ctx);
        link_columns(ctx, &self.params.linker)?;
        recorder.record("connections", Some(vertical), ctx);
        ctx.finish_orientation();
        Ok(())
    }
}

fn inverted_block_count(ctx: &DetectionContext) -> usize {
    match &ctx.inversion {
        Inversion::None => 0,
        Inversion::Whole => {
            // whole-image inversion has no block grid
            1
        }
        Inversion::Blocks(grid) => grid.inverted.iter().filter(|b| **b).count(),
    }
}

/// Everything a caller gets back from one detection run.
#[derive(Clone, Debug)]
pub struct DetectionReport {
    /// Final columns in resolver order.
    pub columns: Vec<DetectedColumn>,
    /// Column closest to `DetectOptions::point_of_interest`, when given.
    pub nearest_column: Option<usize>,
    pub trace: PipelineTrace,
    /// Stage overlays, empty unless snapshots were requested.
    pub snapshots: Vec<Snapshot>,
    // retained for crop extraction
    detailed: Vec<Column>,
    binary: BitMatrix,
}

impl DetectionReport {
    fn new(columns: Vec<Column>, binary: BitMatrix, trace: PipelineTrace) -> Self {
        let detected = columns
            .iter()
            .map(|col| DetectedColumn {
                rect: col.rect,
                vertical: col.vertical,
                furigana: col.furigana,
                areas: col
                    .areas
                    .iter()
                    .map(|a| DetectedArea {
                        rect: a.rect,
                        punctuation: a.punctuation,
                    })
                    .collect(),
                next: col.next,
                previous: col.previous,
            })
            .collect();
        Self {
            columns: detected,
            nearest_column: None,
            trace,
            snapshots: Vec::new(),
            detailed: columns,
            binary,
        }
    }

    /// Character crop rectangles starting at the point, following the text
    /// in reading order across linked columns. Empty when no character sits
    /// near the point.
    pub fn crops_near(&self, point: Point, max: usize) -> Vec<Rect> {
        let Some((first_col, first_rect)) = self.nearest_area(point) else {
            return Vec::new();
        };

        let mut crops = Vec::new();
        let mut found = false;
        let mut visited = vec![false; self.detailed.len()];
        let mut cursor = Some(first_col);
        'walk: while let Some(id) = cursor {
            if visited[id] {
                // intersecting columns can form link loops in the wrong
                // orientation
                break;
            }
            visited[id] = true;
            for area in &self.detailed[id].areas {
                if area.rect == first_rect {
                    found = true;
                }
                if found && !area.punctuation {
                    crops.push(area.rect);
                }
                if crops.len() == max {
                    break 'walk;
                }
            }
            cursor = self.detailed[id].next;
        }
        self.crop_rects(&crops)
    }

    /// Trims empty borders off the given rectangles against the binary
    /// matrix.
    pub fn crop_rects(&self, rects: &[Rect]) -> Vec<Rect> {
        rects.iter().map(|r| self.trim_rect(r)).collect()
    }

    fn trim_rect(&self, rect: &Rect) -> Rect {
        let mid = rect.midpoint();
        let mut min_x = rect.x;
        while min_x < mid.x && self.binary.count_col(min_x, rect.y, rect.max_y()) == 0 {
            min_x += 1;
        }
        let mut max_x = rect.max_x();
        while max_x > mid.x && self.binary.count_col(max_x, rect.y, rect.max_y()) == 0 {
            max_x -= 1;
        }
        let mut min_y = rect.y;
        while min_y < mid.y && self.binary.count_row(rect.x, rect.max_x(), min_y) == 0 {
            min_y += 1;
        }
        let mut max_y = rect.max_y();
        while max_y > mid.y && self.binary.count_row(rect.x, rect.max_x(), max_y) == 0 {
            max_y -= 1;
        }
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    /// Nearest non-punctuation area to the point: `(column index, rect)`.
    /// `None` when the closest one is further away than its own largest
    /// dimension.
    fn nearest_area(&self, point: Point) -> Option<(usize, Rect)> {
        let mut best: Option<(usize, Rect, f32)> = None;
        for (id, col) in self.detailed.iter().enumerate() {
            for area in &col.areas {
                if area.punctuation {
                    continue;
                }
                let distance = area.rect.midpoint().distance(point);
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((id, area.rect, distance));
                }
            }
        }
        let (id, rect, distance) = best?;
        (distance <= rect.max_dim() as f32).then_some((id, rect))
    }
}
