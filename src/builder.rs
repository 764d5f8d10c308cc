//! Score-gated growth of areas into columns.
//!
//! Every area starts as its own single-area column. Columns are then grown
//! greedily, smallest first, by probing for neighbors: three passes along
//! the reading direction with increasing reach, then one sideways pass. A
//! merge is kept only when the merged column scores at least as well as the
//! weighted average of the columns it replaces.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::debug;
use serde::Deserialize;

use crate::column::{Column, ColumnId, ColumnSlab};
use crate::context::DetectionContext;
use crate::error::DetectError;
use crate::rtree::RTree;
use crate::types::Rect;
use crate::util::scale;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BuilderParams {
    /// Columns are only combined when their average intensities are closer
    /// than this. Stops expansion into unrelated background elements.
    pub intensity_max_delta: f32,
    /// Reading-direction growth passes; reach grows with each iteration.
    pub length_iterations: u32,
    /// Merge accepted without scoring when every member is contained in the
    /// largest column by at least this intersection ratio.
    pub contained_ratio: f32,
    /// Minimum weighted pixel density at both column ends.
    pub end_density_min: f32,
    /// Reference black level for intensity weights, normally the binarizer
    /// threshold.
    pub intensity_threshold: u8,
}

impl Default for BuilderParams {
    fn default() -> Self {
        Self {
            intensity_max_delta: 100.0,
            length_iterations: 3,
            contained_ratio: 0.65,
            end_density_min: 0.05,
            intensity_threshold: 140,
        }
    }
}

/// Builds `ctx.columns` from `ctx.areas` for the orientation in
/// `ctx.vertical`.
pub fn build_columns(ctx: &mut DetectionContext, params: &BuilderParams) -> Result<(), DetectError> {
    ctx.columns = ColumnSlab::new();
    if ctx.areas.is_empty() {
        return Ok(());
    }

    let mut index = RTree::new(ctx.image_rect());
    let areas = ctx.areas.clone();
    for area in areas {
        let rect = area.rect;
        let mut column = Column::from_area(area, ctx.vertical);
        column.score = Some(column.rect.squareness());
        let id = ctx.columns.insert(column);
        index.insert(id, rect)?;
    }

    for iteration in 1..=params.length_iterations {
        merge_pass(ctx, &mut index, params, true, iteration)?;
    }
    merge_pass(ctx, &mut index, params, false, 1)?;

    ctx.columns.compact();
    debug!(
        "columns ({}): {}",
        if ctx.vertical { "vertical" } else { "horizontal" },
        ctx.columns.len()
    );
    Ok(())
}

fn merge_pass(
    ctx: &mut DetectionContext,
    index: &mut RTree,
    params: &BuilderParams,
    expand_length: bool,
    iteration: u32,
) -> Result<(), DetectError> {
    // smallest columns first so characters assemble before lines do
    let mut todo: BinaryHeap<Reverse<(i64, ColumnId)>> = BinaryHeap::new();
    for (id, col) in ctx.columns.iter() {
        todo.push(Reverse((heap_key(col), id)));
    }

    while let Some(Reverse((_, id))) = todo.pop() {
        let Some(col) = ctx.columns.get(id) else {
            continue; // already merged away
        };
        let probe = create_probe(col, expand_length, iteration);
        let col_avg = col.avg_intensity();
        let mut targets = index.query_excluding(&probe, id);
        targets.sort_unstable();
        targets.dedup();
        if targets.is_empty() {
            continue;
        }

        let largest = largest_member(&ctx.columns, id, &targets);
        let Some(largest_avg) = ctx.columns.get(largest).map(|c| c.avg_intensity()) else {
            continue;
        };
        if col_avg - largest_avg > params.intensity_max_delta {
            continue;
        }
        let rejected = filter_targets_by_intensity(&ctx.columns, &mut targets, largest, params);
        if targets.is_empty() {
            continue;
        }

        let Some(mut merged) = ctx.columns.get(id).cloned() else {
            continue;
        };
        for &t in &targets {
            if let Some(target) = ctx.columns.get(t) {
                merged = merged.merge(target);
            }
        }

        // sideways growth may only join adjacent columns, never capture a
        // column that was not already a probe hit
        if !expand_length && has_new_targets(index, &merged.rect, id, &targets, &rejected) {
            continue;
        }

        if check_merge(ctx, params, &mut merged, id, &targets, largest) {
            for &t in &targets {
                if let Some(target) = ctx.columns.remove(t) {
                    index.remove(t, target.rect);
                }
            }
            if let Some(old) = ctx.columns.remove(id) {
                index.remove(id, old.rect);
            }
            let merged_rect = merged.rect;
            let key = heap_key(&merged);
            let new_id = ctx.columns.insert(merged);
            index.insert(new_id, merged_rect)?;
            todo.push(Reverse((key, new_id)));
        }
    }
    Ok(())
}

fn heap_key(col: &Column) -> i64 {
    col.minor_dim() as i64 * col.size()
}

fn largest_member(slab: &ColumnSlab, id: ColumnId, targets: &[ColumnId]) -> ColumnId {
    let mut largest = id;
    for &t in targets {
        let (Some(a), Some(b)) = (slab.get(t), slab.get(largest)) else {
            continue;
        };
        if a.minor_dim() > b.minor_dim() {
            largest = t;
        }
    }
    largest
}

/// Drops probe hits whose average intensity is too far above the largest
/// column's. Contained columns and diacritic marks are exempt: dakuten are
/// often gray instead of black and would fail the comparison.
fn filter_targets_by_intensity(
    slab: &ColumnSlab,
    targets: &mut Vec<ColumnId>,
    largest: ColumnId,
    params: &BuilderParams,
) -> Vec<ColumnId> {
    let mut rejected = Vec::new();
    let Some(big) = slab.get(largest) else {
        return rejected;
    };
    let ref_avg = big.avg_intensity();
    targets.retain(|&t| {
        let Some(target) = slab.get(t) else {
            return false;
        };
        if big.rect.contains(&target.rect) {
            return true;
        }
        if is_dakuten_candidate(target, big) {
            return true;
        }
        if target.avg_intensity() - ref_avg > params.intensity_max_delta {
            rejected.push(t);
            return false;
        }
        true
    });
    rejected
}

fn is_dakuten_candidate(target: &Column, largest: &Column) -> bool {
    target.areas.len() == 1
        && target.rect.squareness() >= 0.6
        && target.rect.max_y() >= largest.rect.y - largest.rect.w / 4
        && target.rect.max_y() < largest.rect.max_y()
        && target.midpoint().x > largest.midpoint().x
        && target.pixel_area_ratio() >= 0.5
        && largest.horizontal_intersect_ratio(&target.rect) >= 0.7
}

fn has_new_targets(
    index: &RTree,
    merged_rect: &Rect,
    id: ColumnId,
    targets: &[ColumnId],
    rejected: &[ColumnId],
) -> bool {
    index
        .query_excluding(merged_rect, id)
        .into_iter()
        .any(|hit| !targets.contains(&hit) && !rejected.contains(&hit))
}

/// Probe reaching along the reading direction; reach grows with the
/// iteration number.
fn create_probe(col: &Column, expand_length: bool, iteration: u32) -> Rect {
    let r = col.rect;
    if expand_length {
        let extra = (r.min_dim() as f32 * 0.5 * iteration as f32).ceil() as i32;
        if col.vertical {
            Rect::new(r.x, r.y - extra, r.w, r.h + extra * 2)
        } else {
            Rect::new(r.x - extra, r.y, r.w + extra * 2, r.h)
        }
    } else {
        let extra = r.min_dim();
        if col.vertical {
            Rect::new(r.x - extra, r.y, r.w + extra * 2, r.h)
        } else {
            Rect::new(r.x, r.y - extra, r.w, r.h + extra * 2)
        }
    }
}

/// Scores the merged column against the weighted average of its parents and
/// runs the background and end-density sanity checks.
fn check_merge(
    ctx: &DetectionContext,
    params: &BuilderParams,
    merged: &mut Column,
    id: ColumnId,
    targets: &[ColumnId],
    largest: ColumnId,
) -> bool {
    let slab = &ctx.columns;
    merged.score = Some(calc_score(merged));

    let mut members: Vec<ColumnId> = targets.to_vec();
    members.push(id);

    let Some(big) = slab.get(largest) else {
        return false;
    };
    // everything already inside the largest column: accept without scoring
    if members.iter().all(|&m| {
        slab.get(m)
            .map(|c| big.intersect_ratio(&c.rect) >= params.contained_ratio)
            .unwrap_or(false)
    }) {
        return true;
    }

    // penalize growth across the reading direction; long columns expanding
    // sideways are usually capturing furigana
    let col_areas = slab.get(id).map(|c| c.areas.len()).unwrap_or(0);
    let minor_expansion = merged.minor_dim() as f32 / big.minor_dim().max(1) as f32;
    let max_penalty = scale(col_areas as f32, 2.0, 4.0, 1.0, 0.8);
    let expansion_score = scale(minor_expansion, 1.15, 1.4, 1.0, max_penalty);
    let merged_score = merged.score.unwrap_or(0.0) * expansion_score;
    merged.score = Some(merged_score);

    let mut lowest = f32::MAX;
    for &m in &members {
        if let Some(c) = slab.get(m) {
            lowest = lowest.min(c.score.unwrap_or(0.0));
        }
    }
    let mut score_sum = 0.0;
    let mut weight_sum = 0.0;
    for &m in &members {
        let Some(c) = slab.get(m) else { continue };
        let score = c.score.unwrap_or(0.0);
        let mut weight = (c.size() as f32).powf(0.58);
        if score == lowest {
            weight *= 1.25;
        }
        weight *= scale(
            c.min_intensity() as f32,
            0.0,
            params.intensity_threshold as f32,
            1.0,
            0.5,
        );
        score_sum += score * weight;
        weight_sum += weight;
    }
    let old_score = score_sum / weight_sum;

    if merged_score >= old_score {
        check_background(ctx, merged) && check_column_ends(merged, params)
    } else {
        false
    }
}

/// Per-area score: size, shape, centering and intensity sub-scores
/// multiplied, summed over areas, square-rooted.
pub(crate) fn calc_score(col: &Column) -> f32 {
    let minor = col.minor_dim().max(1);
    let col_min_intensity = col.min_intensity();
    let mut score_sum = 0.0f32;
    for area in &col.areas {
        let size_ratio = (area.max_dim() as f32 / (minor as f32 * 0.9)).min(1.0);
        let size_score = size_ratio.powi(2);

        let shape_score = scale(area.squareness(), 0.0, 0.9, 0.0, 1.0).powf(1.2);

        let (first_edge, second_edge) = if col.vertical {
            (area.x() - col.rect.x, col.rect.max_x() - area.max_x())
        } else {
            (area.y() - col.rect.y, col.rect.max_y() - area.max_y())
        };
        let diff_prct = (first_edge - second_edge).abs() as f32 / minor as f32;
        let diff_prct = scale(diff_prct, 0.1, 1.0, 0.0, 1.0);
        let exponent = scale(size_score, 0.2, 0.8, 6.0, 3.0);
        let location_score = (1.0 - diff_prct).powf(exponent);

        let delta = area.min_intensity as f32 - col_min_intensity as f32;
        let intensity_score = scale(delta, 50.0, 100.0, 1.0, 0.4);

        score_sum += size_score * shape_score * location_score * intensity_score;
    }
    score_sum.sqrt()
}

/// Rejects columns crossing background elements such as bubble outlines or
/// divider lines. Border pixels are checked first because the full scan is
/// much slower.
fn check_background(ctx: &DetectionContext, col: &Column) -> bool {
    let border_pixels = ctx.background.count_rect(&col.rect, false);
    if border_pixels >= 2 {
        let inside_pixels = ctx.background.count_rect(&col.rect, true);
        if inside_pixels >= col.minor_dim() as u32 {
            return false;
        }
    }
    true
}

/// Both ends of the column must hold real pixel mass, otherwise the column
/// has grown into stray fragments.
fn check_column_ends(col: &Column, params: &BuilderParams) -> bool {
    let r = col.rect;
    let len = col.minor_dim();
    let (first, second) = if col.vertical {
        (
            Rect::new(r.x, r.y, r.w, len),
            Rect::new(r.x, r.max_y() - len, r.w, len),
        )
    } else {
        (
            Rect::new(r.x, r.y, len, r.h),
            Rect::new(r.max_x() - len, r.y, len, r.h),
        )
    };
    check_column_end(col, &first, params) && check_column_end(col, &second, params)
}

fn check_column_end(col: &Column, probe: &Rect, params: &BuilderParams) -> bool {
    let mut pixel_sum = 0.0f32;
    for area in &col.areas {
        let Some(intersect) = probe.intersection(&area.rect) else {
            continue;
        };
        let ratio = intersect.area() as f32 / area.size().max(1) as f32;
        let mut pixels = area.pixels as f32 * ratio;
        // thin strokes along the reading direction are fine, weight them up
        pixels *= scale(area.major_minor_ratio(col.vertical), 0.5, 1.5, 0.5, 1.5);
        pixel_sum += pixels;
    }
    pixel_sum / probe.area().max(1) as f32 >= params.end_density_min
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use crate::extract::{extract_areas, ExtractParams};
    use crate::image::RgbImage;
    use crate::preprocess::binarize::{binarize, BinarizeParams};

    fn detect_context(glyphs: &[Rect], size: usize) -> DetectionContext {
        let mut img = RgbImage::filled(size, size, [255, 255, 255]);
        for g in glyphs {
            for y in g.y..=g.max_y() {
                for x in g.x..=g.max_x() {
                    img.set(x as usize, y as usize, [0, 0, 0]);
                }
            }
        }
        let mut ctx = DetectionContext::new(&img).unwrap();
        binarize(&mut ctx, &BinarizeParams::default());
        extract_areas(&mut ctx, &ExtractParams::default()).unwrap();
        ctx
    }

    #[test]
    fn vertical_stack_becomes_one_column() {
        let glyphs = [
            Rect::new(40, 10, 20, 20),
            Rect::new(40, 35, 20, 20),
            Rect::new(40, 60, 20, 20),
            Rect::new(40, 85, 20, 20),
        ];
        let mut ctx = detect_context(&glyphs, 150);
        ctx.vertical = true;
        build_columns(&mut ctx, &BuilderParams::default()).unwrap();
        assert_eq!(ctx.columns.len(), 1);
        let col = ctx.columns.get(0).unwrap();
        assert_eq!(col.rect, Rect::new(40, 10, 20, 95));
        assert_eq!(col.areas.len(), 4);
        // invariant: column rect is the union of its areas
        let union = col
            .areas
            .iter()
            .skip(1)
            .fold(col.areas[0].rect, |acc, a| acc.union(&a.rect));
        assert_eq!(col.rect, union);
    }

    #[test]
    fn distant_stacks_stay_separate() {
        let glyphs = [
            Rect::new(20, 10, 20, 20),
            Rect::new(20, 35, 20, 20),
            Rect::new(110, 10, 20, 20),
            Rect::new(110, 35, 20, 20),
        ];
        let mut ctx = detect_context(&glyphs, 160);
        ctx.vertical = true;
        build_columns(&mut ctx, &BuilderParams::default()).unwrap();
        assert_eq!(ctx.columns.len(), 2);
    }

    #[test]
    fn score_prefers_centered_square_areas() {
        let square = Column::from_area(
            Area::new(Rect::new(0, 0, 20, 20), 300, 0),
            true,
        );
        let mut off_center = Column::from_areas(
            vec![
                Area::new(Rect::new(0, 0, 20, 20), 300, 0),
                Area::new(Rect::new(0, 25, 4, 4), 12, 0),
            ],
            true,
        );
        off_center.refresh_rect();
        assert!(calc_score(&square) > 0.9);
        assert!(calc_score(&square) > calc_score(&off_center) - 0.3);
    }

    #[test]
    fn end_density_rejects_empty_ends() {
        // big head area plus a distant speck: the far end probe sees almost
        // no pixels
        let col = Column::from_areas(
            vec![
                Area::new(Rect::new(0, 0, 20, 20), 380, 0),
                Area::new(Rect::new(9, 100, 2, 2), 4, 0),
            ],
            true,
        );
        assert!(!check_column_ends(&col, &BuilderParams::default()));
    }
}
