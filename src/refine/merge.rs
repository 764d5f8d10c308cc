//! Merges thin neighbour areas along the reading direction.
//!
//! Radicals and diacritics often detach into their own components. Within
//! each column, runs of areas are grouped into chunks and every merge
//! combination of a chunk is scored against the column's character-cell
//! size; the best combination replaces the originals.

use serde::Deserialize;

use crate::area::Area;
use crate::column::Column;
use crate::context::DetectionContext;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MergeParams {
    /// Merged areas may not exceed this many character cells along the
    /// reading direction.
    pub max_area_size: f32,
    /// Upper bound on areas tested for combinations at once. Combinations
    /// grow as 2^n, so chunks are capped.
    pub max_chunk_size: usize,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            max_area_size: 1.5,
            max_chunk_size: 10,
        }
    }
}

/// Merges fragment areas in every column of the current orientation.
pub fn merge_areas(ctx: &mut DetectionContext, params: &MergeParams) {
    let vertical = ctx.vertical;
    for id in ctx.columns.live_ids() {
        if let Some(col) = ctx.columns.get_mut(id) {
            merge_column(col, vertical, params);
        }
    }
}

fn merge_column(col: &mut Column, vertical: bool, params: &MergeParams) {
    let scale = calc_scale(col, vertical);
    let target_size = (col.minor_dim() as f32 * scale).ceil() as i32;
    let max_size = (col.minor_dim() as f32 * params.max_area_size * scale).ceil() as i32;

    // chunks are runs of mergeable areas delimited by punctuation and by
    // gaps too wide to ever merge across
    let mut chunk: Vec<Area> = Vec::new();
    let mut chunk_start = 0usize;

    let mut i = 0;
    while i < col.areas.len() {
        let area = col.areas[i].clone();
        let punctuation = area.punctuation;
        let last_in_col = i == col.areas.len() - 1;
        let mut last_in_chunk = punctuation || last_in_col;

        if !punctuation {
            chunk.push(area.clone());
            if chunk.len() == 1 {
                chunk_start = i;
            }
            if chunk.len() == params.max_chunk_size {
                last_in_chunk = true;
            } else if !last_in_col {
                let test = area.merge(&col.areas[i + 1]);
                if test.major_dim(vertical) > max_size {
                    last_in_chunk = true;
                }
            }
        }

        let mut next = i + 1;
        if last_in_chunk && !chunk.is_empty() {
            let merged = find_best_merge(&chunk, vertical, target_size, max_size);
            let merged_len = merged.len();
            col.areas
                .splice(chunk_start..chunk_start + chunk.len(), merged);
            next = chunk_start + merged_len;
            // resume from the last merged area so it can join the next chunk
            if !punctuation && !last_in_col && chunk.len() > 1 {
                next -= 1;
            }
            chunk.clear();
        }
        i = next;
    }
}

/// Font-compression factor. Horizontal title columns sometimes use narrow
/// fonts; the upper-quartile area width against the column height estimates
/// the compression. Vertical and short columns use 1.0.
fn calc_scale(col: &Column, vertical: bool) -> f32 {
    if vertical || col.areas.len() < 15 {
        return 1.0;
    }
    let mut widths: Vec<i32> = col.areas.iter().map(|a| a.width()).collect();
    widths.sort_unstable();
    let floor = (col.areas.len() as f32 * 0.75).floor() as usize;
    let ceil = (col.areas.len() as f32 * 0.75).ceil() as usize;
    let width = (widths[floor] + widths[ceil]) / 2;
    let scale = width as f32 / col.rect.h.max(1) as f32;
    if scale > 0.8 {
        1.0
    } else if scale < 0.6 {
        0.6
    } else {
        scale
    }
}

/// Tries every merge combination of the chunk and keeps the best-scoring
/// one. A set flag at index `i` merges area `i` into area `i + 1`.
fn find_best_merge(chunk: &[Area], vertical: bool, target_size: i32, max_size: i32) -> Vec<Area> {
    if chunk.len() == 1 {
        return chunk.to_vec();
    }

    let mut combination = vec![false; chunk.len()];
    let mut best_score = 0.0f32;
    let mut best: Vec<Area> = chunk.to_vec();

    loop {
        if let Some((merged, distances)) = merge_combination(chunk, &combination, vertical, max_size)
        {
            let score = score_areas(&merged, &distances, vertical, target_size, max_size);
            if score > best_score {
                best_score = score;
                best = merged;
            }
        }
        next_combination(&mut combination);
        // merging the last area forward is meaningless
        if combination[combination.len() - 1] {
            break;
        }
    }
    best
}

/// Advances the flag vector like a binary counter: ftff -> ttff -> fftf.
pub(crate) fn next_combination(combination: &mut [bool]) {
    for flag in combination.iter_mut() {
        *flag = !*flag;
        if *flag {
            break;
        }
    }
}

/// Applies one combination. Returns the merged areas paired with the gap
/// distance recorded for each, or `None` when a merged area would exceed
/// `max_size`. The recorded distance is the running maximum gap seen so far
/// in the chunk.
fn merge_combination(
    chunk: &[Area],
    combination: &[bool],
    vertical: bool,
    max_size: i32,
) -> Option<(Vec<Area>, Vec<i32>)> {
    let mut merged: Vec<Area> = Vec::new();
    let mut distances: Vec<i32> = Vec::new();

    let mut prev: Option<Area> = None;
    let mut max_distance = 0;
    for (i, &flag) in combination.iter().enumerate() {
        let mut area = chunk[i].clone();
        if let Some(p) = prev {
            let distance = if vertical {
                area.y() - p.max_y()
            } else {
                area.x() - p.max_x()
            };
            max_distance = max_distance.max(distance);
            area = p.merge(&area);
            if area.major_dim(vertical) > max_size {
                return None;
            }
        }
        if flag {
            prev = Some(area);
        } else {
            merged.push(area);
            distances.push(max_distance);
            prev = None;
        }
    }
    // the last flag is always false, so prev is drained

    Some((merged, distances))
}

/// Mean per-area score: how close each area is to the target character-cell
/// size, discounted by the widest gap bridged to build it.
fn score_areas(
    areas: &[Area],
    distances: &[i32],
    vertical: bool,
    target_size: i32,
    max_size: i32,
) -> f32 {
    let mut sum = 0.0f32;
    for (area, &distance) in areas.iter().zip(distances) {
        let size = area.major_dim(vertical);
        let mut score = if size <= target_size {
            size as f32 / target_size as f32
        } else {
            let ratio = 1.0 - (size - target_size) as f32 / (max_size - target_size).max(1) as f32;
            ratio.powf(1.5)
        };
        let distance = distance.min(max_size);
        score *= 1.0 - distance as f32 / max_size as f32;
        sum += score;
    }
    sum / areas.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rect;

    fn area(x: i32, y: i32, w: i32, h: i32) -> Area {
        Area::new(Rect::new(x, y, w, h), (w * h) as u32 / 2, 0)
    }

    #[test]
    fn combination_counter_increments_binary() {
        let mut c = vec![false, false, false];
        next_combination(&mut c);
        assert_eq!(c, vec![true, false, false]);
        next_combination(&mut c);
        assert_eq!(c, vec![false, true, false]);
        next_combination(&mut c);
        assert_eq!(c, vec![true, true, false]);
        next_combination(&mut c);
        assert_eq!(c, vec![false, false, true]);
    }

    #[test]
    fn split_glyph_halves_are_rejoined() {
        // vertical column 20 wide; a full glyph, then a glyph split into
        // two 20x9 halves that together make a 20x19 cell
        let areas = vec![
            area(0, 0, 20, 20),
            area(0, 22, 20, 9),
            area(0, 32, 20, 9),
            area(0, 44, 20, 20),
        ];
        let mut col = Column::from_areas(areas, true);
        merge_column(&mut col, true, &MergeParams::default());
        assert_eq!(col.areas.len(), 3);
        assert_eq!(col.areas[1].rect, Rect::new(0, 22, 20, 19));
    }

    #[test]
    fn well_formed_column_is_unchanged() {
        let areas = vec![
            area(0, 0, 20, 20),
            area(0, 22, 20, 20),
            area(0, 44, 20, 20),
        ];
        let mut col = Column::from_areas(areas, true);
        merge_column(&mut col, true, &MergeParams::default());
        assert_eq!(col.areas.len(), 3);
    }

    #[test]
    fn punctuation_blocks_merging_across_it() {
        // dot between two small fragments: the fragments may not merge
        // through the punctuation area
        let mut dot = area(16, 11, 3, 3);
        dot.punctuation = true;
        let areas = vec![area(0, 0, 20, 9), dot, area(0, 16, 20, 9)];
        let mut col = Column::from_areas(areas, true);
        merge_column(&mut col, true, &MergeParams::default());
        assert_eq!(col.areas.len(), 3);
    }

    #[test]
    fn oversized_merge_is_never_produced() {
        // fragments whose union would exceed 1.5 column widths
        let areas = vec![area(0, 0, 20, 9), area(0, 26, 20, 9)];
        let mut col = Column::from_areas(areas, true);
        merge_column(&mut col, true, &MergeParams::default());
        assert_eq!(col.areas.len(), 2);
    }
}
