//! Resolves the reading orientation per image zone.
//!
//! Both orientations are detected independently; this pass groups columns
//! that overlap across orientations, scores each orientation of a group and
//! keeps the better one. Different zones of the same image may end up with
//! different orientations.

use std::collections::HashMap;

use serde::Deserialize;

use crate::area::Area;
use crate::column::{Column, ColumnId};
use crate::context::DetectionContext;
use crate::error::DetectError;
use crate::rtree::RTree;
use crate::types::{Orientation, Rect};
use crate::util::scale;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OrientationParams {
    /// Columns whose darkest intensities differ by more than this never
    /// join the same group.
    pub intensity_max_delta: f32,
    /// Surviving columns smaller than this in both dimensions are dropped.
    pub min_dimension: i32,
}

impl Default for OrientationParams {
    fn default() -> Self {
        Self {
            intensity_max_delta: 100.0,
            min_dimension: 7,
        }
    }
}

/// Picks the winning orientation per group of overlapping columns and
/// returns the final column list. Handles inside the returned columns refer
/// to positions in that list.
pub fn resolve_orientation(
    ctx: &mut DetectionContext,
    orientation: Orientation,
    params: &OrientationParams,
) -> Result<Vec<Column>, DetectError> {
    match orientation {
        Orientation::Vertical => Ok(take_forced(std::mem::take(&mut ctx.vertical_columns))),
        Orientation::Horizontal => Ok(take_forced(std::mem::take(&mut ctx.horizontal_columns))),
        Orientation::Auto => resolve_auto(ctx, params),
    }
}

/// Forced orientation: the finished slab is already compacted, so its ids
/// are final positions.
fn take_forced(slab: crate::column::ColumnSlab) -> Vec<Column> {
    slab.live_ids()
        .into_iter()
        .filter_map(|id| slab.get(id).cloned())
        .collect()
}

fn resolve_auto(
    ctx: &mut DetectionContext,
    params: &OrientationParams,
) -> Result<Vec<Column>, DetectError> {
    // both slabs into one arena; horizontal handles shift past the vertical
    // ones
    let vertical = std::mem::take(&mut ctx.vertical_columns);
    let horizontal = std::mem::take(&mut ctx.horizontal_columns);
    let offset = vertical.live_ids().len();

    let mut cols: Vec<Column> = Vec::new();
    for id in vertical.live_ids() {
        if let Some(col) = vertical.get(id) {
            cols.push(col.clone());
        }
    }
    for id in horizontal.live_ids() {
        if let Some(col) = horizontal.get(id) {
            let mut col = col.clone();
            col.next = col.next.map(|n| n + offset);
            col.previous = col.previous.map(|p| p + offset);
            for f in &mut col.furigana_columns {
                *f += offset;
            }
            cols.push(col);
        }
    }
    for col in &mut cols {
        col.score = None;
    }

    let mut index = RTree::new(ctx.image_rect());
    for (id, col) in cols.iter().enumerate() {
        index.insert(id, col.rect)?;
    }

    // furigana member areas per orientation, matched pixel-for-pixel by the
    // pair filter below
    let mut vertical_furigana = FuriganaAreas::new(ctx.image_rect());
    let mut horizontal_furigana = FuriganaAreas::new(ctx.image_rect());
    for col in &cols {
        if !col.furigana {
            continue;
        }
        let target = if col.vertical {
            &mut vertical_furigana
        } else {
            &mut horizontal_furigana
        };
        for area in &col.areas {
            target.add(area.rect, area.pixels)?;
        }
    }

    // seed large columns first so small fragments join existing groups
    let mut order: Vec<ColumnId> = (0..cols.len()).collect();
    order.sort_by_key(|&id| (std::cmp::Reverse(cols[id].size()), id));

    let mut visited = vec![false; cols.len()];
    let mut kept: Vec<ColumnId> = Vec::new();

    for seed in order {
        if visited[seed] {
            continue;
        }
        let group = flood_group(&cols, &index, &mut visited, seed, params);

        let mut distances: HashMap<ColumnId, Option<f32>> = HashMap::new();
        let vertical_score = group_score(
            &cols,
            &group.vertical,
            &horizontal_furigana,
            &mut distances,
        );
        let horizontal_score =
            group_score(&cols, &group.horizontal, &vertical_furigana, &mut distances);

        // lower wins; vertical wins ties and the double-null case
        let keep_vertical = match (vertical_score, horizontal_score) {
            (Some(v), Some(h)) => v <= h,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => true,
        };
        if keep_vertical {
            kept.extend(group.vertical);
        } else {
            kept.extend(group.horizontal);
        }
    }

    kept.retain(|&id| cols[id].rect.min_dim() > params.min_dimension);

    // rewrite handles to final positions; targets that lost become None
    let mut remap: Vec<Option<usize>> = vec![None; cols.len()];
    for (pos, &id) in kept.iter().enumerate() {
        remap[id] = Some(pos);
    }
    let mut result = Vec::with_capacity(kept.len());
    for &id in &kept {
        let mut col = cols[id].clone();
        col.next = col.next.and_then(|n| remap[n]);
        col.previous = col.previous.and_then(|p| remap[p]);
        col.furigana_columns = col.furigana_columns.iter().filter_map(|&f| remap[f]).collect();
        for area in &mut col.areas {
            area.owner = remap[id];
        }
        result.push(col);
    }
    Ok(result)
}

struct Group {
    vertical: Vec<ColumnId>,
    horizontal: Vec<ColumnId>,
}

/// Flood fill over significantly overlapping columns of either orientation,
/// pulling in furigana attachments as well.
fn flood_group(
    cols: &[Column],
    index: &RTree,
    visited: &mut [bool],
    seed: ColumnId,
    params: &OrientationParams,
) -> Group {
    let mut group = Group {
        vertical: Vec::new(),
        horizontal: Vec::new(),
    };
    let seed_intensity = cols[seed].min_intensity() as f32;
    let mut todo = vec![seed];

    while let Some(next) = todo.pop() {
        if visited[next] {
            continue;
        }
        visited[next] = true;
        let col = &cols[next];
        if col.vertical {
            group.vertical.push(next);
        } else {
            group.horizontal.push(next);
        }

        let mut candidates = index.query_excluding(&col.rect, next);
        for &furigana in &col.furigana_columns {
            candidates.extend(index.query(&cols[furigana].rect));
        }

        for cand_id in candidates {
            let cand = &cols[cand_id];
            // background decorations have very different ink
            let delta = (seed_intensity - cand.min_intensity() as f32).abs();
            if delta > params.intensity_max_delta {
                continue;
            }
            let Some(intersect) = col.rect.intersection(&cand.rect) else { continue };
            let int_size = intersect.area();
            let ref1 = ((col.minor_dim() as f64).powi(2) / 4.0).ceil() as i64;
            let ref2 = ((cand.minor_dim() as f64).powi(2) / 4.0).ceil() as i64;
            if int_size >= ref1 || int_size >= ref2 {
                todo.push(cand_id);
            }
        }
    }
    group
}

/// Group score, lower is better. `None` when the orientation produced no
/// usable columns in this zone.
fn group_score(
    cols: &[Column],
    group: &[ColumnId],
    opposite_furigana: &FuriganaAreas,
    distances: &mut HashMap<ColumnId, Option<f32>>,
) -> Option<f32> {
    if group.is_empty() {
        return None;
    }
    let distance_score = area_distance_score(cols, group, opposite_furigana, distances)?;
    let connections_score = connected_score(cols, group)?;
    let null_score = null_columns_score(cols, group, distances);
    Some(distance_score * connections_score * null_score)
}

/// Weighted mean midpoint gap between clean area pairs. Columns in the
/// wrong orientation contain few clean pairs with compact gaps, so their
/// mean gap is larger.
fn area_distance_score(
    cols: &[Column],
    group: &[ColumnId],
    opposite_furigana: &FuriganaAreas,
    distances: &mut HashMap<ColumnId, Option<f32>>,
) -> Option<f32> {
    let mut distance_sum = 0.0f32;
    let mut weight_sum = 0.0f32;

    for &id in group {
        let col = &cols[id];
        let distance = area_distance(col, opposite_furigana);
        distances.insert(id, distance);
        let Some(distance) = distance else { continue };
        let mut weight = (col.area_size_sum() as f32).sqrt();
        if col.areas.len() == 2 {
            weight *= col.avg_area_squareness().powi(2);
        }
        distance_sum += distance * weight;
        weight_sum += weight;
    }

    (weight_sum > 0.0).then(|| distance_sum / weight_sum)
}

/// Mean midpoint gap over the column's clean area pairs. Suspected special
/// cases are skipped entirely so a few odd glyphs cannot flip the
/// orientation decision.
fn area_distance(col: &Column, opposite_furigana: &FuriganaAreas) -> Option<f32> {
    let vertical = col.vertical;

    // drop areas that exactly match furigana of the other orientation and
    // re-sort what remains by reading position
    let mut areas: Vec<&Area> = col
        .areas
        .iter()
        .filter(|a| !opposite_furigana.covers_exactly(&a.rect, a.pixels))
        .collect();
    areas.sort_by_key(|a| if vertical { a.y() } else { a.x() });

    let mut distance_sum = 0.0f32;
    let mut pairs = 0u32;

    for pair in areas.windows(2) {
        let (prev, next) = (pair[0], pair[1]);

        if prev.punctuation || next.punctuation {
            continue;
        }
        if prev.splitted || next.splitted {
            continue;
        }

        // small square areas read fine in either orientation
        let (min_size, min_shape) = if prev.size() < next.size() {
            (prev.size() as f32, prev.squareness())
        } else {
            (next.size() as f32, next.squareness())
        };
        let target_size = (col.minor_dim() as f32).powi(2);
        if min_size / target_size <= 0.3 && min_shape >= 0.5 {
            continue;
        }

        // two thin areas are probably one glyph cut across the wrong axis
        let avg_ratio =
            (prev.major_minor_ratio(vertical) + next.major_minor_ratio(vertical)) / 2.0;
        if avg_ratio <= 0.7 {
            continue;
        }

        let max_length = prev.major_dim(vertical).max(next.major_dim(vertical));
        if max_length as f32 > col.minor_dim() as f32 * 1.5 {
            continue;
        }

        let distance = if vertical {
            (next.midpoint().y - prev.midpoint().y) as f32
        } else {
            (next.midpoint().x - prev.midpoint().x) as f32
        };
        if distance > col.minor_dim() as f32 * 2.0 {
            continue;
        }

        distance_sum += distance;
        pairs += 1;
    }

    (pairs > 0).then(|| distance_sum / pairs as f32)
}

/// Best (lowest) chain score over the group. The correct orientation tends
/// to produce long linked chains of square areas.
fn connected_score(cols: &[Column], group: &[ColumnId]) -> Option<f32> {
    let mut best: Option<f32> = None;
    for &id in group {
        // chains start where no previous link points back into the group
        if let Some(prev) = cols[id].previous {
            if group.contains(&prev) {
                continue;
            }
        }
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            if chain.contains(&c) {
                // defensive: linked columns should form chains, not loops
                break;
            }
            chain.push(c);
            cursor = cols[c].next;
        }

        let mut squareness_sum: Option<f32> = None;
        for &c in &chain {
            for area in &cols[c].areas {
                if area.punctuation {
                    continue;
                }
                *squareness_sum.get_or_insert(0.0) += area.squareness();
            }
        }
        if let Some(sum) = squareness_sum {
            let score = 1.0 / sum.powf(0.2);
            best = Some(best.map_or(score, |b: f32| b.min(score)));
        }
    }
    best
}

/// Penalty for columns where no clean pair distance existed.
fn null_columns_score(
    cols: &[Column],
    group: &[ColumnId],
    distances: &HashMap<ColumnId, Option<f32>>,
) -> f32 {
    let mut null_weight = 0.0f32;
    let mut total_weight = 0.0f32;
    for &id in group {
        let weight = (cols[id].area_size_sum() as f32).sqrt();
        if distances.get(&id).copied().flatten().is_none() {
            null_weight += weight;
        }
        total_weight += weight;
    }
    let null_ratio = null_weight / total_weight.max(f32::MIN_POSITIVE);
    if null_ratio < 0.5 {
        scale(null_ratio, 0.0, 0.5, 1.0, 1.1)
    } else {
        scale(null_ratio, 0.5, 1.0, 1.1, 10.0)
    }
}

/// Spatial index over furigana member areas with their pixel counts.
struct FuriganaAreas {
    index: RTree,
    pixels: Vec<u32>,
}

impl FuriganaAreas {
    fn new(bounds: Rect) -> Self {
        Self {
            index: RTree::new(bounds),
            pixels: Vec::new(),
        }
    }

    fn add(&mut self, rect: Rect, pixels: u32) -> Result<(), DetectError> {
        let id = self.pixels.len();
        self.index.insert(id, rect)?;
        self.pixels.push(pixels);
        Ok(())
    }

    /// True when the intersecting furigana areas account for exactly the
    /// area's pixels, meaning the area is the same ink seen from the other
    /// orientation.
    fn covers_exactly(&self, rect: &Rect, pixels: u32) -> bool {
        let sum: u32 = self
            .index
            .query(rect)
            .into_iter()
            .map(|id| self.pixels[id])
            .sum();
        sum == pixels
    }
}
