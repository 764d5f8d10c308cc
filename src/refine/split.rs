//! Splits areas covering two touching characters.
//!
//! An area much longer than its column is thick scans the middle band of the
//! area for the row (or column, in horizontal text) with the fewest set
//! pixels and cuts there. The scan walks outward from the center so that
//! between equally sparse lines the centered one wins.

use serde::Deserialize;

use crate::area::Area;
use crate::column::Column;
use crate::context::DetectionContext;
use crate::matrix::BitMatrix;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SplitParams {
    /// Area must be longer than `min_length` times the column's smaller
    /// dimension to be considered.
    pub min_length: f32,
    /// Scan band start, fraction of the area's reading-direction extent.
    pub scan_from: f32,
    /// Scan band end.
    pub scan_to: f32,
    /// A line qualifies as a cut if its set-pixel ratio stays below this.
    pub max_pixels_ratio: f32,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            min_length: 1.25,
            scan_from: 0.25,
            scan_to: 0.75,
            max_pixels_ratio: 0.14,
        }
    }
}

/// Splits oversized areas in every column of the current orientation.
pub fn split_areas(ctx: &mut DetectionContext, params: &SplitParams) {
    let mut slab = std::mem::take(&mut ctx.columns);
    let vertical = ctx.vertical;
    let (width, height) = (ctx.width(), ctx.height());
    for id in slab.live_ids() {
        let Some(col) = slab.get_mut(id) else { continue };
        let min_length = (col.min_dim() as f32 * params.min_length).ceil() as i32;
        let mut i = 0;
        while i < col.areas.len() {
            let area = &col.areas[i];
            if area.height() < 10 && area.width() < 10 {
                i += 1;
                continue;
            }
            let ref_length = if vertical {
                area.height()
            } else {
                area.width()
            };
            if ref_length > min_length && split_area(col, i, vertical, &ctx.binary, width, height, params)
            {
                // revisit the first half, it may still be too long
                continue;
            }
            i += 1;
        }
        col.refresh_rect();
    }
    ctx.columns = slab;
}

fn split_area(
    col: &mut Column,
    index: usize,
    vertical: bool,
    binary: &BitMatrix,
    width: i32,
    height: i32,
    params: &SplitParams,
) -> bool {
    let area = col.areas[index].clone();
    let halves = if vertical {
        split_vertical(&area, col, binary, height, params)
    } else {
        split_horizontal(&area, col, binary, width, params)
    };
    match halves {
        Some((first, second)) => {
            col.areas[index] = first;
            col.areas.insert(index + 1, second);
            true
        }
        None => false,
    }
}

fn split_vertical(
    area: &Area,
    col: &Column,
    binary: &BitMatrix,
    height: i32,
    params: &SplitParams,
) -> Option<(Area, Area)> {
    let min_y = area.y() + (area.height() as f32 * params.scan_from).floor() as i32;
    let max_y = area.y() + (area.height() as f32 * params.scan_to).ceil() as i32;
    if min_y <= 0 || max_y >= height - 1 {
        return None;
    }
    let mut min_pixels = (area.width() as f32 * params.max_pixels_ratio).ceil() as u32 + 1;
    let mut split_at = None;

    // walk outward from the center: m, m-1, m+1, m-2, ...
    let mut y = min_y + (max_y - min_y) / 2;
    let mut delta = 0;
    while y >= min_y && y <= max_y {
        let pixels = binary.count_row(area.x(), area.max_x(), y);
        if pixels < min_pixels {
            min_pixels = pixels;
            split_at = Some(y);
        }
        delta += 1;
        if delta == (max_y - min_y) / 4 {
            // give priority to centered cuts
            min_pixels = (min_pixels as f32 * 0.9).floor() as u32;
        }
        y = if delta % 2 == 0 { y + delta } else { y - delta };
    }

    let split_at = split_at?;

    // assign the cut line to whichever half its pixels connect to
    let mut up = 0;
    let mut down = 0;
    for x in col.rect.x..=col.rect.max_x() {
        if binary.get(x, split_at) {
            if binary.get(x, split_at - 1) {
                up += 1;
            }
            if binary.get(x, split_at + 1) {
                down += 1;
            }
        }
    }
    let cut = if up > down { split_at } else { split_at - 1 };
    Some(area.split_y(cut))
}

fn split_horizontal(
    area: &Area,
    col: &Column,
    binary: &BitMatrix,
    width: i32,
    params: &SplitParams,
) -> Option<(Area, Area)> {
    let min_x = area.x() + (area.width() as f32 * params.scan_from).floor() as i32;
    let max_x = area.x() + (area.width() as f32 * params.scan_to).ceil() as i32;
    if min_x <= 0 || max_x >= width - 1 {
        return None;
    }
    let mut min_pixels = (area.height() as f32 * params.max_pixels_ratio).ceil() as u32;
    let mut split_at = None;

    let mut x = min_x + (max_x - min_x) / 2;
    let mut delta = 0;
    while x >= min_x && x <= max_x {
        let pixels = binary.count_col(x, area.y(), area.max_y());
        if pixels < min_pixels {
            min_pixels = pixels;
            split_at = Some(x);
        }
        delta += 1;
        if delta == (max_x - min_x) / 4 {
            min_pixels = (min_pixels as f32 * 0.9).floor() as u32;
        }
        x = if delta % 2 == 0 { x + delta } else { x - delta };
    }

    let split_at = split_at?;

    let mut left = 0;
    let mut right = 0;
    for y in col.rect.y..=col.rect.max_y() {
        if binary.get(split_at, y) {
            if binary.get(split_at - 1, y) {
                left += 1;
            }
            if binary.get(split_at + 1, y) {
                right += 1;
            }
        }
    }
    let cut = if left > right { split_at } else { split_at - 1 };
    Some(area.split_x(cut))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RgbImage;
    use crate::types::Rect;

    fn context(width: usize, height: usize) -> DetectionContext {
        let image = RgbImage::filled(width, height, [255, 255, 255]);
        DetectionContext::new(&image).unwrap()
    }

    fn fill(binary: &mut BitMatrix, rect: Rect) {
        for y in rect.y..=rect.max_y() {
            for x in rect.x..=rect.max_x() {
                binary.set(x, y, true);
            }
        }
    }

    #[test]
    fn two_touching_glyphs_are_cut_at_the_gap() {
        let mut ctx = context(60, 60);
        // two 14x14 blocks bridged by a thin 1-pixel neck at x = 25
        fill(&mut ctx.binary, Rect::new(20, 10, 14, 14));
        fill(&mut ctx.binary, Rect::new(20, 26, 14, 14));
        ctx.binary.set(25, 24, true);
        ctx.binary.set(25, 25, true);
        let area = Area::new(Rect::new(20, 10, 14, 30), 394, 0);
        let col = Column::from_area(area, true);
        ctx.columns.insert(col);

        split_areas(&mut ctx, &SplitParams::default());

        let col = ctx.columns.get(0).unwrap();
        assert_eq!(col.areas.len(), 2);
        assert!(col.areas.iter().all(|a| a.splitted));
        // halves tile the original rect
        assert_eq!(
            col.areas[0].rect.union(&col.areas[1].rect),
            Rect::new(20, 10, 14, 30)
        );
        assert_eq!(col.areas[0].max_y() + 1, col.areas[1].y());
        // the cut lands inside the neck band, not inside a glyph
        assert!(col.areas[0].max_y() >= 23 && col.areas[0].max_y() <= 26);
    }

    #[test]
    fn compact_area_is_left_alone() {
        let mut ctx = context(60, 60);
        fill(&mut ctx.binary, Rect::new(20, 10, 14, 14));
        let area = Area::new(Rect::new(20, 10, 14, 14), 196, 0);
        ctx.columns.insert(Column::from_area(area, true));

        split_areas(&mut ctx, &SplitParams::default());

        assert_eq!(ctx.columns.get(0).unwrap().areas.len(), 1);
    }

    #[test]
    fn solid_bar_without_sparse_line_is_not_split() {
        let mut ctx = context(60, 60);
        fill(&mut ctx.binary, Rect::new(20, 10, 14, 30));
        let area = Area::new(Rect::new(20, 10, 14, 30), 420, 0);
        ctx.columns.insert(Column::from_area(area, true));

        split_areas(&mut ctx, &SplitParams::default());

        assert_eq!(ctx.columns.get(0).unwrap().areas.len(), 1);
    }
}
