//! Links columns that continue each other's text in reading direction.
//!
//! Vertical columns continue to the left, horizontal columns continue below.
//! A probe square ahead of each column collects candidates; the nearest one
//! whose entry corner falls inside the probe is accepted unless a divider,
//! a width mismatch or a third column sits between them.

use serde::Deserialize;

use crate::column::ColumnId;
use crate::context::DetectionContext;
use crate::error::DetectError;
use crate::rtree::RTree;
use crate::types::{Point, Rect};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LinkerParams {
    /// Probe square side, relative to the column's thickness.
    pub probe_size_factor: f32,
    /// Background pixels on the connection path that break the link.
    pub max_background_pixels: u32,
    /// Linked columns must have thickness within this ratio of each other.
    pub min_width_ratio: f32,
}

impl Default for LinkerParams {
    fn default() -> Self {
        Self {
            probe_size_factor: 1.75,
            max_background_pixels: 2,
            min_width_ratio: 0.75,
        }
    }
}

/// Finds the next column for every column of the current orientation.
pub fn link_columns(ctx: &mut DetectionContext, params: &LinkerParams) -> Result<(), DetectError> {
    let mut index = RTree::new(ctx.image_rect());
    for (id, col) in ctx.columns.iter() {
        index.insert(id, col.rect)?;
    }
    for id in ctx.columns.live_ids() {
        link_next(ctx, &index, id, params);
    }
    Ok(())
}

fn link_next(ctx: &mut DetectionContext, index: &RTree, id: ColumnId, params: &LinkerParams) {
    let Some(col) = ctx.columns.get(id) else { return };
    let vertical = col.vertical;
    let rect = col.rect;

    let probe = if vertical {
        let probe_size = (rect.w as f32 * params.probe_size_factor).ceil() as i32;
        Rect::new(
            rect.x - probe_size - 1,
            rect.y - probe_size / 2,
            probe_size,
            probe_size,
        )
    } else {
        let probe_size = (rect.h as f32 * params.probe_size_factor).ceil() as i32;
        Rect::new(rect.x - probe_size / 2, rect.max_y() + 1, probe_size, probe_size)
    };

    let start = connection_start(&rect, vertical);

    // nearest candidate whose entry corner falls inside the probe
    let mut target: Option<ColumnId> = None;
    let mut distance = f32::MAX;
    for cand_id in index.query_excluding(&probe, id) {
        let Some(cand) = ctx.columns.get(cand_id) else { continue };
        if cand.furigana {
            continue;
        }
        let entry = if vertical {
            Point::new(cand.rect.max_x(), cand.rect.y)
        } else {
            Point::new(cand.rect.x, cand.rect.y)
        };
        if !probe.contains_point(entry) {
            continue;
        }
        let d = start.distance(connection_end(&cand.rect, vertical));
        if d < distance {
            target = Some(cand_id);
            distance = d;
        }
    }

    let Some(target) = target else { return };
    let Some(target_col) = ctx.columns.get(target) else { return };

    // connected columns form chains, not trees
    if target_col.previous.is_some() {
        return;
    }

    let end = connection_end(&target_col.rect, vertical);
    let target_minor = target_col.minor_dim();

    // no divider may cross the connection path
    let path = Rect::from_corners(start, end);
    if ctx.background.count_rect(&path, true) >= params.max_background_pixels {
        return;
    }
    let half_path = Rect::from_corners(rect.midpoint(), end);
    if ctx.background.count_rect(&half_path, true) >= params.max_background_pixels {
        return;
    }

    // roughly equal thickness
    let minor = if vertical { rect.w } else { rect.h };
    if (minor as f32) < target_minor as f32 * params.min_width_ratio
        || (target_minor as f32) < minor as f32 * params.min_width_ratio
    {
        return;
    }

    // no third column between the two
    for other in index.query(&path) {
        if other != id && other != target {
            return;
        }
    }

    if let Some(col) = ctx.columns.get_mut(id) {
        col.next = Some(target);
    }
    if let Some(target_col) = ctx.columns.get_mut(target) {
        target_col.previous = Some(id);
    }
}

fn connection_start(rect: &Rect, vertical: bool) -> Point {
    if vertical {
        Point::new(rect.x, rect.y)
    } else {
        Point::new(rect.x, rect.max_y())
    }
}

fn connection_end(rect: &Rect, vertical: bool) -> Point {
    if vertical {
        Point::new(rect.max_x(), rect.y)
    } else {
        Point::new(rect.x, rect.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use crate::column::Column;
    use crate::image::RgbImage;

    fn context(width: usize, height: usize) -> DetectionContext {
        let image = RgbImage::filled(width, height, [255, 255, 255]);
        DetectionContext::new(&image).unwrap()
    }

    fn column(rect: Rect, vertical: bool) -> Column {
        let area = Area::new(rect, (rect.w * rect.h) as u32 / 2, 0);
        Column::from_area(area, vertical)
    }

    #[test]
    fn vertical_columns_link_right_to_left() {
        let mut ctx = context(120, 120);
        let right = ctx.columns.insert(column(Rect::new(80, 10, 20, 90), true));
        let left = ctx.columns.insert(column(Rect::new(50, 10, 20, 90), true));

        link_columns(&mut ctx, &LinkerParams::default()).unwrap();

        assert_eq!(ctx.columns.get(right).unwrap().next, Some(left));
        assert_eq!(ctx.columns.get(left).unwrap().previous, Some(right));
        assert_eq!(ctx.columns.get(left).unwrap().next, None);
    }

    #[test]
    fn background_divider_breaks_link() {
        let mut ctx = context(120, 120);
        ctx.columns.insert(column(Rect::new(80, 10, 20, 90), true));
        let left = ctx.columns.insert(column(Rect::new(50, 10, 20, 90), true));
        // panel border between the columns
        for y in 0..40 {
            ctx.background.set(75, y, true);
        }

        link_columns(&mut ctx, &LinkerParams::default()).unwrap();

        assert_eq!(ctx.columns.get(0).unwrap().next, None);
        assert_eq!(ctx.columns.get(left).unwrap().previous, None);
    }

    #[test]
    fn thin_column_is_not_linked_to_thick_one() {
        let mut ctx = context(120, 120);
        ctx.columns.insert(column(Rect::new(80, 10, 20, 90), true));
        ctx.columns.insert(column(Rect::new(62, 10, 8, 90), true));

        link_columns(&mut ctx, &LinkerParams::default()).unwrap();

        assert_eq!(ctx.columns.get(0).unwrap().next, None);
    }

    #[test]
    fn furigana_is_skipped_as_target() {
        let mut ctx = context(120, 120);
        ctx.columns.insert(column(Rect::new(80, 10, 20, 90), true));
        let ruby = ctx.columns.insert(column(Rect::new(52, 10, 18, 90), true));
        ctx.columns.get_mut(ruby).unwrap().furigana = true;

        link_columns(&mut ctx, &LinkerParams::default()).unwrap();

        assert_eq!(ctx.columns.get(0).unwrap().next, None);
    }
}
