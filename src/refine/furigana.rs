//! Detects furigana columns: thin reading-aid columns hugging a main
//! column's right side (vertical text) or top edge (horizontal text).

use serde::Deserialize;

use crate::context::DetectionContext;
use crate::error::DetectError;
use crate::rtree::RTree;
use crate::types::Rect;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FuriganaParams {
    /// Candidate thickness must exceed this fraction of the main column's.
    pub min_minor_ratio: f32,
    /// ... and stay below this fraction.
    pub max_minor_ratio: f32,
    /// Candidate length limit relative to the main column.
    pub max_major_ratio: f32,
    /// Candidate characters must be clearly smaller: median area size below
    /// this fraction of the main column's.
    pub max_median_area_ratio: f32,
    /// Probe touching this many background pixels is blocked.
    pub max_background_pixels: u32,
}

impl Default for FuriganaParams {
    fn default() -> Self {
        Self {
            min_minor_ratio: 0.20,
            max_minor_ratio: 0.55,
            max_major_ratio: 1.05,
            max_median_area_ratio: 0.5,
            max_background_pixels: 2,
        }
    }
}

/// Marks furigana columns and attaches them to their main columns.
pub fn find_furigana(ctx: &mut DetectionContext, params: &FuriganaParams) -> Result<(), DetectError> {
    let mut index = RTree::new(ctx.image_rect());
    for (id, col) in ctx.columns.iter() {
        index.insert(id, col.rect)?;
    }

    let ids = ctx.columns.live_ids();
    for id in ids {
        let Some(col) = ctx.columns.get(id) else { continue };

        // probe hugs the side furigana would occupy
        let probe = if col.vertical {
            Rect::new(
                col.rect.max_x() + 1,
                col.rect.y,
                col.rect.w / 2,
                col.rect.h,
            )
        } else {
            Rect::new(
                col.rect.x,
                col.rect.y - col.rect.h / 2 - 1,
                col.rect.w,
                col.rect.h / 2,
            )
        };

        // background pixels in the probe mean the neighbour is a separate
        // block, not furigana
        if ctx.background.count_rect(&probe, false) >= params.max_background_pixels {
            continue;
        }

        let minor = col.minor_dim() as f32;
        let major = col.major_dim() as f32;
        let median = col.median_area_size();

        let mut found = Vec::new();
        for cand_id in index.query_excluding(&probe, id) {
            let Some(cand) = ctx.columns.get(cand_id) else { continue };
            let cand_minor = cand.minor_dim() as f32;
            if cand_minor < minor * params.max_minor_ratio
                && cand_minor > minor * params.min_minor_ratio
                && (cand.major_dim() as f32) < major * params.max_major_ratio
                && cand.median_area_size() < median * params.max_median_area_ratio
            {
                found.push(cand_id);
            }
        }

        for f in &found {
            if let Some(cand) = ctx.columns.get_mut(*f) {
                cand.furigana = true;
                cand.changed = true;
            }
        }
        if let Some(col) = ctx.columns.get_mut(id) {
            col.furigana_columns.extend(found);
        }
    }
    Ok(())
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

    fn column(x: i32, y: i32, w: i32, cells: i32, cell: i32, vertical: bool) -> Column {
        let mut areas = Vec::new();
        for i in 0..cells {
            let rect = if vertical {
                Rect::new(x, y + i * (cell + 2), w, cell)
            } else {
                Rect::new(x + i * (cell + 2), y, cell, w)
            };
            areas.push(Area::new(rect, (rect.w * rect.h) as u32 / 2, 0));
        }
        Column::from_areas(areas, vertical)
    }

    #[test]
    fn thin_right_neighbour_is_furigana() {
        let mut ctx = context(100, 120);
        // main column 20 wide, furigana column 7 wide right next to it
        let main = ctx.columns.insert(column(10, 10, 20, 5, 20, true));
        let ruby = ctx.columns.insert(column(32, 10, 7, 10, 7, true));

        find_furigana(&mut ctx, &FuriganaParams::default()).unwrap();

        assert!(ctx.columns.get(ruby).unwrap().furigana);
        assert_eq!(ctx.columns.get(main).unwrap().furigana_columns, vec![ruby]);
    }

    #[test]
    fn equal_width_neighbour_is_not_furigana() {
        let mut ctx = context(100, 120);
        let main = ctx.columns.insert(column(10, 10, 20, 5, 20, true));
        let other = ctx.columns.insert(column(32, 10, 20, 5, 20, true));

        find_furigana(&mut ctx, &FuriganaParams::default()).unwrap();

        assert!(!ctx.columns.get(other).unwrap().furigana);
        assert!(ctx.columns.get(main).unwrap().furigana_columns.is_empty());
    }

    #[test]
    fn background_between_columns_blocks_attachment() {
        let mut ctx = context(100, 120);
        let main = ctx.columns.insert(column(10, 10, 20, 5, 20, true));
        ctx.columns.insert(column(32, 10, 7, 10, 7, true));
        // bubble-border pixels on the probe's edge
        ctx.background.set(30, 20, true);
        ctx.background.set(30, 21, true);
        ctx.background.set(30, 22, true);

        find_furigana(&mut ctx, &FuriganaParams::default()).unwrap();

        assert!(ctx.columns.get(main).unwrap().furigana_columns.is_empty());
    }
}
