//! Connected components promoted to character candidates.

use crate::column::ColumnId;
use crate::types::{Point, Rect};

/// One connected component of text-candidate pixels. Areas are value types:
/// merging and splitting produce new `Area`s, the rectangle of an existing
/// one never mutates. `pixels` counts set pixels inside `rect` and never
/// exceeds `rect.area()`.
#[derive(Clone, Debug)]
pub struct Area {
    pub rect: Rect,
    /// Set-pixel count inside `rect`.
    pub pixels: u32,
    /// Minimum intensity (min RGB channel, polarity-corrected) over the
    /// component's pixels. Lower means darker ink.
    pub min_intensity: u8,
    /// Classified as punctuation by the bracket/dot pass.
    pub punctuation: bool,
    /// Produced by the splitting pass.
    pub splitted: bool,
    /// Changed by the most recent refinement pass, used only for snapshot
    /// highlighting.
    pub changed: bool,
    /// Column currently holding this area, if any.
    pub owner: Option<ColumnId>,
    /// Rectangles this area was merged from, kept for snapshot overlays.
    pub source_rects: Vec<Rect>,
}

impl Area {
    pub fn new(rect: Rect, pixels: u32, min_intensity: u8) -> Self {
        Self {
            rect,
            pixels,
            min_intensity,
            punctuation: false,
            splitted: false,
            changed: false,
            owner: None,
            source_rects: Vec::new(),
        }
    }

    pub fn x(&self) -> i32 {
        self.rect.x
    }

    pub fn y(&self) -> i32 {
        self.rect.y
    }

    pub fn width(&self) -> i32 {
        self.rect.w
    }

    pub fn height(&self) -> i32 {
        self.rect.h
    }

    pub fn max_x(&self) -> i32 {
        self.rect.max_x()
    }

    pub fn max_y(&self) -> i32 {
        self.rect.max_y()
    }

    pub fn midpoint(&self) -> Point {
        self.rect.midpoint()
    }

    pub fn size(&self) -> i64 {
        self.rect.area()
    }

    pub fn min_dim(&self) -> i32 {
        self.rect.min_dim()
    }

    pub fn max_dim(&self) -> i32 {
        self.rect.max_dim()
    }

    /// Extent along the reading direction.
    pub fn major_dim(&self, vertical: bool) -> i32 {
        if vertical {
            self.rect.h
        } else {
            self.rect.w
        }
    }

    /// Extent across the reading direction.
    pub fn minor_dim(&self, vertical: bool) -> i32 {
        if vertical {
            self.rect.w
        } else {
            self.rect.h
        }
    }

    /// Reading-direction extent over cross extent. > 1 means elongated along
    /// the reading direction.
    pub fn major_minor_ratio(&self, vertical: bool) -> f32 {
        self.major_dim(vertical) as f32 / self.minor_dim(vertical).max(1) as f32
    }

    /// min(w/h, h/w); 1.0 for a square.
    pub fn squareness(&self) -> f32 {
        self.rect.squareness()
    }

    /// Set pixels over bounding-box area.
    pub fn density(&self) -> f32 {
        let size = self.size();
        if size == 0 {
            return 0.0;
        }
        self.pixels as f32 / size as f32
    }

    /// New area covering both operands. Pixel counts add; the darker
    /// intensity wins. Source rectangles accumulate for overlays.
    pub fn merge(&self, other: &Area) -> Area {
        let mut merged = Area::new(
            self.rect.union(&other.rect),
            self.pixels + other.pixels,
            self.min_intensity.min(other.min_intensity),
        );
        merged.splitted = self.splitted || other.splitted;
        merged.changed = true;
        merged.source_rects = self
            .source_rects
            .iter()
            .chain(other.source_rects.iter())
            .copied()
            .collect();
        merged.source_rects.push(self.rect);
        merged.source_rects.push(other.rect);
        merged
    }

    /// Splits at column `x`, which goes to the left half. Both halves are
    /// marked `splitted` and get half the pixel count each.
    pub fn split_x(&self, x: i32) -> (Area, Area) {
        let left = Rect::new(self.rect.x, self.rect.y, x - self.rect.x + 1, self.rect.h);
        let right = Rect::new(x + 1, self.rect.y, self.rect.max_x() - x, self.rect.h);
        self.make_halves(left, right)
    }

    /// Splits at row `y`, which goes to the top half.
    pub fn split_y(&self, y: i32) -> (Area, Area) {
        let top = Rect::new(self.rect.x, self.rect.y, self.rect.w, y - self.rect.y + 1);
        let bottom = Rect::new(self.rect.x, y + 1, self.rect.w, self.rect.max_y() - y);
        self.make_halves(top, bottom)
    }

    fn make_halves(&self, a: Rect, b: Rect) -> (Area, Area) {
        let mut first = Area::new(a, self.pixels / 2, self.min_intensity);
        let mut second = Area::new(b, self.pixels / 2, self.min_intensity);
        for half in [&mut first, &mut second] {
            half.splitted = true;
            half.changed = true;
            half.owner = self.owner;
        }
        (first, second)
    }
}
