//! Column candidates and the arena that owns them.
//!
//! Columns reference each other (next/previous in reading order, furigana
//! attachments) through plain `ColumnId` indexes into a [`ColumnSlab`], never
//! through owning pointers, so chains and attachments cannot form ownership
//! cycles.

use crate::area::Area;
use crate::types::{Point, Rect};

/// Index of a column inside its slab.
pub type ColumnId = usize;

/// Ordered group of areas read as one line of text. `rect` is always the
/// union of the member rectangles.
#[derive(Clone, Debug)]
pub struct Column {
    pub areas: Vec<Area>,
    pub rect: Rect,
    pub vertical: bool,
    pub furigana: bool,
    /// Furigana columns attached to this column.
    pub furigana_columns: Vec<ColumnId>,
    /// Following column in reading order, if linked.
    pub next: Option<ColumnId>,
    /// Preceding column in reading order, if linked.
    pub previous: Option<ColumnId>,
    /// Cached builder score.
    pub score: Option<f32>,
    /// Changed by the most recent pass, used for snapshot highlighting.
    pub changed: bool,
}

impl Column {
    pub fn from_area(area: Area, vertical: bool) -> Self {
        let rect = area.rect;
        Self {
            areas: vec![area],
            rect,
            vertical,
            furigana: false,
            furigana_columns: Vec::new(),
            next: None,
            previous: None,
            score: None,
            changed: false,
        }
    }

    pub fn from_areas(areas: Vec<Area>, vertical: bool) -> Self {
        let mut rect = areas[0].rect;
        for a in &areas[1..] {
            rect = rect.union(&a.rect);
        }
        Self {
            areas,
            rect,
            vertical,
            furigana: false,
            furigana_columns: Vec::new(),
            next: None,
            previous: None,
            score: None,
            changed: false,
        }
    }

    pub fn size(&self) -> i64 {
        self.rect.area()
    }

    pub fn midpoint(&self) -> Point {
        self.rect.midpoint()
    }

    pub fn min_dim(&self) -> i32 {
        self.rect.min_dim()
    }

    /// Extent along the reading direction.
    pub fn major_dim(&self) -> i32 {
        if self.vertical {
            self.rect.h
        } else {
            self.rect.w
        }
    }

    /// Character-cell thickness: extent across the reading direction.
    pub fn minor_dim(&self) -> i32 {
        if self.vertical {
            self.rect.w
        } else {
            self.rect.h
        }
    }

    pub fn pixels(&self) -> u32 {
        self.areas.iter().map(|a| a.pixels).sum()
    }

    /// Set pixels over bounding-box area.
    pub fn pixel_area_ratio(&self) -> f32 {
        let size = self.size();
        if size == 0 {
            return 0.0;
        }
        self.pixels() as f32 / size as f32
    }

    /// Darkest member intensity.
    pub fn min_intensity(&self) -> u8 {
        self.areas
            .iter()
            .map(|a| a.min_intensity)
            .min()
            .unwrap_or(255)
    }

    /// Pixel-weighted mean of member intensities.
    pub fn avg_intensity(&self) -> f32 {
        let pixels = self.pixels();
        if pixels == 0 {
            return 255.0;
        }
        let sum: f64 = self
            .areas
            .iter()
            .map(|a| a.min_intensity as f64 * a.pixels as f64)
            .sum();
        (sum / pixels as f64) as f32
    }

    pub fn area_size_sum(&self) -> i64 {
        self.areas.iter().map(|a| a.size()).sum()
    }

    pub fn median_area_size(&self) -> f32 {
        if self.areas.is_empty() {
            return 0.0;
        }
        let mut sizes: Vec<i64> = self.areas.iter().map(|a| a.size()).collect();
        sizes.sort_unstable();
        let n = sizes.len();
        if n % 2 == 1 {
            sizes[n / 2] as f32
        } else {
            (sizes[n / 2 - 1] + sizes[n / 2]) as f32 / 2.0
        }
    }

    /// Mean squareness of member areas.
    pub fn avg_area_squareness(&self) -> f32 {
        if self.areas.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.areas.iter().map(|a| a.squareness()).sum();
        sum / self.areas.len() as f32
    }

    /// Intersection area over the smaller column's area; 0.0 when disjoint.
    pub fn intersect_ratio(&self, other: &Rect) -> f32 {
        match self.rect.intersection(other) {
            Some(i) => i.area() as f32 / self.rect.area().min(other.area()).max(1) as f32,
            None => 0.0,
        }
    }

    /// Horizontal overlap over the smaller width; 0.0 when disjoint in x.
    pub fn horizontal_intersect_ratio(&self, other: &Rect) -> f32 {
        let min_x = self.rect.x.max(other.x);
        let max_x = self.rect.max_x().min(other.max_x());
        if max_x < min_x {
            return 0.0;
        }
        (max_x - min_x + 1) as f32 / self.rect.w.min(other.w).max(1) as f32
    }

    /// New column combining both operands. Areas are re-sorted by their
    /// reading-direction midpoint and consecutive members overlapping along
    /// the reading axis are folded together (characters sliced into
    /// side-by-side fragments end up as one area).
    pub fn merge(&self, other: &Column) -> Column {
        let vertical = self.vertical;
        let mut areas: Vec<Area> = self
            .areas
            .iter()
            .chain(other.areas.iter())
            .cloned()
            .collect();
        areas.sort_by_key(|a| {
            if vertical {
                a.midpoint().y
            } else {
                a.midpoint().x
            }
        });
        let overlaps = |a: &Area, b: &Area| {
            if vertical {
                a.max_y() >= b.y() && a.y() <= b.max_y()
            } else {
                a.max_x() >= b.x() && a.x() <= b.max_x()
            }
        };
        let mut folded: Vec<Area> = Vec::with_capacity(areas.len());
        for area in areas {
            match folded.last() {
                Some(last) if overlaps(last, &area) => {
                    let merged = folded.pop().map(|l| l.merge(&area));
                    if let Some(m) = merged {
                        folded.push(m);
                    }
                }
                _ => folded.push(area),
            }
        }
        let mut col = Column::from_areas(folded, vertical);
        col.changed = true;
        col
    }

    /// Refreshes `rect` after in-place area edits.
    pub fn refresh_rect(&mut self) {
        if self.areas.is_empty() {
            return;
        }
        let mut rect = self.areas[0].rect;
        for a in &self.areas[1..] {
            rect = rect.union(&a.rect);
        }
        self.rect = rect;
    }
}

/// Arena of columns for one orientation. Removal leaves a tombstone so
/// outstanding `ColumnId`s stay valid until [`ColumnSlab::compact`].
#[derive(Clone, Debug, Default)]
pub struct ColumnSlab {
    slots: Vec<Option<Column>>,
}

impl ColumnSlab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a column, stamping its id into every member area's `owner`.
    pub fn insert(&mut self, mut column: Column) -> ColumnId {
        let id = self.slots.len();
        for area in &mut column.areas {
            area.owner = Some(id);
        }
        self.slots.push(Some(column));
        id
    }

    pub fn get(&self, id: ColumnId) -> Option<&Column> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.slots.get_mut(id).and_then(|s| s.as_mut())
    }

    pub fn remove(&mut self, id: ColumnId) -> Option<Column> {
        self.slots.get_mut(id).and_then(|s| s.take())
    }

    pub fn live_ids(&self) -> Vec<ColumnId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColumnId, &Column)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|c| (i, c)))
    }

    /// Drops tombstones and rewrites every stored `ColumnId` (next, previous,
    /// furigana attachments, area owners) to the compacted indexes. Handles
    /// pointing at removed columns become `None`.
    pub fn compact(&mut self) {
        let mut remap: Vec<Option<ColumnId>> = vec![None; self.slots.len()];
        let mut next_id = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                remap[i] = Some(next_id);
                next_id += 1;
            }
        }
        let old = std::mem::take(&mut self.slots);
        for mut column in old.into_iter().flatten() {
            let id = self.slots.len();
            column.next = column.next.and_then(|n| remap[n]);
            column.previous = column.previous.and_then(|p| remap[p]);
            column.furigana_columns = column
                .furigana_columns
                .iter()
                .filter_map(|&f| remap[f])
                .collect();
            for area in &mut column.areas {
                area.owner = Some(id);
            }
            self.slots.push(Some(column));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(x: i32, y: i32, w: i32, h: i32) -> Area {
        Area::new(Rect::new(x, y, w, h), (w * h) as u32 / 2, 0)
    }

    #[test]
    fn merge_sorts_by_reading_order_and_folds_overlaps() {
        let a = Column::from_area(area(0, 20, 10, 10), true);
        let b = Column::from_areas(vec![area(0, 0, 10, 10), area(0, 8, 10, 6)], true);
        let m = a.merge(&b);
        // the two overlapping top areas fold into one
        assert_eq!(m.areas.len(), 2);
        assert_eq!(m.rect, Rect::new(0, 0, 10, 30));
        assert!(m.areas[0].midpoint().y < m.areas[1].midpoint().y);
    }

    #[test]
    fn slab_compact_remaps_handles() {
        let mut slab = ColumnSlab::new();
        let a = slab.insert(Column::from_area(area(0, 0, 5, 5), true));
        let b = slab.insert(Column::from_area(area(0, 10, 5, 5), true));
        let c = slab.insert(Column::from_area(area(0, 20, 5, 5), true));
        slab.get_mut(b).unwrap().next = Some(c);
        slab.get_mut(c).unwrap().previous = Some(b);
        slab.get_mut(b).unwrap().furigana_columns.push(a);
        slab.remove(a);
        slab.compact();
        assert_eq!(slab.len(), 2);
        let first = slab.get(0).unwrap();
        assert_eq!(first.next, Some(1));
        assert!(first.furigana_columns.is_empty());
        assert_eq!(slab.get(1).unwrap().previous, Some(0));
        assert_eq!(first.areas[0].owner, Some(0));
    }

    #[test]
    fn intensity_is_pixel_weighted() {
        let mut a1 = area(0, 0, 10, 10);
        a1.pixels = 90;
        a1.min_intensity = 0;
        let mut a2 = area(0, 10, 10, 10);
        a2.pixels = 10;
        a2.min_intensity = 100;
        let col = Column::from_areas(vec![a1, a2], true);
        assert!((col.avg_intensity() - 10.0).abs() < 1e-3);
        assert_eq!(col.min_intensity(), 0);
    }
}
