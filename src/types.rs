use serde::{Deserialize, Serialize};

/// Integer point in image coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned integer rectangle. `w`/`h` are never negative; an empty
/// rectangle has zero width or height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Smallest rectangle containing both corner points (inclusive).
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self {
            x,
            y,
            w: (a.x - b.x).abs() + 1,
            h: (a.y - b.y).abs() + 1,
        }
    }

    /// Surface area.
    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    /// Rightmost contained column.
    pub fn max_x(&self) -> i32 {
        self.x + self.w - 1
    }

    /// Bottommost contained row.
    pub fn max_y(&self) -> i32 {
        self.y + self.h - 1
    }

    pub fn midpoint(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn min_dim(&self) -> i32 {
        self.w.min(self.h)
    }

    pub fn max_dim(&self) -> i32 {
        self.w.max(self.h)
    }

    /// min(w/h, h/w); 1.0 for a square, near 0.0 for a thin line.
    pub fn squareness(&self) -> f32 {
        if self.w <= 0 || self.h <= 0 {
            return 0.0;
        }
        let r1 = self.w as f32 / self.h as f32;
        let r2 = self.h as f32 / self.w as f32;
        r1.min(r2)
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.max_x() && p.y >= self.y && p.y <= self.max_y()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.max_x()
            && other.x <= self.max_x()
            && self.y <= other.max_y()
            && other.y <= self.max_y()
    }

    /// Overlapping region, or `None` when the rectangles are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        Some(Rect::new(x, y, max_x - x + 1, max_y - y + 1))
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Rect::new(x, y, max_x - x + 1, max_y - y + 1)
    }
}

/// Requested reading direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Detect both orientations and keep the better-scoring decomposition
    /// per image zone.
    #[default]
    Auto,
    /// Columns read top-to-bottom, ordered right-to-left.
    Vertical,
    /// Rows read left-to-right, ordered top-to-bottom.
    Horizontal,
}

/// Expected text/background polarity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorPolarity {
    /// Detect light-on-dark regions block by block and invert them.
    #[default]
    Auto,
    DarkOnLight,
    LightOnDark,
}

/// Final column exposed to callers. Indices in `next`/`previous` refer to
/// the report's own column list.
#[derive(Clone, Debug, Serialize)]
pub struct DetectedColumn {
    pub rect: Rect,
    pub vertical: bool,
    pub furigana: bool,
    pub areas: Vec<DetectedArea>,
    pub next: Option<usize>,
    pub previous: Option<usize>,
}

/// Member rectangle of a detected column, in reading order.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct DetectedArea {
    pub rect: Rect,
    pub punctuation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_intersection_are_inclusive() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.union(&b), Rect::new(0, 0, 15, 15));
        assert_eq!(a.intersection(&b), Some(Rect::new(5, 5, 5, 5)));
        assert!(a.intersects(&Rect::new(9, 9, 1, 1)));
        assert!(!a.intersects(&Rect::new(10, 0, 1, 1)));
    }

    #[test]
    fn squareness_ranges() {
        assert_eq!(Rect::new(0, 0, 8, 8).squareness(), 1.0);
        assert!(Rect::new(0, 0, 2, 20).squareness() < 0.11);
    }

    #[test]
    fn from_corners_spans_both_points() {
        let r = Rect::from_corners(Point::new(10, 2), Point::new(3, 8));
        assert_eq!(r, Rect::new(3, 2, 8, 7));
        assert!(r.contains_point(Point::new(10, 2)));
        assert!(r.contains_point(Point::new(3, 8)));
    }
}
