//! Boolean pixel matrices backing the detection pipeline.
//!
//! Three instances live in the detection context: the binary text-candidate
//! matrix, the background matrix (blob pixels not claimed by any accepted
//! area) and the border matrix (seams drawn around color-inverted regions).
//! Reads outside the image always return `false` so probe rectangles may
//! extend past the bounds without special casing.

use crate::types::Rect;

#[derive(Clone, Debug)]
pub struct BitMatrix {
    w: usize,
    h: usize,
    bits: Vec<bool>,
}

impl BitMatrix {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            bits: vec![false; w * h],
        }
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.w || y as usize >= self.h {
            return false;
        }
        self.bits[y as usize * self.w + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if x < 0 || y < 0 || x as usize >= self.w || y as usize >= self.h {
            return;
        }
        self.bits[y as usize * self.w + x as usize] = value;
    }

    /// Flips every bit in place.
    pub fn invert_all(&mut self) {
        for b in &mut self.bits {
            *b = !*b;
        }
    }

    /// Number of set pixels along a horizontal line (inclusive ends).
    pub fn count_row(&self, min_x: i32, max_x: i32, y: i32) -> u32 {
        let mut count = 0;
        for x in min_x..=max_x {
            if self.get(x, y) {
                count += 1;
            }
        }
        count
    }

    /// Number of set pixels along a vertical line (inclusive ends).
    pub fn count_col(&self, x: i32, min_y: i32, max_y: i32) -> u32 {
        let mut count = 0;
        for y in min_y..=max_y {
            if self.get(x, y) {
                count += 1;
            }
        }
        count
    }

    /// Number of set pixels inside `rect`. With `interior == false` only the
    /// one-pixel border ring of the rectangle is scanned, which is the cheap
    /// first check used by divider tests.
    pub fn count_rect(&self, rect: &Rect, interior: bool) -> u32 {
        let mut count = 0;
        for y in rect.y..=rect.max_y() {
            for x in rect.x..=rect.max_x() {
                let on_edge =
                    y == rect.y || y == rect.max_y() || x == rect.x || x == rect.max_x();
                if (interior || on_edge) && self.get(x, y) {
                    count += 1;
                }
            }
        }
        count
    }

    /// True if at least one pixel inside `rect` is set.
    pub fn contains_any(&self, rect: &Rect) -> bool {
        for y in rect.y..=rect.max_y() {
            for x in rect.x..=rect.max_x() {
                if self.get(x, y) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_reads_are_false() {
        let mut m = BitMatrix::new(4, 4);
        m.set(0, 0, true);
        m.set(-1, 0, true); // ignored
        assert!(m.get(0, 0));
        assert!(!m.get(-1, 0));
        assert!(!m.get(4, 0));
        assert!(!m.get(0, 4));
    }

    #[test]
    fn border_count_skips_interior() {
        let mut m = BitMatrix::new(5, 5);
        m.set(2, 2, true); // interior
        m.set(0, 2, true); // on border ring of full rect
        let rect = Rect::new(0, 0, 5, 5);
        assert_eq!(m.count_rect(&rect, false), 1);
        assert_eq!(m.count_rect(&rect, true), 2);
    }

    #[test]
    fn line_counts() {
        let mut m = BitMatrix::new(8, 8);
        for x in 1..6 {
            m.set(x, 3, true);
        }
        assert_eq!(m.count_row(0, 7, 3), 5);
        assert_eq!(m.count_col(2, 0, 7), 1);
    }
}
