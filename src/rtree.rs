//! Arena-backed spatial index over `(id, rect)` pairs.
//!
//! Nodes live in one `Vec` and reference children by index. A node splits
//! into four quadrant children around the average midpoint of its entries;
//! entries that straddle a quadrant boundary stay in the parent, which acts
//! as the overflow bucket. If any quadrant would immediately overflow, the
//! split is abandoned and the node stays a plain list for good. Removal
//! never rebalances. Indexes are rebuilt from scratch at every phase, so
//! neither is a problem in practice.

use crate::error::DetectError;
use crate::types::Rect;

const NODE_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub id: usize,
    pub rect: Rect,
}

#[derive(Clone, Debug)]
struct Node {
    coverage: Rect,
    entries: Vec<Entry>,
    children: Vec<usize>,
    unsplittable: bool,
}

impl Node {
    fn new(coverage: Rect) -> Self {
        Self {
            coverage,
            entries: Vec::new(),
            children: Vec::new(),
            unsplittable: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RTree {
    nodes: Vec<Node>,
}

impl RTree {
    /// Index covering `bounds`. Every inserted rectangle must fit inside.
    pub fn new(bounds: Rect) -> Self {
        Self {
            nodes: vec![Node::new(bounds)],
        }
    }

    pub fn insert(&mut self, id: usize, rect: Rect) -> Result<(), DetectError> {
        if !self.nodes[0].coverage.contains(&rect) {
            return Err(DetectError::IndexOutOfBounds {
                rect,
                bounds: self.nodes[0].coverage,
            });
        }
        self.insert_at(0, Entry { id, rect });
        Ok(())
    }

    fn insert_at(&mut self, node: usize, entry: Entry) {
        // descend into the first child that fully contains the rectangle;
        // straddling entries stay at this level
        let mut target = None;
        for &child in &self.nodes[node].children {
            if self.nodes[child].coverage.contains(&entry.rect) {
                target = Some(child);
                break;
            }
        }
        if let Some(child) = target {
            self.insert_at(child, entry);
            return;
        }
        self.nodes[node].entries.push(entry);
        if self.nodes[node].entries.len() > NODE_CAPACITY
            && self.nodes[node].children.is_empty()
            && !self.nodes[node].unsplittable
        {
            self.split(node);
        }
    }

    fn split(&mut self, node: usize) {
        let coverage = self.nodes[node].coverage;
        let n = self.nodes[node].entries.len() as i64;
        let sum_x: i64 = self.nodes[node]
            .entries
            .iter()
            .map(|e| e.rect.midpoint().x as i64)
            .sum();
        let sum_y: i64 = self.nodes[node]
            .entries
            .iter()
            .map(|e| e.rect.midpoint().y as i64)
            .sum();
        let mid_x = (sum_x / n) as i32;
        let mid_y = (sum_y / n) as i32;
        let quadrants = Self::quadrants(&coverage, mid_x, mid_y);
        let Some(quadrants) = quadrants else {
            self.nodes[node].unsplittable = true;
            return;
        };

        let mut buckets: [Vec<Entry>; 4] = Default::default();
        let mut overflow = Vec::new();
        for entry in self.nodes[node].entries.drain(..) {
            match quadrants.iter().position(|q| q.contains(&entry.rect)) {
                Some(i) => buckets[i].push(entry),
                None => overflow.push(entry),
            }
        }
        if buckets.iter().any(|b| b.len() > NODE_CAPACITY) {
            // splitting would only push the overflow one level down
            let mut entries = overflow;
            for bucket in &mut buckets {
                entries.append(bucket);
            }
            self.nodes[node].entries = entries;
            self.nodes[node].unsplittable = true;
            return;
        }

        for (quadrant, bucket) in quadrants.into_iter().zip(buckets) {
            let child = self.nodes.len();
            let mut child_node = Node::new(quadrant);
            child_node.entries = bucket;
            self.nodes.push(child_node);
            self.nodes[node].children.push(child);
        }
        self.nodes[node].entries = overflow;
    }

    fn quadrants(coverage: &Rect, mid_x: i32, mid_y: i32) -> Option<[Rect; 4]> {
        let left_w = mid_x - coverage.x;
        let top_h = mid_y - coverage.y;
        let right_w = coverage.w - left_w;
        let bottom_h = coverage.h - top_h;
        if left_w <= 0 || top_h <= 0 || right_w <= 0 || bottom_h <= 0 {
            return None;
        }
        Some([
            Rect::new(coverage.x, coverage.y, left_w, top_h),
            Rect::new(mid_x, coverage.y, right_w, top_h),
            Rect::new(coverage.x, mid_y, left_w, bottom_h),
            Rect::new(mid_x, mid_y, right_w, bottom_h),
        ])
    }

    /// Removes the entry with matching id and rectangle. Children are left
    /// in place even when they drain empty.
    pub fn remove(&mut self, id: usize, rect: Rect) {
        self.remove_at(0, id, &rect);
    }

    fn remove_at(&mut self, node: usize, id: usize, rect: &Rect) -> bool {
        if !self.nodes[node].coverage.intersects(rect) {
            return false;
        }
        if let Some(pos) = self.nodes[node]
            .entries
            .iter()
            .position(|e| e.id == id && e.rect == *rect)
        {
            self.nodes[node].entries.swap_remove(pos);
            return true;
        }
        let children = self.nodes[node].children.clone();
        for child in children {
            if self.remove_at(child, id, rect) {
                return true;
            }
        }
        false
    }

    /// Ids of all entries intersecting `rect`. The probe may extend past the
    /// index bounds.
    pub fn query(&self, rect: &Rect) -> Vec<usize> {
        let mut out = Vec::new();
        self.query_at(0, rect, usize::MAX, &mut out);
        out
    }

    /// Like [`RTree::query`] but skipping one id, typically the prober
    /// itself.
    pub fn query_excluding(&self, rect: &Rect, exclude: usize) -> Vec<usize> {
        let mut out = Vec::new();
        self.query_at(0, rect, exclude, &mut out);
        out
    }

    fn query_at(&self, node: usize, rect: &Rect, exclude: usize, out: &mut Vec<usize>) {
        if !self.nodes[node].coverage.intersects(rect) {
            return;
        }
        for entry in &self.nodes[node].entries {
            if entry.id != exclude && entry.rect.intersects(rect) {
                out.push(entry.id);
            }
        }
        for &child in &self.nodes[node].children {
            self.query_at(child, rect, exclude, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_query_remove() {
        let mut tree = RTree::new(Rect::new(0, 0, 100, 100));
        tree.insert(1, Rect::new(10, 10, 5, 5)).unwrap();
        tree.insert(2, Rect::new(50, 50, 5, 5)).unwrap();
        let hits = tree.query(&Rect::new(0, 0, 20, 20));
        assert_eq!(hits, vec![1]);
        tree.remove(1, Rect::new(10, 10, 5, 5));
        assert!(tree.query(&Rect::new(0, 0, 20, 20)).is_empty());
        assert_eq!(tree.query(&Rect::new(0, 0, 100, 100)), vec![2]);
    }

    #[test]
    fn out_of_bounds_insert_fails() {
        let mut tree = RTree::new(Rect::new(0, 0, 50, 50));
        let err = tree.insert(1, Rect::new(45, 45, 10, 10)).unwrap_err();
        assert!(matches!(err, DetectError::IndexOutOfBounds { .. }));
    }

    #[test]
    fn probe_may_extend_past_bounds() {
        let mut tree = RTree::new(Rect::new(0, 0, 50, 50));
        tree.insert(7, Rect::new(40, 40, 9, 9)).unwrap();
        let hits = tree.query(&Rect::new(45, 45, 100, 100));
        assert_eq!(hits, vec![7]);
    }

    #[test]
    fn splits_and_still_finds_everything() {
        let mut tree = RTree::new(Rect::new(0, 0, 200, 200));
        for i in 0..64 {
            let x = (i % 8) * 24;
            let y = (i / 8) * 24;
            tree.insert(i as usize, Rect::new(x, y, 4, 4)).unwrap();
        }
        let all = tree.query(&Rect::new(0, 0, 200, 200));
        assert_eq!(all.len(), 64);
        let corner = tree.query(&Rect::new(0, 0, 30, 30));
        assert_eq!(corner.len(), 4);
    }

    #[test]
    fn degenerate_pile_abandons_split() {
        let mut tree = RTree::new(Rect::new(0, 0, 100, 100));
        // identical pixels all land in one quadrant, so splitting gains
        // nothing and the node stays a plain list
        for i in 0..40 {
            tree.insert(i, Rect::new(10, 10, 1, 1)).unwrap();
        }
        assert_eq!(tree.query(&Rect::new(10, 10, 1, 1)).len(), 40);
        assert_eq!(tree.nodes.len(), 1);
        assert!(tree.nodes[0].unsplittable);
    }
}
