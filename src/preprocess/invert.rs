//! Polarity handling: light-on-dark regions are detected block by block and
//! flipped so the rest of the pipeline only ever sees dark text.

use std::collections::VecDeque;

use log::debug;
use serde::Deserialize;

use crate::context::{BlockGrid, DetectionContext, Inversion};
use crate::types::{ColorPolarity, Rect};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InvertParams {
    /// Block width and height in pixels.
    pub block_size: i32,
    /// Black-pixel ratio required to seed an inverted region. Each already
    /// inverted neighbor lowers the bar by `neighbor_discount`.
    pub block_ratio_threshold: f32,
    pub neighbor_discount: f32,
    /// A region is kept only with at least this many near-solid blocks...
    pub min_black_blocks: u32,
    /// ...and this many marked 2x2 block quads. Guards against inverting the
    /// insides of large thick glyphs.
    pub min_quad_blocks: u32,
    /// Interior gaps wider and taller than this many blocks stay unfilled.
    pub max_gap_blocks: i32,
    /// Gaps at least this many blocks in each dimension are tested for the
    /// speech-bubble shape before filling.
    pub bubble_min_blocks: i32,
    /// Ellipse scale and maximum interior pixel ratio for the bubble test.
    pub bubble_ellipse_scale: f32,
    pub bubble_max_ratio: f32,
}

impl Default for InvertParams {
    fn default() -> Self {
        Self {
            block_size: 15,
            block_ratio_threshold: 0.95,
            neighbor_discount: 0.25,
            min_black_blocks: 4,
            min_quad_blocks: 4,
            max_gap_blocks: 8,
            bubble_min_blocks: 3,
            bubble_ellipse_scale: 0.9,
            bubble_max_ratio: 0.1,
        }
    }
}

/// Applies the requested polarity to `ctx.binary`, recording what was
/// flipped in `ctx.inversion` and sealing flipped regions with one-pixel
/// border seams.
pub fn apply_polarity(ctx: &mut DetectionContext, polarity: ColorPolarity, params: &InvertParams) {
    match polarity {
        ColorPolarity::DarkOnLight => {}
        ColorPolarity::LightOnDark => {
            ctx.binary.invert_all();
            ctx.inversion = Inversion::Whole;
        }
        ColorPolarity::Auto => detect_inverted_regions(ctx, params),
    }
}

fn detect_inverted_regions(ctx: &mut DetectionContext, params: &InvertParams) {
    let bs = params.block_size;
    let cols = (ctx.width() + bs - 1) / bs;
    let rows = (ctx.height() + bs - 1) / bs;
    let mut detector = RegionDetector {
        ctx,
        params,
        cols,
        rows,
        visited: vec![false; (cols * rows) as usize],
        grid: BlockGrid::new(bs, cols, rows),
        neighbors_inverted: vec![0u32; (cols * rows) as usize],
    };

    for bx in 0..cols {
        for by in 0..rows {
            detector.check_block(bx, by);
        }
    }

    let grid = detector.grid;
    let inverted_blocks = grid.inverted.iter().filter(|&&b| b).count();
    if inverted_blocks > 0 {
        debug!("inverting {inverted_blocks} blocks of {cols}x{rows}");
        for bx in 0..cols {
            for by in 0..rows {
                if grid.get(bx, by) {
                    invert_block(ctx, &grid, bx, by);
                }
            }
        }
        ctx.inversion = Inversion::Blocks(grid);
    }
}

struct RegionDetector<'a> {
    ctx: &'a DetectionContext,
    params: &'a InvertParams,
    cols: i32,
    rows: i32,
    visited: Vec<bool>,
    grid: BlockGrid,
    neighbors_inverted: Vec<u32>,
}

impl RegionDetector<'_> {
    fn idx(&self, bx: i32, by: i32) -> usize {
        (by * self.cols + bx) as usize
    }

    /// Black-pixel ratio of one block, clipped to the image.
    fn block_ratio(&self, bx: i32, by: i32) -> f32 {
        let bs = self.params.block_size;
        let mut black = 0u32;
        let mut all = 0u32;
        for x in bx * bs..((bx + 1) * bs).min(self.ctx.width()) {
            for y in by * bs..((by + 1) * bs).min(self.ctx.height()) {
                if self.ctx.binary.get(x, y) {
                    black += 1;
                }
                all += 1;
            }
        }
        if all == 0 {
            return 0.0;
        }
        black as f32 / all as f32
    }

    /// Seeds a flood fill at block (bx, by) and marks the connected region
    /// of near-solid blocks for inversion. Regions without enough mass are
    /// rolled back.
    fn check_block(&mut self, bx: i32, by: i32) {
        let mut marked: Vec<(i32, i32)> = Vec::new();
        let mut black_blocks = 0u32;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (bx, bx, by, by);

        let mut todo: VecDeque<(i32, i32)> = VecDeque::new();
        todo.push_back((bx, by));
        while let Some((x, y)) = todo.pop_front() {
            let i = self.idx(x, y);
            if self.visited[i] {
                continue;
            }
            self.visited[i] = true;
            let ratio = self.block_ratio(x, y);
            let threshold = self.params.block_ratio_threshold
                - self.neighbors_inverted[i] as f32 * self.params.neighbor_discount;
            if ratio >= threshold {
                self.mark_block(x, y, &mut todo);
                marked.push((x, y));
            }
            if ratio >= self.params.block_ratio_threshold {
                black_blocks += 1;
            }
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        // 2x2 quads of marked blocks; overlapping quads count separately
        let mut quad_blocks = 0u32;
        for &(x, y) in &marked {
            if self.grid.get(x + 1, y) && self.grid.get(x, y + 1) && self.grid.get(x + 1, y + 1) {
                quad_blocks += 1;
            }
        }

        // a sparse region is more likely the inside of a thick glyph than a
        // dark background
        if quad_blocks < self.params.min_quad_blocks || black_blocks < self.params.min_black_blocks
        {
            for (x, y) in marked {
                self.grid.set(x, y, false);
            }
            return;
        }

        let region = Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
        self.fill_gaps(&region);
    }

    fn mark_block(&mut self, x: i32, y: i32, todo: &mut VecDeque<(i32, i32)>) {
        self.grid.set(x, y, true);
        if x > 0 {
            let i = self.idx(x - 1, y);
            self.neighbors_inverted[i] += 1;
            todo.push_back((x - 1, y));
        }
        if x < self.cols - 1 {
            let i = self.idx(x + 1, y);
            self.neighbors_inverted[i] += 1;
            todo.push_back((x + 1, y));
        }
        if y > 0 {
            let i = self.idx(x, y - 1);
            self.neighbors_inverted[i] += 1;
            todo.push_back((x, y - 1));
        }
        if y < self.rows - 1 {
            let i = self.idx(x, y + 1);
            self.neighbors_inverted[i] += 1;
            todo.push_back((x, y + 1));
        }
    }

    /// Marks enclosed non-inverted gaps inside `region` unless they are too
    /// large or look like a speech bubble on the dark background.
    fn fill_gaps(&mut self, region: &Rect) {
        // one block smaller in every direction; gaps reaching this ring are
        // open to the outside and stay
        let internal = Rect::new(region.x + 1, region.y + 1, region.w - 2, region.h - 2);
        if internal.w <= 0 || internal.h <= 0 {
            return;
        }
        let mut visited = vec![false; (self.cols * self.rows) as usize];

        for gx in internal.x..=internal.max_x() {
            for gy in internal.y..=internal.max_y() {
                if self.grid.get(gx, gy) || visited[self.idx(gx, gy)] {
                    continue;
                }
                let (mut min_x, mut max_x, mut min_y, mut max_y) = (gx, gx, gy, gy);
                let mut marked: Vec<(i32, i32)> = Vec::new();
                let mut touches_border = false;
                let mut todo: VecDeque<(i32, i32)> = VecDeque::new();
                todo.push_back((gx, gy));
                while let Some((x, y)) = todo.pop_front() {
                    if x < 0 || y < 0 || x >= self.cols || y >= self.rows {
                        continue;
                    }
                    if self.grid.get(x, y) || visited[self.idx(x, y)] {
                        continue;
                    }
                    if !internal.contains_point(crate::types::Point::new(x, y)) {
                        touches_border = true;
                        continue;
                    }
                    visited[self.idx(x, y)] = true;
                    marked.push((x, y));
                    todo.push_back((x, y - 1));
                    todo.push_back((x, y + 1));
                    todo.push_back((x - 1, y));
                    todo.push_back((x + 1, y));
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                    min_y = min_y.min(y);
                    max_y = max_y.max(y);
                }
                if touches_border {
                    continue;
                }

                let width = max_x - min_x + 1;
                let height = max_y - min_y + 1;
                if width > self.params.max_gap_blocks && height > self.params.max_gap_blocks {
                    continue;
                }
                if width >= self.params.bubble_min_blocks && height >= self.params.bubble_min_blocks
                {
                    let ratio = self.ellipse_pixel_ratio(min_x, max_x, min_y, max_y);
                    if ratio < self.params.bubble_max_ratio {
                        // nearly empty ellipse: a small speech bubble, leave it
                        continue;
                    }
                }
                for (x, y) in marked {
                    self.grid.set(x, y, true);
                }
            }
        }
    }

    /// Black-pixel ratio inside the scaled ellipse centered on the block
    /// span.
    fn ellipse_pixel_ratio(&self, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> f32 {
        let bs = self.params.block_size;
        let scale = self.params.bubble_ellipse_scale;
        let p_width = (max_x - min_x + 1) * bs;
        let p_height = (max_y - min_y + 1) * bs;
        let a2 = (p_width as f32 / 2.0 * scale).powi(2);
        let b2 = (p_height as f32 / 2.0 * scale).powi(2);
        let px_min = min_x * bs;
        let px_max = (max_x + 1) * bs - 1;
        let py_min = min_y * bs;
        let py_max = (max_y + 1) * bs - 1;
        let cx = px_min + p_width / 2;
        let cy = py_min + p_height / 2;
        let mut black = 0u32;
        let mut all = 0u32;
        for px in px_min..=px_max.min(self.ctx.width() - 1) {
            for py in py_min..=py_max.min(self.ctx.height() - 1) {
                let value = (px - cx).pow(2) as f32 / a2 + (py - cy).pow(2) as f32 / b2;
                if value > 1.0 {
                    continue;
                }
                if self.ctx.binary.get(px, py) {
                    black += 1;
                }
                all += 1;
            }
        }
        if all == 0 {
            return 0.0;
        }
        black as f32 / all as f32
    }
}

/// Flips pixels of one block and seals edges facing non-inverted blocks
/// with a border seam so components cannot leak across the boundary.
fn invert_block(ctx: &mut DetectionContext, grid: &BlockGrid, bx: i32, by: i32) {
    let bs = grid.block_size;
    let min_x = bx * bs;
    let max_x = (bx + 1) * bs - 1;
    let min_y = by * bs;
    let max_y = (by + 1) * bs - 1;

    for x in min_x..=max_x.min(ctx.width() - 1) {
        for y in min_y..=max_y.min(ctx.height() - 1) {
            let v = ctx.binary.get(x, y);
            ctx.binary.set(x, y, !v);
        }
    }

    let seal_top = by > 0 && !grid.get(bx, by - 1);
    let seal_bottom = by < grid.rows - 1 && !grid.get(bx, by + 1);
    let seal_left = bx > 0 && !grid.get(bx - 1, by);
    let seal_right = bx < grid.cols - 1 && !grid.get(bx + 1, by);

    if seal_top {
        seam_row(ctx, min_x, max_x, min_y);
    }
    if seal_bottom {
        seam_row(ctx, min_x, max_x, max_y);
    }
    if seal_left {
        seam_col(ctx, min_x, min_y, max_y);
    }
    if seal_right {
        seam_col(ctx, max_x, min_y, max_y);
    }
}

fn seam_row(ctx: &mut DetectionContext, min_x: i32, max_x: i32, y: i32) {
    for x in min_x..=max_x {
        ctx.binary.set(x, y, true);
        ctx.border.set(x, y, true);
    }
}

fn seam_col(ctx: &mut DetectionContext, x: i32, min_y: i32, max_y: i32) {
    for y in min_y..=max_y {
        ctx.binary.set(x, y, true);
        ctx.border.set(x, y, true);
    }
}
