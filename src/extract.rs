//! Connected-component extraction from the binary matrix.
//!
//! Every black pixel starts out as background; components that survive the
//! filters take their pixels out. Pixels of rejected components stay in the
//! background matrix where they later block column growth, except that
//! removal passes never put pixels back (tiny fragments often carry radical
//! strokes on low-resolution images).

use std::collections::VecDeque;

use log::debug;
use serde::Deserialize;

use crate::area::Area;
use crate::context::DetectionContext;
use crate::error::DetectError;
use crate::rtree::RTree;
use crate::types::Rect;
use crate::util::scale;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExtractParams {
    /// Components wider or taller than this are rejected outright.
    pub max_dimension: i32,
    /// Density floor for large components.
    pub sparse_min_size: i64,
    pub sparse_max_density: f32,
    /// Speech-bubble test: components at least this large in both dimensions
    /// with more than `bubble_outside_ratio` of their pixels outside the
    /// centered ellipse are bubble outlines, not characters.
    pub bubble_min_dim: i32,
    pub bubble_ellipse_scale: f32,
    pub bubble_outside_ratio: f32,
    /// Dither pass over single components: applies above this pixel count.
    pub dither_min_pixels: u32,
    pub dither_score_threshold: f32,
    /// Reference black level for intensity quality, normally the binarizer
    /// threshold.
    pub intensity_threshold: u8,
    /// Dither pass over windows: sliding probe size and overlap...
    pub window_size: i32,
    pub window_overlap: i32,
    /// ...and what counts as a dither speck inside one.
    pub window_min_count: usize,
    pub window_max_pixels: u32,
    pub window_min_squareness: f32,
    /// Components with fewer pixels than this are dropped last.
    pub min_pixels: u32,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            max_dimension: 120,
            sparse_min_size: 300,
            sparse_max_density: 0.09,
            bubble_min_dim: 80,
            bubble_ellipse_scale: 0.88,
            bubble_outside_ratio: 0.92,
            dither_min_pixels: 15,
            dither_score_threshold: 1.3,
            intensity_threshold: 140,
            window_size: 80,
            window_overlap: 8,
            window_min_count: 80,
            window_max_pixels: 6,
            window_min_squareness: 0.6,
            min_pixels: 3,
        }
    }
}

/// Fills `ctx.areas` and `ctx.background` from the binary matrix.
pub fn extract_areas(ctx: &mut DetectionContext, params: &ExtractParams) -> Result<(), DetectError> {
    find_components(ctx, params);
    let found = ctx.areas.len();
    remove_dither_components(ctx, params);
    remove_dither_windows(ctx, params)?;
    ctx.areas.retain(|a| a.pixels >= params.min_pixels);
    debug!("areas: {found} components, {} kept", ctx.areas.len());
    Ok(())
}

fn find_components(ctx: &mut DetectionContext, params: &ExtractParams) {
    let width = ctx.width();
    let height = ctx.height();
    let mut visited = vec![false; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            if ctx.binary.get(x, y) {
                ctx.background.set(x, y, true);
            } else {
                visited[(y * width + x) as usize] = true;
            }
        }
    }
    for y in 0..height {
        for x in 0..width {
            if !visited[(y * width + x) as usize] {
                flood_component(ctx, params, &mut visited, x, y);
            }
        }
    }
}

/// Floods one 8-connected component and appends it to `ctx.areas` if it
/// passes the shape filters.
fn flood_component(
    ctx: &mut DetectionContext,
    params: &ExtractParams,
    visited: &mut [bool],
    init_x: i32,
    init_y: i32,
) {
    let width = ctx.width();
    let height = ctx.height();
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (init_x, init_x, init_y, init_y);
    let mut touches_border = false;
    let mut pixels: Vec<(i32, i32)> = Vec::new();

    let mut todo: VecDeque<(i32, i32)> = VecDeque::new();
    todo.push_back((init_x, init_y));
    while let Some((x, y)) = todo.pop_front() {
        let idx = (y * width + x) as usize;
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        if !ctx.binary.get(x, y) {
            continue;
        }
        if x <= 0 || x >= width - 1 || y <= 0 || y >= height - 1 || ctx.border.get(x, y) {
            touches_border = true;
        }
        pixels.push((x, y));
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
        for ny in (y - 1).max(0)..=(y + 1).min(height - 1) {
            for nx in (x - 1).max(0)..=(x + 1).min(width - 1) {
                if !visited[(ny * width + nx) as usize] {
                    todo.push_back((nx, ny));
                }
            }
        }
    }

    if touches_border {
        return;
    }
    let rect = Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
    if rect.w > params.max_dimension || rect.h > params.max_dimension {
        return;
    }
    let density = pixels.len() as f32 / rect.area() as f32;
    if rect.area() > params.sparse_min_size && density < params.sparse_max_density {
        return;
    }
    if is_speech_bubble(ctx, params, &rect, pixels.len()) {
        return;
    }

    let mut min_intensity = 255u8;
    for &(x, y) in &pixels {
        min_intensity = min_intensity.min(ctx.intensity_at(x, y));
    }
    for &(x, y) in &pixels {
        ctx.background.set(x, y, false);
    }
    ctx.areas
        .push(Area::new(rect, pixels.len() as u32, min_intensity));
}

/// Bubble outlines put nearly all their pixels outside the centered ellipse.
/// Only applies to large components; big bubbles already fail the density
/// filter.
fn is_speech_bubble(
    ctx: &DetectionContext,
    params: &ExtractParams,
    rect: &Rect,
    pixels: usize,
) -> bool {
    if rect.w < params.bubble_min_dim || rect.h < params.bubble_min_dim {
        return false;
    }
    let size = params.bubble_ellipse_scale;
    let a2 = (rect.w as f32 / 2.0 * size).powi(2);
    let b2 = (rect.h as f32 / 2.0 * size).powi(2);
    let center = rect.midpoint();
    let mut outside = 0u32;
    for y in rect.y..=rect.max_y() {
        for x in rect.x..=rect.max_x() {
            let value =
                (x - center.x).pow(2) as f32 / a2 + (y - center.y).pow(2) as f32 / b2;
            if value <= 1.0 {
                continue;
            }
            if ctx.binary.get(x, y) {
                outside += 1;
            }
        }
    }
    outside as f32 / pixels as f32 > params.bubble_outside_ratio
}

/// Drops components dominated by isolated pixels, the signature of a dither
/// pattern. Lighter components get a stricter bar.
fn remove_dither_components(ctx: &mut DetectionContext, params: &ExtractParams) {
    let mut keep = vec![true; ctx.areas.len()];
    for (i, area) in ctx.areas.iter().enumerate() {
        if area.pixels <= params.dither_min_pixels {
            continue;
        }
        let mut isolated = 0u32;
        let mut single = 0u32;
        for x in area.x()..=area.max_x() {
            for y in area.y()..=area.max_y() {
                if !ctx.binary.get(x, y) {
                    continue;
                }
                let neighbors = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                    .iter()
                    .filter(|&&(nx, ny)| ctx.binary.get(nx, ny))
                    .count();
                match neighbors {
                    0 => isolated += 1,
                    1 => single += 1,
                    _ => {}
                }
            }
        }
        if isolated > area.pixels / 2 {
            keep[i] = false;
            continue;
        }
        let score = (isolated as f32 * 2.0 + single as f32) / area.pixels as f32;
        let quality = area.min_intensity as f32 / params.intensity_threshold as f32;
        let threshold = params.dither_score_threshold * scale(quality, 0.5, 0.7, 1.0, 0.6);
        if score >= threshold {
            keep[i] = false;
        }
    }
    let removed = keep.iter().filter(|&&k| !k).count();
    if removed > 0 {
        debug!("dither components removed: {removed}");
        let mut it = keep.iter();
        ctx.areas.retain(|_| *it.next().unwrap_or(&true));
    }
}

/// Drops swarms of tiny square specks packed into one probe window.
fn remove_dither_windows(
    ctx: &mut DetectionContext,
    params: &ExtractParams,
) -> Result<(), DetectError> {
    let mut index = RTree::new(ctx.image_rect());
    for (i, area) in ctx.areas.iter().enumerate() {
        index.insert(i, area.rect)?;
    }
    let mut keep = vec![true; ctx.areas.len()];
    let step = (params.window_size - params.window_overlap).max(1);
    let mut y = 0;
    while y < ctx.height() {
        let mut x = 0;
        while x < ctx.width() {
            let probe = Rect::new(x, y, params.window_size, params.window_size);
            let specks: Vec<usize> = index
                .query(&probe)
                .into_iter()
                .filter(|&i| {
                    let a = &ctx.areas[i];
                    a.pixels <= params.window_max_pixels
                        && a.squareness() > params.window_min_squareness
                })
                .collect();
            if specks.len() >= params.window_min_count {
                for i in specks {
                    keep[i] = false;
                }
            }
            x += step;
        }
        y += step;
    }
    let removed = keep.iter().filter(|&&k| !k).count();
    if removed > 0 {
        debug!("dither windows removed: {removed}");
        let mut it = keep.iter();
        ctx.areas.retain(|_| *it.next().unwrap_or(&true));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RgbImage;
    use crate::preprocess::binarize::{binarize, BinarizeParams};

    fn context_from(img: &RgbImage) -> DetectionContext {
        let mut ctx = DetectionContext::new(img).unwrap();
        binarize(&mut ctx, &BinarizeParams::default());
        ctx
    }

    fn fill(img: &mut RgbImage, rect: Rect, rgb: [u8; 3]) {
        for y in rect.y..=rect.max_y() {
            for x in rect.x..=rect.max_x() {
                img.set(x as usize, y as usize, rgb);
            }
        }
    }

    #[test]
    fn white_image_yields_no_areas() {
        let img = RgbImage::filled(50, 50, [255, 255, 255]);
        let mut ctx = context_from(&img);
        extract_areas(&mut ctx, &ExtractParams::default()).unwrap();
        assert!(ctx.areas.is_empty());
    }

    #[test]
    fn single_square_yields_exact_rect() {
        let mut img = RgbImage::filled(100, 100, [255, 255, 255]);
        fill(&mut img, Rect::new(40, 40, 20, 20), [0, 0, 0]);
        let mut ctx = context_from(&img);
        extract_areas(&mut ctx, &ExtractParams::default()).unwrap();
        assert_eq!(ctx.areas.len(), 1);
        assert_eq!(ctx.areas[0].rect, Rect::new(40, 40, 20, 20));
        assert_eq!(ctx.areas[0].pixels, 400);
        // claimed pixels left the background
        assert!(!ctx.background.get(45, 45));
    }

    #[test]
    fn edge_touching_component_is_background() {
        let mut img = RgbImage::filled(60, 60, [255, 255, 255]);
        fill(&mut img, Rect::new(0, 10, 15, 15), [0, 0, 0]);
        let mut ctx = context_from(&img);
        extract_areas(&mut ctx, &ExtractParams::default()).unwrap();
        assert!(ctx.areas.is_empty());
        assert!(ctx.background.get(5, 15));
    }

    #[test]
    fn bubble_ring_is_rejected() {
        // 90x90 ring, three pixels thick: dense enough to pass the sparse
        // filter, but nearly all pixels sit outside the centered ellipse
        let mut img = RgbImage::filled(120, 120, [255, 255, 255]);
        let ring = Rect::new(10, 10, 90, 90);
        for t in 0..3 {
            for x in ring.x..=ring.max_x() {
                img.set(x as usize, (ring.y + t) as usize, [0, 0, 0]);
                img.set(x as usize, (ring.max_y() - t) as usize, [0, 0, 0]);
            }
            for y in ring.y..=ring.max_y() {
                img.set((ring.x + t) as usize, y as usize, [0, 0, 0]);
                img.set((ring.max_x() - t) as usize, y as usize, [0, 0, 0]);
            }
        }
        let mut ctx = context_from(&img);
        extract_areas(&mut ctx, &ExtractParams::default()).unwrap();
        assert!(ctx.areas.is_empty());
    }

    #[test]
    fn tiny_fragments_are_dropped_but_keep_their_pixels_claimed() {
        let mut img = RgbImage::filled(50, 50, [255, 255, 255]);
        img.set(20, 20, [0, 0, 0]);
        img.set(21, 20, [0, 0, 0]);
        let mut ctx = context_from(&img);
        extract_areas(&mut ctx, &ExtractParams::default()).unwrap();
        assert!(ctx.areas.is_empty());
        assert!(!ctx.background.get(20, 20));
    }
}
