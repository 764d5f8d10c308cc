//! Synthetic page builders shared by the integration tests.

use column_detector::image::RgbImage;
use column_detector::types::Rect;

/// Blank white page.
pub fn blank_page(width: usize, height: usize) -> RgbImage {
    RgbImage::filled(width, height, [255, 255, 255])
}

pub fn fill(page: &mut RgbImage, rect: Rect, rgb: [u8; 3]) {
    for y in rect.y..=rect.max_y() {
        for x in rect.x..=rect.max_x() {
            page.set(x as usize, y as usize, rgb);
        }
    }
}

/// Solid square block of ink, a stand-in for one character.
pub fn draw_glyph(page: &mut RgbImage, rect: Rect) {
    fill(page, rect, [0, 0, 0]);
}

/// Evenly spaced square glyphs along one axis; returns their rects.
pub fn draw_glyph_run(
    page: &mut RgbImage,
    x: i32,
    y: i32,
    size: i32,
    gap: i32,
    count: i32,
    vertical: bool,
) -> Vec<Rect> {
    let mut rects = Vec::new();
    for i in 0..count {
        let offset = i * (size + gap);
        let rect = if vertical {
            Rect::new(x, y + offset, size, size)
        } else {
            Rect::new(x + offset, y, size, size)
        };
        draw_glyph(page, rect);
        rects.push(rect);
    }
    rects
}

/// Rectangular outline a few pixels thick, the shape of a speech bubble.
pub fn draw_ring(page: &mut RgbImage, rect: Rect, thickness: i32) {
    for t in 0..thickness {
        for x in rect.x..=rect.max_x() {
            page.set(x as usize, (rect.y + t) as usize, [0, 0, 0]);
            page.set(x as usize, (rect.max_y() - t) as usize, [0, 0, 0]);
        }
        for y in rect.y..=rect.max_y() {
            page.set((rect.x + t) as usize, y as usize, [0, 0, 0]);
            page.set((rect.max_x() - t) as usize, y as usize, [0, 0, 0]);
        }
    }
}

/// Dark panel with white glyphs punched out of it.
pub fn draw_inverted_panel(page: &mut RgbImage, panel: Rect, glyphs: &[Rect]) {
    fill(page, panel, [0, 0, 0]);
    for glyph in glyphs {
        fill(page, *glyph, [255, 255, 255]);
    }
}
