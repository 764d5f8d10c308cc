//! Thresholding of the sharpened plane into the binary matrix.

use serde::Deserialize;

use crate::context::DetectionContext;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BinarizeParams {
    /// Pixels darker than this are text candidates.
    pub black_threshold: u8,
    /// Fixed-ink-level mode: only pixels within `fixed_range` of this level
    /// qualify. Used for screen captures with a known text color. When set,
    /// sharpening and automatic inversion are skipped.
    pub fixed_level: Option<u8>,
    /// Half-width of the fixed-level window.
    pub fixed_range: u8,
}

impl Default for BinarizeParams {
    fn default() -> Self {
        Self {
            black_threshold: 140,
            fixed_level: None,
            fixed_range: 50,
        }
    }
}

/// Fills `ctx.binary` from the sharpened intensity plane.
pub fn binarize(ctx: &mut DetectionContext, params: &BinarizeParams) {
    let width = ctx.width();
    let height = ctx.height();
    for y in 0..height {
        for x in 0..width {
            let v = ctx.sharpened[(y * width + x) as usize];
            let black = match params.fixed_level {
                Some(level) => (v as i32 - level as i32).abs() <= params.fixed_range as i32,
                None => v < params.black_threshold,
            };
            ctx.binary.set(x, y, black);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RgbImage;

    #[test]
    fn threshold_mode_marks_dark_pixels() {
        let mut img = RgbImage::filled(4, 1, [255, 255, 255]);
        img.set(0, 0, [0, 0, 0]);
        img.set(1, 0, [139, 139, 139]);
        img.set(2, 0, [140, 140, 140]);
        let mut ctx = DetectionContext::new(&img).unwrap();
        binarize(&mut ctx, &BinarizeParams::default());
        assert!(ctx.binary.get(0, 0));
        assert!(ctx.binary.get(1, 0));
        assert!(!ctx.binary.get(2, 0));
        assert!(!ctx.binary.get(3, 0));
    }

    #[test]
    fn fixed_level_mode_uses_a_window() {
        let mut img = RgbImage::filled(3, 1, [255, 255, 255]);
        img.set(0, 0, [10, 10, 10]); // far below the window
        img.set(1, 0, [160, 160, 160]);
        let mut ctx = DetectionContext::new(&img).unwrap();
        let params = BinarizeParams {
            fixed_level: Some(180),
            ..Default::default()
        };
        binarize(&mut ctx, &params);
        assert!(!ctx.binary.get(0, 0));
        assert!(ctx.binary.get(1, 0));
        assert!(!ctx.binary.get(2, 0));
    }
}
