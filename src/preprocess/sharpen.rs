//! Unsharp mask over the intensity plane.

use serde::Deserialize;

use crate::context::DetectionContext;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SharpenParams {
    /// Strength of the sharpening term.
    pub amount: f32,
    /// Gaussian blur radius in pixels.
    pub radius: usize,
    /// Minimum difference from the blurred plane for a pixel to be touched.
    /// Keeps flat regions free of amplified noise.
    pub threshold: u8,
}

impl Default for SharpenParams {
    fn default() -> Self {
        Self {
            amount: 4.0,
            radius: 2,
            threshold: 2,
        }
    }
}

/// Sharpens `ctx.intensity` into `ctx.sharpened` with an unsharp mask.
/// The raw intensity plane stays untouched for later scoring reads.
pub fn sharpen(ctx: &mut DetectionContext, params: &SharpenParams) {
    let width = ctx.width() as usize;
    let height = ctx.height() as usize;
    let blurred = gaussian_blur(&ctx.intensity, width, height, params.radius);
    let threshold = params.threshold as f32;
    for (i, out) in ctx.sharpened.iter_mut().enumerate() {
        let orig = ctx.intensity[i] as f32;
        let diff = orig - blurred[i];
        *out = if diff.abs() >= threshold {
            (orig + params.amount * diff).clamp(0.0, 255.0) as u8
        } else {
            ctx.intensity[i]
        };
    }
}

/// Separable gaussian blur with edge clamping.
fn gaussian_blur(plane: &[u8], width: usize, height: usize, radius: usize) -> Vec<f32> {
    if radius == 0 {
        return plane.iter().map(|&v| v as f32).collect();
    }
    let kernel = gaussian_kernel(radius);
    let r = radius as isize;

    let mut horizontal = vec![0.0f32; plane.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - r).clamp(0, width as isize - 1) as usize;
                sum += plane[y * width + sx] as f32 * w;
            }
            horizontal[y * width + x] = sum;
        }
    }

    let mut blurred = vec![0.0f32; plane.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - r).clamp(0, height as isize - 1) as usize;
                sum += horizontal[sy * width + x] * w;
            }
            blurred[y * width + x] = sum;
        }
    }
    blurred
}

fn gaussian_kernel(radius: usize) -> Vec<f32> {
    let sigma = (radius as f32 / 2.0).max(0.5);
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RgbImage;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(2);
        assert_eq!(k.len(), 5);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[0] - k[4]).abs() < 1e-6);
        assert!(k[2] > k[1]);
    }

    #[test]
    fn sharpening_increases_edge_contrast() {
        let mut img = RgbImage::filled(20, 20, [255, 255, 255]);
        for y in 0..20 {
            for x in 0..10 {
                img.set(x, y, [80, 80, 80]);
            }
        }
        let mut ctx = DetectionContext::new(&img).unwrap();
        sharpen(&mut ctx, &SharpenParams::default());
        // pixel just inside the dark side gets darker, just outside lighter
        let dark = ctx.sharpened[10 * 20 + 9];
        let light = ctx.sharpened[10 * 20 + 10];
        assert!(dark < 80);
        assert_eq!(light, 255);
    }
}
