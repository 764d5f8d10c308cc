//! Owned image buffers used at the pipeline boundary.

pub mod io;

pub use io::{load_rgb_image, save_rgb_image, write_json_file};

/// Owned 8-bit RGB buffer, tightly packed rows.
#[derive(Clone, Debug)]
pub struct RgbImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbImage {
    /// Construct from raw RGB triples. Returns `None` on a size mismatch.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        (data.len() == width * height * 3).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Solid-color image, useful for synthetic tests and overlays.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Per-pixel minimum of the three channels. Text strokes keep their
    /// darkest component even on tinted backgrounds, so the minimum channel
    /// is what the binarizer and intensity scoring consume.
    pub fn min_channel_plane(&self) -> Vec<u8> {
        let mut plane = Vec::with_capacity(self.width * self.height);
        for px in self.data.chunks_exact(3) {
            plane.push(px[0].min(px[1]).min(px[2]));
        }
        plane
    }
}
