//! Per-image working state shared by all pipeline stages.

use crate::area::Area;
use crate::column::ColumnSlab;
use crate::error::DetectError;
use crate::image::RgbImage;
use crate::matrix::BitMatrix;
use crate::types::Rect;

/// Which parts of the image had their polarity flipped.
#[derive(Clone, Debug, Default)]
pub enum Inversion {
    /// Dark-on-light input, nothing flipped.
    #[default]
    None,
    /// Whole image flipped (forced light-on-dark).
    Whole,
    /// Block grid produced by automatic inverted-region detection.
    Blocks(BlockGrid),
}

/// Per-block inversion flags from automatic polarity detection.
#[derive(Clone, Debug)]
pub struct BlockGrid {
    pub block_size: i32,
    pub cols: i32,
    pub rows: i32,
    pub inverted: Vec<bool>,
}

impl BlockGrid {
    pub fn new(block_size: i32, cols: i32, rows: i32) -> Self {
        Self {
            block_size,
            cols,
            rows,
            inverted: vec![false; (cols * rows) as usize],
        }
    }

    #[inline]
    pub fn get(&self, bx: i32, by: i32) -> bool {
        if bx < 0 || by < 0 || bx >= self.cols || by >= self.rows {
            return false;
        }
        self.inverted[(by * self.cols + bx) as usize]
    }

    #[inline]
    pub fn set(&mut self, bx: i32, by: i32, value: bool) {
        if bx < 0 || by < 0 || bx >= self.cols || by >= self.rows {
            return;
        }
        self.inverted[(by * self.cols + bx) as usize] = value;
    }

    /// True when the pixel at (x, y) lies inside an inverted block.
    #[inline]
    pub fn pixel_inverted(&self, x: i32, y: i32) -> bool {
        self.get(x / self.block_size, y / self.block_size)
    }
}

/// Owns everything a stage needs: the intensity planes, the three pixel
/// matrices, extracted areas and the column slab for the orientation
/// currently being built. Constructed once per image, dropped when the
/// report escapes.
#[derive(Debug)]
pub struct DetectionContext {
    width: usize,
    height: usize,
    /// Raw per-pixel minimum RGB channel. Intensity reads flip inside
    /// inverted regions, see [`DetectionContext::intensity_at`].
    pub intensity: Vec<u8>,
    /// Intensity plane after sharpening, input to the binarizer.
    pub sharpened: Vec<u8>,
    /// Text-candidate pixels.
    pub binary: BitMatrix,
    /// Pixels that flood-filled into rejected components. Divider and probe
    /// checks treat these as obstacles.
    pub background: BitMatrix,
    /// One-pixel seams around inverted regions; components may not touch
    /// them.
    pub border: BitMatrix,
    pub inversion: Inversion,
    pub areas: Vec<Area>,
    /// Columns of the orientation currently being processed.
    pub columns: ColumnSlab,
    /// True while the vertical orientation is being processed.
    pub vertical: bool,
    /// Finished per-orientation results, kept for the resolver.
    pub vertical_columns: ColumnSlab,
    pub horizontal_columns: ColumnSlab,
}

impl DetectionContext {
    pub fn new(image: &RgbImage) -> Result<Self, DetectError> {
        let width = image.width();
        let height = image.height();
        if width == 0 || height == 0 {
            return Err(DetectError::EmptyImage { width, height });
        }
        let intensity = image.min_channel_plane();
        Ok(Self {
            width,
            height,
            sharpened: intensity.clone(),
            intensity,
            binary: BitMatrix::new(width, height),
            background: BitMatrix::new(width, height),
            border: BitMatrix::new(width, height),
            inversion: Inversion::None,
            areas: Vec::new(),
            columns: ColumnSlab::new(),
            vertical: true,
            vertical_columns: ColumnSlab::new(),
            horizontal_columns: ColumnSlab::new(),
        })
    }

    pub fn width(&self) -> i32 {
        self.width as i32
    }

    pub fn height(&self) -> i32 {
        self.height as i32
    }

    pub fn image_rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Polarity-corrected intensity; 255 (background white) outside the
    /// image.
    #[inline]
    pub fn intensity_at(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return 255;
        }
        let v = self.intensity[y as usize * self.width + x as usize];
        let flipped = match &self.inversion {
            Inversion::None => false,
            Inversion::Whole => true,
            Inversion::Blocks(grid) => grid.pixel_inverted(x, y),
        };
        if flipped {
            255 - v
        } else {
            v
        }
    }

    /// Stashes the working slab as the finished result for the current
    /// orientation and resets for the next run.
    pub fn finish_orientation(&mut self) {
        self.columns.compact();
        let slab = std::mem::take(&mut self.columns);
        if self.vertical {
            self.vertical_columns = slab;
        } else {
            self.horizontal_columns = slab;
        }
        for area in &mut self.areas {
            area.owner = None;
            area.punctuation = false;
            area.splitted = false;
            area.changed = false;
        }
    }
}
