use std::ops::{AddAssign, Neg};
use std::path::PathBuf;

use ndarray::{Array2, Array3, Axis};

use crate::error::{DriftError, Result};

/// A single grayscale image frame.
/// Pixel values are f32, normalized to [0.0, 1.0] when read from disk.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Position in the acquisition sequence (0-based).
    pub index: usize,
}

impl Frame {
    pub fn new(data: Array2<f32>, index: usize) -> Self {
        Self { data, index }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

/// An ordered, fixed-shape sequence of frames.
///
/// Construction rejects empty sequences and frames whose shape differs from
/// the first one, so everything downstream can rely on a uniform `(H, W)`.
#[derive(Clone, Debug)]
pub struct FrameStack {
    frames: Vec<Frame>,
    /// Bit depth of the source samples (8, 16 or 32), used when writing output.
    pub bit_depth: u8,
}

impl FrameStack {
    pub fn new(frames: Vec<Frame>, bit_depth: u8) -> Result<Self> {
        let first = frames.first().ok_or(DriftError::EmptySequence)?;
        let expected = first.shape();
        if let Some(bad) = frames.iter().find(|f| f.shape() != expected) {
            return Err(DriftError::ShapeMismatch {
                index: bad.index,
                expected,
                found: bad.shape(),
            });
        }
        Ok(Self { frames, bit_depth })
    }

    /// Build a stack from bare arrays, numbering frames in order.
    pub fn from_arrays(arrays: Vec<Array2<f32>>, bit_depth: u8) -> Result<Self> {
        let frames = arrays
            .into_iter()
            .enumerate()
            .map(|(i, data)| Frame::new(data, i))
            .collect();
        Self::new(frames, bit_depth)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// (height, width) shared by every frame.
    pub fn shape(&self) -> (usize, usize) {
        self.frames[0].shape()
    }

    /// Number of frames in the inclusive range `index_min..=index_max`.
    ///
    /// `index_max` past the end is clamped to the last frame; an empty or
    /// inverted range is rejected.
    pub fn range_len(&self, index_min: usize, index_max: usize) -> Result<usize> {
        let total = self.frames.len();
        if index_min >= total || index_min > index_max {
            return Err(DriftError::IndexRange {
                min: index_min,
                max: index_max,
                total,
            });
        }
        Ok(index_max.min(total - 1) - index_min + 1)
    }

    /// Select the inclusive range `index_min..=index_max` (see `range_len`).
    pub fn select_range(&self, index_min: usize, index_max: usize) -> Result<FrameStack> {
        let len = self.range_len(index_min, index_max)?;
        Ok(FrameStack {
            frames: self.frames[index_min..index_min + len].to_vec(),
            bit_depth: self.bit_depth,
        })
    }
}

/// Translational displacement in pixels. `dx` runs along columns, `dy` along rows.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Shift {
    pub dx: f64,
    pub dy: f64,
}

impl Shift {
    pub const ZERO: Shift = Shift { dx: 0.0, dy: 0.0 };

    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

impl AddAssign for Shift {
    fn add_assign(&mut self, rhs: Shift) {
        self.dx += rhs.dx;
        self.dy += rhs.dy;
    }
}

impl Neg for Shift {
    type Output = Shift;

    fn neg(self) -> Shift {
        Shift::new(-self.dx, -self.dy)
    }
}

/// Half-open, axis-aligned rectangle in row/column indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRectangle {
    pub imin: usize,
    pub imax: usize,
    pub jmin: usize,
    pub jmax: usize,
}

impl CropRectangle {
    pub fn new(imin: usize, imax: usize, jmin: usize, jmax: usize) -> Self {
        Self {
            imin,
            imax,
            jmin,
            jmax,
        }
    }

    pub fn height(&self) -> usize {
        self.imax.saturating_sub(self.imin)
    }

    pub fn width(&self) -> usize {
        self.jmax.saturating_sub(self.jmin)
    }

    pub fn area(&self) -> usize {
        self.height() * self.width()
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// True if the rectangle is non-empty and fits inside an `(h, w)` frame.
    pub fn fits(&self, h: usize, w: usize) -> bool {
        !self.is_empty() && self.imax <= h && self.jmax <= w
    }
}

impl std::fmt::Display for CropRectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rows {}..{}, cols {}..{} ({}x{})",
            self.imin,
            self.imax,
            self.jmin,
            self.jmax,
            self.width(),
            self.height()
        )
    }
}

/// Drift-corrected frames cropped to the common valid region.
/// Shape = (frames, imax - imin, jmax - jmin).
#[derive(Clone, Debug)]
pub struct AlignedStack {
    pub data: Array3<f32>,
    pub crop: CropRectangle,
}

impl AlignedStack {
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (height, width) of every cropped frame.
    pub fn frame_shape(&self) -> (usize, usize) {
        let (_, h, w) = self.data.dim();
        (h, w)
    }
}

/// Metadata about the source stack.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub total_frames: usize,
    pub width: usize,
    pub height: usize,
    pub bit_depth: u8,
}
