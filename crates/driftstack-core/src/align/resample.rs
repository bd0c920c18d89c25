use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{PARALLEL_PIXEL_THRESHOLD, PROBE_VALID_TOLERANCE};
use crate::frame::Shift;

/// Interpolation used when sampling a frame at fractional coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "Nearest"),
            Self::Bilinear => write!(f, "Bilinear"),
        }
    }
}

/// Value used for samples that fall outside the source frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Out-of-bounds samples read as 0.
    #[default]
    Zero,
    /// Out-of-bounds samples repeat the nearest edge pixel.
    Edge,
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zero => write!(f, "Zero"),
            Self::Edge => write!(f, "Edge"),
        }
    }
}

/// Sampling parameters shared by data frames and the validity probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resampler {
    pub interpolation: Interpolation,
    pub boundary: Boundary,
}

impl Resampler {
    pub fn new(interpolation: Interpolation, boundary: Boundary) -> Self {
        Self {
            interpolation,
            boundary,
        }
    }

    /// Sample `data` at fractional (y, x).
    pub fn sample(&self, data: &Array2<f32>, y: f64, x: f64) -> f32 {
        match self.interpolation {
            Interpolation::Nearest => {
                fetch(data, y.round() as i64, x.round() as i64, self.boundary)
            }
            Interpolation::Bilinear => bilinear_sample(data, y, x, self.boundary),
        }
    }

    /// Translate a frame's content by `shift`: output(r, c) = input(r - dy, c - dx).
    ///
    /// Passing the negated cumulative drift brings a frame back into the
    /// reference frame's coordinates.
    pub fn shift_frame(&self, data: &Array2<f32>, shift: Shift) -> Array2<f32> {
        let (h, w) = data.dim();
        map_pixels(h, w, |row, col| {
            self.sample(data, row as f64 - shift.dy, col as f64 - shift.dx)
        })
    }

    /// Push an all-ones probe of shape `(h, w)` through the same translation
    /// with a zero boundary. A pixel is valid when the probe comes back whole,
    /// i.e. every interpolation tap with non-zero weight read real data.
    pub fn validity_mask(&self, (h, w): (usize, usize), shift: Shift) -> Array2<bool> {
        let probe = Array2::<f32>::ones((h, w));
        let probe_sampler = Resampler::new(self.interpolation, Boundary::Zero);
        let shifted = probe_sampler.shift_frame(&probe, shift);
        shifted.mapv(|v| v >= 1.0 - PROBE_VALID_TOLERANCE)
    }
}

/// Evaluate `f(row, col)` over an (h, w) grid, splitting rows across rayon
/// for large frames.
fn map_pixels<T, F>(h: usize, w: usize, f: F) -> Array2<T>
where
    T: Send + Copy,
    F: Fn(usize, usize) -> T + Sync,
{
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        let rows: Vec<Vec<T>> = (0..h)
            .into_par_iter()
            .map(|row| (0..w).map(|col| f(row, col)).collect())
            .collect();
        Array2::from_shape_fn((h, w), |(row, col)| rows[row][col])
    } else {
        Array2::from_shape_fn((h, w), |(row, col)| f(row, col))
    }
}

fn fetch(data: &Array2<f32>, r: i64, c: i64, boundary: Boundary) -> f32 {
    let (h, w) = data.dim();
    let inside = r >= 0 && r < h as i64 && c >= 0 && c < w as i64;
    match boundary {
        _ if inside => data[[r as usize, c as usize]],
        Boundary::Zero => 0.0,
        Boundary::Edge => {
            let r = r.clamp(0, h as i64 - 1) as usize;
            let c = c.clamp(0, w as i64 - 1) as usize;
            data[[r, c]]
        }
    }
}

pub fn bilinear_sample(data: &Array2<f32>, y: f64, x: f64, boundary: Boundary) -> f32 {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    // Taps with zero weight are never read, so an exact integer shift does
    // not pull in the out-of-bounds neighbor.
    let tap = |r: i64, c: i64, weight: f32| -> f32 {
        if weight == 0.0 {
            0.0
        } else {
            fetch(data, r, c, boundary) * weight
        }
    };

    tap(y0, x0, (1.0 - fx) * (1.0 - fy))
        + tap(y0, x0 + 1, fx * (1.0 - fy))
        + tap(y0 + 1, x0, (1.0 - fx) * fy)
        + tap(y0 + 1, x0 + 1, fx * fy)
}
