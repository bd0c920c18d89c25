use std::sync::Arc;

use ndarray::{Array2, Axis};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::consts::{CROSS_POWER_FLOOR, DEFAULT_MIN_CONFIDENCE, EPSILON};
use crate::frame::Shift;

use super::estimator::{EstimateError, ShiftEstimate, ShiftEstimator};
use super::subpixel::refine_peak_paraboloid;

/// FFT phase correlation with paraboloid sub-pixel refinement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseCorrelator {
    /// Apply a Hann window before the FFT to reduce edge leakage.
    /// Disable only for data that is genuinely periodic.
    pub window: bool,
    /// Minimum correlation peak height accepted as a confident estimate.
    pub min_confidence: f64,
}

impl Default for PhaseCorrelator {
    fn default() -> Self {
        Self {
            window: true,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl std::fmt::Display for PhaseCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Phase Correlation (window: {}, min confidence: {})",
            if self.window { "hann" } else { "none" },
            self.min_confidence
        )
    }
}

impl ShiftEstimator for PhaseCorrelator {
    fn estimate(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
    ) -> std::result::Result<ShiftEstimate, EstimateError> {
        if reference.dim() != target.dim() {
            return Err(EstimateError::SizeMismatch {
                reference: reference.dim(),
                target: target.dim(),
            });
        }
        if !has_contrast(reference) {
            return Err(EstimateError::Degenerate("reference"));
        }
        if !has_contrast(target) {
            return Err(EstimateError::Degenerate("target"));
        }

        let correlation = self.correlation_surface(reference, target);
        let (h, w) = correlation.dim();
        let (peak_row, peak_col, peak_val) = find_peak(&correlation);

        if peak_val < self.min_confidence {
            return Err(EstimateError::LowConfidence {
                peak: peak_val,
                min: self.min_confidence,
            });
        }

        let (sub_dy, sub_dx) = refine_peak_paraboloid(&correlation, peak_row, peak_col);

        Ok(ShiftEstimate {
            shift: Shift::new(
                unwrap_index(peak_col, w) + sub_dx,
                unwrap_index(peak_row, h) + sub_dy,
            ),
            confidence: peak_val,
        })
    }
}

impl PhaseCorrelator {
    /// Inverse FFT of the normalized cross-power spectrum. The peak sits at
    /// the displacement of `target` relative to `reference` (mod frame size).
    pub fn correlation_surface(&self, reference: &Array2<f32>, target: &Array2<f32>) -> Array2<f64> {
        let (h, w) = reference.dim();
        let mut planner = FftPlanner::new();
        let forward = (planner.plan_fft_forward(w), planner.plan_fft_forward(h));

        let ref_fft = fft2d(&self.prepare(reference), &forward);
        let tgt_fft = fft2d(&self.prepare(target), &forward);

        let cross_power = normalized_cross_power(&ref_fft, &tgt_fft);

        let inverse = (planner.plan_fft_inverse(w), planner.plan_fft_inverse(h));
        ifft2d_real(cross_power, &inverse)
    }

    /// Remove the mean, then optionally window.
    fn prepare(&self, data: &Array2<f32>) -> Array2<Complex<f64>> {
        let (h, w) = data.dim();
        let mean = data.iter().map(|&v| v as f64).sum::<f64>() / (h * w) as f64;
        let wy = hann(h, self.window);
        let wx = hann(w, self.window);
        Array2::from_shape_fn((h, w), |(row, col)| {
            Complex::new((data[[row, col]] as f64 - mean) * wy[row] * wx[col], 0.0)
        })
    }
}

fn has_contrast(data: &Array2<f32>) -> bool {
    let (min, max) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    max - min > EPSILON
}

fn hann(n: usize, enabled: bool) -> Vec<f64> {
    if !enabled {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (std::f64::consts::TAU * i as f64 / n as f64).cos()))
        .collect()
}

/// Run `fft` over every lane along `axis`, in place.
fn transform_axis(data: &mut Array2<Complex<f64>>, axis: Axis, fft: &Arc<dyn Fft<f64>>) {
    let mut buf = Vec::with_capacity(data.len_of(axis));
    for mut lane in data.lanes_mut(axis) {
        buf.clear();
        buf.extend(lane.iter().copied());
        fft.process(&mut buf);
        for (dst, src) in lane.iter_mut().zip(&buf) {
            *dst = *src;
        }
    }
}

/// 2D FFT: row-wise FFT, then column-wise FFT. `plans` = (row plan, column plan).
fn fft2d(
    data: &Array2<Complex<f64>>,
    plans: &(Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>),
) -> Array2<Complex<f64>> {
    let mut result = data.clone();
    transform_axis(&mut result, Axis(1), &plans.0);
    transform_axis(&mut result, Axis(0), &plans.1);
    result
}

/// Inverse 2D FFT, keeping the normalized real part.
fn ifft2d_real(
    mut data: Array2<Complex<f64>>,
    plans: &(Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>),
) -> Array2<f64> {
    let (h, w) = data.dim();
    transform_axis(&mut data, Axis(0), &plans.1);
    transform_axis(&mut data, Axis(1), &plans.0);
    let scale = 1.0 / (h * w) as f64;
    data.mapv(|c| c.re * scale)
}

fn normalized_cross_power(
    ref_fft: &Array2<Complex<f64>>,
    tgt_fft: &Array2<Complex<f64>>,
) -> Array2<Complex<f64>> {
    let mut result = ref_fft.clone();
    ndarray::Zip::from(&mut result)
        .and(tgt_fft)
        .for_each(|r, &t| {
            let cross = r.conj() * t;
            let mag = cross.norm();
            *r = if mag > CROSS_POWER_FLOOR {
                cross / mag
            } else {
                Complex::new(0.0, 0.0)
            };
        });
    result
}

/// Location and value of the maximum; the first maximum in row-major order wins.
fn find_peak(data: &Array2<f64>) -> (usize, usize, f64) {
    let mut best = (0, 0, f64::NEG_INFINITY);
    for ((row, col), &v) in data.indexed_iter() {
        if v > best.2 {
            best = (row, col, v);
        }
    }
    best
}

/// Map a peak index on a periodic axis of length `n` to a signed offset.
fn unwrap_index(peak: usize, n: usize) -> f64 {
    if peak > n / 2 {
        peak as f64 - n as f64
    } else {
        peak as f64
    }
}
