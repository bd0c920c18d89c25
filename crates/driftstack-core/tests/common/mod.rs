#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use driftstack_core::align::{EstimateError, ShiftEstimate, ShiftEstimator};
use driftstack_core::frame::{Frame, Shift};
use driftstack_core::pipeline::{PipelineStage, ProgressReporter};

/// Uniform noise in [0, 1), reproducible from `seed`.
pub fn random_pattern(h: usize, w: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((h, w), |_| rng.random::<f32>())
}

/// Circularly roll `base` right by `dx` and down by `dy` pixels, so that
/// `out(r, c) = base(r - dy, c - dx)` with wrap-around.
pub fn roll(base: &Array2<f32>, dy: usize, dx: usize) -> Array2<f32> {
    let (h, w) = base.dim();
    Array2::from_shape_fn((h, w), |(r, c)| base[[(r + h - dy % h) % h, (c + w - dx % w) % w]])
}

/// `n` frames, frame `k` rolled right by `k * step_dx` columns.
pub fn drifting_stack(base: &Array2<f32>, n: usize, step_dx: usize) -> Vec<Frame> {
    (0..n)
        .map(|k| Frame::new(roll(base, 0, k * step_dx), k))
        .collect()
}

/// `n` windows of `size` cut from `scene`, window `k` panned `k * step_dx`
/// columns left so its content appears to move right. No wrap-around: new
/// content enters at the left edge.
pub fn panning_stack(scene: &Array2<f32>, size: (usize, usize), n: usize, step_dx: usize) -> Vec<Frame> {
    let (h, w) = size;
    let row0 = (scene.nrows() - h) / 2;
    let col0 = n * step_dx;
    assert!(col0 + w <= scene.ncols(), "scene too narrow for the pan");
    (0..n)
        .map(|k| {
            let col = col0 - k * step_dx;
            let window = scene.slice(s![row0..row0 + h, col..col + w]).to_owned();
            Frame::new(window, k)
        })
        .collect()
}

/// Isotropic Gaussian spot centered at (cy, cx).
pub fn gaussian_blob(h: usize, w: usize, cy: f64, cx: f64, sigma: f64) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(r, c)| {
        let dy = r as f64 - cy;
        let dx = c as f64 - cx;
        (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp() as f32
    })
}

pub fn frames_from(arrays: Vec<Array2<f32>>) -> Vec<Frame> {
    arrays
        .into_iter()
        .enumerate()
        .map(|(i, data)| Frame::new(data, i))
        .collect()
}

/// Estimator that reports the same shift for every pair.
pub struct ConstantShift(pub Shift);

impl ShiftEstimator for ConstantShift {
    fn estimate(
        &self,
        _reference: &Array2<f32>,
        _target: &Array2<f32>,
    ) -> Result<ShiftEstimate, EstimateError> {
        Ok(ShiftEstimate {
            shift: self.0,
            confidence: 1.0,
        })
    }
}

/// Like `ConstantShift`, but fails on any target whose first pixel is negative.
pub struct FailOnMarker(pub Shift);

impl ShiftEstimator for FailOnMarker {
    fn estimate(
        &self,
        _reference: &Array2<f32>,
        target: &Array2<f32>,
    ) -> Result<ShiftEstimate, EstimateError> {
        if target[[0, 0]] < 0.0 {
            return Err(EstimateError::Degenerate("target"));
        }
        Ok(ShiftEstimate {
            shift: self.0,
            confidence: 1.0,
        })
    }
}

/// Records every stage and sums the reported units.
#[derive(Default)]
pub struct CountingReporter {
    pub units: AtomicUsize,
    pub stages: Mutex<Vec<(PipelineStage, Option<usize>)>>,
}

impl CountingReporter {
    pub fn units(&self) -> usize {
        self.units.load(Ordering::SeqCst)
    }

    pub fn stages(&self) -> Vec<(PipelineStage, Option<usize>)> {
        self.stages.lock().unwrap().clone()
    }
}

impl ProgressReporter for CountingReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.stages.lock().unwrap().push((stage, total_items));
    }

    fn advance(&self, items: usize) {
        self.units.fetch_add(items, Ordering::SeqCst);
    }
}
