//! Sequential pairwise drift correction.
//!
//! Each frame is registered against the frame just before it and the
//! pairwise shifts are summed into a cumulative drift, so estimation error
//! accumulates along the sequence. Every frame is then resampled by the
//! negated cumulative drift into frame 0's coordinates.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::CHUNK_OVERLAP;
use crate::error::{DriftError, Result};
use crate::frame::{Frame, Shift};
use crate::pipeline::{CancelToken, NoOpReporter, PipelineStage, ProgressReporter};

use super::estimator::{EstimateError, ShiftEstimate, ShiftEstimator};
use super::resample::Resampler;

/// Whether resampling also propagates a validity probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplePolicy {
    /// One resample per frame using the running cumulative shift.
    #[default]
    Direct,
    /// Additionally push an all-ones probe through the same transform and
    /// AND the resulting per-frame validity masks.
    ProbeMask,
}

/// What to do when the estimator cannot register a frame pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run with `EstimationFailure`.
    #[default]
    Abort,
    /// Hold the frame at the drift of the last registered frame, flag it as
    /// a fallback, and register later frames against that last registered
    /// frame instead of the skipped one.
    Skip,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => write!(f, "Abort"),
            Self::Skip => write!(f, "Skip"),
        }
    }
}

/// Per-frame outcome of the drift pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriftRecord {
    /// Acquisition index of the frame.
    pub index: usize,
    /// Shift relative to the previous frame. After a skipped frame this is
    /// measured against the last registered frame, which the skipped frames
    /// share their cumulative drift with.
    pub shift: Shift,
    /// Sum of all shifts up to and including this frame.
    pub cumulative: Shift,
    /// Estimator confidence; `None` for frame 0 and for fallbacks.
    pub confidence: Option<f64>,
    /// The estimator failed and a zero shift was substituted.
    pub fallback: bool,
}

#[derive(Clone, Debug)]
pub struct DriftResult {
    pub records: Vec<DriftRecord>,
    /// Frames expressed in frame 0's coordinates.
    pub resampled: Vec<Array2<f32>>,
    /// Cells valid in every frame; present under `ResamplePolicy::ProbeMask`.
    pub mask: Option<Array2<bool>>,
}

impl DriftResult {
    pub fn shifts(&self) -> Vec<Shift> {
        self.records.iter().map(|r| r.shift).collect()
    }

    pub fn cumulative(&self) -> Vec<Shift> {
        self.records.iter().map(|r| r.cumulative).collect()
    }
}

type PairOutcome = std::result::Result<ShiftEstimate, EstimateError>;

/// Frame loads needed to estimate `frames` pairwise shifts with `workers`
/// chunks: every chunk after the first also re-reads its predecessor frame.
pub fn estimation_units(frames: usize, workers: usize) -> usize {
    let chunks = chunk_bounds(frames, workers).len();
    frames + chunks.saturating_sub(1) * CHUNK_OVERLAP
}

/// Contiguous `[start, end)` frame ranges, one per worker at most.
fn chunk_bounds(frames: usize, workers: usize) -> Vec<(usize, usize)> {
    if frames == 0 {
        return Vec::new();
    }
    let chunk_len = frames.div_ceil(workers.clamp(1, frames));
    (0..frames)
        .step_by(chunk_len)
        .map(|start| (start, (start + chunk_len).min(frames)))
        .collect()
}

pub struct DriftAccumulator<E> {
    estimator: E,
    resampler: Resampler,
    policy: ResamplePolicy,
    on_failure: FailurePolicy,
    num_workers: usize,
}

impl<E: ShiftEstimator> DriftAccumulator<E> {
    pub fn new(estimator: E) -> Self {
        Self {
            estimator,
            resampler: Resampler::default(),
            policy: ResamplePolicy::default(),
            on_failure: FailurePolicy::default(),
            num_workers: 1,
        }
    }

    pub fn with_resampler(mut self, resampler: Resampler) -> Self {
        self.resampler = resampler;
        self
    }

    pub fn with_policy(mut self, policy: ResamplePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    /// Align `frames` without progress reporting or cancellation.
    pub fn align(&self, frames: &[Frame]) -> Result<DriftResult> {
        self.align_reported(frames, &NoOpReporter, &CancelToken::new())
    }

    /// Estimate, accumulate and resample, reporting the `ShiftEstimation`
    /// and `Transformation` stages to `reporter`.
    pub fn align_reported(
        &self,
        frames: &[Frame],
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<DriftResult> {
        if frames.is_empty() {
            return Err(DriftError::EmptySequence);
        }

        let pairs = self.estimate_pairs(frames, reporter, cancel)?;
        self.accumulate(frames, &pairs, reporter, cancel)
    }

    /// Raw estimator outcome for every frame against its predecessor.
    /// Entry 0 is always a zero shift.
    fn estimate_pairs(
        &self,
        frames: &[Frame],
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<Vec<PairOutcome>> {
        let n = frames.len();
        let bounds = chunk_bounds(n, self.num_workers);
        let workers = bounds.len();
        reporter.begin_stage(
            PipelineStage::ShiftEstimation,
            Some(estimation_units(n, self.num_workers)),
        );

        let chunks: Vec<Result<Vec<PairOutcome>>> = if workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| DriftError::InvalidConfig(format!("worker pool: {e}")))?;
            debug!(workers, "Estimating shifts in parallel");
            pool.install(|| {
                bounds
                    .par_iter()
                    .map(|&(start, end)| self.estimate_chunk(frames, start, end, reporter, cancel))
                    .collect()
            })
        } else {
            bounds
                .iter()
                .map(|&(start, end)| self.estimate_chunk(frames, start, end, reporter, cancel))
                .collect()
        };

        let mut pairs = Vec::with_capacity(n);
        for chunk in chunks {
            pairs.extend(chunk?);
        }
        reporter.finish_stage();
        Ok(pairs)
    }

    /// Pairwise shifts for frames `start..end`, holding one previous-frame
    /// reference. A chunk not starting at 0 first loads frame `start - 1`.
    fn estimate_chunk(
        &self,
        frames: &[Frame],
        start: usize,
        end: usize,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<Vec<PairOutcome>> {
        let mut outcomes = Vec::with_capacity(end - start);
        let mut previous: Option<&Frame> = None;
        if start > 0 {
            previous = Some(&frames[start - CHUNK_OVERLAP]);
            reporter.advance(CHUNK_OVERLAP);
        }

        for frame in &frames[start..end] {
            cancel.check()?;
            let outcome = match previous {
                None => Ok(ShiftEstimate {
                    shift: Shift::ZERO,
                    confidence: 1.0,
                }),
                Some(prev) => self.estimator.estimate(&prev.data, &frame.data),
            };
            outcomes.push(outcome);
            previous = Some(frame);
            reporter.advance(1);
        }
        Ok(outcomes)
    }

    /// Apply the failure policy in frame order, sum the shifts and resample.
    ///
    /// Precomputed outcomes compare each frame with its predecessor. Once a
    /// frame has been skipped, the next frames are re-estimated against the
    /// last registered frame until one succeeds.
    fn accumulate(
        &self,
        frames: &[Frame],
        pairs: &[PairOutcome],
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<DriftResult> {
        reporter.begin_stage(PipelineStage::Transformation, Some(frames.len()));

        let shape = frames[0].shape();
        let mut records = Vec::with_capacity(frames.len());
        let mut resampled = Vec::with_capacity(frames.len());
        let mut mask = match self.policy {
            ResamplePolicy::Direct => None,
            ResamplePolicy::ProbeMask => Some(Array2::from_elem(shape, true)),
        };
        let mut cumulative = Shift::ZERO;
        // Position of the last frame that was actually registered.
        let mut anchor = 0;

        for (k, (frame, outcome)) in frames.iter().zip(pairs).enumerate() {
            cancel.check()?;

            let (shift, confidence, fallback) = if k == 0 {
                (Shift::ZERO, None, false)
            } else {
                let outcome = if anchor + 1 == k {
                    outcome.clone()
                } else {
                    debug!(
                        frame = frame.index,
                        reference = frames[anchor].index,
                        "Re-estimating against last registered frame"
                    );
                    self.estimator.estimate(&frames[anchor].data, &frame.data)
                };
                match outcome {
                    Ok(est) => {
                        anchor = k;
                        (est.shift, Some(est.confidence), false)
                    }
                    Err(e) => match self.on_failure {
                        FailurePolicy::Abort => {
                            return Err(DriftError::EstimationFailure {
                                index: frame.index,
                                reason: e.to_string(),
                            })
                        }
                        FailurePolicy::Skip => {
                            warn!(
                                frame = frame.index,
                                reason = %e,
                                "Shift estimation failed, skipping frame"
                            );
                            (Shift::ZERO, None, true)
                        }
                    },
                }
            };

            cumulative += shift;
            debug!(
                frame = frame.index,
                dx = shift.dx,
                dy = shift.dy,
                cum_dx = cumulative.dx,
                cum_dy = cumulative.dy,
                "Drift"
            );

            if k == 0 {
                resampled.push(frame.data.clone());
            } else {
                resampled.push(self.resampler.shift_frame(&frame.data, -cumulative));
                if let Some(mask) = mask.as_mut() {
                    let valid = self.resampler.validity_mask(shape, -cumulative);
                    mask.zip_mut_with(&valid, |acc, &v| *acc &= v);
                }
            }

            records.push(DriftRecord {
                index: frame.index,
                shift,
                cumulative,
                confidence,
                fallback,
            });
            reporter.advance(1);
        }
        reporter.finish_stage();

        let fallbacks = records.iter().filter(|r| r.fallback).count();
        info!(
            frames = records.len(),
            fallbacks,
            final_dx = cumulative.dx,
            final_dy = cumulative.dy,
            "Drift accumulated"
        );

        Ok(DriftResult {
            records,
            resampled,
            mask,
        })
    }
}
