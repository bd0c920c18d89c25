use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::align::phase_correlation::PhaseCorrelator;
use crate::align::resample::{Boundary, Interpolation, Resampler};
use crate::align::{FailurePolicy, ResamplePolicy};
use crate::consts::{DEFAULT_INDEX_MAX, DEFAULT_LIVENESS_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS};
use crate::crop::CropMode;
use crate::error::{DriftError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// First frame of the processed range (inclusive).
    pub index_min: usize,
    /// Last frame of the processed range (inclusive, clamped to the stack).
    pub index_max: usize,
    /// Write the per-frame shift tables next to the output.
    pub save_shifts: bool,
    pub crop_mode: CropMode,
    /// Parallelism degree for pairwise shift estimation.
    pub num_workers: usize,
    pub interpolation: Interpolation,
    pub boundary: Boundary,
    pub on_estimation_failure: FailurePolicy,
    /// Supervisor poll tick.
    pub poll_interval_ms: u64,
    /// Time without a progress message after which the worker is declared dead.
    pub liveness_timeout_ms: u64,
    pub estimator: PhaseCorrelator,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            index_min: 0,
            index_max: DEFAULT_INDEX_MAX,
            save_shifts: false,
            crop_mode: CropMode::default(),
            num_workers: 1,
            interpolation: Interpolation::default(),
            boundary: Boundary::default(),
            on_estimation_failure: FailurePolicy::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            liveness_timeout_ms: DEFAULT_LIVENESS_TIMEOUT_MS,
            estimator: PhaseCorrelator::default(),
        }
    }
}

impl AlignConfig {
    /// Reject settings that cannot describe a run, before any frame is touched.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(DriftError::InvalidConfig("num_workers must be >= 1".into()));
        }
        if self.index_min > self.index_max {
            return Err(DriftError::InvalidConfig(format!(
                "index_min ({}) is greater than index_max ({})",
                self.index_min, self.index_max
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(DriftError::InvalidConfig(
                "poll_interval_ms must be > 0".into(),
            ));
        }
        if self.liveness_timeout_ms <= self.poll_interval_ms {
            return Err(DriftError::InvalidConfig(format!(
                "liveness_timeout_ms ({}) must exceed poll_interval_ms ({})",
                self.liveness_timeout_ms, self.poll_interval_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.estimator.min_confidence) {
            return Err(DriftError::InvalidConfig(format!(
                "estimator.min_confidence ({}) must lie in [0, 1]",
                self.estimator.min_confidence
            )));
        }
        Ok(())
    }

    pub fn resampler(&self) -> Resampler {
        Resampler::new(self.interpolation, self.boundary)
    }

    /// The exact-mask crop needs the validity probe; the bounding box does not.
    pub fn resample_policy(&self) -> ResamplePolicy {
        match self.crop_mode {
            CropMode::BoundingBox => ResamplePolicy::Direct,
            CropMode::ExactMask => ResamplePolicy::ProbeMask,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }
}
