use serde::{Deserialize, Serialize};

use crate::align::DriftRecord;
use crate::frame::{AlignedStack, Shift};

/// Pipeline processing stage, used for progress reporting and error context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Reading,
    ShiftEstimation,
    Transformation,
    Cropping,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading frames"),
            Self::ShiftEstimation => write!(f, "Estimating shifts"),
            Self::Transformation => write!(f, "Resampling frames"),
            Self::Cropping => write!(f, "Cropping"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Result of an alignment run.
#[derive(Clone, Debug)]
pub struct AlignmentOutput {
    pub stack: AlignedStack,
    /// One record per processed frame, in acquisition order.
    pub records: Vec<DriftRecord>,
}

impl AlignmentOutput {
    pub fn shifts(&self) -> Vec<Shift> {
        self.records.iter().map(|r| r.shift).collect()
    }

    pub fn cumulative_shifts(&self) -> Vec<Shift> {
        self.records.iter().map(|r| r.cumulative).collect()
    }

    /// Number of frames whose shift was substituted under the skip policy.
    pub fn fallback_count(&self) -> usize {
        self.records.iter().filter(|r| r.fallback).count()
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// `advance` carries an increment (units completed since the previous call),
/// not a running total. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work units in this stage, if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items` more work units of the current stage have completed.
    fn advance(&self, _items: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when the caller does not observe progress.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Work units per stage of a run; the sum is the total announced on the
/// progress channel before any increment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<(PipelineStage, usize)>,
}

impl StagePlan {
    pub fn new(stages: Vec<(PipelineStage, usize)>) -> Self {
        Self { stages }
    }

    pub fn single(stage: PipelineStage, units: usize) -> Self {
        Self::new(vec![(stage, units)])
    }

    pub fn total(&self) -> usize {
        self.stages.iter().map(|(_, n)| n).sum()
    }

    pub fn units(&self, stage: PipelineStage) -> usize {
        self.stages
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, n)| n)
            .sum()
    }

    /// Stage in progress once `count` units are done. A finished plan
    /// reports its last stage.
    pub fn stage_at(&self, count: usize) -> Option<PipelineStage> {
        let mut boundary = 0;
        for &(stage, units) in &self.stages {
            boundary += units;
            if count < boundary {
                return Some(stage);
            }
        }
        self.stages.last().map(|(s, _)| *s)
    }
}
