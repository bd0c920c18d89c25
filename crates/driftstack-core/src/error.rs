use thiserror::Error;

use crate::pipeline::PipelineStage;

#[derive(Error, Debug)]
pub enum DriftError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("TIFF error: {0}")]
    TiffError(#[from] tiff::TiffError),

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Frame {index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Index range {min}..={max} is outside the stack (total: {total})")]
    IndexRange { min: usize, max: usize, total: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported stack format: {0}")]
    UnsupportedFormat(String),

    #[error("Shift estimation failed for frame {index}: {reason}")]
    EstimationFailure { index: usize, reason: String },

    #[error("No valid region remains after alignment ({mode})")]
    EmptyValidRegion { mode: String },

    #[error("Worker failed during {stage}: {reason}")]
    WorkerFailure { stage: PipelineStage, reason: String },

    #[error("Run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, DriftError>;
