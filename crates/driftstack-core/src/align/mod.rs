mod drift;
pub mod estimator;
pub mod phase_correlation;
pub mod resample;
pub mod subpixel;

pub use drift::{
    estimation_units, DriftAccumulator, DriftRecord, DriftResult, FailurePolicy, ResamplePolicy,
};
pub use estimator::{EstimateError, ShiftEstimate, ShiftEstimator};
pub use phase_correlation::PhaseCorrelator;
pub use resample::{bilinear_sample, Boundary, Interpolation, Resampler};
