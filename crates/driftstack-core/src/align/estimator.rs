use ndarray::Array2;
use thiserror::Error;

use crate::frame::Shift;

/// Why an estimator could not produce a usable shift for a frame pair.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    #[error("frame size mismatch: {reference:?} vs {target:?}")]
    SizeMismatch {
        reference: (usize, usize),
        target: (usize, usize),
    },

    #[error("{0} frame has no contrast")]
    Degenerate(&'static str),

    #[error("correlation peak {peak:.4} below confidence threshold {min:.4}")]
    LowConfidence { peak: f64, min: f64 },
}

/// A shift together with the estimator's confidence in it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShiftEstimate {
    /// Displacement of the target relative to the reference.
    pub shift: Shift,
    /// Estimator-specific confidence; for phase correlation the correlation
    /// peak height in [0, 1].
    pub confidence: f64,
}

/// Translational registration primitive between two frames of equal shape.
///
/// `estimate(reference, target)` returns the displacement of `target`
/// relative to `reference`: if `target(y, x) == reference(y - dy, x - dx)`
/// the result is `(dx, dy)`. Implementations must be deterministic and
/// shareable across the rayon pool used for parallel estimation.
pub trait ShiftEstimator: Send + Sync {
    fn estimate(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
    ) -> std::result::Result<ShiftEstimate, EstimateError>;
}

impl<E: ShiftEstimator + ?Sized> ShiftEstimator for &E {
    fn estimate(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
    ) -> std::result::Result<ShiftEstimate, EstimateError> {
        (**self).estimate(reference, target)
    }
}
