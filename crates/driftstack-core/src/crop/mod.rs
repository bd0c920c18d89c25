mod bounding_box;
mod largest_rect;

use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DriftError, Result};
use crate::frame::{AlignedStack, CropRectangle, Shift};
use crate::pipeline::ProgressReporter;

pub use bounding_box::bounding_box;
pub use largest_rect::largest_rectangle;

/// How the common valid region of an aligned stack is determined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropMode {
    /// Crop by the extremes of the cumulative drift. Cheap; conservative
    /// whenever the valid region is not a perfect rectangle.
    #[default]
    BoundingBox,
    /// Largest rectangle inside the exact validity mask propagated through
    /// the resampling.
    ExactMask,
}

impl std::fmt::Display for CropMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BoundingBox => write!(f, "Bounding Box"),
            Self::ExactMask => write!(f, "Exact Mask"),
        }
    }
}

/// Rectangle valid in every frame, or `EmptyValidRegion`.
///
/// `ExactMask` requires the validity mask produced by the probe resampling.
pub fn find_valid_region(
    mode: CropMode,
    cumulative: &[Shift],
    mask: Option<&Array2<bool>>,
    shape: (usize, usize),
) -> Result<CropRectangle> {
    let rect = match mode {
        CropMode::BoundingBox => Some(bounding_box(cumulative, shape)),
        CropMode::ExactMask => {
            let mask = mask.ok_or_else(|| {
                DriftError::InvalidConfig("exact-mask crop needs a validity mask".into())
            })?;
            if mask.dim() != shape {
                return Err(DriftError::ShapeMismatch {
                    index: 0,
                    expected: shape,
                    found: mask.dim(),
                });
            }
            largest_rectangle(mask)
        }
    };

    match rect {
        Some(r) if r.fits(shape.0, shape.1) => {
            info!(mode = %mode, crop = %r, "Valid region found");
            Ok(r)
        }
        _ => Err(DriftError::EmptyValidRegion {
            mode: mode.to_string(),
        }),
    }
}

/// Crop every resampled frame to `rect`, reporting one unit per frame.
pub fn crop_stack(
    frames: &[Array2<f32>],
    rect: CropRectangle,
    reporter: &dyn ProgressReporter,
) -> Result<AlignedStack> {
    let first = frames.first().ok_or(DriftError::EmptySequence)?;
    let (h, w) = first.dim();
    if !rect.fits(h, w) {
        return Err(DriftError::EmptyValidRegion {
            mode: format!("crop {rect} outside {w}x{h} frame"),
        });
    }

    let mut data = Array3::<f32>::zeros((frames.len(), rect.height(), rect.width()));
    for (k, (frame, mut out)) in frames.iter().zip(data.axis_iter_mut(Axis(0))).enumerate() {
        if frame.dim() != (h, w) {
            return Err(DriftError::ShapeMismatch {
                index: k,
                expected: (h, w),
                found: frame.dim(),
            });
        }
        out.assign(&frame.slice(s![rect.imin..rect.imax, rect.jmin..rect.jmax]));
        reporter.advance(1);
    }
    debug!(frames = frames.len(), "Stack cropped");

    Ok(AlignedStack { data, crop: rect })
}
