use crate::consts::INTEGER_SNAP_TOLERANCE;
use crate::frame::{CropRectangle, Shift};

/// Conservative crop from the extremes of the cumulative drift.
///
/// Assumes pure translation: a frame shifted by `(dx, dy)` loses
/// `ceil(-dx)` columns on the left when `dx < 0` and `floor(dx)` on the right
/// when `dx > 0` (rows likewise). The result may be empty; callers decide
/// whether that is an error.
pub fn bounding_box(cumulative: &[Shift], (h, w): (usize, usize)) -> CropRectangle {
    if cumulative.is_empty() {
        return CropRectangle::new(0, h, 0, w);
    }

    let (min_dx, max_dx) = extremes(cumulative.iter().map(|s| s.dx));
    let (min_dy, max_dy) = extremes(cumulative.iter().map(|s| s.dy));

    let imin = margin(snap(-min_dy).ceil()).min(h);
    let imax = h.saturating_sub(margin(snap(max_dy).floor()));
    let jmin = margin(snap(-min_dx).ceil()).min(w);
    let jmax = w.saturating_sub(margin(snap(max_dx).floor()));

    CropRectangle::new(imin, imax.max(imin), jmin, jmax.max(jmin))
}

fn extremes(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Snap values within round-off distance of an integer onto it.
fn snap(v: f64) -> f64 {
    let nearest = v.round();
    if (v - nearest).abs() < INTEGER_SNAP_TOLERANCE {
        nearest
    } else {
        v
    }
}

/// Negative margins mean the frame never moved that way; they crop nothing.
fn margin(v: f64) -> usize {
    if v > 0.0 {
        v as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_only_touches_near_integers() {
        assert_eq!(snap(3.9999999999), 4.0);
        assert_eq!(snap(-2.0000000001), -2.0);
        assert_eq!(snap(3.5), 3.5);
    }

    #[test]
    fn negative_margin_is_zero() {
        assert_eq!(margin(-3.0), 0);
        assert_eq!(margin(2.0), 2);
    }
}
