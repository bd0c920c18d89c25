use ndarray::Array2;

use crate::consts::PARABOLA_CURVATURE_FLOOR;

/// Refine peak location using separable parabola fits on the 3x3 neighborhood.
///
/// The correlation surface is periodic, so neighbors wrap around the edges
/// and a peak on row or column 0 is refined like any other.
///
/// Returns (delta_row, delta_col) as fractional pixel offsets from the integer peak.
pub fn refine_peak_paraboloid(
    correlation: &Array2<f64>,
    peak_row: usize,
    peak_col: usize,
) -> (f64, f64) {
    let (h, w) = correlation.dim();
    if h < 3 || w < 3 {
        return (0.0, 0.0);
    }

    let up = (peak_row + h - 1) % h;
    let down = (peak_row + 1) % h;
    let left = (peak_col + w - 1) % w;
    let right = (peak_col + 1) % w;

    let center = correlation[[peak_row, peak_col]];
    let delta_row = parabola_vertex(
        correlation[[up, peak_col]],
        center,
        correlation[[down, peak_col]],
    );
    let delta_col = parabola_vertex(
        correlation[[peak_row, left]],
        center,
        correlation[[peak_row, right]],
    );

    (delta_row, delta_col)
}

/// Vertex offset of the parabola through (-1, prev), (0, curr), (1, next),
/// clamped to +/- 0.5 pixel.
fn parabola_vertex(prev: f64, curr: f64, next: f64) -> f64 {
    let curvature = prev - 2.0 * curr + next;
    if curvature.abs() > PARABOLA_CURVATURE_FLOOR {
        ((prev - next) / (2.0 * curvature)).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}
