mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use driftstack_core::align::{
    bilinear_sample, Boundary, EstimateError, Interpolation, PhaseCorrelator, Resampler,
    ShiftEstimator,
};
use driftstack_core::frame::Shift;

use common::{gaussian_blob, panning_stack, random_pattern, roll};

fn unwindowed() -> PhaseCorrelator {
    PhaseCorrelator {
        window: false,
        ..Default::default()
    }
}

#[test]
fn test_zero_shift_for_identical_frames() {
    let data = random_pattern(32, 32, 1);
    let est = PhaseCorrelator::default().estimate(&data, &data).unwrap();
    assert_abs_diff_eq!(est.shift.dx, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(est.shift.dy, 0.0, epsilon = 1e-6);
    assert!(est.confidence > 0.5, "confidence={}", est.confidence);
}

#[test]
fn test_circular_shift_is_exact() {
    let base = random_pattern(24, 20, 2);
    let target = roll(&base, 3, 5);
    let est = unwindowed().estimate(&base, &target).unwrap();
    assert_abs_diff_eq!(est.shift.dx, 5.0, epsilon = 1e-6);
    assert_abs_diff_eq!(est.shift.dy, 3.0, epsilon = 1e-6);
}

#[test]
fn test_negative_shift_unwraps() {
    let base = random_pattern(20, 20, 3);
    // Rolling by w - 2 is a shift of -2.
    let target = roll(&base, 0, 18);
    let est = unwindowed().estimate(&base, &target).unwrap();
    assert_abs_diff_eq!(est.shift.dx, -2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(est.shift.dy, 0.0, epsilon = 1e-6);
}

#[test]
fn test_windowed_pan_of_larger_scene() {
    let scene = random_pattern(48, 48, 13);
    let frames = panning_stack(&scene, (24, 24), 4, 1);
    let est = PhaseCorrelator::default()
        .estimate(&frames[0].data, &frames[3].data)
        .unwrap();
    assert!((est.shift.dx - 3.0).abs() < 0.1, "dx={}", est.shift.dx);
    assert!(est.shift.dy.abs() < 0.1, "dy={}", est.shift.dy);
}

#[test]
fn test_windowed_blob_shift() {
    let reference = gaussian_blob(64, 64, 30.0, 30.0, 3.0);
    let target = gaussian_blob(64, 64, 32.0, 33.0, 3.0);
    let est = PhaseCorrelator::default()
        .estimate(&reference, &target)
        .unwrap();
    assert!((est.shift.dx - 3.0).abs() < 0.5, "dx={}", est.shift.dx);
    assert!((est.shift.dy - 2.0).abs() < 0.5, "dy={}", est.shift.dy);
}

#[test]
fn test_half_pixel_shift_is_refined() {
    let reference = gaussian_blob(64, 64, 32.0, 32.0, 2.5);
    let target = gaussian_blob(64, 64, 32.0, 34.5, 2.5);
    let est = unwindowed().estimate(&reference, &target).unwrap();
    assert!((est.shift.dx - 2.5).abs() < 0.3, "dx={}", est.shift.dx);
    assert!(est.shift.dy.abs() < 0.3, "dy={}", est.shift.dy);
}

#[test]
fn test_constant_frame_is_degenerate() {
    let flat = Array2::from_elem((16, 16), 0.5f32);
    let textured = random_pattern(16, 16, 4);
    assert!(matches!(
        PhaseCorrelator::default().estimate(&flat, &textured),
        Err(EstimateError::Degenerate("reference"))
    ));
    assert!(matches!(
        PhaseCorrelator::default().estimate(&textured, &flat),
        Err(EstimateError::Degenerate("target"))
    ));
}

#[test]
fn test_size_mismatch_rejected() {
    let a = random_pattern(16, 16, 5);
    let b = random_pattern(16, 12, 6);
    assert!(matches!(
        PhaseCorrelator::default().estimate(&a, &b),
        Err(EstimateError::SizeMismatch { .. })
    ));
}

#[test]
fn test_unrelated_frames_have_low_confidence() {
    let a = random_pattern(64, 64, 7);
    let b = random_pattern(64, 64, 8);
    let strict = PhaseCorrelator {
        min_confidence: 0.5,
        ..Default::default()
    };
    assert!(matches!(
        strict.estimate(&a, &b),
        Err(EstimateError::LowConfidence { .. })
    ));
}

#[test]
fn test_correlation_surface_peaks_at_shift() {
    let base = random_pattern(16, 16, 9);
    let target = roll(&base, 2, 1);
    let surface = unwindowed().correlation_surface(&base, &target);
    let (mut best, mut at) = (f64::NEG_INFINITY, (0, 0));
    for ((r, c), &v) in surface.indexed_iter() {
        if v > best {
            best = v;
            at = (r, c);
        }
    }
    assert_eq!(at, (2, 1));
}

#[test]
fn test_bilinear_interpolation() {
    let mut data = Array2::<f32>::zeros((4, 4));
    data[[1, 1]] = 1.0;

    assert_abs_diff_eq!(bilinear_sample(&data, 1.0, 1.0, Boundary::Zero), 1.0);
    assert_abs_diff_eq!(bilinear_sample(&data, 1.5, 1.0, Boundary::Zero), 0.5);
    assert_abs_diff_eq!(bilinear_sample(&data, 1.5, 1.5, Boundary::Zero), 0.25);
    assert_abs_diff_eq!(bilinear_sample(&data, -1.0, 1.0, Boundary::Zero), 0.0);
}

#[test]
fn test_integer_shift_moves_content() {
    let data = Array2::from_shape_fn((5, 6), |(r, c)| (r * 6 + c) as f32);
    let shifted = Resampler::default().shift_frame(&data, Shift::new(2.0, 1.0));
    // output(r, c) = input(r - 1, c - 2)
    assert_eq!(shifted[[3, 4]], data[[2, 2]]);
    assert_eq!(shifted[[0, 0]], 0.0);
    assert_eq!(shifted[[1, 1]], 0.0);
}

#[test]
fn test_zero_shift_is_identity() {
    let data = random_pattern(9, 7, 10);
    for interp in [Interpolation::Nearest, Interpolation::Bilinear] {
        let r = Resampler::new(interp, Boundary::Zero);
        assert_eq!(r.shift_frame(&data, Shift::ZERO), data);
    }
}

#[test]
fn test_edge_boundary_repeats_border() {
    let data = Array2::from_shape_fn((3, 3), |(_, c)| c as f32 + 1.0);
    let r = Resampler::new(Interpolation::Bilinear, Boundary::Edge);
    let shifted = r.shift_frame(&data, Shift::new(1.0, 0.0));
    assert_eq!(shifted.row(0).to_vec(), vec![1.0, 1.0, 2.0]);
}

#[test]
fn test_validity_mask_integer_shift() {
    let mask = Resampler::default().validity_mask((4, 5), Shift::new(-2.0, 1.0));
    // Content moves left by 2 and down by 1: the right 2 columns and the
    // top row read outside the source.
    for ((r, c), &valid) in mask.indexed_iter() {
        assert_eq!(valid, r >= 1 && c < 3, "cell ({r}, {c})");
    }
}

#[test]
fn test_validity_mask_fractional_shift_loses_partial_column() {
    let mask = Resampler::default().validity_mask((3, 6), Shift::new(0.5, 0.0));
    // Column 0 blends with the out-of-bounds column -1.
    assert!(!mask[[1, 0]]);
    assert!(mask.column(1).iter().all(|&v| v));
    assert!(mask.column(5).iter().all(|&v| v));
}
