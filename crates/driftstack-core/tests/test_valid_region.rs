use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use driftstack_core::crop::{
    bounding_box, crop_stack, find_valid_region, largest_rectangle, CropMode,
};
use driftstack_core::error::DriftError;
use driftstack_core::frame::{CropRectangle, Shift};
use driftstack_core::pipeline::NoOpReporter;

fn mask_from(rows: &[&[u8]]) -> Array2<bool> {
    let h = rows.len();
    let w = rows[0].len();
    Array2::from_shape_fn((h, w), |(r, c)| rows[r][c] == 1)
}

fn all_valid(mask: &Array2<bool>, rect: &CropRectangle) -> bool {
    mask.slice(s![rect.imin..rect.imax, rect.jmin..rect.jmax])
        .iter()
        .all(|&v| v)
}

/// O(H²W²) reference: try every rectangle.
fn brute_force_area(mask: &Array2<bool>) -> usize {
    let (h, w) = mask.dim();
    let mut best = 0;
    for i0 in 0..h {
        for i1 in i0 + 1..=h {
            for j0 in 0..w {
                for j1 in j0 + 1..=w {
                    let area = (i1 - i0) * (j1 - j0);
                    if area > best && all_valid(mask, &CropRectangle::new(i0, i1, j0, j1)) {
                        best = area;
                    }
                }
            }
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Largest rectangle
// ---------------------------------------------------------------------------

#[test]
fn test_all_true_mask_is_full_frame() {
    let mask = Array2::from_elem((7, 9), true);
    assert_eq!(
        largest_rectangle(&mask),
        Some(CropRectangle::new(0, 7, 0, 9))
    );
}

#[test]
fn test_all_false_mask_has_no_rectangle() {
    let mask = Array2::from_elem((4, 4), false);
    assert_eq!(largest_rectangle(&mask), None);
}

#[test]
fn test_single_cell() {
    let mut mask = Array2::from_elem((5, 6), false);
    mask[[3, 4]] = true;
    assert_eq!(
        largest_rectangle(&mask),
        Some(CropRectangle::new(3, 4, 4, 5))
    );
}

#[test]
fn test_false_row_splits_mask() {
    let mut mask = Array2::from_elem((6, 5), true);
    mask.row_mut(2).fill(false);
    assert_eq!(
        largest_rectangle(&mask),
        Some(CropRectangle::new(3, 6, 0, 5))
    );
}

#[test]
fn test_notched_mask_area_six() {
    let mask = mask_from(&[&[1, 1, 0, 1], &[1, 1, 0, 1], &[1, 1, 1, 1]]);
    let rect = largest_rectangle(&mask).unwrap();
    assert_eq!(rect.area(), 6);
    assert!(all_valid(&mask, &rect));
    // Ties resolve to the earliest end row.
    assert_eq!(rect, CropRectangle::new(0, 3, 0, 2));
}

#[test]
fn test_matches_brute_force_on_random_masks() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let h = rng.random_range(1..=10);
        let w = rng.random_range(1..=10);
        let density = rng.random_range(0.3..0.95);
        let mask = Array2::from_shape_fn((h, w), |_| rng.random_bool(density));

        let expected = brute_force_area(&mask);
        match largest_rectangle(&mask) {
            Some(rect) => {
                assert_eq!(rect.area(), expected, "mask:\n{mask:?}");
                assert!(rect.fits(h, w));
                assert!(all_valid(&mask, &rect), "rect {rect} not valid in\n{mask:?}");
            }
            None => assert_eq!(expected, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// Bounding box
// ---------------------------------------------------------------------------

#[test]
fn test_bounding_box_integer_drift() {
    let cumulative = [
        Shift::ZERO,
        Shift::new(2.0, -1.0),
        Shift::new(-3.0, 4.0),
    ];
    // Right margin floor(2), left ceil(3); bottom floor(4), top ceil(1).
    assert_eq!(
        bounding_box(&cumulative, (20, 30)),
        CropRectangle::new(1, 16, 3, 28)
    );
}

#[test]
fn test_bounding_box_fractional_drift() {
    let cumulative = [Shift::ZERO, Shift::new(1.5, -0.25)];
    // floor(1.5) = 1 column lost on the right, ceil(0.25) = 1 row on top.
    assert_eq!(
        bounding_box(&cumulative, (10, 10)),
        CropRectangle::new(1, 10, 0, 9)
    );
}

#[test]
fn test_bounding_box_snaps_round_off() {
    let cumulative = [Shift::ZERO, Shift::new(3.0 - 1e-9, -(2.0 + 1e-9))];
    assert_eq!(
        bounding_box(&cumulative, (10, 10)),
        CropRectangle::new(2, 10, 0, 7)
    );
}

#[test]
fn test_bounding_box_no_drift_is_full_frame() {
    assert_eq!(
        bounding_box(&[Shift::ZERO; 3], (4, 6)),
        CropRectangle::new(0, 4, 0, 6)
    );
}

// ---------------------------------------------------------------------------
// find_valid_region / crop_stack
// ---------------------------------------------------------------------------

#[test]
fn test_excessive_drift_is_empty_region() {
    let cumulative = [Shift::ZERO, Shift::new(6.0, 0.0), Shift::new(-5.0, 0.0)];
    let err = find_valid_region(CropMode::BoundingBox, &cumulative, None, (8, 10)).unwrap_err();
    assert!(matches!(err, DriftError::EmptyValidRegion { .. }));
}

#[test]
fn test_all_false_mask_is_empty_region() {
    let mask = Array2::from_elem((4, 4), false);
    let err =
        find_valid_region(CropMode::ExactMask, &[Shift::ZERO], Some(&mask), (4, 4)).unwrap_err();
    assert!(matches!(err, DriftError::EmptyValidRegion { .. }));
}

#[test]
fn test_exact_mask_requires_mask() {
    let err = find_valid_region(CropMode::ExactMask, &[Shift::ZERO], None, (4, 4)).unwrap_err();
    assert!(matches!(err, DriftError::InvalidConfig(_)));
}

#[test]
fn test_exact_mask_shape_checked() {
    let mask = Array2::from_elem((3, 4), true);
    let err =
        find_valid_region(CropMode::ExactMask, &[Shift::ZERO], Some(&mask), (4, 4)).unwrap_err();
    assert!(matches!(err, DriftError::ShapeMismatch { .. }));
}

#[test]
fn test_crop_stack_slices_every_frame() {
    let frames: Vec<Array2<f32>> = (0..3)
        .map(|k| Array2::from_shape_fn((5, 6), |(r, c)| (k * 100 + r * 10 + c) as f32))
        .collect();
    let rect = CropRectangle::new(1, 4, 2, 5);
    let stack = crop_stack(&frames, rect, &NoOpReporter).unwrap();

    assert_eq!(stack.len(), 3);
    assert_eq!(stack.frame_shape(), (3, 3));
    assert_eq!(stack.crop, rect);
    assert_eq!(stack.data[[2, 0, 0]], 212.0);
    assert_eq!(stack.data[[0, 2, 2]], 34.0);
}

#[test]
fn test_crop_outside_frame_rejected() {
    let frames = vec![Array2::<f32>::zeros((4, 4))];
    let err = crop_stack(&frames, CropRectangle::new(0, 5, 0, 4), &NoOpReporter).unwrap_err();
    assert!(matches!(err, DriftError::EmptyValidRegion { .. }));
}
