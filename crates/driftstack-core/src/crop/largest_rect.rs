//! Largest axis-aligned all-true rectangle in a boolean mask.
//!
//! Each row turns the mask into a histogram of per-column run heights (how
//! many consecutive `true` cells end at this row). The largest rectangle in
//! that histogram is found with a monotonic stack of `(start_col, height)`
//! entries; the best histogram rectangle over all rows is the answer.
//! O(H·W) time, O(W) extra space, no allocation inside the row loop.

use ndarray::Array2;

use crate::frame::CropRectangle;

/// Best rectangle found so far, in histogram terms.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    area: usize,
    height: usize,
    width: usize,
    start_col: usize,
    end_row: usize,
}

impl Candidate {
    /// Strictly larger area wins. Equal areas keep the earlier end row, then
    /// the lower start column.
    fn beats(&self, best: &Option<Candidate>) -> bool {
        match best {
            None => self.area > 0,
            Some(b) => {
                self.area > b.area
                    || (self.area == b.area
                        && self.end_row == b.end_row
                        && self.start_col < b.start_col)
            }
        }
    }

    fn to_rect(self) -> CropRectangle {
        let imax = self.end_row + 1;
        CropRectangle::new(
            imax - self.height,
            imax,
            self.start_col,
            self.start_col + self.width,
        )
    }
}

/// Index-based scratch space reused across rows.
struct HistogramScan {
    heights: Vec<usize>,
    stack_start: Vec<usize>,
    stack_height: Vec<usize>,
}

impl HistogramScan {
    fn new(width: usize) -> Self {
        Self {
            heights: vec![0; width],
            stack_start: vec![0; width],
            stack_height: vec![0; width],
        }
    }

    /// Largest rectangle in the current histogram, bottom edge on `row`.
    fn scan_row(&mut self, row: usize, best: &mut Option<Candidate>) {
        let w = self.heights.len();
        let mut top = 0usize;

        // One extra column of height 0 flushes the stack at the right edge.
        for col in 0..=w {
            let incoming = if col < w { self.heights[col] } else { 0 };
            let mut start = col;

            while top > 0 && self.stack_height[top - 1] > incoming {
                top -= 1;
                let popped_start = self.stack_start[top];
                let popped_height = self.stack_height[top];
                let width = col - popped_start;
                let candidate = Candidate {
                    area: popped_height * width,
                    height: popped_height,
                    width,
                    start_col: popped_start,
                    end_row: row,
                };
                if candidate.beats(best) {
                    *best = Some(candidate);
                }
                // The incoming bar extends left over everything it popped.
                start = popped_start;
            }

            let top_height = if top > 0 { self.stack_height[top - 1] } else { 0 };
            if incoming > top_height {
                self.stack_start[top] = start;
                self.stack_height[top] = incoming;
                top += 1;
            }
        }
    }
}

/// Largest all-true rectangle of `mask`, or `None` if no cell is true.
///
/// Ties between equal areas resolve to the lowest end row, then the lowest
/// start column.
pub fn largest_rectangle(mask: &Array2<bool>) -> Option<CropRectangle> {
    let (h, w) = mask.dim();
    if h == 0 || w == 0 {
        return None;
    }

    let mut scan = HistogramScan::new(w);
    let mut best: Option<Candidate> = None;

    for (row, cells) in mask.rows().into_iter().enumerate() {
        for (height, &valid) in scan.heights.iter_mut().zip(cells.iter()) {
            *height = if valid { *height + 1 } else { 0 };
        }
        scan.scan_row(row, &mut best);
    }

    best.map(Candidate::to_rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&[u8]]) -> Array2<bool> {
        let h = rows.len();
        let w = rows[0].len();
        Array2::from_shape_fn((h, w), |(r, c)| rows[r][c] == 1)
    }

    #[test]
    fn histogram_equal_heights_merge() {
        let mask = mask_from(&[&[1, 1, 1, 1]]);
        assert_eq!(largest_rectangle(&mask), Some(CropRectangle::new(0, 1, 0, 4)));
    }

    #[test]
    fn tie_prefers_lower_start_column_in_same_row() {
        // Two 1x2 runs in one row.
        let mask = mask_from(&[&[1, 1, 0, 1, 1]]);
        assert_eq!(largest_rectangle(&mask), Some(CropRectangle::new(0, 1, 0, 2)));
    }

    #[test]
    fn tie_prefers_earlier_end_row() {
        let mask = mask_from(&[&[1, 1, 0], &[0, 0, 0], &[0, 1, 1]]);
        assert_eq!(largest_rectangle(&mask), Some(CropRectangle::new(0, 1, 0, 2)));
    }

    #[test]
    fn stack_never_exceeds_width() {
        // Strictly increasing heights push one entry per column.
        let mask = mask_from(&[&[0, 0, 0, 1], &[0, 0, 1, 1], &[0, 1, 1, 1], &[1, 1, 1, 1]]);
        let rect = largest_rectangle(&mask).unwrap();
        assert_eq!(rect.area(), 6);
    }
}
