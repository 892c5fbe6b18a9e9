//! Gap-filling passes that operate on a normalized `[nx, ny]` grid.
//!
//! Every function here takes a value grid and a weight grid of the same shape.
//! A cell is "valid" if its weight is positive. The functions only ever write
//! to cells with zero weight, so valid cells pass through untouched.

use ndarray::{ArrayViewMut1, ArrayViewMut2, Axis};

/// A sample lying just outside of one end of a lane. It is used as the
/// outer bracket when extending interpolation up to the edge of the grid.
#[derive(Clone, Copy, Debug)]
pub struct LaneBracket {
    pub position: f64,
    pub value: f64,
    pub weight: f64,
}

#[inline]
fn lerp(a: f64, b: f64, frac: f64) -> f64 {
    a + frac * (b - a)
}

/// fills the zero-weight cells `lo+1..hi` from the brackets at `lo` & `hi`
fn fill_run(
    values: &mut ArrayViewMut1<f64>,
    weights: &mut ArrayViewMut1<f64>,
    positions: &[f64],
    run: core::ops::Range<usize>,
    lo: (f64, f64, f64),
    hi: (f64, f64, f64),
) -> usize {
    let (p0, v0, w0) = lo;
    let (p1, v1, w1) = hi;
    let span = p1 - p0;
    let mut n_filled = 0;
    for k in run {
        let frac = (positions[k] - p0) / span;
        values[k] = lerp(v0, v1, frac);
        weights[k] = lerp(w0, w1, frac);
        n_filled += 1;
    }
    n_filled
}

/// Linearly interpolates runs of zero-weight cells within a single lane.
///
/// A run is only filled when it is bracketed by two valid cells whose
/// positions differ by no more than `max_span` (and by a positive amount).
/// Both the value and the weight are interpolated by fractional position.
///
/// Returns the number of cells that were filled.
pub fn interpolate_lane(
    values: &mut ArrayViewMut1<f64>,
    weights: &mut ArrayViewMut1<f64>,
    positions: &[f64],
    max_span: f64,
) -> usize {
    debug_assert_eq!(values.len(), positions.len());
    debug_assert_eq!(weights.len(), positions.len());

    let mut n_filled = 0;
    let mut last_valid: Option<usize> = None;
    for i in 0..positions.len() {
        if weights[i] <= 0.0 {
            continue;
        }
        if let Some(i0) = last_valid {
            let span = positions[i] - positions[i0];
            if i > i0 + 1 && span > 0.0 && span <= max_span {
                n_filled += fill_run(
                    values,
                    weights,
                    positions,
                    (i0 + 1)..i,
                    (positions[i0], values[i0], weights[i0]),
                    (positions[i], values[i], weights[i]),
                );
            }
        }
        last_valid = Some(i);
    }
    n_filled
}

/// Extends interpolation to the ends of a lane.
///
/// `before` and `after` describe samples lying outside of the lane (just
/// before index 0 and just after the last index). The leading run of
/// zero-weight cells is interpolated between `before` and the first valid
/// cell; the trailing run between the last valid cell and `after`. The same
/// `max_span` ceiling as [`interpolate_lane`] applies.
///
/// Returns the number of cells that were filled.
pub fn interpolate_lane_ends(
    values: &mut ArrayViewMut1<f64>,
    weights: &mut ArrayViewMut1<f64>,
    positions: &[f64],
    before: Option<LaneBracket>,
    after: Option<LaneBracket>,
    max_span: f64,
) -> usize {
    let n = positions.len();
    let Some(first) = (0..n).find(|&i| weights[i] > 0.0) else {
        // there is nothing inside the lane to bracket against
        return 0;
    };
    let last = (0..n).rev().find(|&i| weights[i] > 0.0).unwrap_or(first);

    let usable = |b: &LaneBracket| b.weight > 0.0 && b.value.is_finite();

    let mut n_filled = 0;
    if let Some(b) = before.filter(usable) {
        let span = positions[first] - b.position;
        if first > 0 && span > 0.0 && span <= max_span {
            n_filled += fill_run(
                values,
                weights,
                positions,
                0..first,
                (b.position, b.value, b.weight),
                (positions[first], values[first], weights[first]),
            );
        }
    }
    if let Some(b) = after.filter(usable) {
        let span = b.position - positions[last];
        if last + 1 < n && span > 0.0 && span <= max_span {
            n_filled += fill_run(
                values,
                weights,
                positions,
                (last + 1)..n,
                (positions[last], values[last], weights[last]),
                (b.position, b.value, b.weight),
            );
        }
    }
    n_filled
}

/// Applies [`interpolate_lane`] to every lane of the grid that runs along
/// `axis` (`axis = Axis(0)` interpolates along x for each fixed y).
pub fn interpolate_along(
    values: &mut ArrayViewMut2<f64>,
    weights: &mut ArrayViewMut2<f64>,
    axis: Axis,
    positions: &[f64],
    max_span: f64,
) -> usize {
    debug_assert_eq!(values.shape(), weights.shape());
    debug_assert_eq!(values.len_of(axis), positions.len());

    let other = Axis(1 - axis.index());
    let mut n_filled = 0;
    for k in 0..values.len_of(other) {
        n_filled += interpolate_lane(
            &mut values.index_axis_mut(other, k),
            &mut weights.index_axis_mut(other, k),
            positions,
            max_span,
        );
    }
    n_filled
}

/// copies cell `src` into cell `dst` when `dst` is empty and `src` is valid
#[inline]
fn copy_if_empty(
    values: &mut ArrayViewMut2<f64>,
    weights: &mut ArrayViewMut2<f64>,
    dst: [usize; 2],
    src: [usize; 2],
) -> usize {
    if weights[dst] == 0.0 && weights[src] > 0.0 {
        values[dst] = values[src];
        weights[dst] = weights[src];
        1
    } else {
        0
    }
}

/// Grows the valid region of the grid by replicating neighbors into empty
/// cells.
///
/// Each pass performs four sweeps (right-to-left, left-to-right,
/// top-to-bottom, bottom-to-top). Within a sweep an empty cell only copies
/// from a neighbor that the sweep hasn't touched yet, so every sweep grows
/// the valid region by at most one cell in its direction.
///
/// Returns the number of cells that were filled.
pub fn replicate_fill(
    values: &mut ArrayViewMut2<f64>,
    weights: &mut ArrayViewMut2<f64>,
    n_passes: usize,
) -> usize {
    debug_assert_eq!(values.shape(), weights.shape());
    let (nx, ny) = values.dim();
    let mut n_filled = 0;

    for _ in 0..n_passes {
        for ix in 0..nx.saturating_sub(1) {
            for iy in 0..ny {
                n_filled += copy_if_empty(values, weights, [ix, iy], [ix + 1, iy]);
            }
        }
        for ix in (1..nx).rev() {
            for iy in 0..ny {
                n_filled += copy_if_empty(values, weights, [ix, iy], [ix - 1, iy]);
            }
        }
        for iy in 0..ny.saturating_sub(1) {
            for ix in 0..nx {
                n_filled += copy_if_empty(values, weights, [ix, iy], [ix, iy + 1]);
            }
        }
        for iy in (1..ny).rev() {
            for ix in 0..nx {
                n_filled += copy_if_empty(values, weights, [ix, iy], [ix, iy - 1]);
            }
        }
    }
    n_filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, array};

    #[test]
    fn interpolate_simple_gap() {
        let mut values = array![1.0, 0.0, 0.0, 0.0, 5.0, 0.0];
        let mut weights = array![1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let positions = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];

        let n = interpolate_lane(&mut values.view_mut(), &mut weights.view_mut(), &positions, 4.0);
        assert_eq!(n, 3);
        assert_eq!(values, array![1.0, 2.0, 3.0, 4.0, 5.0, 0.0]);
        assert_eq!(weights, array![1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn interpolate_respects_max_span() {
        let mut values = array![1.0, 0.0, 0.0, 4.0];
        let mut weights = array![1.0, 0.0, 0.0, 0.5];
        let positions = [0.0, 1.0, 2.0, 3.0];

        let n = interpolate_lane(&mut values.view_mut(), &mut weights.view_mut(), &positions, 2.9);
        assert_eq!(n, 0);
        assert_eq!(weights, array![1.0, 0.0, 0.0, 0.5]);

        let n = interpolate_lane(&mut values.view_mut(), &mut weights.view_mut(), &positions, 3.0);
        assert_eq!(n, 2);
        // weights are interpolated as well
        assert!((weights[1] - (1.0 - 0.5 / 3.0)).abs() < 1e-15);
    }

    #[test]
    fn interpolate_lane_ends_with_brackets() {
        let mut values = array![0.0, 2.0, 0.0, 0.0];
        let mut weights = array![0.0, 1.0, 0.0, 0.0];
        let positions = [0.0, 1.0, 2.0, 3.0];
        let before = LaneBracket {
            position: -1.0,
            value: 0.0,
            weight: 1.0,
        };
        let after = LaneBracket {
            position: 5.0,
            value: 8.0,
            weight: 1.0,
        };

        // the trailing bracket is too far away
        let n = interpolate_lane_ends(
            &mut values.view_mut(),
            &mut weights.view_mut(),
            &positions,
            Some(before),
            Some(after),
            2.0,
        );
        assert_eq!(n, 1);
        assert_eq!(values[0], 1.0);
        assert_eq!(weights[3], 0.0);

        let n = interpolate_lane_ends(
            &mut values.view_mut(),
            &mut weights.view_mut(),
            &positions,
            None,
            Some(after),
            4.0,
        );
        assert_eq!(n, 2);
        assert_eq!(values[2], 3.5);
        assert_eq!(values[3], 5.0);
    }

    #[test]
    fn interpolate_lane_ends_needs_interior_data() {
        let mut values = Array1::zeros(3);
        let mut weights = Array1::zeros(3);
        let bracket = LaneBracket {
            position: -1.0,
            value: 0.0,
            weight: 1.0,
        };
        let n = interpolate_lane_ends(
            &mut values.view_mut(),
            &mut weights.view_mut(),
            &[0.0, 1.0, 2.0],
            Some(bracket),
            None,
            10.0,
        );
        assert_eq!(n, 0);
    }

    #[test]
    fn interpolate_along_both_axes() {
        let mut values = Array2::<f64>::zeros((3, 3));
        let mut weights = Array2::<f64>::zeros((3, 3));
        for &(ix, iy, v) in &[(0, 0, 1.0), (2, 0, 3.0), (0, 2, 5.0), (2, 2, 7.0)] {
            values[[ix, iy]] = v;
            weights[[ix, iy]] = 1.0;
        }
        let positions = [0.0, 1.0, 2.0];

        let n = interpolate_along(
            &mut values.view_mut(),
            &mut weights.view_mut(),
            Axis(0),
            &positions,
            2.0,
        );
        assert_eq!(n, 2);
        assert_eq!(values[[1, 0]], 2.0);
        assert_eq!(values[[1, 2]], 6.0);

        let n = interpolate_along(
            &mut values.view_mut(),
            &mut weights.view_mut(),
            Axis(1),
            &positions,
            2.0,
        );
        assert_eq!(n, 3);
        assert_eq!(values[[0, 1]], 3.0);
        assert_eq!(values[[1, 1]], 4.0);
        assert_eq!(values[[2, 1]], 5.0);
    }

    #[test]
    fn replicate_fill_grows_one_cell_per_pass() {
        let mut values = Array2::<f64>::zeros((7, 1));
        let mut weights = Array2::<f64>::zeros((7, 1));
        values[[3, 0]] = 9.0;
        weights[[3, 0]] = 1.0;

        let n = replicate_fill(&mut values.view_mut(), &mut weights.view_mut(), 1);
        assert_eq!(n, 2);
        assert_eq!(weights.column(0).to_vec(), vec![0., 0., 1., 1., 1., 0., 0.]);

        let n = replicate_fill(&mut values.view_mut(), &mut weights.view_mut(), 5);
        assert_eq!(n, 4);
        assert!(values.iter().all(|&v| v == 9.0));
    }

    #[test]
    fn replicate_fill_leaves_valid_cells() {
        let mut values = array![[1.0, 0.0], [0.0, 4.0]];
        let mut weights = array![[1.0, 0.0], [0.0, 1.0]];
        replicate_fill(&mut values.view_mut(), &mut weights.view_mut(), 5);
        assert_eq!(values[[0, 0]], 1.0);
        assert_eq!(values[[1, 1]], 4.0);
        // (0,1) is filled from its right-hand neighbor during the first sweep
        assert_eq!(values[[0, 1]], 4.0);
        assert_eq!(values[[1, 0]], 1.0);
    }
}
