//! Implements [`AxisBins`], the arithmetic behind a regular 1D target grid.
//!
//! The grid is regular in its *internal coordinate*. For a linear axis the
//! internal coordinate is the value itself. For a logarithmic axis it is the
//! natural log of the value, which means that the bins are regular in
//! log-space and their centers (once mapped back out) are geometric means of
//! the bin boundaries.
//!
//! Everything in this module is expressed in the axis's own units. Unit
//! conversion is handled by the public crate before values get here.

/// Returned by [`AxisBins::bin_index`] under [`EdgePolicy::Sentinel`] (and for
/// `NaN` values under every policy)
pub const NO_BIN: i32 = -1;

/// Describes how [`AxisBins::bin_index`] treats values that fall outside of
/// the grid.
///
/// Different consumers need different answers from the same axis. Averaging
/// wants out-of-range values dropped, while the boundary extrapolation logic
/// wants to know exactly which side of the grid a value lies on (and by how
/// many bins it misses).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgePolicy {
    /// values below the grid map to bin 0 and values above it map to the
    /// last bin
    ClampToEdge,
    /// out-of-range values map to [`NO_BIN`]
    Sentinel,
    /// out-of-range values map to the index they would have if the grid
    /// extended forever (i.e. negative values or values `>= n_bins`)
    Extrapolate,
}

/// Regular bins with uniform spacing in the internal coordinate
#[derive(Clone, Debug, PartialEq)]
pub struct AxisBins {
    // both are internal coordinates
    start: f64,
    end: f64,
    bin_width: f64,
    n_bins: usize,
    is_log: bool,
}

impl AxisBins {
    /// Note that we initialize with n_bins rather than bin_width.
    ///
    /// `min` and `max` are always specified in the axis's units (i.e. they are
    /// **not** log-transformed by the caller).
    pub fn new(min: f64, max: f64, n_bins: usize, is_log: bool) -> Result<Self, &'static str> {
        if n_bins == 0 {
            return Err("Number of bins must be greater than zero");
        } else if !min.is_finite() || !max.is_finite() {
            return Err("Min and max values must be finite");
        } else if n_bins > i32::MAX as usize {
            return Err("Number of bins can't be represented as a bin index");
        } else if is_log && min <= 0.0 {
            return Err("The minimum of a logarithmic axis must be positive");
        }

        let (start, end) = if is_log {
            (min.ln(), max.ln())
        } else {
            (min, max)
        };

        if end <= start {
            Err("Maximum value must be greater than minimum value")
        } else {
            Ok(Self {
                start,
                end,
                bin_width: (end - start) / n_bins as f64,
                n_bins,
                is_log,
            })
        }
    }

    #[inline]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    #[inline]
    pub fn is_log(&self) -> bool {
        self.is_log
    }

    /// the width of a single bin in the internal coordinate
    #[inline]
    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// map a value (in axis units) to the internal coordinate
    ///
    /// Non-positive values on a logarithmic axis map to `-inf` or `NaN`.
    #[inline]
    pub fn to_internal(&self, value: f64) -> f64 {
        if self.is_log { value.ln() } else { value }
    }

    /// inverse of [`Self::to_internal`]
    #[inline]
    pub fn from_internal(&self, coord: f64) -> f64 {
        if self.is_log { coord.exp() } else { coord }
    }

    /// the lower edge of the grid, in axis units
    pub fn min(&self) -> f64 {
        self.from_internal(self.start)
    }

    /// the upper edge of the grid, in axis units
    pub fn max(&self) -> f64 {
        self.from_internal(self.end)
    }

    /// The lower edge of bin `index`, in the internal coordinate.
    ///
    /// `index` is allowed to lie outside of the grid. This is how the
    /// "virtual" bins just past either edge get their positions.
    #[inline]
    pub fn internal_start(&self, index: i64) -> f64 {
        self.start + (index as f64) * self.bin_width
    }

    /// The center of bin `index`, in the internal coordinate (see
    /// [`Self::internal_start`] for the meaning of out-of-range indices)
    #[inline]
    pub fn internal_center(&self, index: i64) -> f64 {
        self.start + (index as f64 + 0.5) * self.bin_width
    }

    /// `[lower, upper)` for every bin, in the internal coordinate
    pub fn internal_edges(&self) -> Vec<[f64; 2]> {
        (0..self.n_bins as i64)
            .map(|i| {
                let lo = self.internal_start(i);
                // use the stored end for the last bin so that rounding can't
                // shrink the grid
                let hi = if i + 1 == self.n_bins as i64 {
                    self.end
                } else {
                    self.internal_start(i + 1)
                };
                [lo, hi]
            })
            .collect()
    }

    pub fn bin_starts(&self) -> Vec<f64> {
        (0..self.n_bins as i64)
            .map(|i| self.from_internal(self.internal_start(i)))
            .collect()
    }

    pub fn bin_stops(&self) -> Vec<f64> {
        let mut out: Vec<f64> = (1..self.n_bins as i64)
            .map(|i| self.from_internal(self.internal_start(i)))
            .collect();
        out.push(self.from_internal(self.end));
        out
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        (0..self.n_bins as i64)
            .map(|i| self.from_internal(self.internal_center(i)))
            .collect()
    }

    /// Calculate the bin index for a given value (in axis units). Values which
    /// are equal to boundary values are considered part of the higher bin,
    /// i.e. intervals do not include the right edge.
    pub fn bin_index(&self, value: f64, policy: EdgePolicy) -> i32 {
        let coord = self.to_internal(value);
        if coord.is_nan() {
            return NO_BIN;
        }

        let n = self.n_bins as i32;
        let raw = if coord < self.start {
            // saturating casts take care of -inf
            ((coord - self.start) / self.bin_width).floor() as i32
        } else if coord >= self.end {
            (((coord - self.start) / self.bin_width).floor() as i32).max(n)
        } else {
            // this cast handles the truncation. Rounding can push a value
            // sitting just below `end` into bin n, so we clamp it back
            (((coord - self.start) / self.bin_width) as i32).min(n - 1)
        };

        if (0..n).contains(&raw) {
            raw
        } else {
            match policy {
                EdgePolicy::ClampToEdge => raw.clamp(0, n - 1),
                EdgePolicy::Sentinel => NO_BIN,
                EdgePolicy::Extrapolate => raw,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_creation() {
        // Zero bins
        assert!(AxisBins::new(0.0, 10.0, 0, false).is_err());

        // Max <= min
        assert!(AxisBins::new(10.0, 10.0, 5, false).is_err());
        assert!(AxisBins::new(10.0, 5.0, 5, false).is_err());

        // Non-finite values
        assert!(AxisBins::new(f64::NAN, 10.0, 5, false).is_err());
        assert!(AxisBins::new(0.0, f64::INFINITY, 5, false).is_err());

        // log axes need a positive minimum
        assert!(AxisBins::new(0.0, 10.0, 5, true).is_err());
        assert!(AxisBins::new(-1.0, 10.0, 5, true).is_err());
    }

    #[test]
    fn linear_bin_indexing() {
        let bins = AxisBins::new(0.0, 10.0, 5, false).unwrap();
        assert_eq!(bins.n_bins(), 5);

        let policy = EdgePolicy::Sentinel;
        assert_eq!(bins.bin_index(0.0, policy), 0);
        assert_eq!(bins.bin_index(1.9, policy), 0);
        assert_eq!(bins.bin_index(2.0, policy), 1);
        assert_eq!(bins.bin_index(3.9, policy), 1);
        assert_eq!(bins.bin_index(4.0, policy), 2);
        assert_eq!(bins.bin_index(8.0, policy), 4);
        assert_eq!(bins.bin_index(9.9, policy), 4);

        // Test boundary conditions
        assert_eq!(bins.bin_index(10.0, policy), NO_BIN); // max is exclusive
        assert_eq!(bins.bin_index(-0.1, policy), NO_BIN);
        assert_eq!(bins.bin_index(10.1, policy), NO_BIN);
        assert_eq!(bins.bin_index(f64::NAN, policy), NO_BIN);
    }

    #[test]
    fn edge_policies() {
        let bins = AxisBins::new(0.0, 10.0, 5, false).unwrap();

        assert_eq!(bins.bin_index(-0.1, EdgePolicy::ClampToEdge), 0);
        assert_eq!(bins.bin_index(25.0, EdgePolicy::ClampToEdge), 4);

        assert_eq!(bins.bin_index(-0.1, EdgePolicy::Extrapolate), -1);
        assert_eq!(bins.bin_index(-4.1, EdgePolicy::Extrapolate), -3);
        assert_eq!(bins.bin_index(10.0, EdgePolicy::Extrapolate), 5);
        assert_eq!(bins.bin_index(13.0, EdgePolicy::Extrapolate), 6);
        assert_eq!(
            bins.bin_index(f64::NEG_INFINITY, EdgePolicy::Extrapolate),
            i32::MIN
        );

        // NaN never maps to a bin
        assert_eq!(bins.bin_index(f64::NAN, EdgePolicy::ClampToEdge), NO_BIN);
        assert_eq!(bins.bin_index(f64::NAN, EdgePolicy::Extrapolate), NO_BIN);
    }

    #[test]
    fn log_bins() {
        let bins = AxisBins::new(1.0, 1000.0, 3, true).unwrap();

        let starts = bins.bin_starts();
        let stops = bins.bin_stops();
        let centers = bins.bin_centers();
        let expected_starts = [1.0, 10.0, 100.0];
        let expected_stops = [10.0, 100.0, 1000.0];
        for i in 0..3 {
            assert!((starts[i] - expected_starts[i]).abs() < 1e-9 * expected_starts[i]);
            assert!((stops[i] - expected_stops[i]).abs() < 1e-9 * expected_stops[i]);
            let geometric_mean = (expected_starts[i] * expected_stops[i]).sqrt();
            assert!((centers[i] - geometric_mean).abs() < 1e-9 * geometric_mean);
        }

        let policy = EdgePolicy::Sentinel;
        assert_eq!(bins.bin_index(1.0, policy), 0);
        assert_eq!(bins.bin_index(9.0, policy), 0);
        assert_eq!(bins.bin_index(11.0, policy), 1);
        assert_eq!(bins.bin_index(999.0, policy), 2);
        assert_eq!(bins.bin_index(1000.0, policy), NO_BIN);
        assert_eq!(bins.bin_index(0.0, policy), NO_BIN);
        assert_eq!(bins.bin_index(-5.0, policy), NO_BIN);
        assert_eq!(bins.bin_index(0.5, EdgePolicy::Extrapolate), -1);
    }

    #[test]
    fn log_midpoints_are_boundary_consistent() {
        let bins = AxisBins::new(3.0, 3.0e4, 8, true).unwrap();
        let centers = bins.bin_centers();
        for k in 0..(centers.len() - 1) {
            assert_eq!(bins.bin_index(centers[k], EdgePolicy::Sentinel), k as i32);
            let geometric_mean = (centers[k] * centers[k + 1]).sqrt();
            let idx = bins.bin_index(geometric_mean, EdgePolicy::Sentinel);
            // the geometric mean sits on the shared edge. It belongs to the
            // upper bin, but rounding in the exp/ln round trip may nudge it
            // just below the edge
            assert!(idx == k as i32 || idx == (k + 1) as i32);
        }
    }

    #[test]
    fn internal_edges_tile_the_grid() {
        let bins = AxisBins::new(-3.0, 7.0, 4, false).unwrap();
        let edges = bins.internal_edges();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[0][0], -3.0);
        assert_eq!(edges[3][1], 7.0);
        for i in 1..edges.len() {
            assert_eq!(edges[i - 1][1], edges[i][0]);
        }
        assert_eq!(bins.internal_center(-1), -3.0 - 1.25);
        assert_eq!(bins.internal_center(4), 7.0 + 1.25);
    }
}
