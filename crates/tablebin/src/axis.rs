use crate::error::Error;
use crate::units::Unit;
use tablebin_internal::{AxisBins, EdgePolicy};

/// A regular 1D target grid: `n_bins` bins spanning `[start, end)`, either
/// linearly spaced or spaced uniformly in log-space.
///
/// Lookups through [`BinAxis::which_bin`] use the axis's [`EdgePolicy`]
/// (which defaults to [`EdgePolicy::Sentinel`]).
#[derive(Clone, Debug, PartialEq)]
pub struct BinAxis {
    bins: AxisBins,
    units: Unit,
    policy: EdgePolicy,
}

impl BinAxis {
    pub fn new(
        start: f64,
        end: f64,
        n_bins: u32,
        is_log: bool,
        units: Unit,
    ) -> Result<Self, Error> {
        let bins =
            AxisBins::new(start, end, n_bins as usize, is_log).map_err(Error::precondition)?;
        Ok(Self {
            bins,
            units,
            policy: EdgePolicy::Sentinel,
        })
    }

    pub fn linear(start: f64, end: f64, n_bins: u32, units: Unit) -> Result<Self, Error> {
        Self::new(start, end, n_bins, false, units)
    }

    pub fn log(start: f64, end: f64, n_bins: u32, units: Unit) -> Result<Self, Error> {
        Self::new(start, end, n_bins, true, units)
    }

    pub fn with_policy(mut self, policy: EdgePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn start(&self) -> f64 {
        self.bins.min()
    }

    pub fn end(&self) -> f64 {
        self.bins.max()
    }

    pub fn n_bins(&self) -> usize {
        self.bins.n_bins()
    }

    pub fn is_log(&self) -> bool {
        self.bins.is_log()
    }

    pub fn units(&self) -> &Unit {
        &self.units
    }

    pub fn policy(&self) -> EdgePolicy {
        self.policy
    }

    pub fn bin_starts(&self) -> Vec<f64> {
        self.bins.bin_starts()
    }

    pub fn bin_stops(&self) -> Vec<f64> {
        self.bins.bin_stops()
    }

    /// Bin centers. The centers of a log axis are the geometric means of the
    /// bin boundaries.
    pub fn bin_centers(&self) -> Vec<f64> {
        self.bins.bin_centers()
    }

    /// The bin holding `value` (expressed in `value_units`), resolved with
    /// the axis's own edge policy
    pub fn which_bin(&self, value: f64, value_units: &Unit) -> Result<i32, Error> {
        self.which_bin_with(value, value_units, self.policy)
    }

    pub fn which_bin_with(
        &self,
        value: f64,
        value_units: &Unit,
        policy: EdgePolicy,
    ) -> Result<i32, Error> {
        let value = value_units.converter(&self.units)?.apply(value);
        Ok(self.bins.bin_index(value, policy))
    }

    pub(crate) fn bins(&self) -> &AxisBins {
        &self.bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablebin_internal::NO_BIN;

    #[test]
    fn which_bin_converts_units() {
        let axis = BinAxis::linear(0.0, 4.0, 4, Unit::seconds()).unwrap();
        assert_eq!(axis.which_bin(2500.0, &Unit::milliseconds()).unwrap(), 2);
        assert_eq!(axis.which_bin(5.0, &Unit::seconds()).unwrap(), NO_BIN);
        assert_eq!(
            axis.which_bin_with(5.0, &Unit::seconds(), EdgePolicy::ClampToEdge).unwrap(),
            3
        );
        assert!(axis.which_bin(1.0, &Unit::hertz()).is_err());
    }

    #[test]
    fn log_axis_centers() {
        let axis = BinAxis::log(1.0, 100.0, 2, Unit::hertz()).unwrap();
        let centers = axis.bin_centers();
        assert!((centers[0] - 10.0_f64.sqrt()).abs() < 1e-12);
        assert!((centers[1] - 1000.0_f64.sqrt()).abs() < 1e-12);
        assert!((axis.end() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn log_axis_boundaries() {
        let axis = BinAxis::log(1.0, 1000.0, 3, Unit::hertz()).unwrap();
        let centers = axis.bin_centers();
        for k in 0..2 {
            // the geometric mean of adjacent centers is the shared boundary
            let boundary = (centers[k] * centers[k + 1]).sqrt();
            let index = axis.which_bin(boundary, &Unit::hertz()).unwrap();
            assert!(index == k as i32 || index == k as i32 + 1);
            let below = axis.which_bin(boundary * (1.0 - 1e-9), &Unit::hertz());
            assert_eq!(below.unwrap(), k as i32);
            let above = axis.which_bin(boundary * (1.0 + 1e-9), &Unit::hertz());
            assert_eq!(above.unwrap(), k as i32 + 1);
        }
    }

    #[test]
    fn invalid_axes() {
        assert!(BinAxis::linear(0.0, 1.0, 0, Unit::seconds()).is_err());
        assert!(BinAxis::linear(1.0, 1.0, 3, Unit::seconds()).is_err());
        assert!(BinAxis::log(0.0, 1.0, 3, Unit::seconds()).is_err());
    }
}
