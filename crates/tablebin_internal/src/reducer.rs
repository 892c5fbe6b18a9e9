//! Define basic accumulator machinery
//!
//! # Accumulation Machinery
//!
//! Every rebinner in this package boils down to the same loop: each input
//! cell is resolved to one or more output bins and contributes a weighted
//! value to each of them. What differs between rebinners is the statistic
//! computed within a single bin. Consider the ith contribution to a bin,
//! `[zᵢ, wᵢ]`, where `zᵢ` is the cell's value and `wᵢ` is the product of the
//! cell's validity weight and its fractional overlap with the bin:
//! - the average rebinner computes the weighted mean `Σzᵢwᵢ/Σwᵢ`
//! - the peak rebinner tracks `max(zᵢ)`
//! - the splat rebinner keeps the single contribution with the largest `wᵢ`
//!
//! We draw a distinction between the current state of a bin and the logic
//! that updates it.
//! - We refer to the current state of a single bin as the `accum_state`.
//! - The logic is encapsulated by the functions implemented by the
//!   [`Reducer`] trait.
//! - From the perspective of a reducer, the `accum_state` is packaged inside
//!   of the [`AccumStateView`] & [`AccumStateViewMut`] types.
//!
//! A collection of `accum_state`s, one per output bin, is held by a
//! [`crate::StatePack`].

use crate::state::{AccumStateView, AccumStateViewMut, StatePack};
use ndarray::{Array2, ArrayViewMut1, Axis};

/// Instances of this element are consumed by the Reducer
#[derive(Clone, Copy, Debug)]
pub struct Datum {
    pub value: f64,
    pub weight: f64,
}

/// describes the output components from a single Reducer accum_state
pub enum OutputDescr {
    MultiScalarComp(&'static [&'static str]),
}

impl OutputDescr {
    /// the number of components to allocate per accum_state
    pub fn n_per_accum_state(&self) -> usize {
        match self {
            Self::MultiScalarComp(names) => names.len(),
        }
    }
}

/// Reducers operate on individual `accum_state`s.
pub trait Reducer {
    /// the number of f64 elements needed to track the accumulator data
    fn accum_state_size(&self) -> usize;

    /// initializes the storage tracking the acumulator's state.
    ///
    /// You can also use this to reset the accumulator's state since it
    /// blindly overwrites any existing values.
    fn init_accum_state(&self, accum_state: &mut AccumStateViewMut);

    /// consume the value and weight to update the accum_state
    fn consume(&self, accum_state: &mut AccumStateViewMut, datum: &Datum);

    /// extract all output-values from a single accum_state. Expects `value` to
    /// have the length given by `self.output_descr().n_per_accum_state()`.
    ///
    /// Bins that never received a contribution report `NaN` in place of
    /// the statistic (translating that into a fill value is the caller's
    /// business).
    fn value_from_accum_state(&self, value: &mut ArrayViewMut1<f64>, accum_state: &AccumStateView);

    /// Describes the outputs produced from a single accum_state
    fn output_descr(&self) -> OutputDescr;
}

/// computes the output values for every `accum_state` in `statepack`.
///
/// The result has shape `[n_components, n_states]`.
pub fn values_from_statepack(reducer: &impl Reducer, statepack: &StatePack) -> Array2<f64> {
    let n_comps = reducer.output_descr().n_per_accum_state();
    let mut values = Array2::zeros((n_comps, statepack.n_states()));
    for i in 0..statepack.n_states() {
        reducer.value_from_accum_state(
            &mut values.index_axis_mut(Axis(1), i),
            &statepack.get_state(i),
        );
    }
    values
}

/// The weighted mean
#[derive(Clone, Copy)]
pub struct Mean;

impl Mean {
    const TOTAL: usize = 0;
    const WEIGHT: usize = 1;

    pub const VALUE_MEAN: usize = 0;
    pub const VALUE_WEIGHT: usize = 1;
    const OUTPUT_COMPONENTS: &'static [&'static str] = &["mean", "weight"];
}

impl Reducer for Mean {
    fn accum_state_size(&self) -> usize {
        2_usize
    }

    fn init_accum_state(&self, accum_state: &mut AccumStateViewMut) {
        accum_state[Mean::TOTAL] = 0.0;
        accum_state[Mean::WEIGHT] = 0.0;
    }

    #[inline(always)]
    fn consume(&self, accum_state: &mut AccumStateViewMut, datum: &Datum) {
        accum_state[Mean::WEIGHT] += datum.weight;
        accum_state[Mean::TOTAL] += datum.value * datum.weight;
    }

    fn output_descr(&self) -> OutputDescr {
        OutputDescr::MultiScalarComp(Mean::OUTPUT_COMPONENTS)
    }

    fn value_from_accum_state(&self, value: &mut ArrayViewMut1<f64>, accum_state: &AccumStateView) {
        let weight = accum_state[Mean::WEIGHT];
        value[[Mean::VALUE_MEAN]] = if weight > 0.0 {
            accum_state[Mean::TOTAL] / weight
        } else {
            f64::NAN
        };
        value[[Mean::VALUE_WEIGHT]] = weight;
    }
}

/// Max-hold. Only contributions with a positive weight are considered.
#[derive(Clone, Copy)]
pub struct Max;

impl Max {
    const MAX: usize = 0;
    const WEIGHT: usize = 1;

    pub const VALUE_MAX: usize = 0;
    pub const VALUE_WEIGHT: usize = 1;
    const OUTPUT_COMPONENTS: &'static [&'static str] = &["max", "weight"];
}

impl Reducer for Max {
    fn accum_state_size(&self) -> usize {
        2_usize
    }

    fn init_accum_state(&self, accum_state: &mut AccumStateViewMut) {
        accum_state[Max::MAX] = f64::NEG_INFINITY;
        accum_state[Max::WEIGHT] = 0.0;
    }

    #[inline(always)]
    fn consume(&self, accum_state: &mut AccumStateViewMut, datum: &Datum) {
        if datum.weight > 0.0 {
            accum_state[Max::MAX] = accum_state[Max::MAX].max(datum.value);
            accum_state[Max::WEIGHT] += datum.weight;
        }
    }

    fn output_descr(&self) -> OutputDescr {
        OutputDescr::MultiScalarComp(Max::OUTPUT_COMPONENTS)
    }

    fn value_from_accum_state(&self, value: &mut ArrayViewMut1<f64>, accum_state: &AccumStateView) {
        let weight = accum_state[Max::WEIGHT];
        value[[Max::VALUE_MAX]] = if weight > 0.0 {
            accum_state[Max::MAX]
        } else {
            f64::NAN
        };
        value[[Max::VALUE_WEIGHT]] = weight;
    }
}

/// Keeps the single contribution with the largest weight.
///
/// Ties go to the contribution that arrived first: a later contribution only
/// replaces the current one when its weight is *strictly* greater.
#[derive(Clone, Copy)]
pub struct Strongest;

impl Strongest {
    const TOTAL: usize = 0;
    const WEIGHT: usize = 1;

    pub const VALUE_VALUE: usize = 0;
    pub const VALUE_WEIGHT: usize = 1;
    const OUTPUT_COMPONENTS: &'static [&'static str] = &["value", "weight"];
}

impl Reducer for Strongest {
    fn accum_state_size(&self) -> usize {
        2_usize
    }

    fn init_accum_state(&self, accum_state: &mut AccumStateViewMut) {
        accum_state[Strongest::TOTAL] = 0.0;
        accum_state[Strongest::WEIGHT] = 0.0;
    }

    #[inline(always)]
    fn consume(&self, accum_state: &mut AccumStateViewMut, datum: &Datum) {
        if datum.weight > accum_state[Strongest::WEIGHT] {
            accum_state[Strongest::TOTAL] = datum.value * datum.weight;
            accum_state[Strongest::WEIGHT] = datum.weight;
        }
    }

    fn output_descr(&self) -> OutputDescr {
        OutputDescr::MultiScalarComp(Strongest::OUTPUT_COMPONENTS)
    }

    fn value_from_accum_state(&self, value: &mut ArrayViewMut1<f64>, accum_state: &AccumStateView) {
        let weight = accum_state[Strongest::WEIGHT];
        value[[Strongest::VALUE_VALUE]] = if weight > 0.0 {
            accum_state[Strongest::TOTAL] / weight
        } else {
            f64::NAN
        };
        value[[Strongest::VALUE_WEIGHT]] = weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consume_all(reducer: &impl Reducer, data: &[Datum]) -> (f64, f64) {
        let mut statepack = StatePack::new(reducer, 1);
        for datum in data {
            reducer.consume(&mut statepack.get_state_mut(0), datum);
        }
        let values = values_from_statepack(reducer, &statepack);
        (values[[0, 0]], values[[1, 0]])
    }

    fn datum(value: f64, weight: f64) -> Datum {
        Datum { value, weight }
    }

    #[test]
    fn mean_consume() {
        let (mean, weight) = consume_all(&Mean, &[datum(4.0, 1.0)]);
        assert_eq!(mean, 4.0);
        assert_eq!(weight, 1.0);

        let (mean, weight) = consume_all(&Mean, &[datum(4.0, 1.0), datum(8.0, 1.0)]);
        assert_eq!(mean, 6.0);
        assert_eq!(weight, 2.0);

        let (mean, weight) = consume_all(&Mean, &[datum(4.0, 0.25), datum(8.0, 0.75)]);
        assert_eq!(mean, 7.0);
        assert_eq!(weight, 1.0);
    }

    #[test]
    fn mean_without_contributions() {
        let (mean, weight) = consume_all(&Mean, &[]);
        assert!(mean.is_nan());
        assert_eq!(weight, 0.0);

        let (mean, weight) = consume_all(&Mean, &[datum(3.0, 0.0)]);
        assert!(mean.is_nan());
        assert_eq!(weight, 0.0);
    }

    #[test]
    fn max_consume() {
        let (max, weight) = consume_all(&Max, &[datum(4.0, 0.5), datum(-2.0, 1.0)]);
        assert_eq!(max, 4.0);
        assert_eq!(weight, 1.5);

        // zero-weight contributions are ignored
        let (max, weight) = consume_all(&Max, &[datum(4.0, 0.5), datum(100.0, 0.0)]);
        assert_eq!(max, 4.0);
        assert_eq!(weight, 0.5);

        let (max, _) = consume_all(&Max, &[]);
        assert!(max.is_nan());
    }

    #[test]
    fn strongest_consume() {
        let (value, weight) = consume_all(
            &Strongest,
            &[datum(4.0, 0.5), datum(8.0, 0.75), datum(16.0, 0.25)],
        );
        assert_eq!(value, 8.0);
        assert_eq!(weight, 0.75);

        // the first of equally strong contributions wins
        let (value, _) = consume_all(&Strongest, &[datum(4.0, 1.0), datum(8.0, 1.0)]);
        assert_eq!(value, 4.0);
    }
}
