//! Introduces the [`AccumStateView`] and [`AccumStateViewMut`] types, along
//! with the [`StatePack`] container that holds one accum_state per output bin.
//!
//! Currently the views simply wrap `ndarray::ArrayView1<f64>` and
//! `ndarray::ArrayViewMut1<f64>`. There is some benefit to defining these
//! types even though they are thin wrappers: they keep the layout of a
//! statepack (accum_state components along axis 0, bins along axis 1) in a
//! single file.

use crate::reducer::Reducer;
use core::ops::{Index, IndexMut};
use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis};

pub struct AccumStateView<'a> {
    data: ArrayView1<'a, f64>,
}

impl<'a> AccumStateView<'a> {
    pub fn from_array_view(data: ArrayView1<'a, f64>) -> Self {
        Self { data }
    }
}

impl Index<usize> for AccumStateView<'_> {
    type Output = f64;

    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index]
    }
}

pub struct AccumStateViewMut<'a> {
    data: ArrayViewMut1<'a, f64>,
}

impl<'a> AccumStateViewMut<'a> {
    pub fn from_array_view(data: ArrayViewMut1<'a, f64>) -> Self {
        Self { data }
    }
}

impl Index<usize> for AccumStateViewMut<'_> {
    type Output = f64;

    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<usize> for AccumStateViewMut<'_> {
    #[inline(always)]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// Owns a collection of accumulator states (one per bin)
///
/// The statepack is created for a single rebin call and dropped once the
/// output values have been extracted. Nothing about it outlives the call.
pub struct StatePack {
    data: Array2<f64>,
}

impl StatePack {
    /// allocate `n_states` accum_states, each initialized by `reducer`
    pub fn new(reducer: &impl Reducer, n_states: usize) -> Self {
        let mut out = Self {
            data: Array2::zeros((reducer.accum_state_size(), n_states)),
        };
        for i in 0..n_states {
            reducer.init_accum_state(&mut out.get_state_mut(i));
        }
        out
    }

    pub fn get_state(&self, i: usize) -> AccumStateView<'_> {
        AccumStateView::from_array_view(self.data.index_axis(Axis(1), i))
    }

    pub fn get_state_mut(&mut self, i: usize) -> AccumStateViewMut<'_> {
        AccumStateViewMut::from_array_view(self.data.index_axis_mut(Axis(1), i))
    }

    pub fn n_states(&self) -> usize {
        self.data.len_of(Axis(1))
    }
}
