//! Numerical kernels behind the `tablebin` crate.
//!
//! Nothing in here knows about physical units or about the table data model.
//! Values arrive already converted into an axis's units (and, where relevant,
//! into the axis's internal coordinate), and grids are plain `ndarray`
//! buffers. Errors are reported as `&'static str`; the public crate wraps them.

mod bins;
mod fill;
mod overlap;
mod reducer;
mod state;

pub use bins::{AxisBins, EdgePolicy, NO_BIN};
pub use fill::{
    LaneBracket, interpolate_along, interpolate_lane, interpolate_lane_ends, replicate_fill,
};
pub use overlap::{OverlapPairs, cell_ranges, overlap_bins};
pub use reducer::{Datum, Max, Mean, OutputDescr, Reducer, Strongest, values_from_statepack};
pub use state::{AccumStateView, AccumStateViewMut, StatePack};
