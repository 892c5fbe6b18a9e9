/*!
Rebins tabulated two-dimensional data (e.g. spectrograms) onto regular
target grids.

# High-Level: Tables and Rebinning

A [`Table`] holds values of `z` that were measured at a set of `(x, y)`
tags (think time and frequency). The X tags are shared by every column.
The Y tags may change partway through the table, so columns are grouped into
[`Segment`]s that each carry their own Y tags. Alongside the primary values,
a table can carry extra planes ([`Plane::Weights`], [`Plane::Peaks`]) with
the same shape.

A [`Rebinner`] maps a table onto a regular grid described by one
[`BinAxis`] per dimension. Every input cell is treated as covering a
rectangle (its tag plus or minus half of the sample width, see
[`SampleWidths`]), and each output bin averages the cells that overlap it,
weighted by the overlap. Bins that receive nothing can be filled by
interpolating across small gaps, by extrapolating at the grid boundaries or
by replicating their neighbors.

Four rebinners are provided. They can be constructed directly or by name
through [`rebinner_from_name`] and [`RebinnerBuilder`]:

| name               | type                              |
|--------------------|-----------------------------------|
| `average`          | [`AverageRebinner`]               |
| `peak`             | [`PeakRebinner`]                  |
| `averagePeak`      | [`AveragePeakRebinner`]           |
| `nearestNeighbor`  | [`NearestNeighborSplatRebinner`]  |

[`IndexMappedView`] presents a table through an index mapping (a window, a
single plane, or a nearest-neighbor resampling) without copying it, and the
[`gridder`] module fits regular axes to a table's own tags.

# Developer Guide

The numerical kernels (bin arithmetic, overlap computation, reducers and
gap interpolation) live in [`tablebin_internal`] and know nothing about
units or tables.

*/

#![deny(rustdoc::broken_intra_doc_links)]

// inform build-system of the crates in this package
mod average;
mod axis;
mod binning;
mod boundary;
mod builder;
mod error;
pub mod gridder;
mod options;
mod peak;
mod rebinner;
mod sample_width;
mod splat;
mod table;
mod units;
mod views;

// symbols visible outside of the package
pub use average::AverageRebinner;
pub use axis::BinAxis;
pub use builder::TableBuilder;
pub use error::{Error, ErrorKind};
pub use options::{BinningMode, GapFill, RebinOptions};
pub use peak::{AveragePeakRebinner, PeakRebinner};
pub use rebinner::{Rebinner, RebinnerBuilder, rebinner_from_name, rebinner_names};
pub use sample_width::{SampleWidths, TagWidth, guess_width, guess_x_width, guess_y_width};
pub use splat::{
    NearestNeighborQernalFactory, NearestNeighborSplatRebinner, Qernal, QernalFactory, Resolution,
};
pub use table::{Plane, Segment, Table, TableLike, TableProperties, TableUnits, WeightsView};
pub use tablebin_internal::{EdgePolicy, NO_BIN};
pub use units::{DEFAULT_FILL, Unit, UnitConverter};
pub use views::{IndexMappedView, TagMap};
