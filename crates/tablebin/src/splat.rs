//! Nearest-neighbor rebinning by splatting.
//!
//! Instead of resolving cell overlaps, each input cell is "splatted" over a
//! small rectangular neighborhood (a [`Qernal`]) centered on the output bin
//! holding its tag. Where neighborhoods collide, the nearest cell generally
//! wins.

use crate::axis::BinAxis;
use crate::binning::{Geometry, apply_fill, internal_width, usable_tag};
use crate::error::Error;
use crate::options::RebinOptions;
use crate::rebinner::Rebinner;
use crate::sample_width::{SampleWidths, TagWidth};
use crate::table::{Plane, Table, TableLike, TableProperties, WeightsView};
use ndarray::Array2;
use tablebin_internal::{Datum, EdgePolicy, Reducer, StatePack, Strongest, values_from_statepack};

/// The extent of a splat, in bins, on either side of the center bin
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Qernal {
    pub dx_before: usize,
    pub dx_after: usize,
    pub dy_before: usize,
    pub dy_after: usize,
}

impl Qernal {
    /// only the center bin
    pub fn single_cell() -> Self {
        Self::default()
    }

    /// limits the extents to a `[nx, ny]` grid. Offsets of `nx` (or `ny`)
    /// bins or more never land on the grid.
    pub fn clamped(self, nx: usize, ny: usize) -> Self {
        Self {
            dx_before: self.dx_before.min(nx),
            dx_after: self.dx_after.min(nx),
            dy_before: self.dy_before.min(ny),
            dy_after: self.dy_after.min(ny),
        }
    }

    pub fn n_cells(&self) -> usize {
        (self.dx_before + 1 + self.dx_after) * (self.dy_before + 1 + self.dy_after)
    }
}

/// The resolution of a single axis, as seen by a [`QernalFactory`]. Both
/// widths are measured in the axis's internal coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub sample_width: f64,
    /// `None` when the axis passes through unbinned
    pub bin_width: Option<f64>,
}

/// Chooses the splat neighborhood for a rebin call
pub trait QernalFactory: Send + Sync {
    fn qernal(&self, x: Resolution, y: Resolution) -> Qernal;
}

/// Sizes the neighborhood so that it spans the width of an input sample
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestNeighborQernalFactory;

impl NearestNeighborQernalFactory {
    fn half_extent(resolution: Resolution) -> usize {
        match resolution.bin_width {
            Some(bin_width) if bin_width > 0.0 => {
                let n = (0.5 * resolution.sample_width / bin_width).floor();
                if n.is_finite() && n > 0.0 { n as usize } else { 0 }
            }
            _ => 0,
        }
    }
}

impl QernalFactory for NearestNeighborQernalFactory {
    fn qernal(&self, x: Resolution, y: Resolution) -> Qernal {
        let (nx, ny) = (Self::half_extent(x), Self::half_extent(y));
        Qernal {
            dx_before: nx,
            dx_after: nx,
            dy_before: ny,
            dy_after: ny,
        }
    }
}

/// Where an input tag lands on one output axis
#[derive(Clone, Copy, Debug)]
struct Center {
    bin: i64,
    // offset from the center of `bin`, in bins
    offset: f64,
}

fn centers(tags: &[f64], axis: Option<&BinAxis>) -> Vec<Option<Center>> {
    match axis {
        None => (0..tags.len())
            .map(|i| {
                Some(Center {
                    bin: i as i64,
                    offset: 0.0,
                })
            })
            .collect(),
        Some(axis) => {
            let bins = axis.bins();
            tags.iter()
                .map(|&tag| {
                    if !usable_tag(bins, tag) {
                        return None;
                    }
                    let bin = i64::from(bins.bin_index(tag, EdgePolicy::Extrapolate));
                    let offset =
                        (bins.to_internal(tag) - bins.internal_center(bin)) / bins.bin_width();
                    Some(Center { bin, offset })
                })
                .collect()
        }
    }
}

fn resolution(sample_width: TagWidth, axis: Option<&BinAxis>) -> Resolution {
    match axis {
        Some(axis) => Resolution {
            sample_width: internal_width(sample_width, axis.bins()),
            bin_width: Some(axis.bins().bin_width()),
        },
        None => Resolution {
            sample_width: sample_width.value(),
            bin_width: None,
        },
    }
}

/// Rebins by splatting every input cell over a neighborhood of output bins.
///
/// Each contribution's weight is the cell's weight scaled by `1 / (1 + d²)`,
/// where `d` is the distance between the cell's tag and the bin center,
/// measured in bins. Within each output bin the strongest contribution wins
/// (for cells of equal weight, that is the closest one) and its scaled weight
/// becomes the output weight. No gap filling is performed.
#[derive(Clone, Debug, Default)]
pub struct NearestNeighborSplatRebinner<F: QernalFactory = NearestNeighborQernalFactory> {
    options: RebinOptions,
    factory: F,
}

impl NearestNeighborSplatRebinner {
    pub fn new(options: RebinOptions) -> Self {
        Self {
            options,
            factory: NearestNeighborQernalFactory,
        }
    }
}

impl<F: QernalFactory> NearestNeighborSplatRebinner<F> {
    pub fn with_factory(options: RebinOptions, factory: F) -> Self {
        Self { options, factory }
    }

    /// The options this rebinner was built with. Splatting doesn't consult
    /// the gap-filling or binning-mode settings.
    pub fn options(&self) -> &RebinOptions {
        &self.options
    }
}

impl<F: QernalFactory> Rebinner for NearestNeighborSplatRebinner<F> {
    fn name(&self) -> &'static str {
        "nearestNeighbor"
    }

    fn rebin(
        &self,
        table: &dyn TableLike,
        x_axis: Option<&BinAxis>,
        y_axis: Option<&BinAxis>,
        widths: &SampleWidths,
    ) -> Result<Table, Error> {
        let geometry = Geometry::new(table, x_axis, y_axis, widths)?;
        let (nx, ny) = (geometry.nx, geometry.ny);
        let qernal = self
            .factory
            .qernal(
                resolution(geometry.x_width, x_axis),
                resolution(geometry.y_width, y_axis),
            )
            .clamped(nx, ny);
        tracing::debug!(
            rebinner = self.name(),
            n_columns = table.x_len(),
            nx,
            ny,
            qernal_cells = qernal.n_cells(),
            "rebinning table"
        );

        let x_centers = centers(&geometry.x_tags, x_axis);
        let y_centers: Vec<Vec<Option<Center>>> = geometry
            .y_tags
            .iter()
            .map(|tags| centers(tags, y_axis))
            .collect();

        let reducer = Strongest;
        let mut statepack = StatePack::new(&reducer, nx * ny);
        let weights = WeightsView::new(table);
        let z_units = &table.units().z;
        let (nx_i, ny_i) = (nx as i64, ny as i64);

        for (seg, y_centers) in y_centers.iter().enumerate() {
            for i in table.segment_range(seg) {
                let Some(cx) = x_centers[i] else { continue };
                for (j, cy) in y_centers.iter().enumerate() {
                    let Some(cy) = cy else { continue };
                    let weight = weights.get(i, j);
                    let value = table.value(Plane::Primary, i, j);
                    if !(weight > 0.0) || z_units.is_fill(value) {
                        continue;
                    }

                    for dx in -(qernal.dx_before as i64)..=(qernal.dx_after as i64) {
                        let ix = cx.bin + dx;
                        if !(0..nx_i).contains(&ix) {
                            continue;
                        }
                        let ox = cx.offset - dx as f64;
                        for dy in -(qernal.dy_before as i64)..=(qernal.dy_after as i64) {
                            let iy = cy.bin + dy;
                            if !(0..ny_i).contains(&iy) {
                                continue;
                            }
                            let oy = cy.offset - dy as f64;
                            let datum = Datum {
                                value,
                                weight: weight / (1.0 + ox * ox + oy * oy),
                            };
                            let k = (ix * ny_i + iy) as usize;
                            reducer.consume(&mut statepack.get_state_mut(k), &datum);
                        }
                    }
                }
            }
        }

        let stats = values_from_statepack(&reducer, &statepack);
        let mut values = Array2::from_shape_fn((nx, ny), |(ix, iy)| {
            stats[[Strongest::VALUE_VALUE, ix * ny + iy]]
        });
        let out_weights = Array2::from_shape_fn((nx, ny), |(ix, iy)| {
            stats[[Strongest::VALUE_WEIGHT, ix * ny + iy]]
        });
        apply_fill(&mut values, &out_weights, geometry.units.z.fill_value());

        geometry.build_table(
            values,
            vec![(Plane::Weights, out_weights)],
            TableProperties::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_neighbor_qernal() {
        let factory = NearestNeighborQernalFactory;
        let narrow = Resolution {
            sample_width: 1.0,
            bin_width: Some(1.0),
        };
        assert_eq!(factory.qernal(narrow, narrow), Qernal::single_cell());

        let wide = Resolution {
            sample_width: 4.5,
            bin_width: Some(1.0),
        };
        let unbinned = Resolution {
            sample_width: 4.5,
            bin_width: None,
        };
        let qernal = factory.qernal(wide, unbinned);
        assert_eq!(qernal.dx_before, 2);
        assert_eq!(qernal.dx_after, 2);
        assert_eq!(qernal.dy_before, 0);
        assert_eq!(qernal.n_cells(), 5);
    }

    #[test]
    fn enormous_samples() {
        let huge = Resolution {
            sample_width: 1e300,
            bin_width: Some(1.0),
        };
        let unbinned = Resolution {
            sample_width: 1.0,
            bin_width: None,
        };
        let qernal = NearestNeighborQernalFactory.qernal(huge, unbinned);
        assert_eq!(qernal.dx_before, usize::MAX);

        let qernal = qernal.clamped(8, 3);
        assert_eq!(qernal.dx_before, 8);
        assert_eq!(qernal.dx_after, 8);
        assert_eq!(qernal.dy_after, 0);
        assert_eq!(qernal.n_cells(), 17);
    }
}
