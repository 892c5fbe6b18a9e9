use crate::axis::BinAxis;
use crate::binning::{Geometry, RebinContext, Target, apply_fill};
use crate::boundary::BoundaryBuffers;
use crate::error::Error;
use crate::options::{GapFill, RebinOptions};
use crate::rebinner::Rebinner;
use crate::sample_width::SampleWidths;
use crate::table::{Plane, Table, TableLike, TableProperties};
use ndarray::{Array2, Axis};
use tablebin_internal::{
    Mean, Reducer, StatePack, interpolate_along, replicate_fill, values_from_statepack,
};

/// The normalized `[nx, ny]` output of the averaging stage. Empty cells have
/// zero weight and a `NaN` value.
pub(crate) struct AveragedGrid {
    pub values: Array2<f64>,
    pub weights: Array2<f64>,
}

/// Rebins onto the target grid by weighted averaging.
///
/// Every valid input cell contributes to each output bin it overlaps, with a
/// weight equal to the product of its validity weight and the fractional
/// overlaps along X and Y. Afterwards, the configured gap filling is applied
/// (interpolation along X and then Y by default) and, when a Y axis is given,
/// edge and corner cells are extrapolated from the data just outside of the
/// grid.
#[derive(Clone, Debug, Default)]
pub struct AverageRebinner {
    options: RebinOptions,
}

impl AverageRebinner {
    pub fn new(options: RebinOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RebinOptions {
        &self.options
    }

    pub(crate) fn average(&self, table: &dyn TableLike, ctx: &RebinContext) -> AveragedGrid {
        let (nx, ny) = (ctx.geometry.nx, ctx.geometry.ny);
        let extrapolate = self.options.extrapolate_boundaries && ctx.geometry.y_axis.is_some();

        let reducer = Mean;
        let mut statepack = StatePack::new(&reducer, nx * ny);
        let mut buffers = BoundaryBuffers::new(nx, ny);
        ctx.visit(table, Plane::Primary, extrapolate, |target, datum, _| match target {
            Target::Bin(k) => reducer.consume(&mut statepack.get_state_mut(k), &datum),
            _ => buffers.consume(target, &datum),
        });

        let stats = values_from_statepack(&reducer, &statepack);
        let mut values =
            Array2::from_shape_fn((nx, ny), |(ix, iy)| stats[[Mean::VALUE_MEAN, ix * ny + iy]]);
        let mut weights =
            Array2::from_shape_fn((nx, ny), |(ix, iy)| stats[[Mean::VALUE_WEIGHT, ix * ny + iy]]);

        let mut n_interpolated = 0;
        if self.options.gap_fill == GapFill::Interpolate {
            n_interpolated += interpolate_along(
                &mut values.view_mut(),
                &mut weights.view_mut(),
                Axis(0),
                &ctx.x_positions,
                ctx.x_span,
            );
            n_interpolated += interpolate_along(
                &mut values.view_mut(),
                &mut weights.view_mut(),
                Axis(1),
                &ctx.y_positions,
                ctx.y_span,
            );
        }

        let n_extrapolated = if extrapolate {
            buffers.extrapolate(ctx, &mut values.view_mut(), &mut weights.view_mut())
        } else {
            0
        };

        let n_replicated = if self.options.gap_fill == GapFill::Replicate {
            replicate_fill(
                &mut values.view_mut(),
                &mut weights.view_mut(),
                self.options.replicate_passes,
            )
        } else {
            0
        };

        tracing::trace!(
            n_interpolated,
            n_extrapolated,
            n_replicated,
            "filled empty cells"
        );
        AveragedGrid { values, weights }
    }
}

impl Rebinner for AverageRebinner {
    fn name(&self) -> &'static str {
        "average"
    }

    fn rebin(
        &self,
        table: &dyn TableLike,
        x_axis: Option<&BinAxis>,
        y_axis: Option<&BinAxis>,
        widths: &SampleWidths,
    ) -> Result<Table, Error> {
        let geometry = Geometry::new(table, x_axis, y_axis, widths)?;
        tracing::debug!(
            rebinner = self.name(),
            n_columns = table.x_len(),
            n_segments = table.n_segments(),
            gap_fill = ?self.options.gap_fill,
            nx = geometry.nx,
            ny = geometry.ny,
            "rebinning table"
        );
        let ctx = RebinContext::new(geometry, &self.options)?;

        let AveragedGrid { mut values, weights } = self.average(table, &ctx);
        let n_empty = weights.iter().filter(|&&w| !(w > 0.0)).count();
        apply_fill(&mut values, &weights, ctx.geometry.units.z.fill_value());
        tracing::debug!(n_empty, "finished averaging");

        ctx.geometry.build_table(
            values,
            vec![(Plane::Weights, weights)],
            TableProperties::default(),
        )
    }
}
