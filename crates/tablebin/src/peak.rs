use crate::average::{AverageRebinner, AveragedGrid};
use crate::axis::BinAxis;
use crate::binning::{Geometry, RebinContext, Target, apply_fill};
use crate::error::Error;
use crate::options::{GapFill, RebinOptions};
use crate::rebinner::Rebinner;
use crate::sample_width::SampleWidths;
use crate::table::{Plane, Table, TableLike, TableProperties};
use ndarray::Array2;
use tablebin_internal::{Max, Reducer, StatePack, values_from_statepack};

/// Rebins by keeping the largest value that lands in each output bin.
///
/// When the source carries a [`Plane::Peaks`] plane (e.g. it is the output
/// of [`AveragePeakRebinner`]), the maximum is taken over that plane instead
/// of the primary values. No gap filling is performed.
#[derive(Clone, Debug, Default)]
pub struct PeakRebinner {
    options: RebinOptions,
}

impl PeakRebinner {
    pub fn new(options: RebinOptions) -> Self {
        Self { options }
    }

    /// returns the `[nx, ny]` maxima (`NaN` where empty) and the total
    /// weight that reached each bin
    pub(crate) fn peaks(
        &self,
        table: &dyn TableLike,
        ctx: &RebinContext,
    ) -> (Array2<f64>, Array2<f64>) {
        let (nx, ny) = (ctx.geometry.nx, ctx.geometry.ny);
        let plane = if table.has_plane(Plane::Peaks) {
            Plane::Peaks
        } else {
            Plane::Primary
        };

        let reducer = Max;
        let mut statepack = StatePack::new(&reducer, nx * ny);
        ctx.visit(table, plane, false, |target, datum, _| {
            if let Target::Bin(k) = target {
                reducer.consume(&mut statepack.get_state_mut(k), &datum);
            }
        });

        let stats = values_from_statepack(&reducer, &statepack);
        let values =
            Array2::from_shape_fn((nx, ny), |(ix, iy)| stats[[Max::VALUE_MAX, ix * ny + iy]]);
        let weights =
            Array2::from_shape_fn((nx, ny), |(ix, iy)| stats[[Max::VALUE_WEIGHT, ix * ny + iy]]);
        (values, weights)
    }
}

impl Rebinner for PeakRebinner {
    fn name(&self) -> &'static str {
        "peak"
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
            nx = geometry.nx,
            ny = geometry.ny,
            "rebinning table"
        );
        let ctx = RebinContext::new(geometry, &self.options)?;
        let (mut values, weights) = self.peaks(table, &ctx);
        apply_fill(&mut values, &weights, ctx.geometry.units.z.fill_value());
        ctx.geometry.build_table(
            values,
            vec![(Plane::Weights, weights)],
            TableProperties::default(),
        )
    }
}

/// Produces the interpolated average and the peak in a single call, over the
/// same axes.
///
/// The output carries three planes: the average ([`Plane::Primary`]), its
/// weights ([`Plane::Weights`]) and the peaks ([`Plane::Peaks`]). The
/// `x_coverage` property records the range of input X tags that contributed
/// to each output X bin.
///
/// The averaging stage always interpolates gaps, whatever
/// [`RebinOptions::gap_fill`] says.
#[derive(Clone, Debug, Default)]
pub struct AveragePeakRebinner {
    average: AverageRebinner,
    peak: PeakRebinner,
}

impl AveragePeakRebinner {
    pub fn new(options: RebinOptions) -> Self {
        let average_options = RebinOptions {
            gap_fill: GapFill::Interpolate,
            ..options.clone()
        };
        Self {
            average: AverageRebinner::new(average_options),
            peak: PeakRebinner::new(options),
        }
    }

    fn x_coverage(&self, table: &dyn TableLike, ctx: &RebinContext) -> Vec<[f64; 2]> {
        let ny = ctx.geometry.ny;
        let mut coverage = vec![[f64::NAN, f64::NAN]; ctx.geometry.nx];
        ctx.visit(table, Plane::Primary, false, |target, _, i| {
            if let Target::Bin(k) = target {
                let tag = ctx.geometry.x_tags[i];
                let range = &mut coverage[k / ny];
                // f64::min & f64::max ignore the initial NaN
                range[0] = range[0].min(tag);
                range[1] = range[1].max(tag);
            }
        });
        coverage
    }
}

impl Rebinner for AveragePeakRebinner {
    fn name(&self) -> &'static str {
        "averagePeak"
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
            nx = geometry.nx,
            ny = geometry.ny,
            "rebinning table"
        );
        let ctx = RebinContext::new(geometry, self.average.options())?;
        let fill = ctx.geometry.units.z.fill_value();

        let AveragedGrid { mut values, weights } = self.average.average(table, &ctx);
        apply_fill(&mut values, &weights, fill);
        let (mut peaks, peak_weights) = self.peak.peaks(table, &ctx);
        apply_fill(&mut peaks, &peak_weights, fill);

        let properties = TableProperties {
            x_coverage: Some(self.x_coverage(table, &ctx)),
            ..TableProperties::default()
        };
        ctx.geometry.build_table(
            values,
            vec![(Plane::Weights, weights), (Plane::Peaks, peaks)],
            properties,
        )
    }
}
