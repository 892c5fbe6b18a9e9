//! Infers regular target grids from a table's own tags.
//!
//! This is useful for tables whose tags are *nearly* regular (e.g. jittered
//! timestamps). The fitted axes place one bin center on (or close to) each
//! distinct tag, and [`regrid`] presents the table on those axes through an
//! [`IndexMappedView`].

use crate::axis::BinAxis;
use crate::error::Error;
use crate::sample_width::{TagWidth, guess_width};
use crate::table::TableLike;
use crate::units::Unit;
use crate::views::{IndexMappedView, TagMap, centers_in, nearest_tag};
use tablebin_internal::EdgePolicy;

/// the largest number of bins that [`fit_axis`] will produce
pub const MAX_GRID_BINS: u32 = 1 << 20;

/// Fits a regular axis to `tags` (expressed in `units`).
///
/// The spacing comes from [`guess_width`]. Tags that are more regular in
/// log-space produce a logarithmic axis. The first bin is centered on the
/// smallest tag and the last bin on (approximately) the largest.
pub fn fit_axis(tags: &[f64], units: &Unit) -> Result<BinAxis, Error> {
    let width = guess_width(tags).ok_or_else(|| {
        Error::precondition("at least two distinct finite tags are needed to fit an axis")
    })?;
    let (min, max) = tags
        .iter()
        .copied()
        .filter(|t| t.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| (lo.min(t), hi.max(t)));

    let (span, step) = match width {
        TagWidth::Linear(step) => (max - min, step),
        TagWidth::Ratio(r) => ((max / min).ln(), r),
    };
    let n = (span / step).round() + 1.0;
    if !(n <= MAX_GRID_BINS as f64) {
        return Err(Error::precondition(format!(
            "fitting these tags would need {n} bins (the limit is {MAX_GRID_BINS})"
        )));
    }
    let n_bins = n as u32;
    tracing::trace!(n_bins, ?width, "fitted an axis");

    match width {
        TagWidth::Linear(step) => BinAxis::linear(
            min - 0.5 * step,
            min + (n - 0.5) * step,
            n_bins,
            units.clone(),
        ),
        TagWidth::Ratio(r) => BinAxis::log(
            min * (-0.5 * r).exp(),
            min * ((n - 0.5) * r).exp(),
            n_bins,
            units.clone(),
        ),
    }
}

/// fits an axis to the X tags of `table`
pub fn grid_x(table: &(impl TableLike + ?Sized)) -> Result<BinAxis, Error> {
    fit_axis(&table.x_tags(), &table.units().x)
}

/// fits an axis to the Y tags of every segment of `table`
pub fn grid_y(table: &(impl TableLike + ?Sized)) -> Result<BinAxis, Error> {
    let tags: Vec<f64> = (0..table.n_segments()).flat_map(|seg| table.y_tags(seg)).collect();
    fit_axis(&tags, &table.units().y)
}

/// assigns each bin of `axis` the index of the nearest tag that lies in it
fn assign(
    tags: &[f64],
    sorted: bool,
    axis: &BinAxis,
    tag_units: &Unit,
) -> Result<Vec<Option<usize>>, Error> {
    let converter = tag_units.converter(axis.units())?;
    let converted: Vec<f64> = tags.iter().map(|&t| converter.apply(t)).collect();
    let bins = axis.bins();
    let metric = if axis.is_log() {
        TagWidth::Ratio(bins.bin_width())
    } else {
        TagWidth::Linear(bins.bin_width())
    };
    Ok(axis
        .bin_centers()
        .into_iter()
        .enumerate()
        .map(|(k, center)| {
            nearest_tag(&converted, center, sorted, &metric)
                .map(|(i, _)| i)
                .filter(|&i| bins.bin_index(converted[i], EdgePolicy::Sentinel) == k as i32)
        })
        .collect())
}

/// Maps every bin of the target axes onto the source column (and row) whose
/// tag lies in the bin and is nearest to its center
pub fn tag_map(
    table: &(impl TableLike + ?Sized),
    x_axis: &BinAxis,
    y_axis: &BinAxis,
) -> Result<TagMap, Error> {
    let units = table.units();
    let x_map = assign(&table.x_tags(), true, x_axis, &units.x)?;
    let y_maps = (0..table.n_segments())
        .map(|seg| assign(&table.y_tags(seg), false, y_axis, &units.y))
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(TagMap {
        x_tags: centers_in(x_axis, &units.x)?,
        x_map,
        y_tags: centers_in(y_axis, &units.y)?,
        y_maps,
    })
}

/// Presents `table` on axes fitted to its own tags
pub fn regrid<T: TableLike + ?Sized>(table: &T) -> Result<IndexMappedView<'_, T>, Error> {
    let x_axis = grid_x(table)?;
    let y_axis = grid_y(table)?;
    tracing::debug!(
        nx = x_axis.n_bins(),
        ny = y_axis.n_bins(),
        x_log = x_axis.is_log(),
        y_log = y_axis.is_log(),
        "regridding table"
    );
    let map = tag_map(table, &x_axis, &y_axis)?;
    IndexMappedView::tag_map(table, map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_linear_axis() {
        let tags = [0.0, 1.0, 2.0, 3.0];
        let axis = fit_axis(&tags, &Unit::seconds()).unwrap();
        assert!(!axis.is_log());
        assert_eq!(axis.n_bins(), 4);
        assert_eq!(axis.start(), -0.5);
        assert_eq!(axis.end(), 3.5);
        assert_eq!(axis.bin_centers(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn fit_log_axis() {
        let tags = [1.0, 2.0, 4.0, 8.0, 16.0];
        let axis = fit_axis(&tags, &Unit::hertz()).unwrap();
        assert!(axis.is_log());
        assert_eq!(axis.n_bins(), 5);
        for (center, tag) in axis.bin_centers().iter().zip(tags) {
            assert!((center / tag - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn fit_with_gaps() {
        // the missing tag at 2 gets a bin of its own
        let tags = [0.0, 1.0, 3.0, 4.0, 5.0];
        let axis = fit_axis(&tags, &Unit::seconds()).unwrap();
        assert_eq!(axis.n_bins(), 6);

        let map = assign(&tags, true, &axis, &Unit::seconds()).unwrap();
        assert_eq!(map, vec![Some(0), Some(1), None, Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn fit_degenerate() {
        assert!(fit_axis(&[1.0], &Unit::seconds()).is_err());
        assert!(fit_axis(&[0.0, 1.0, 2.0, 3e7], &Unit::seconds()).is_err());
    }
}
