//! Resolves the geometry of a single rebin call and maps input cells onto
//! output bins.
//!
//! Everything here is computed once per call (in [`Geometry::new`] and
//! [`RebinContext::new`]) and dropped when the call returns. The rebinners
//! themselves hold nothing but their options.

use crate::axis::BinAxis;
use crate::error::Error;
use crate::options::{BinningMode, RebinOptions};
use crate::sample_width::{SampleWidths, TagWidth};
use crate::table::{Plane, Segment, Table, TableLike, TableProperties, TableUnits, WeightsView};
use ndarray::{Array2, Zip};
use tablebin_internal::{AxisBins, Datum, EdgePolicy, NO_BIN, cell_ranges, overlap_bins};

/// Where an input tag lies relative to an output axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Inside,
    /// in the virtual bin just before the first bin
    Before,
    /// in the virtual bin just after the last bin
    After,
    /// anywhere else (including unusable tags)
    Beyond,
}

/// The four edges of the output grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Edge {
    XMin,
    XMax,
    YMin,
    YMax,
}

impl Edge {
    pub(crate) const ALL: [Edge; 4] = [Edge::XMin, Edge::XMax, Edge::YMin, Edge::YMax];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    fn from_side(side: Side, lower: Edge, upper: Edge) -> Option<Edge> {
        match side {
            Side::Before => Some(lower),
            Side::After => Some(upper),
            Side::Inside | Side::Beyond => None,
        }
    }
}

/// the index of the corner touched by an X edge and a Y edge
pub(crate) fn corner_index(x_edge: Edge, y_edge: Edge) -> usize {
    2 * usize::from(x_edge == Edge::XMax) + usize::from(y_edge == Edge::YMax)
}

/// Identifies the accumulator that receives a contribution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Target {
    /// the flattened `ix * ny + iy` index of an output cell
    Bin(usize),
    /// the virtual bins just past an edge, indexed along the edge
    Edge(Edge, usize),
    /// the virtual bin just past a corner (see [`corner_index`])
    Corner(usize),
}

pub(crate) fn usable_tag(bins: &AxisBins, tag: f64) -> bool {
    tag.is_finite() && (!bins.is_log() || tag > 0.0)
}

/// the internal coordinate of a cell boundary
fn internal_bound(bins: &AxisBins, value: f64) -> f64 {
    if bins.is_log() && value <= 0.0 {
        f64::NEG_INFINITY
    } else {
        bins.to_internal(value)
    }
}

/// A sparse mapping from the cells along one input axis to output bins.
///
/// The mapping is stored in compressed form: the targets of input `i` are
/// `targets[offsets[i]..offsets[i + 1]]`.
#[derive(Clone, Debug)]
pub(crate) struct AxisMapping {
    offsets: Vec<usize>,
    targets: Vec<(usize, f64)>,
    sides: Vec<Side>,
}

impl AxisMapping {
    /// input `i` maps onto output `i` with unit weight
    pub(crate) fn identity(n: usize) -> Self {
        Self {
            offsets: (0..=n).collect(),
            targets: (0..n).map(|i| (i, 1.0)).collect(),
            sides: vec![Side::Inside; n],
        }
    }

    /// Maps `tags` (already expressed in the axis's units, in any order) onto
    /// the bins of an axis.
    pub(crate) fn from_axis(
        tags: &[f64],
        width: TagWidth,
        bins: &AxisBins,
        mode: BinningMode,
    ) -> Result<Self, Error> {
        let n = tags.len();
        let mut per_input: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];

        match mode {
            BinningMode::Point => {
                for (i, &tag) in tags.iter().enumerate() {
                    let index = bins.bin_index(tag, EdgePolicy::Sentinel);
                    if index != NO_BIN && usable_tag(bins, tag) {
                        per_input[i].push((index as usize, 1.0));
                    }
                }
            }
            BinningMode::Overlap => {
                // the sweep needs the cells in ascending order
                let mut order: Vec<usize> = (0..n).filter(|&i| usable_tag(bins, tags[i])).collect();
                order.sort_by(|&a, &b| tags[a].total_cmp(&tags[b]));
                let coords: Vec<f64> = order.iter().map(|&i| bins.to_internal(tags[i])).collect();

                let ranges = cell_ranges(&coords, |coord| {
                    let [lo, hi] = width.extent(bins.from_internal(coord));
                    [internal_bound(bins, lo), internal_bound(bins, hi)]
                })
                .map_err(Error::precondition)?;
                let pairs = overlap_bins(&ranges, &bins.internal_edges())
                    .map_err(Error::precondition)?;
                for k in 0..pairs.len() {
                    let target = (pairs.output_index[k], pairs.weight[k]);
                    per_input[order[pairs.input_index[k]]].push(target);
                }
            }
        }

        let n_bins = bins.n_bins() as i64;
        let sides = tags
            .iter()
            .map(|&tag| {
                if !usable_tag(bins, tag) {
                    return Side::Beyond;
                }
                match bins.bin_index(tag, EdgePolicy::Extrapolate) as i64 {
                    -1 => Side::Before,
                    index if index == n_bins => Side::After,
                    index if (0..n_bins).contains(&index) => Side::Inside,
                    _ => Side::Beyond,
                }
            })
            .collect();

        let mut offsets = Vec::with_capacity(n + 1);
        offsets.push(0);
        let mut targets = Vec::new();
        for list in per_input {
            targets.extend(list);
            offsets.push(targets.len());
        }
        Ok(Self {
            offsets,
            targets,
            sides,
        })
    }

    #[inline]
    pub(crate) fn targets(&self, i: usize) -> &[(usize, f64)] {
        &self.targets[self.offsets[i]..self.offsets[i + 1]]
    }

    #[inline]
    pub(crate) fn side(&self, i: usize) -> Side {
        self.sides[i]
    }
}

/// A sample width expressed in an axis's internal coordinate.
///
/// Converting between linear and ratiometric widths depends on where you
/// are on the axis. We evaluate the conversion at the middle of the axis.
pub(crate) fn internal_width(width: TagWidth, bins: &AxisBins) -> f64 {
    let middle = 0.5 * (bins.to_internal(bins.min()) + bins.to_internal(bins.max()));
    let center = bins.from_internal(middle);
    match (width, bins.is_log()) {
        (TagWidth::Ratio(r), true) => r,
        (TagWidth::Linear(w), false) => w,
        (TagWidth::Linear(w), true) if center > 0.5 * w => {
            ((center + 0.5 * w) / (center - 0.5 * w)).ln()
        }
        (TagWidth::Linear(_), true) => f64::INFINITY,
        (TagWidth::Ratio(r), false) => 2.0 * center.abs() * (0.5 * r).sinh(),
    }
}

/// Positions of the source tags when an axis passes through unchanged. They
/// are measured the same way as `width` so that spans can be compared against
/// it.
fn identity_positions(tags: &[f64], width: TagWidth) -> Vec<f64> {
    match width {
        TagWidth::Linear(_) => tags.to_vec(),
        TagWidth::Ratio(_) => tags
            .iter()
            .map(|&t| if t > 0.0 { t.ln() } else { f64::NAN })
            .collect(),
    }
}

/// The shape and units of a rebin call's output, along with the source tags
/// converted into the output units.
///
/// This also performs all of the validation that is common to every
/// rebinner.
pub(crate) struct Geometry<'a> {
    pub x_axis: Option<&'a BinAxis>,
    pub y_axis: Option<&'a BinAxis>,
    /// the source X tags, in the output X units
    pub x_tags: Vec<f64>,
    /// the Y tags of each source segment, in the output Y units
    pub y_tags: Vec<Vec<f64>>,
    pub x_width: TagWidth,
    pub y_width: TagWidth,
    pub nx: usize,
    pub ny: usize,
    pub units: TableUnits,
    // a segment holding at least one column
    reference_segment: usize,
}

impl<'a> Geometry<'a> {
    pub(crate) fn new(
        table: &dyn TableLike,
        x_axis: Option<&'a BinAxis>,
        y_axis: Option<&'a BinAxis>,
        widths: &SampleWidths,
    ) -> Result<Self, Error> {
        if table.x_len() == 0 {
            return Err(Error::precondition("the source table holds no columns"));
        }
        let reference_segment = table.segment_of(0);
        let n_segments = table.n_segments();

        if y_axis.is_none() {
            let reference = table.y_tags(reference_segment);
            let differs = (0..n_segments)
                .filter(|&seg| !table.segment_range(seg).is_empty())
                .any(|seg| table.y_tags(seg) != reference);
            if differs {
                return Err(Error::ambiguous_y_geometry(n_segments));
            }
        }

        let source_units = table.units();
        let x_units = x_axis.map_or(&source_units.x, |axis| axis.units());
        let y_units = y_axis.map_or(&source_units.y, |axis| axis.units());
        let x_converter = source_units.x.converter(x_units)?;
        let y_converter = source_units.y.converter(y_units)?;

        let x_tags: Vec<f64> = (0..table.x_len())
            .map(|i| x_converter.apply(table.x_tag(i)))
            .collect();
        let y_tags: Vec<Vec<f64>> = (0..n_segments)
            .map(|seg| {
                (0..table.y_len(seg))
                    .map(|j| y_converter.apply(table.y_tag(seg, j)))
                    .collect()
            })
            .collect();
        let x_width = widths.x.to_units(&source_units.x, x_units)?;
        let y_width = widths.y.to_units(&source_units.y, y_units)?;

        if let Some(axis) = x_axis {
            let finite = x_tags.iter().copied().filter(|t| t.is_finite());
            let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
                (lo.min(t), hi.max(t))
            });
            let source = [x_width.extent(min)[0], x_width.extent(max)[1]];
            // written so that NaN (no usable tags) lands in the error branch
            if !(source[1] > axis.start() && source[0] < axis.end()) {
                return Err(Error::no_data_in_range(source, [axis.start(), axis.end()]));
            }
        }

        let nx = x_axis.map_or(table.x_len(), |axis| axis.n_bins());
        let ny = y_axis.map_or(table.y_len(reference_segment), |axis| axis.n_bins());
        let units = TableUnits {
            x: x_units.clone(),
            y: y_units.clone(),
            z: source_units.z.clone(),
            weights: source_units.weights.clone(),
        };

        Ok(Self {
            x_axis,
            y_axis,
            x_tags,
            y_tags,
            x_width,
            y_width,
            nx,
            ny,
            units,
            reference_segment,
        })
    }

    /// the X tags of the output table
    pub(crate) fn output_x_tags(&self) -> Vec<f64> {
        self.x_axis.map_or_else(|| self.x_tags.clone(), |axis| axis.bin_centers())
    }

    /// the Y tags of the output table
    pub(crate) fn output_y_tags(&self) -> Vec<f64> {
        self.y_axis.map_or_else(
            || self.y_tags[self.reference_segment].clone(),
            |axis| axis.bin_centers(),
        )
    }

    /// wraps the output planes (each with shape `[nx, ny]`) in a
    /// single-segment table
    pub(crate) fn build_table(
        &self,
        primary: Array2<f64>,
        others: Vec<(Plane, Array2<f64>)>,
        properties: TableProperties,
    ) -> Result<Table, Error> {
        let mut segment = Segment::new(self.output_y_tags(), primary)?;
        for (plane, data) in others {
            segment = segment.with_plane(plane, data)?;
        }
        let table = Table::new(self.output_x_tags(), self.units.clone(), vec![segment])?;
        Ok(table.with_properties(properties))
    }
}

/// replaces the values of empty (zero-weight) cells with `fill`
pub(crate) fn apply_fill(values: &mut Array2<f64>, weights: &Array2<f64>, fill: f64) {
    Zip::from(values).and(weights).for_each(|value, &weight| {
        if !(weight > 0.0) || value.is_nan() {
            *value = fill;
        }
    });
}

/// [`Geometry`] plus the input-to-output mappings and the gap-filling
/// parameters of a rebin call
pub(crate) struct RebinContext<'a> {
    pub geometry: Geometry<'a>,
    pub x_map: AxisMapping,
    pub y_maps: Vec<AxisMapping>,
    /// positions of the output X bins (see [`internal_width`])
    pub x_positions: Vec<f64>,
    pub y_positions: Vec<f64>,
    /// the largest span, in the same coordinate as the positions, that X
    /// interpolation may bridge
    pub x_span: f64,
    pub y_span: f64,
}

impl<'a> RebinContext<'a> {
    pub(crate) fn new(geometry: Geometry<'a>, options: &RebinOptions) -> Result<Self, Error> {
        let (x_map, x_positions, x_width) = match geometry.x_axis {
            Some(axis) => {
                let bins = axis.bins();
                (
                    AxisMapping::from_axis(
                        &geometry.x_tags,
                        geometry.x_width,
                        bins,
                        options.binning,
                    )?,
                    (0..bins.n_bins() as i64).map(|i| bins.internal_center(i)).collect(),
                    internal_width(geometry.x_width, bins),
                )
            }
            None => (
                AxisMapping::identity(geometry.x_tags.len()),
                identity_positions(&geometry.x_tags, geometry.x_width),
                geometry.x_width.value(),
            ),
        };

        let y_maps = geometry
            .y_tags
            .iter()
            .map(|tags| match geometry.y_axis {
                Some(axis) => {
                    AxisMapping::from_axis(tags, geometry.y_width, axis.bins(), options.binning)
                }
                None => Ok(AxisMapping::identity(tags.len())),
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let (y_positions, y_width) = match geometry.y_axis {
            Some(axis) => {
                let bins = axis.bins();
                (
                    (0..bins.n_bins() as i64).map(|i| bins.internal_center(i)).collect(),
                    internal_width(geometry.y_width, bins),
                )
            }
            None => (
                identity_positions(&geometry.y_tags[geometry.reference_segment], geometry.y_width),
                geometry.y_width.value(),
            ),
        };

        let x_span = x_width * options.x_gap_fudge;
        let y_span = y_width * options.y_fudge(geometry.y_width.is_ratiometric());
        Ok(Self {
            geometry,
            x_map,
            y_maps,
            x_positions,
            y_positions,
            x_span,
            y_span,
        })
    }

    /// Feeds every valid cell of `plane` to `f`.
    ///
    /// `f` receives the accumulator that a contribution goes to, the
    /// contribution itself and the index of the input column. When
    /// `boundaries` is set, cells lying in the virtual bins just outside the
    /// grid are reported as well.
    pub(crate) fn visit(
        &self,
        table: &dyn TableLike,
        plane: Plane,
        boundaries: bool,
        mut f: impl FnMut(Target, Datum, usize),
    ) {
        let weights = WeightsView::new(table);
        let z_units = &table.units().z;
        let ny = self.geometry.ny;

        for (seg, y_map) in self.y_maps.iter().enumerate() {
            for i in table.segment_range(seg) {
                let x_targets = self.x_map.targets(i);
                let x_edge = Edge::from_side(self.x_map.side(i), Edge::XMin, Edge::XMax);
                if x_targets.is_empty() && !(boundaries && x_edge.is_some()) {
                    continue;
                }

                for j in 0..table.y_len(seg) {
                    let weight = weights.get(i, j);
                    if !(weight > 0.0) {
                        continue;
                    }
                    let value = table.value(plane, i, j);
                    if z_units.is_fill(value) {
                        continue;
                    }

                    let y_targets = y_map.targets(j);
                    for &(ix, wx) in x_targets {
                        for &(iy, wy) in y_targets {
                            let datum = Datum {
                                value,
                                weight: weight * wx * wy,
                            };
                            f(Target::Bin(ix * ny + iy), datum, i);
                        }
                    }

                    if !boundaries {
                        continue;
                    }
                    let y_edge = Edge::from_side(y_map.side(j), Edge::YMin, Edge::YMax);
                    if let Some(edge) = x_edge {
                        for &(iy, wy) in y_targets {
                            let datum = Datum {
                                value,
                                weight: weight * wy,
                            };
                            f(Target::Edge(edge, iy), datum, i);
                        }
                    }
                    if let Some(edge) = y_edge {
                        for &(ix, wx) in x_targets {
                            let datum = Datum {
                                value,
                                weight: weight * wx,
                            };
                            f(Target::Edge(edge, ix), datum, i);
                        }
                    }
                    if let (Some(xe), Some(ye)) = (x_edge, y_edge) {
                        f(Target::Corner(corner_index(xe, ye)), Datum { value, weight }, i);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_weight(mapping: &AxisMapping, n_in: usize, n_out: usize) -> Vec<f64> {
        let mut out = vec![0.0; n_out];
        for i in 0..n_in {
            for &(o, w) in mapping.targets(i) {
                out[o] += w;
            }
        }
        out
    }

    #[test]
    fn overlap_mapping() {
        let bins = AxisBins::new(0.0, 4.0, 2, false).unwrap();
        let tags = [0.0, 1.0, 2.0, 3.0, 4.0];
        let mapping =
            AxisMapping::from_axis(&tags, TagWidth::Linear(1.0), &bins, BinningMode::Overlap)
                .unwrap();

        assert_eq!(mapping.targets(0), &[(0, 0.25)]);
        assert_eq!(mapping.targets(1), &[(0, 0.5)]);
        assert_eq!(mapping.targets(2), &[(0, 0.25), (1, 0.25)]);
        assert_eq!(mapping.targets(4), &[(1, 0.25)]);
        assert_eq!(total_weight(&mapping, 5, 2), vec![1.0, 1.0]);
        assert_eq!(mapping.side(0), Side::Inside);
        assert_eq!(mapping.side(4), Side::After);
    }

    #[test]
    fn overlap_mapping_unsorted_tags() {
        let bins = AxisBins::new(0.0, 4.0, 2, false).unwrap();
        let mapping = AxisMapping::from_axis(
            &[3.0, 1.0, f64::NAN],
            TagWidth::Linear(2.0),
            &bins,
            BinningMode::Overlap,
        )
        .unwrap();
        // the two cells meet at the midpoint between their tags
        assert_eq!(mapping.targets(0), &[(1, 1.0)]);
        assert_eq!(mapping.targets(1), &[(0, 1.0)]);
        assert!(mapping.targets(2).is_empty());
        assert_eq!(mapping.side(2), Side::Beyond);
    }

    #[test]
    fn point_mapping() {
        let bins = AxisBins::new(0.0, 4.0, 2, false).unwrap();
        let tags = [-1.5, 0.5, 2.0, 4.0, 9.0];
        let mapping =
            AxisMapping::from_axis(&tags, TagWidth::Linear(1.0), &bins, BinningMode::Point)
                .unwrap();
        assert!(mapping.targets(0).is_empty());
        assert_eq!(mapping.targets(1), &[(0, 1.0)]);
        assert_eq!(mapping.targets(2), &[(1, 1.0)]);
        assert!(mapping.targets(3).is_empty());
        assert_eq!(mapping.side(0), Side::Before);
        assert_eq!(mapping.side(3), Side::After);
        assert_eq!(mapping.side(4), Side::Beyond);
    }

    #[test]
    fn log_mapping_drops_non_positive_tags() {
        let bins = AxisBins::new(1.0, 16.0, 4, true).unwrap();
        let tags = [-1.0, 0.0, 2.0, 8.0];
        let width = TagWidth::Ratio(2.0_f64.ln());
        let mapping =
            AxisMapping::from_axis(&tags, width, &bins, BinningMode::Overlap).unwrap();
        assert!(mapping.targets(0).is_empty());
        assert!(mapping.targets(1).is_empty());
        assert_eq!(mapping.side(0), Side::Beyond);
        // 2 covers [sqrt(2), 2 sqrt(2)) which is half of bin 0 and half of bin 1
        let weights: Vec<f64> = mapping.targets(2).iter().map(|&(_, w)| w).collect();
        assert_eq!(mapping.targets(2).len(), 2);
        assert!(weights.iter().all(|&w| (w - 0.5).abs() < 1e-12));
    }

    #[test]
    fn width_conversion() {
        let log_bins = AxisBins::new(1.0, 100.0, 2, true).unwrap();
        assert_eq!(internal_width(TagWidth::Ratio(0.5), &log_bins), 0.5);
        // the middle of this axis is 10
        let w = internal_width(TagWidth::Linear(2.0), &log_bins);
        assert!((w - (11.0_f64 / 9.0).ln()).abs() < 1e-12);
        assert_eq!(internal_width(TagWidth::Linear(100.0), &log_bins), f64::INFINITY);

        let bins = AxisBins::new(0.0, 4.0, 2, false).unwrap();
        assert_eq!(internal_width(TagWidth::Linear(2.0), &bins), 2.0);
        let w = internal_width(TagWidth::Ratio(0.1), &bins);
        assert!((w - 4.0 * 0.05_f64.sinh()).abs() < 1e-12);
    }
}
