//! The table data model.
//!
//! A table is a sequence of X columns that is split into contiguous
//! *segments*. Every column of a segment shares the segment's Y tags. Each
//! cell holds a value for every [`Plane`] that the table carries.
//!
//! Rebinners and views only ever talk to a table through the [`TableLike`]
//! trait, so a view can stand in for the table it wraps.

use crate::error::Error;
use crate::sample_width::TagWidth;
use crate::units::Unit;
use core::ops::Range;
use ndarray::Array2;
use std::collections::BTreeMap;

/// Identifies one of the named value planes of a table (the set of planes
/// is closed)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Plane {
    /// the main values
    Primary,
    /// per-cell statistical weights
    Weights,
    /// per-cell peak values (produced by the average-peak rebinner)
    Peaks,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::Primary, Plane::Weights, Plane::Peaks];

    pub fn name(&self) -> &'static str {
        match self {
            Plane::Primary => "",
            Plane::Weights => "weights",
            Plane::Peaks => "peaks",
        }
    }

    pub fn from_name(name: &str) -> Option<Plane> {
        Plane::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// The units of a table's tags and planes
#[derive(Clone, Debug, PartialEq)]
pub struct TableUnits {
    pub x: Unit,
    pub y: Unit,
    pub z: Unit,
    pub weights: Unit,
}

impl TableUnits {
    /// the weights are dimensionless
    pub fn new(x: Unit, y: Unit, z: Unit) -> Self {
        Self {
            x,
            y,
            z,
            weights: Unit::dimensionless(),
        }
    }

    /// the units of the values held by `plane`
    pub fn plane(&self, plane: Plane) -> &Unit {
        match plane {
            Plane::Weights => &self.weights,
            Plane::Primary | Plane::Peaks => &self.z,
        }
    }
}

/// Properties attached to a table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableProperties {
    /// an explicit X sample width (overrides estimation)
    pub x_tag_width: Option<TagWidth>,
    /// an explicit Y sample width (overrides estimation)
    pub y_tag_width: Option<TagWidth>,
    /// `[min, max]` of the input X tags that contributed to each output X
    /// bin (`NaN` where nothing contributed). Set by the average-peak
    /// rebinner.
    pub x_coverage: Option<Vec<[f64; 2]>>,
}

/// A run of X columns that share the same Y tags.
///
/// Each plane is stored as an array of shape `[x_len, y_len]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    y_tags: Vec<f64>,
    planes: BTreeMap<Plane, Array2<f64>>,
}

impl Segment {
    /// creates a segment whose primary plane holds `values`
    pub fn new(y_tags: Vec<f64>, values: Array2<f64>) -> Result<Self, Error> {
        if values.ncols() != y_tags.len() {
            return Err(Error::dimension_mismatch(
                "the primary plane of a segment",
                &[values.nrows(), y_tags.len()],
                values.shape(),
            ));
        }
        let mut planes = BTreeMap::new();
        planes.insert(Plane::Primary, values);
        Ok(Self { y_tags, planes })
    }

    /// adds (or replaces) a plane
    pub fn with_plane(mut self, plane: Plane, data: Array2<f64>) -> Result<Self, Error> {
        let expected = [self.x_len(), self.y_len()];
        if data.shape() != expected {
            return Err(Error::dimension_mismatch(
                format!("the \"{}\" plane of a segment", plane.name()),
                &expected,
                data.shape(),
            ));
        }
        self.planes.insert(plane, data);
        Ok(self)
    }

    pub fn x_len(&self) -> usize {
        self.planes.get(&Plane::Primary).map_or(0, |p| p.nrows())
    }

    pub fn y_len(&self) -> usize {
        self.y_tags.len()
    }

    pub fn y_tags(&self) -> &[f64] {
        &self.y_tags
    }

    pub fn plane(&self, plane: Plane) -> Option<&Array2<f64>> {
        self.planes.get(&plane)
    }

    fn plane_names(&self) -> Vec<Plane> {
        self.planes.keys().copied().collect()
    }
}

/// A concrete, owned table
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    x_tags: Vec<f64>,
    units: TableUnits,
    segments: Vec<Segment>,
    // offsets[k]..offsets[k+1] are the columns of segment k
    offsets: Vec<usize>,
    properties: TableProperties,
}

impl Table {
    /// Assembles a table.
    ///
    /// The X tags must be nondecreasing (and not `NaN`), the segments' column
    /// counts must add up to the number of X tags, and every segment must
    /// carry the same planes.
    pub fn new(x_tags: Vec<f64>, units: TableUnits, segments: Vec<Segment>) -> Result<Self, Error> {
        if x_tags.iter().any(|t| t.is_nan()) {
            return Err(Error::precondition("X tags must not be NaN"));
        } else if !x_tags.is_sorted() {
            return Err(Error::precondition("X tags must be nondecreasing"));
        }

        let mut offsets = Vec::with_capacity(segments.len() + 1);
        offsets.push(0);
        for segment in &segments {
            offsets.push(offsets[offsets.len() - 1] + segment.x_len());
        }
        let n_columns = offsets[offsets.len() - 1];
        if n_columns != x_tags.len() {
            return Err(Error::dimension_mismatch(
                "the concatenated segments",
                &[x_tags.len()],
                &[n_columns],
            ));
        }

        if let Some(first) = segments.first() {
            let expected = first.plane_names();
            for segment in &segments[1..] {
                let actual = segment.plane_names();
                if actual != expected {
                    return Err(Error::dimension_mismatch(
                        "the number of planes in a segment",
                        &[expected.len()],
                        &[actual.len()],
                    ));
                }
            }
        }

        Ok(Self {
            x_tags,
            units,
            segments,
            offsets,
            properties: TableProperties::default(),
        })
    }

    pub fn with_properties(mut self, properties: TableProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn properties(&self) -> &TableProperties {
        &self.properties
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// the data of `plane` for segment `segment`, if the table has the plane
    pub fn plane(&self, segment: usize, plane: Plane) -> Option<&Array2<f64>> {
        self.segments[segment].plane(plane)
    }
}

/// Read access to a table (or to a view of one).
///
/// Columns are addressed by their global index `i` (`0..x_len()`). Rows are
/// addressed within the segment that holds the column.
pub trait TableLike {
    fn units(&self) -> &TableUnits;

    fn x_len(&self) -> usize;

    fn x_tag(&self, i: usize) -> f64;

    fn n_segments(&self) -> usize;

    /// the global column indices belonging to `segment`
    fn segment_range(&self, segment: usize) -> Range<usize>;

    fn y_len(&self, segment: usize) -> usize;

    fn y_tag(&self, segment: usize, j: usize) -> f64;

    fn has_plane(&self, plane: Plane) -> bool;

    /// The value of `plane` at column `i`, row `j`.
    ///
    /// Tables that lack `plane` report the plane's fill value (zero for the
    /// weights plane).
    fn value(&self, plane: Plane, i: usize, j: usize) -> f64;

    fn x_tag_width(&self) -> Option<TagWidth> {
        None
    }

    fn y_tag_width(&self) -> Option<TagWidth> {
        None
    }

    /// the segment holding column `i`
    fn segment_of(&self, i: usize) -> usize {
        let (mut lo, mut hi) = (0, self.n_segments());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.segment_range(mid).end <= i {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// The statistical weight of a cell.
    ///
    /// Cells holding fill have zero weight. Otherwise the weight comes from
    /// the weights plane when there is one and is 1 when there isn't.
    fn weight(&self, i: usize, j: usize) -> f64 {
        if self.units().z.is_fill(self.value(Plane::Primary, i, j)) {
            0.0
        } else if self.has_plane(Plane::Weights) {
            self.value(Plane::Weights, i, j)
        } else {
            1.0
        }
    }

    fn x_tags(&self) -> Vec<f64> {
        (0..self.x_len()).map(|i| self.x_tag(i)).collect()
    }

    fn y_tags(&self, segment: usize) -> Vec<f64> {
        (0..self.y_len(segment)).map(|j| self.y_tag(segment, j)).collect()
    }
}

impl TableLike for Table {
    fn units(&self) -> &TableUnits {
        &self.units
    }

    fn x_len(&self) -> usize {
        self.x_tags.len()
    }

    fn x_tag(&self, i: usize) -> f64 {
        self.x_tags[i]
    }

    fn n_segments(&self) -> usize {
        self.segments.len()
    }

    fn segment_range(&self, segment: usize) -> Range<usize> {
        self.offsets[segment]..self.offsets[segment + 1]
    }

    fn y_len(&self, segment: usize) -> usize {
        self.segments[segment].y_len()
    }

    fn y_tag(&self, segment: usize, j: usize) -> f64 {
        self.segments[segment].y_tags[j]
    }

    fn has_plane(&self, plane: Plane) -> bool {
        self.segments.first().is_some_and(|s| s.planes.contains_key(&plane))
    }

    fn value(&self, plane: Plane, i: usize, j: usize) -> f64 {
        let segment = self.segment_of(i);
        match self.segments[segment].plane(plane) {
            Some(data) => data[[i - self.offsets[segment], j]],
            None => missing_value(&self.units, plane),
        }
    }

    fn x_tag_width(&self) -> Option<TagWidth> {
        self.properties.x_tag_width
    }

    fn y_tag_width(&self) -> Option<TagWidth> {
        self.properties.y_tag_width
    }

    fn x_tags(&self) -> Vec<f64> {
        self.x_tags.clone()
    }
}

/// the value reported for a cell that holds no data
pub(crate) fn missing_value(units: &TableUnits, plane: Plane) -> f64 {
    match plane {
        Plane::Weights => 0.0,
        Plane::Primary | Plane::Peaks => units.z.fill_value(),
    }
}

/// Read-only weights view over any table.
///
/// Every rebinner reads cell weights through this view. See
/// [`TableLike::weight`] for how weights are derived.
pub struct WeightsView<'a, T: TableLike + ?Sized> {
    table: &'a T,
}

impl<'a, T: TableLike + ?Sized> WeightsView<'a, T> {
    pub fn new(table: &'a T) -> Self {
        Self { table }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.table.weight(i, j)
    }
}
