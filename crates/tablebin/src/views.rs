//! Lazy, read-only views that re-index an underlying table.
//!
//! An [`IndexMappedView`] borrows its source and never copies cell values.
//! It implements [`TableLike`] by translating each `(column, row)` lookup
//! into a lookup on the source. Cells that don't map onto the source report
//! the plane's fill value (and therefore carry zero weight).

use crate::axis::BinAxis;
use crate::error::Error;
use crate::sample_width::{SampleWidths, TagWidth};
use crate::table::{Plane, TableLike, TableUnits, missing_value};
use crate::units::Unit;
use core::ops::Range;

/// Describes a view onto new X and Y tags.
///
/// `x_map[i]` is the source column shown as column `i`. Rows are mapped per
/// source segment: `y_maps[s][j]` is the row of source segment `s` that is
/// shown as row `j` (for columns drawn from segment `s`). `None` entries
/// show up as fill. The tags are expressed in the source's units.
#[derive(Clone, Debug, PartialEq)]
pub struct TagMap {
    pub x_tags: Vec<f64>,
    pub x_map: Vec<Option<usize>>,
    pub y_tags: Vec<f64>,
    pub y_maps: Vec<Vec<Option<usize>>>,
}

#[derive(Clone, Debug, PartialEq)]
struct ViewSegment {
    source: usize,
    columns: Range<usize>,
}

#[derive(Clone, Debug, PartialEq)]
enum Transform {
    Identity,
    Window {
        x_offset: usize,
        x_len: usize,
        y_windows: Vec<(usize, usize)>,
        segments: Vec<ViewSegment>,
    },
    Lookup {
        map: TagMap,
        segments: Vec<ViewSegment>,
    },
}

/// A view presenting a re-indexed (and possibly re-planed) source table
#[derive(Clone, Debug)]
pub struct IndexMappedView<'a, T: TableLike + ?Sized> {
    source: &'a T,
    transform: Transform,
    // the source plane presented as Plane::Primary
    plane: Plane,
}

/// Finds the tag nearest to `target`. `sorted` tags are searched with a
/// binary search, anything else with a linear scan.
pub(crate) fn nearest_tag(
    tags: &[f64],
    target: f64,
    sorted: bool,
    width: &TagWidth,
) -> Option<(usize, f64)> {
    let candidates: Box<dyn Iterator<Item = usize>> = if sorted {
        let k = tags.partition_point(|&t| t < target);
        Box::new([k.checked_sub(1), (k < tags.len()).then_some(k)].into_iter().flatten())
    } else {
        Box::new(0..tags.len())
    };
    candidates
        .map(|k| (k, width.distance(tags[k], target)))
        .filter(|(_, d)| !d.is_nan())
        .fold(None, |best, (k, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((k, d)),
        })
}

/// converts the bin centers of `axis` into `units`
pub(crate) fn centers_in(axis: &BinAxis, units: &Unit) -> Result<Vec<f64>, Error> {
    let converter = axis.units().converter(units)?;
    Ok(axis.bin_centers().into_iter().map(|c| converter.apply(c)).collect())
}

impl<'a, T: TableLike + ?Sized> IndexMappedView<'a, T> {
    /// a view that presents the source unchanged
    pub fn new(source: &'a T) -> Self {
        Self {
            source,
            transform: Transform::Identity,
            plane: Plane::Primary,
        }
    }

    /// A window onto columns `x_offset..x_offset + x_len` of the source.
    ///
    /// `y_windows` holds one `(offset, len)` pair per source segment.
    pub fn window(
        source: &'a T,
        x_offset: usize,
        x_len: usize,
        y_windows: Vec<(usize, usize)>,
    ) -> Result<Self, Error> {
        let stop = x_offset.checked_add(x_len).filter(|&stop| stop <= source.x_len());
        let Some(stop) = stop else {
            return Err(Error::precondition(format!(
                "the window {x_offset}..{x_offset}+{x_len} exceeds the {} source columns",
                source.x_len()
            )));
        };
        if y_windows.len() != source.n_segments() {
            return Err(Error::precondition(format!(
                "expected a Y window for each of the {} source segments, got {}",
                source.n_segments(),
                y_windows.len()
            )));
        }
        for (seg, &(y_offset, y_len)) in y_windows.iter().enumerate() {
            if y_offset.checked_add(y_len).is_none_or(|end| end > source.y_len(seg)) {
                return Err(Error::precondition(format!(
                    "the Y window {y_offset}..{y_offset}+{y_len} doesn't lie within the {} rows of \
                     segment {seg}",
                    source.y_len(seg)
                )));
            }
        }

        let segments = (0..source.n_segments())
            .filter_map(|seg| {
                let range = source.segment_range(seg);
                let (lo, hi) = (range.start.max(x_offset), range.end.min(stop));
                (lo < hi).then_some(ViewSegment {
                    source: seg,
                    columns: (lo - x_offset)..(hi - x_offset),
                })
            })
            .collect();
        Ok(Self {
            source,
            transform: Transform::Window {
                x_offset,
                x_len,
                y_windows,
                segments,
            },
            plane: Plane::Primary,
        })
    }

    /// A window onto a range of columns that keeps every row
    pub fn x_window(source: &'a T, x_offset: usize, x_len: usize) -> Result<Self, Error> {
        let y_windows = (0..source.n_segments()).map(|seg| (0, source.y_len(seg))).collect();
        Self::window(source, x_offset, x_len, y_windows)
    }

    /// A view described by an explicit [`TagMap`]
    pub fn tag_map(source: &'a T, map: TagMap) -> Result<Self, Error> {
        if map.x_map.len() != map.x_tags.len() {
            return Err(Error::dimension_mismatch(
                "the X map",
                &[map.x_tags.len()],
                &[map.x_map.len()],
            ));
        } else if map.y_maps.len() != source.n_segments() {
            return Err(Error::dimension_mismatch(
                "the list of Y maps",
                &[source.n_segments()],
                &[map.y_maps.len()],
            ));
        }
        if source.n_segments() == 0 && !map.x_map.is_empty() {
            return Err(Error::precondition("the source holds no segments"));
        } else if map.x_map.iter().flatten().any(|&i| i >= source.x_len()) {
            return Err(Error::precondition("the X map refers to a column that doesn't exist"));
        }
        for (seg, y_map) in map.y_maps.iter().enumerate() {
            if y_map.len() != map.y_tags.len() {
                return Err(Error::dimension_mismatch(
                    "a Y map",
                    &[map.y_tags.len()],
                    &[y_map.len()],
                ));
            } else if y_map.iter().flatten().any(|&j| j >= source.y_len(seg)) {
                return Err(Error::precondition("a Y map refers to a row that doesn't exist"));
            }
        }

        // Each view segment is a run of columns drawn from the same source
        // segment. Unmapped columns join the run before them (or, at the
        // start, the run after them).
        let mut owners: Vec<Option<usize>> = map
            .x_map
            .iter()
            .map(|i| i.map(|i| source.segment_of(i)))
            .collect();
        let first_owner = owners.iter().flatten().next().copied().unwrap_or(0);
        let mut current = first_owner;
        for owner in owners.iter_mut() {
            current = owner.unwrap_or(current);
            *owner = Some(current);
        }
        let mut segments: Vec<ViewSegment> = Vec::new();
        for (i, owner) in owners.into_iter().flatten().enumerate() {
            match segments.last_mut() {
                Some(last) if last.source == owner => last.columns.end = i + 1,
                _ => segments.push(ViewSegment {
                    source: owner,
                    columns: i..(i + 1),
                }),
            }
        }

        Ok(Self {
            source,
            transform: Transform::Lookup { map, segments },
            plane: Plane::Primary,
        })
    }

    /// A view of the source onto the centers of two target axes.
    ///
    /// Each target bin shows the source column (and row) whose tag is nearest
    /// to the bin's center, provided it lies within half a sample width of
    /// it. Bins without such a neighbor show fill.
    pub fn nearest_neighbor(
        source: &'a T,
        x_axis: &BinAxis,
        y_axis: &BinAxis,
        widths: &SampleWidths,
    ) -> Result<Self, Error> {
        let units = source.units();
        let x_tags = centers_in(x_axis, &units.x)?;
        let y_tags = centers_in(y_axis, &units.y)?;

        let source_x = source.x_tags();
        let x_map = x_tags
            .iter()
            .map(|&c| {
                nearest_tag(&source_x, c, true, &widths.x)
                    .filter(|&(_, d)| d <= 0.5 * widths.x.value())
                    .map(|(i, _)| i)
            })
            .collect();
        let y_maps = (0..source.n_segments())
            .map(|seg| {
                let source_y = source.y_tags(seg);
                y_tags
                    .iter()
                    .map(|&c| {
                        nearest_tag(&source_y, c, false, &widths.y)
                            .filter(|&(_, d)| d <= 0.5 * widths.y.value())
                            .map(|(j, _)| j)
                    })
                    .collect()
            })
            .collect();

        tracing::debug!(nx = x_tags.len(), ny = y_tags.len(), "building a nearest-neighbor view");
        Self::tag_map(
            source,
            TagMap {
                x_tags,
                x_map,
                y_tags,
                y_maps,
            },
        )
    }

    /// Presents `plane` of the source as the primary plane (all other planes
    /// keep their names)
    pub fn select_plane(mut self, plane: Plane) -> Result<Self, Error> {
        if !self.source.has_plane(plane) {
            return Err(Error::precondition(format!(
                "the source has no \"{}\" plane",
                plane.name()
            )));
        }
        self.plane = plane;
        Ok(self)
    }

    pub fn source(&self) -> &'a T {
        self.source
    }

    fn resolve(&self, plane: Plane) -> Plane {
        if plane == Plane::Primary { self.plane } else { plane }
    }

    fn view_segment(&self, segment: usize) -> Option<&ViewSegment> {
        match &self.transform {
            Transform::Identity => None,
            Transform::Window { segments, .. } | Transform::Lookup { segments, .. } => {
                segments.get(segment)
            }
        }
    }

    /// the source cell displayed at `(i, j)`, if any
    fn map_cell(&self, i: usize, j: usize) -> Option<(usize, usize)> {
        match &self.transform {
            Transform::Identity => Some((i, j)),
            Transform::Window {
                x_offset,
                y_windows,
                segments,
                ..
            } => {
                let seg = &segments[self.segment_of(i)];
                Some((x_offset + i, y_windows[seg.source].0 + j))
            }
            Transform::Lookup { map, segments } => {
                let seg = &segments[self.segment_of(i)];
                Some((map.x_map[i]?, map.y_maps[seg.source][j]?))
            }
        }
    }
}

impl<T: TableLike + ?Sized> TableLike for IndexMappedView<'_, T> {
    fn units(&self) -> &TableUnits {
        self.source.units()
    }

    fn x_len(&self) -> usize {
        match &self.transform {
            Transform::Identity => self.source.x_len(),
            Transform::Window { x_len, .. } => *x_len,
            Transform::Lookup { map, .. } => map.x_tags.len(),
        }
    }

    fn x_tag(&self, i: usize) -> f64 {
        match &self.transform {
            Transform::Identity => self.source.x_tag(i),
            Transform::Window { x_offset, .. } => self.source.x_tag(x_offset + i),
            Transform::Lookup { map, .. } => map.x_tags[i],
        }
    }

    fn n_segments(&self) -> usize {
        match &self.transform {
            Transform::Identity => self.source.n_segments(),
            Transform::Window { segments, .. } | Transform::Lookup { segments, .. } => {
                segments.len()
            }
        }
    }

    fn segment_range(&self, segment: usize) -> Range<usize> {
        match self.view_segment(segment) {
            Some(seg) => seg.columns.clone(),
            None => self.source.segment_range(segment),
        }
    }

    fn y_len(&self, segment: usize) -> usize {
        match &self.transform {
            Transform::Identity => self.source.y_len(segment),
            Transform::Window {
                y_windows, segments, ..
            } => y_windows[segments[segment].source].1,
            Transform::Lookup { map, .. } => map.y_tags.len(),
        }
    }

    fn y_tag(&self, segment: usize, j: usize) -> f64 {
        match &self.transform {
            Transform::Identity => self.source.y_tag(segment, j),
            Transform::Window {
                y_windows, segments, ..
            } => {
                let source = segments[segment].source;
                self.source.y_tag(source, y_windows[source].0 + j)
            }
            Transform::Lookup { map, .. } => map.y_tags[j],
        }
    }

    fn has_plane(&self, plane: Plane) -> bool {
        self.source.has_plane(self.resolve(plane))
    }

    fn value(&self, plane: Plane, i: usize, j: usize) -> f64 {
        match self.map_cell(i, j) {
            Some((si, sj)) => self.source.value(self.resolve(plane), si, sj),
            None => missing_value(self.source.units(), plane),
        }
    }

    fn x_tag_width(&self) -> Option<TagWidth> {
        match self.transform {
            Transform::Lookup { .. } => None,
            _ => self.source.x_tag_width(),
        }
    }

    fn y_tag_width(&self) -> Option<TagWidth> {
        match self.transform {
            Transform::Lookup { .. } => None,
            _ => self.source.y_tag_width(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_tag_search() {
        let width = TagWidth::Linear(1.0);
        let tags = [0.0, 1.0, 2.0, 4.0];
        assert_eq!(nearest_tag(&tags, 2.75, true, &width), Some((2, 0.75)));
        assert_eq!(nearest_tag(&tags, -5.0, true, &width).map(|t| t.0), Some(0));
        assert_eq!(nearest_tag(&tags, 9.0, true, &width).map(|t| t.0), Some(3));
        assert_eq!(nearest_tag(&[], 9.0, true, &width), None);

        let unsorted = [4.0, 0.0, 2.0];
        assert_eq!(nearest_tag(&unsorted, 3.5, false, &width).map(|t| t.0), Some(0));

        // ties go to the first candidate
        assert_eq!(nearest_tag(&tags, 0.5, true, &width).map(|t| t.0), Some(0));
    }
}
