//! Assembles a [`Table`] from scattered `(x, y, z)` samples.

use crate::error::Error;
use crate::table::{Plane, Segment, Table, TableProperties, TableUnits, missing_value};
use ndarray::Array2;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
struct Entry {
    x: f64,
    y: f64,
    values: Vec<(Plane, f64)>,
}

/// the distinct y values of a column (whose entries are sorted by y)
fn y_set(column: &[Entry]) -> Vec<f64> {
    let mut ys: Vec<f64> = column.iter().map(|e| e.y).collect();
    ys.dedup();
    ys
}

/// Collects samples and turns them into a table.
///
/// The X tags of the table are the sorted distinct x values. Consecutive
/// columns that hold the same set of y values are grouped into a segment.
/// Cells without a sample hold the plane's fill value (zero weight). When the
/// same `(x, y)` pair is inserted more than once, the last insertion wins.
#[derive(Clone, Debug)]
pub struct TableBuilder {
    units: TableUnits,
    properties: TableProperties,
    entries: Vec<Entry>,
}

impl TableBuilder {
    pub fn new(units: TableUnits) -> Self {
        Self {
            units,
            properties: TableProperties::default(),
            entries: Vec::new(),
        }
    }

    pub fn properties(mut self, properties: TableProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn insert(&mut self, x: f64, y: f64, z: f64) -> &mut Self {
        self.insert_planes(x, y, &[(Plane::Primary, z)])
    }

    /// Records values for several planes of the same cell. Planes that are
    /// never given a value for a cell hold fill there.
    pub fn insert_planes(&mut self, x: f64, y: f64, values: &[(Plane, f64)]) -> &mut Self {
        // adding zero folds -0.0 into 0.0
        self.entries.push(Entry {
            x: x + 0.0,
            y: y + 0.0,
            values: values.to_vec(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> Result<Table, Error> {
        if self.entries.iter().any(|e| !e.x.is_finite() || !e.y.is_finite()) {
            return Err(Error::precondition("every x and y tag must be finite"));
        }
        let mut planes: Vec<Plane> = self
            .entries
            .iter()
            .flat_map(|e| e.values.iter().map(|(p, _)| *p))
            .collect();
        planes.push(Plane::Primary);
        planes.sort();
        planes.dedup();

        // a stable sort keeps repeated insertions in order
        let mut entries = self.entries;
        entries.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));

        // group the entries by column
        let mut columns: Vec<(f64, Vec<Entry>)> = Vec::new();
        for entry in entries {
            match columns.last_mut() {
                Some((x, column)) if *x == entry.x => column.push(entry),
                _ => columns.push((entry.x, vec![entry])),
            }
        }

        let mut x_tags = Vec::with_capacity(columns.len());
        let mut segments = Vec::new();
        let mut start = 0;
        while start < columns.len() {
            let y_tags = y_set(&columns[start].1);
            let mut stop = start + 1;
            while stop < columns.len() && y_set(&columns[stop].1) == y_tags {
                stop += 1;
            }

            let row_of: BTreeMap<u64, usize> = y_tags
                .iter()
                .enumerate()
                .map(|(j, y)| (y.to_bits(), j))
                .collect();
            let mut data: BTreeMap<Plane, Array2<f64>> = planes
                .iter()
                .map(|&p| {
                    let fill = missing_value(&self.units, p);
                    (p, Array2::from_elem((stop - start, y_tags.len()), fill))
                })
                .collect();
            for (i, (x, column)) in columns[start..stop].iter().enumerate() {
                x_tags.push(*x);
                for entry in column {
                    let j = row_of[&entry.y.to_bits()];
                    for &(plane, value) in &entry.values {
                        if let Some(array) = data.get_mut(&plane) {
                            array[[i, j]] = value;
                        }
                    }
                }
            }

            let mut planes_iter = data.into_iter();
            let mut segment = match planes_iter.next() {
                Some((Plane::Primary, values)) => Segment::new(y_tags, values)?,
                _ => return Err(Error::precondition("the primary plane is missing")),
            };
            for (plane, array) in planes_iter {
                segment = segment.with_plane(plane, array)?;
            }
            segments.push(segment);
            start = stop;
        }

        Ok(Table::new(x_tags, self.units, segments)?.with_properties(self.properties))
    }
}
