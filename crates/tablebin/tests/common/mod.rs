// the reason this is named mod.rs has to do with how cargo treats
// subdirectories of tests/ (they are not compiled as their own test crates)
//
// https://doc.rust-lang.org/book/ch11-03-test-organization.html#submodules-in-integration-tests

#![allow(dead_code)]

use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tablebin::{Plane, Segment, Table, TableLike, TableUnits, Unit};

// based on numpy!
// https://numpy.org/doc/stable/reference/generated/numpy.isclose.html
pub fn isclose(actual: f64, ref_val: f64, rtol: f64, atol: f64) -> bool {
    let actual_nan = actual.is_nan();
    let ref_nan = ref_val.is_nan();
    if actual_nan || ref_nan {
        actual_nan && ref_nan
    } else {
        (actual - ref_val).abs() <= (atol + rtol * ref_val.abs())
    }
}

pub fn assert_isclose(actual: f64, ref_val: f64, what: &str) {
    assert!(
        isclose(actual, ref_val, 1e-12, 1e-12),
        "{what}: expected {ref_val}, got {actual}"
    );
}

/// seconds along X, hertz along Y, dimensionless values
pub fn time_freq_units() -> TableUnits {
    TableUnits::new(Unit::seconds(), Unit::hertz(), Unit::dimensionless())
}

/// a single-segment table whose values come from `f(x_tag, y_tag)`
pub fn table_from_fn(x_tags: &[f64], y_tags: &[f64], f: impl Fn(f64, f64) -> f64) -> Table {
    let shape = (x_tags.len(), y_tags.len());
    let values = Array2::from_shape_fn(shape, |(i, j)| f(x_tags[i], y_tags[j]));
    let segment = Segment::new(y_tags.to_vec(), values).unwrap();
    Table::new(x_tags.to_vec(), time_freq_units(), vec![segment]).unwrap()
}

/// a single-segment table holding uniformly distributed random values
pub fn random_table(x_tags: &[f64], y_tags: &[f64], seed: u64) -> Table {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let shape = (x_tags.len(), y_tags.len());
    let values = Array2::from_shape_simple_fn(shape, || rng.random_range(-5.0..5.0));
    let segment = Segment::new(y_tags.to_vec(), values).unwrap();
    Table::new(x_tags.to_vec(), time_freq_units(), vec![segment]).unwrap()
}

/// every value of `plane`, as an `[x_len, y_len]` array. The table must have
/// a single segment.
pub fn plane_values(table: &impl TableLike, plane: Plane) -> Array2<f64> {
    assert_eq!(table.n_segments(), 1);
    Array2::from_shape_fn((table.x_len(), table.y_len(0)), |(i, j)| table.value(plane, i, j))
}
