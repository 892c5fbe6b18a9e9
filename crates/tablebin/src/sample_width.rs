//! Sample widths, and the heuristics that estimate them from tags.
//!
//! A sample width describes how much of an axis a single tag "covers". It is
//! either linear (an interval in the tag's units) or ratiometric (the natural
//! log of the ratio between the upper and lower edge of a cell). The
//! rebinners never estimate widths themselves: callers estimate them here (or
//! supply their own) and pass them in through [`SampleWidths`].

use crate::error::Error;
use crate::table::TableLike;
use crate::units::Unit;

/// The width of a single sample along one axis
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TagWidth {
    /// an interval, in the units of the tags
    Linear(f64),
    /// the natural log of a ratio
    Ratio(f64),
}

impl TagWidth {
    /// Interprets a width quantity that was expressed in `width_units`, for
    /// tags measured in `tag_units`.
    ///
    /// Ratiometric units produce a [`TagWidth::Ratio`]. Anything else must be
    /// convertible to `tag_units`.
    pub fn from_quantity(value: f64, width_units: &Unit, tag_units: &Unit) -> Result<Self, Error> {
        if !(value.is_finite() && value > 0.0) {
            return Err(Error::precondition("a sample width must be finite and positive"));
        }
        if width_units.is_ratiometric() {
            Ok(TagWidth::Ratio(width_units.convert(value, &Unit::log_e_ratio())?))
        } else {
            let converter = width_units.converter(tag_units)?;
            Ok(TagWidth::Linear(converter.apply_interval(value)))
        }
    }

    /// the magnitude of the width (an interval, or a natural-log ratio)
    pub fn value(&self) -> f64 {
        match self {
            TagWidth::Linear(w) | TagWidth::Ratio(w) => *w,
        }
    }

    pub fn is_ratiometric(&self) -> bool {
        matches!(self, TagWidth::Ratio(_))
    }

    /// The separation between two tags, measured the same way as the width.
    /// Ratiometric separations involving non-positive tags are infinite.
    pub fn distance(&self, a: f64, b: f64) -> f64 {
        match self {
            TagWidth::Linear(_) => (a - b).abs(),
            TagWidth::Ratio(_) if a > 0.0 && b > 0.0 => (a / b).ln().abs(),
            TagWidth::Ratio(_) => f64::INFINITY,
        }
    }

    /// The nominal `[lo, hi)` extent of a cell centered on `tag`.
    ///
    /// A ratiometric extent is empty for a non-positive tag.
    pub fn extent(&self, tag: f64) -> [f64; 2] {
        match self {
            TagWidth::Linear(w) => [tag - 0.5 * w, tag + 0.5 * w],
            TagWidth::Ratio(r) if tag > 0.0 => [tag * (-0.5 * r).exp(), tag * (0.5 * r).exp()],
            TagWidth::Ratio(_) => [tag, tag],
        }
    }

    /// re-expresses a width for tags measured in `from`, as a width for tags
    /// measured in `to`
    pub(crate) fn to_units(self, from: &Unit, to: &Unit) -> Result<Self, Error> {
        match self {
            TagWidth::Linear(w) => Ok(TagWidth::Linear(from.converter(to)?.apply_interval(w))),
            TagWidth::Ratio(_) => Ok(self),
        }
    }
}

/// The X and Y sample widths handed to a rebinner
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleWidths {
    pub x: TagWidth,
    pub y: TagWidth,
}

impl SampleWidths {
    pub fn new(x: TagWidth, y: TagWidth) -> Self {
        Self { x, y }
    }

    /// Estimates both widths with [`guess_x_width`] and [`guess_y_width`]
    pub fn estimate(table: &(impl TableLike + ?Sized)) -> Result<Self, Error> {
        let x = guess_x_width(table).ok_or_else(|| {
            Error::precondition("unable to estimate the X sample width (too few distinct X tags)")
        })?;
        let y = guess_y_width(table).ok_or_else(|| {
            Error::precondition("unable to estimate the Y sample width (too few distinct Y tags)")
        })?;
        Ok(Self { x, y })
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// (max - min) / median, which is zero for perfectly regular spacing
fn relative_spread(values: &mut [f64]) -> f64 {
    let mid = median(values);
    // median sorted the values
    (values[values.len() - 1] - values[0]) / mid
}

/// Guesses the width of samples from a sequence of tags (in any order).
///
/// The linear guess is the median positive separation between consecutive
/// (sorted) tags. When every tag is positive we also consider the median
/// log-ratio between consecutive tags and prefer it when the ratios are more
/// regular than the separations. Returns `None` when there are fewer than two
/// distinct finite tags.
pub fn guess_width(tags: &[f64]) -> Option<TagWidth> {
    let mut sorted: Vec<f64> = tags.iter().copied().filter(|t| t.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut deltas: Vec<f64> = sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&d| d > 0.0)
        .collect();
    if deltas.is_empty() {
        return None;
    }

    if sorted[0] > 0.0 && deltas.len() > 1 {
        let mut ratios: Vec<f64> = sorted
            .windows(2)
            .filter(|w| w[1] > w[0])
            .map(|w| (w[1] / w[0]).ln())
            .collect();
        let linear_spread = relative_spread(&mut deltas);
        let ratio_spread = relative_spread(&mut ratios);
        if ratio_spread < linear_spread {
            return Some(TagWidth::Ratio(median(&mut ratios)));
        }
    }
    Some(TagWidth::Linear(median(&mut deltas)))
}

/// The table's explicit X tag width if it has one, otherwise a guess made
/// from the X tags
pub fn guess_x_width(table: &(impl TableLike + ?Sized)) -> Option<TagWidth> {
    table.x_tag_width().or_else(|| guess_width(&table.x_tags()))
}

/// The table's explicit Y tag width if it has one, otherwise a guess made
/// from the Y tags.
///
/// Each segment is guessed separately. The result is the largest guess among
/// the segments whose guess has the same form as the first segment's guess.
pub fn guess_y_width(table: &(impl TableLike + ?Sized)) -> Option<TagWidth> {
    if let Some(width) = table.y_tag_width() {
        return Some(width);
    }
    let mut guesses = (0..table.n_segments()).filter_map(|seg| guess_width(&table.y_tags(seg)));
    let first = guesses.next()?;
    Some(guesses.fold(first, |best, guess| match (best, guess) {
        (TagWidth::Linear(a), TagWidth::Linear(b)) => TagWidth::Linear(a.max(b)),
        (TagWidth::Ratio(a), TagWidth::Ratio(b)) => TagWidth::Ratio(a.max(b)),
        _ => best,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_regular_linear() {
        let tags: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();
        assert_eq!(guess_width(&tags), Some(TagWidth::Linear(2.0)));

        // order and duplicates don't matter
        let tags = [4.0, 0.0, 2.0, 2.0, 6.0];
        assert_eq!(guess_width(&tags), Some(TagWidth::Linear(2.0)));
    }

    #[test]
    fn guess_regular_ratio() {
        let tags: Vec<f64> = (0..8).map(|i| 2.0_f64.powi(i)).collect();
        match guess_width(&tags) {
            Some(TagWidth::Ratio(r)) => assert!((r - 2.0_f64.ln()).abs() < 1e-12),
            other => panic!("expected a ratio width, got {other:?}"),
        }
    }

    #[test]
    fn guess_degenerate() {
        assert_eq!(guess_width(&[]), None);
        assert_eq!(guess_width(&[3.0, 3.0]), None);
        assert_eq!(guess_width(&[f64::NAN, 1.0]), None);
        // two tags always give a linear width
        assert_eq!(guess_width(&[1.0, 4.0]), Some(TagWidth::Linear(3.0)));
    }

    #[test]
    fn width_extent_and_distance() {
        let linear = TagWidth::Linear(2.0);
        assert_eq!(linear.extent(5.0), [4.0, 6.0]);
        assert_eq!(linear.distance(5.0, 3.5), 1.5);

        let ratio = TagWidth::Ratio(2.0_f64.ln() * 2.0);
        let [lo, hi] = ratio.extent(4.0);
        assert!((lo - 2.0).abs() < 1e-12 && (hi - 8.0).abs() < 1e-12);
        assert_eq!(ratio.distance(-1.0, 1.0), f64::INFINITY);
        assert_eq!(ratio.extent(-1.0), [-1.0, -1.0]);
    }

    #[test]
    fn width_from_quantity() {
        let w = TagWidth::from_quantity(250.0, &Unit::milliseconds(), &Unit::seconds()).unwrap();
        assert_eq!(w, TagWidth::Linear(0.25));

        let w = TagWidth::from_quantity(100.0, &Unit::percent_increase(), &Unit::hertz()).unwrap();
        assert!(w.is_ratiometric());
        assert!((w.value() - 2.0_f64.ln()).abs() < 1e-15);

        assert!(TagWidth::from_quantity(1.0, &Unit::hertz(), &Unit::seconds()).is_err());
        assert!(TagWidth::from_quantity(-1.0, &Unit::seconds(), &Unit::seconds()).is_err());
    }
}
