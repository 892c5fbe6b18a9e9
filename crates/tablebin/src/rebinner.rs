//! The [`Rebinner`] trait, and the machinery to construct rebinners by name.
//!
//! A lazily initialized registry maps names to functions that build boxed
//! trait objects.

use crate::average::AverageRebinner;
use crate::axis::BinAxis;
use crate::error::Error;
use crate::options::{BinningMode, GapFill, RebinOptions};
use crate::peak::{AveragePeakRebinner, PeakRebinner};
use crate::sample_width::SampleWidths;
use crate::splat::NearestNeighborSplatRebinner;
use crate::table::{Table, TableLike};
use std::{collections::HashMap, sync::LazyLock};

/// Rebins a table onto a regular target grid.
///
/// Passing `None` for an axis means that the source's tags along that axis
/// pass through unchanged (this is only possible for Y when every segment
/// shares the same Y tags). The sample widths are used to work out how much
/// of each axis an input cell covers; see
/// [`SampleWidths::estimate`](crate::SampleWidths::estimate).
///
/// Implementors are stateless: everything they compute lives for the duration
/// of a single call.
pub trait Rebinner: Send + Sync {
    fn name(&self) -> &'static str;

    fn rebin(
        &self,
        table: &dyn TableLike,
        x_axis: Option<&BinAxis>,
        y_axis: Option<&BinAxis>,
        widths: &SampleWidths,
    ) -> Result<Table, Error>;
}

/// Wraps a function pointer that constructs a boxed [`Rebinner`]
struct MkRebinnerFn(fn(&RebinOptions) -> Box<dyn Rebinner>);

fn build_registry() -> HashMap<String, MkRebinnerFn> {
    HashMap::from([
        (
            "average".to_owned(),
            MkRebinnerFn(|o: &RebinOptions| -> Box<dyn Rebinner> {
                Box::new(AverageRebinner::new(o.clone()))
            }),
        ),
        (
            "peak".to_owned(),
            MkRebinnerFn(|o: &RebinOptions| -> Box<dyn Rebinner> {
                Box::new(PeakRebinner::new(o.clone()))
            }),
        ),
        (
            "averagePeak".to_owned(),
            MkRebinnerFn(|o: &RebinOptions| -> Box<dyn Rebinner> {
                Box::new(AveragePeakRebinner::new(o.clone()))
            }),
        ),
        (
            "nearestNeighbor".to_owned(),
            MkRebinnerFn(|o: &RebinOptions| -> Box<dyn Rebinner> {
                Box::new(NearestNeighborSplatRebinner::new(o.clone()))
            }),
        ),
    ])
}

/// Holds the known rebinners, keyed by name. It is lazily initialized (in a
/// threadsafe manner) by [`build_registry`].
static REBINNER_REGISTRY: LazyLock<HashMap<String, MkRebinnerFn>> = LazyLock::new(build_registry);

/// the names accepted by [`rebinner_from_name`], in sorted order
pub fn rebinner_names() -> Vec<String> {
    let mut names: Vec<String> = REBINNER_REGISTRY.keys().cloned().collect();
    names.sort();
    names
}

/// Constructs the rebinner registered under `name`
pub fn rebinner_from_name(name: &str, options: &RebinOptions) -> Result<Box<dyn Rebinner>, Error> {
    if let Some(func) = REBINNER_REGISTRY.get(name) {
        Ok(func.0(options))
    } else {
        Err(Error::unknown_rebinner(name.to_owned(), rebinner_names()))
    }
}

/// Builder-style construction of a rebinner
///
/// # Example
/// ```
/// use tablebin::{GapFill, Rebinner, RebinnerBuilder};
///
/// let rebinner = RebinnerBuilder::new()
///     .name("peak")
///     .gap_fill(GapFill::Disabled)
///     .build()
///     .unwrap();
/// assert_eq!(rebinner.name(), "peak");
/// ```
#[derive(Clone, Debug)]
pub struct RebinnerBuilder {
    name: String,
    options: RebinOptions,
}

impl Default for RebinnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RebinnerBuilder {
    /// the default rebinner is "average" with default options
    pub fn new() -> Self {
        Self {
            name: "average".to_owned(),
            options: RebinOptions::default(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    pub fn options(mut self, options: RebinOptions) -> Self {
        self.options = options;
        self
    }

    pub fn gap_fill(mut self, gap_fill: GapFill) -> Self {
        self.options.gap_fill = gap_fill;
        self
    }

    pub fn binning(mut self, binning: BinningMode) -> Self {
        self.options.binning = binning;
        self
    }

    pub fn x_gap_fudge(mut self, fudge: f64) -> Self {
        self.options.x_gap_fudge = fudge;
        self
    }

    pub fn y_gap_fudge(mut self, fudge: f64) -> Self {
        self.options.y_gap_fudge = Some(fudge);
        self
    }

    pub fn extrapolate_boundaries(mut self, flag: bool) -> Self {
        self.options.extrapolate_boundaries = flag;
        self
    }

    pub fn build(self) -> Result<Box<dyn Rebinner>, Error> {
        let negative = |f: f64| !(f >= 0.0);
        if negative(self.options.x_gap_fudge) || self.options.y_gap_fudge.is_some_and(negative) {
            return Err(Error::precondition("gap fudge factors must be non-negative"));
        }
        rebinner_from_name(&self.name, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn registry_names() {
        assert_eq!(
            rebinner_names(),
            vec!["average", "averagePeak", "nearestNeighbor", "peak"]
        );
        for name in rebinner_names() {
            let rebinner = rebinner_from_name(&name, &RebinOptions::default()).unwrap();
            assert_eq!(rebinner.name(), name);
        }
    }

    #[test]
    fn unknown_name() {
        let Err(err) = RebinnerBuilder::new().name("median").build() else {
            panic!("\"median\" should not be a known rebinner");
        };
        match err.kind() {
            ErrorKind::UnknownRebinner { actual, choices } => {
                assert_eq!(actual, "median");
                assert_eq!(choices.len(), 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_fudge() {
        assert!(RebinnerBuilder::new().x_gap_fudge(-1.0).build().is_err());
        assert!(RebinnerBuilder::new().y_gap_fudge(f64::NAN).build().is_err());
    }
}
