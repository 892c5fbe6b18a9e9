//! Physical units attached to tags and values.
//!
//! Every unit belongs to a *dimension*. Values can be converted between two
//! units of the same dimension. Ordinary quantities convert affinely
//! (`reference = value * scale + offset`, where the reference unit of the
//! dimension has `scale = 1` and `offset = 0`). Ratiometric units (natural-log
//! ratio, log10 ratio, percent increase) all measure a ratio between two
//! values and convert through the natural-log ratio.
//!
//! A unit also carries the fill value used to flag missing data. `NaN` is
//! always treated as fill, regardless of the configured fill value.

use crate::error::Error;

/// The fill value used when a unit doesn't specify one
pub const DEFAULT_FILL: f64 = -1e31;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RatioKind {
    LogE,
    Log10,
    PercentIncrease,
}

impl RatioKind {
    fn to_log_e(self, value: f64) -> f64 {
        match self {
            RatioKind::LogE => value,
            RatioKind::Log10 => value * core::f64::consts::LN_10,
            RatioKind::PercentIncrease => (1.0 + value / 100.0).ln(),
        }
    }

    fn from_log_e(self, value: f64) -> f64 {
        match self {
            RatioKind::LogE => value,
            RatioKind::Log10 => value / core::f64::consts::LN_10,
            RatioKind::PercentIncrease => 100.0 * value.exp_m1(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Dimension {
    Quantity(String),
    Ratio(RatioKind),
}

/// A physical unit.
///
/// Units are plain values. They are passed explicitly to whatever needs them
/// (there is no global registry of units).
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    name: String,
    dimension: Dimension,
    scale: f64,
    offset: f64,
    fill: f64,
}

impl Unit {
    /// Creates a unit of an ordinary (non-ratiometric) dimension.
    ///
    /// A value expressed in this unit converts to the dimension's reference
    /// unit as `value * scale + offset`.
    pub fn new(name: &str, dimension: &str, scale: f64, offset: f64) -> Result<Self, Error> {
        if !(scale.is_finite() && scale != 0.0) || !offset.is_finite() {
            return Err(Error::precondition(
                "a unit's scale must be finite & nonzero and its offset must be finite",
            ));
        }
        Ok(Self {
            name: name.to_owned(),
            dimension: Dimension::Quantity(dimension.to_owned()),
            scale,
            offset,
            fill: DEFAULT_FILL,
        })
    }

    fn simple(name: &str, dimension: &str, scale: f64) -> Self {
        Self {
            name: name.to_owned(),
            dimension: Dimension::Quantity(dimension.to_owned()),
            scale,
            offset: 0.0,
            fill: DEFAULT_FILL,
        }
    }

    fn ratio(name: &str, kind: RatioKind) -> Self {
        Self {
            name: name.to_owned(),
            dimension: Dimension::Ratio(kind),
            scale: 1.0,
            offset: 0.0,
            fill: DEFAULT_FILL,
        }
    }

    pub fn dimensionless() -> Self {
        Self::simple("", "dimensionless", 1.0)
    }

    pub fn seconds() -> Self {
        Self::simple("s", "time", 1.0)
    }

    pub fn milliseconds() -> Self {
        Self::simple("ms", "time", 1e-3)
    }

    pub fn hertz() -> Self {
        Self::simple("Hz", "frequency", 1.0)
    }

    pub fn kilohertz() -> Self {
        Self::simple("kHz", "frequency", 1e3)
    }

    /// the natural log of a ratio
    pub fn log_e_ratio() -> Self {
        Self::ratio("log(ratio)", RatioKind::LogE)
    }

    /// the base-10 log of a ratio
    pub fn log10_ratio() -> Self {
        Self::ratio("log10(ratio)", RatioKind::Log10)
    }

    /// a ratio expressed as a percent increase (`100 * (ratio - 1)`)
    pub fn percent_increase() -> Self {
        Self::ratio("% increase", RatioKind::PercentIncrease)
    }

    /// returns a copy of the unit that flags missing data with `fill`
    pub fn with_fill(mut self, fill: f64) -> Self {
        self.fill = fill;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> &str {
        match &self.dimension {
            Dimension::Quantity(name) => name.as_str(),
            Dimension::Ratio(_) => "ratio",
        }
    }

    pub fn is_ratiometric(&self) -> bool {
        matches!(self.dimension, Dimension::Ratio(_))
    }

    pub fn fill_value(&self) -> f64 {
        self.fill
    }

    pub fn is_fill(&self, value: f64) -> bool {
        value.is_nan() || value == self.fill
    }

    pub fn is_convertible_to(&self, other: &Unit) -> bool {
        match (&self.dimension, &other.dimension) {
            (Dimension::Quantity(a), Dimension::Quantity(b)) => a == b,
            (Dimension::Ratio(_), Dimension::Ratio(_)) => true,
            _ => false,
        }
    }

    /// Builds a converter from this unit to `other`.
    ///
    /// Compatibility is checked here, once, so that the converter itself
    /// can't fail.
    pub fn converter(&self, other: &Unit) -> Result<UnitConverter, Error> {
        let kind = match (&self.dimension, &other.dimension) {
            (Dimension::Quantity(a), Dimension::Quantity(b)) if a == b => {
                if self.scale == other.scale && self.offset == other.offset {
                    ConverterKind::Identity
                } else {
                    ConverterKind::Affine {
                        scale: self.scale / other.scale,
                        offset: (self.offset - other.offset) / other.scale,
                    }
                }
            }
            (Dimension::Ratio(a), Dimension::Ratio(b)) => {
                if a == b {
                    ConverterKind::Identity
                } else {
                    ConverterKind::Ratio { from: *a, to: *b }
                }
            }
            _ => return Err(Error::incompatible_units(&self.name, &other.name)),
        };
        Ok(UnitConverter {
            kind,
            from_fill: self.fill,
            to_fill: other.fill,
        })
    }

    /// Converts a single value from this unit to `other`. Fill values map to
    /// `other`'s fill value.
    pub fn convert(&self, value: f64, other: &Unit) -> Result<f64, Error> {
        Ok(self.converter(other)?.apply(value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ConverterKind {
    Identity,
    Affine { scale: f64, offset: f64 },
    Ratio { from: RatioKind, to: RatioKind },
}

/// Converts values between two compatible units (see [`Unit::converter`])
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitConverter {
    kind: ConverterKind,
    from_fill: f64,
    to_fill: f64,
}

impl UnitConverter {
    pub fn apply(&self, value: f64) -> f64 {
        if value.is_nan() || value == self.from_fill {
            return self.to_fill;
        }
        match self.kind {
            ConverterKind::Identity => value,
            ConverterKind::Affine { scale, offset } => value * scale + offset,
            ConverterKind::Ratio { from, to } => to.from_log_e(from.to_log_e(value)),
        }
    }

    /// Converts the *difference* between two values (the offset of an affine
    /// conversion drops out).
    pub fn apply_interval(&self, interval: f64) -> f64 {
        match self.kind {
            ConverterKind::Identity => interval,
            ConverterKind::Affine { scale, .. } => interval * scale,
            ConverterKind::Ratio { from, to } => to.from_log_e(from.to_log_e(interval)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn convert_quantities() {
        let ms = Unit::milliseconds();
        let s = Unit::seconds();
        assert_eq!(s.convert(2.0, &ms).unwrap(), 2000.0);
        assert_eq!(ms.convert(500.0, &s).unwrap(), 0.5);
        assert_eq!(s.converter(&Unit::seconds()).unwrap().apply(1.5), 1.5);

        let celsius = Unit::new("C", "temperature", 1.0, 273.15).unwrap();
        let kelvin = Unit::new("K", "temperature", 1.0, 0.0).unwrap();
        let converter = celsius.converter(&kelvin).unwrap();
        assert_eq!(converter.apply(0.0), 273.15);
        assert_eq!(converter.apply_interval(2.0), 2.0);
    }

    #[test]
    fn convert_incompatible() {
        let err = Unit::seconds().convert(1.0, &Unit::hertz()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IncompatibleUnits { .. }));
        assert!(Unit::log_e_ratio().converter(&Unit::seconds()).is_err());
    }

    #[test]
    fn convert_ratios() {
        let ln = Unit::log_e_ratio();
        let log10 = Unit::log10_ratio();
        let pct = Unit::percent_increase();

        let doubling = 2.0_f64.ln();
        assert!((ln.convert(doubling, &log10).unwrap() - 2.0_f64.log10()).abs() < 1e-15);
        assert!((ln.convert(doubling, &pct).unwrap() - 100.0).abs() < 1e-12);
        assert!((pct.convert(100.0, &ln).unwrap() - doubling).abs() < 1e-15);
        assert!(pct.is_ratiometric());
        assert!(!Unit::hertz().is_ratiometric());
    }

    #[test]
    fn fill_values() {
        let s = Unit::seconds();
        assert!(s.is_fill(DEFAULT_FILL));
        assert!(s.is_fill(f64::NAN));
        assert!(!s.is_fill(0.0));

        let custom = Unit::milliseconds().with_fill(-1.0);
        assert!(custom.is_fill(-1.0));
        assert!(!custom.is_fill(DEFAULT_FILL));
        // fill values are mapped onto the destination's fill value
        assert_eq!(custom.convert(-1.0, &s).unwrap(), DEFAULT_FILL);
        assert_eq!(s.convert(f64::NAN, &custom).unwrap(), -1.0);
    }
}
