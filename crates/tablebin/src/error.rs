// The internal crate reports `&'static str` errors. This crate wraps them
// (along with its own errors) in a single public Error type.
//
// Callers that need to distinguish between failures should match on
// [`Error::kind`]. All of the error conditions are detected at the start (or
// during the first pass) of a call. None of them are produced per-cell.

use thiserror::Error as ThisError;

/// The error type returned by every fallible operation in this crate
#[derive(Debug, ThisError)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
}

/// Describes the kind of an [`Error`]
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ErrorKind {
    /// Y binning was omitted while the source holds multiple segments with
    /// differing Y tags (there is no single, well-defined output Y axis)
    #[error(
        "no Y axis was specified, but the source holds {n_segments} segments \
         with differing Y tags"
    )]
    AmbiguousYGeometry { n_segments: usize },

    /// The source's X extent lies entirely outside of the requested X axis
    #[error(
        "the source's X extent, [{source_min}, {source_max}], lies entirely \
         outside of the requested X axis, [{axis_min}, {axis_max})"
    )]
    NoDataInRange {
        source_min: f64,
        source_max: f64,
        axis_min: f64,
        axis_max: f64,
    },

    /// A plane (or a segment's data) doesn't have the expected shape
    #[error("{what} has shape {actual:?}, but it should have shape {expected:?}")]
    DimensionMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Invalid arguments: bad view offsets/lengths, non-ascending axis bounds,
    /// zero bin counts, unsorted tags, ...
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// A value can't be converted between two units
    #[error("can't convert values in \"{from}\" to \"{to}\"")]
    IncompatibleUnits { from: String, to: String },

    /// An unknown rebinner name was passed to the registry
    #[error("\"{actual}\" is not a rebinner name. Choices include: {choices:?}")]
    UnknownRebinner { actual: String, choices: Vec<String> },
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn ambiguous_y_geometry(n_segments: usize) -> Self {
        Error {
            kind: ErrorKind::AmbiguousYGeometry { n_segments },
        }
    }

    pub(crate) fn no_data_in_range(source: [f64; 2], axis: [f64; 2]) -> Self {
        Error {
            kind: ErrorKind::NoDataInRange {
                source_min: source[0],
                source_max: source[1],
                axis_min: axis[0],
                axis_max: axis[1],
            },
        }
    }

    pub(crate) fn dimension_mismatch(
        what: impl Into<String>,
        expected: &[usize],
        actual: &[usize],
    ) -> Self {
        Error {
            kind: ErrorKind::DimensionMismatch {
                what: what.into(),
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            },
        }
    }

    /// This is also used to wrap the string errors from
    /// `tablebin_internal`
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Error {
            kind: ErrorKind::PreconditionViolation(message.into()),
        }
    }

    pub(crate) fn incompatible_units(from: &str, to: &str) -> Self {
        Error {
            kind: ErrorKind::IncompatibleUnits {
                from: from.to_owned(),
                to: to.to_owned(),
            },
        }
    }

    pub(crate) fn unknown_rebinner(actual: String, choices: Vec<String>) -> Self {
        Error {
            kind: ErrorKind::UnknownRebinner { actual, choices },
        }
    }
}
