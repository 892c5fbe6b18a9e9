//! Configuration shared by the rebinners.

/// How empty output cells are treated after accumulation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GapFill {
    /// empty cells stay empty
    Disabled,
    /// linear interpolation along X, then along Y
    #[default]
    Interpolate,
    /// nearest-neighbor replication
    Replicate,
}

/// How input cells are assigned to output bins
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BinningMode {
    /// each cell contributes to every bin it overlaps, in proportion to the
    /// overlap
    #[default]
    Overlap,
    /// each cell contributes its full weight to the bin holding its tag
    Point,
}

/// Options for a rebin call
#[derive(Clone, Debug, PartialEq)]
pub struct RebinOptions {
    pub gap_fill: GapFill,
    pub binning: BinningMode,
    /// Gaps along X are only interpolated when the bracketing samples are no
    /// more than `x_gap_fudge` sample widths apart
    pub x_gap_fudge: f64,
    /// The equivalent of `x_gap_fudge` along Y. When `None`, we use 1.5 for
    /// linear Y widths and 2.0 for ratiometric Y widths.
    pub y_gap_fudge: Option<f64>,
    /// the number of passes made by [`GapFill::Replicate`]
    pub replicate_passes: usize,
    /// whether edge and corner cells are extrapolated from the data lying
    /// just outside of the grid
    pub extrapolate_boundaries: bool,
}

impl Default for RebinOptions {
    fn default() -> Self {
        Self {
            gap_fill: GapFill::Interpolate,
            binning: BinningMode::Overlap,
            x_gap_fudge: 1.5,
            y_gap_fudge: None,
            replicate_passes: 5,
            extrapolate_boundaries: true,
        }
    }
}

impl RebinOptions {
    pub(crate) fn y_fudge(&self, ratiometric: bool) -> f64 {
        self.y_gap_fudge
            .unwrap_or(if ratiometric { 2.0 } else { 1.5 })
    }
}
