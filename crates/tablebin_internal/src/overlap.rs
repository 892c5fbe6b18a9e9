//! Computes the fractional overlap between input cells and output bins along
//! a single axis.
//!
//! Both sides are described as sequences of half-open ranges `[lo, hi)`. The
//! input ranges are the inferred extents of the input cells and the output
//! ranges are the bins of an [`crate::AxisBins`]. We sweep over both
//! sequences at once (like the merge step of merge-sort), which is `O(n+m)`.
//!
//! For this to work, each sequence must be sorted and its ranges must not
//! overlap each other. [`cell_ranges`] builds input ranges that satisfy this
//! requirement.

/// Records every nonzero-overlap pairing between input cells and output bins.
///
/// The entries are stored as parallel arrays. The `weight` of an entry is the
/// overlapping width divided by the width of the output bin, so it always
/// lies in `(0, 1]`.
#[derive(Clone, Debug, Default)]
pub struct OverlapPairs {
    pub input_index: Vec<usize>,
    pub output_index: Vec<usize>,
    pub weight: Vec<f64>,
}

impl OverlapPairs {
    pub fn len(&self) -> usize {
        self.weight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weight.is_empty()
    }

    fn push(&mut self, input_index: usize, output_index: usize, weight: f64) {
        self.input_index.push(input_index);
        self.output_index.push(output_index);
        self.weight.push(weight);
    }
}

/// Checks that a sequence of ranges is sorted and that the ranges don't
/// overlap. Empty ranges (including ranges holding `NaN`) are ignored.
fn check_ranges(ranges: &[[f64; 2]]) -> Result<(), &'static str> {
    let mut prev_hi = f64::NEG_INFINITY;
    for &[lo, hi] in ranges {
        // written so that NaN lands in this branch
        if !(lo < hi) {
            continue;
        }
        if lo < prev_hi {
            return Err("ranges must be sorted and must not overlap");
        }
        prev_hi = hi;
    }
    Ok(())
}

/// Computes the overlap weights between `inputs` and `outputs`.
///
/// Input ranges that are empty (`lo >= hi`) or hold `NaN` never contribute.
/// Every output range must have a nonzero width.
pub fn overlap_bins(
    inputs: &[[f64; 2]],
    outputs: &[[f64; 2]],
) -> Result<OverlapPairs, &'static str> {
    check_ranges(inputs)?;
    if outputs.iter().any(|&[lo, hi]| !(lo < hi)) {
        return Err("output ranges must have a positive width");
    }
    check_ranges(outputs)?;

    let mut pairs = OverlapPairs::default();
    let (mut a, mut b) = (0, 0);
    while a < inputs.len() && b < outputs.len() {
        let [lo_a, hi_a] = inputs[a];
        if !(lo_a < hi_a) {
            a += 1;
            continue;
        }
        let [lo_b, hi_b] = outputs[b];

        let overlap = hi_a.min(hi_b) - lo_a.max(lo_b);
        if overlap > 0.0 {
            pairs.push(a, b, overlap / (hi_b - lo_b));
        }

        // advance whichever range ends first
        if hi_a < hi_b {
            a += 1;
        } else if hi_b < hi_a {
            b += 1;
        } else {
            a += 1;
            b += 1;
        }
    }
    Ok(pairs)
}

/// Builds non-overlapping input ranges from sorted cell centers.
///
/// `extent` maps a cell center to the cell's nominal `[lo, hi)` range. The
/// nominal ranges of neighboring cells may overlap (e.g. when the sample width
/// exceeds the local tag spacing), so each range is clipped at the midpoint
/// between neighboring tags. Everything is expressed in the same coordinate
/// (callers working on a log axis pass log-transformed tags).
pub fn cell_ranges(
    tags: &[f64],
    extent: impl Fn(f64) -> [f64; 2],
) -> Result<Vec<[f64; 2]>, &'static str> {
    if tags.iter().any(|t| !t.is_finite()) {
        return Err("cell centers must be finite");
    } else if !tags.is_sorted() {
        return Err("cell centers must be sorted");
    }

    let n = tags.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let [mut lo, mut hi] = extent(tags[i]);
        if i > 0 {
            lo = lo.max(0.5 * (tags[i - 1] + tags[i]));
        }
        if i + 1 < n {
            hi = hi.min(0.5 * (tags[i] + tags[i + 1]));
        }
        out.push([lo, hi]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distr::{Distribution, Uniform};
    use rand_xoshiro::Xoshiro256PlusPlus;
    use rand_xoshiro::rand_core::SeedableRng;

    fn weight_sums(pairs: &OverlapPairs, n_outputs: usize) -> Vec<f64> {
        let mut sums = vec![0.0; n_outputs];
        for k in 0..pairs.len() {
            sums[pairs.output_index[k]] += pairs.weight[k];
        }
        sums
    }

    #[test]
    fn empty_sequences() {
        let outputs = [[0.0, 1.0], [1.0, 2.0]];
        assert!(overlap_bins(&[], &outputs).unwrap().is_empty());
        assert!(overlap_bins(&[[0.0, 1.0]], &[]).unwrap().is_empty());
        assert!(overlap_bins(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn simple_overlap() {
        // cells of width 1 centered on 0..=4, bins of width 2 over [0, 4)
        let inputs = cell_ranges(&[0.0, 1.0, 2.0, 3.0, 4.0], |t| [t - 0.5, t + 0.5]).unwrap();
        let outputs = [[0.0, 2.0], [2.0, 4.0]];
        let pairs = overlap_bins(&inputs, &outputs).unwrap();

        assert_eq!(pairs.input_index, vec![0, 1, 2, 2, 3, 4]);
        assert_eq!(pairs.output_index, vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(pairs.weight, vec![0.25, 0.5, 0.25, 0.25, 0.5, 0.25]);
    }

    #[test]
    fn empty_and_nan_inputs_are_skipped() {
        let inputs = [[0.0, 1.0], [1.0, 1.0], [f64::NAN, f64::NAN], [1.0, 2.0]];
        let outputs = [[0.0, 2.0]];
        let pairs = overlap_bins(&inputs, &outputs).unwrap();
        assert_eq!(pairs.input_index, vec![0, 3]);
        assert_eq!(pairs.weight, vec![0.5, 0.5]);
    }

    #[test]
    fn rejects_unsorted_ranges() {
        let outputs = [[0.0, 2.0]];
        assert!(overlap_bins(&[[1.0, 2.0], [0.0, 1.0]], &outputs).is_err());
        assert!(overlap_bins(&[[0.0, 1.5], [1.0, 2.0]], &outputs).is_err());
        assert!(overlap_bins(&[[0.0, 1.0]], &[[0.0, 0.0]]).is_err());
        assert!(cell_ranges(&[1.0, 0.0], |t| [t, t + 1.0]).is_err());
        assert!(cell_ranges(&[0.0, f64::NAN], |t| [t, t + 1.0]).is_err());
    }

    #[test]
    fn wide_cells_are_clipped_at_midpoints() {
        let ranges = cell_ranges(&[0.0, 1.0, 3.0], |t| [t - 2.0, t + 2.0]).unwrap();
        assert_eq!(ranges, vec![[-2.0, 0.5], [0.5, 2.0], [2.0, 5.0]]);
    }

    #[test]
    fn overlap_completeness() {
        // inputs that tile the whole output domain must assign a total weight
        // of 1 to every output bin
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2357);
        let gap_dist = Uniform::try_from(0.01..0.7).unwrap();
        let n_bins_dist = Uniform::try_from(1..40_usize).unwrap();

        for _ in 0..50 {
            let n_bins = n_bins_dist.sample(&mut rng);
            let (min, max) = (-3.0, 5.0);
            let width = (max - min) / n_bins as f64;
            let outputs: Vec<[f64; 2]> = (0..n_bins)
                .map(|i| [min + i as f64 * width, min + (i + 1) as f64 * width])
                .collect();

            // random cell boundaries spanning (and exceeding) the domain
            let mut edges = vec![min - gap_dist.sample(&mut rng)];
            while *edges.last().unwrap() < max {
                let next = edges.last().unwrap() + gap_dist.sample(&mut rng);
                edges.push(next);
            }
            let inputs: Vec<[f64; 2]> = edges.windows(2).map(|w| [w[0], w[1]]).collect();

            let pairs = overlap_bins(&inputs, &outputs).unwrap();
            for sum in weight_sums(&pairs, n_bins) {
                assert!((sum - 1.0).abs() < 1e-12, "sum = {sum}");
            }
        }
    }
}
