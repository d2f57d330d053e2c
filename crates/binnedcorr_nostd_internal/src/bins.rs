//! Implements types to represent "bin edges" along a single scalar axis. The
//! [`BinEdges`] trait provides a common interface for locating the bin that
//! holds a value; [`RegularBinEdges`] implements it for uniformly spaced
//! bins (the only layout that the resolved binning topologies produce).
//!
//! Logarithmic binning is handled by the caller: it simply hands us
//! `ln(sep)` and a [`RegularBinEdges`] instance built in log-space.

/// Super simple. This can be expanded as needed.
pub trait BinEdges {
    /// Calculate the bin index for a given value. Values which are equal to
    /// boundary values are considered part of the higher bin, i.e. intervals
    /// do not include the right edge.
    fn bin_index(&self, value: f64) -> Option<usize>;

    fn n_bins(&self) -> usize;
}

/// Regular bins with uniform spacing
#[derive(Clone, Debug, PartialEq)]
pub struct RegularBinEdges {
    min: f64,
    max: f64,
    bin_width: f64,
    n_bins: usize,
}

impl RegularBinEdges {
    /// Note that we initialize with num_bins rather than bin_width
    pub fn new(min: f64, max: f64, n_bins: usize) -> Result<Self, &'static str> {
        if n_bins == 0 {
            Err("Number of bins must be greater than zero")
        } else if !min.is_finite() || !max.is_finite() {
            Err("Min and max values must be finite")
        } else if max <= min {
            Err("Maximum value must be greater than minimum value")
        } else {
            Ok(Self {
                min,
                max,
                bin_width: (max - min) / n_bins as f64,
                n_bins,
            })
        }
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// the center of the `i`th bin
    pub fn center(&self, i: usize) -> f64 {
        self.min + (i as f64 + 0.5) * self.bin_width
    }
}

impl BinEdges for RegularBinEdges {
    fn bin_index(&self, value: f64) -> Option<usize> {
        // NaN fails both comparisons, so check it explicitly
        if value.is_nan() || value < self.min || value >= self.max {
            return None;
        }

        // this cast handles the truncation. Roundoff can push a value just
        // below `max` into a nonexistent bin, so we clamp
        let index = ((value - self.min) / self.bin_width) as usize;

        Some(index.min(self.n_bins - 1))
    }

    fn n_bins(&self) -> usize {
        self.n_bins
    }
}

/// Checks that `edges` holds at least 2 finite values in strictly increasing
/// order.
pub fn validate_bin_edges(edges: &[f64]) -> Result<(), &'static str> {
    if edges.len() < 2 {
        return Err("A minimum of two bin edges are required");
    }

    if edges.iter().any(|x| !x.is_finite()) {
        return Err("Bin edges must be finite");
    }

    if edges.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err("Bin edges must be in strictly increasing order");
    }
    Ok(())
}
