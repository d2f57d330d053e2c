/*!
Binning and covariance machinery for spatial two-point correlation functions
(e.g. galaxy clustering or weak lensing shear correlations).

The pair counting itself (building a spatial index, walking it, computing
separations) happens elsewhere. This crate handles everything around it:

- resolving a partial binning specification into a concrete bin layout and
  the traversal tolerance ([`resolve_bin_spec`])
- accumulating the partial results produced by each pair of spatial
  patches ([`Correlation`], [`ResultStore`])
- estimating the covariance of the statistic from those partial results
  ([`estimate_cov`], [`estimate_multi_cov`])

# Quick Example

```
use binnedcorr::{BinParams, BinType, resolve_bin_spec};

let spec = resolve_bin_spec(
    &BinParams::new(BinType::Log).min_sep(1.0).max_sep(100.0).bin_size(0.1),
).unwrap();
assert_eq!(spec.nbins(), 47);
```

# Logging

Progress and numerical warnings (e.g. a `bin_slop` that is too large) are
reported through the [`log`] facade. Pick whichever backend you like.

# Developer Guide

The numeric kernels live in [`binnedcorr_nostd_internal`].
*/

#![deny(rustdoc::broken_intra_doc_links)]

// inform build-system of the crates in this package
mod accumulate;
mod binning;
mod config;
mod covariance;
mod error;
mod metric;
mod patch;

// pull in symbols that visible outside of the package
pub use accumulate::{Correlation, PairCounter, PairSampler, SampledPairs, TraversalParams};
pub use binning::{BinLayout, BinParams, BinSpec, BinType, MAX_BINS, resolve_bin_spec};
pub use config::CorrConfig;
pub use covariance::{
    CovarianceSource, DEFAULT_NUM_BOOTSTRAP, VarMethod, estimate_cov, estimate_multi_cov,
    make_design_matrix,
};
pub use error::{Error, ErrorCategory};
pub use metric::{Metric, MetricOptions};
pub use patch::{PatchKey, PatchResult, ResultStore};
