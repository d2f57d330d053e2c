/*!
Numeric kernels backing the `binnedcorr` crate.

This crate is `no_std` so that the kernels stay free of any allocation
strategy or platform assumptions beyond what `ndarray` itself needs. Errors
are reported as `&'static str`; the public `binnedcorr` crate wraps them.

The pieces are:
- [`bins`]: locating the bin that holds a scalar coordinate
- [`design`]: building per-sample "design matrices" (summed statistic and
  summed weight) and taking their ratio
- [`gram`]: the centered Gram contraction shared by the resampling
  covariance estimators
*/

#![no_std]

pub mod bins;
pub mod design;
pub mod gram;
mod misc;

pub use bins::{BinEdges, RegularBinEdges, validate_bin_edges};
pub use design::{accumulate_design_row, add_design_row, ratio_into};
pub use gram::centered_gram;
pub use misc::{add_assign_elementwise, any_nonzero};
