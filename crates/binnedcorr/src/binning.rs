//! Resolves a (partial) binning specification into a concrete bin layout.
//!
//! A binning is described by 4 numbers: `nbins`, `bin_size`, `min_sep` and
//! `max_sep`. They aren't independent, so the caller supplies exactly 3 of
//! them (only 2 for [`BinType::TwoD`], whose range is always symmetric about
//! 0) and we derive the last one. When `nbins` is derived, it is rounded up
//! and `bin_size` is recomputed so that the bins exactly tile the range.
//!
//! Resolution also produces the traversal tolerance, `b`, that the external
//! tree traversal uses to decide when it can stop descending.

use binnedcorr_nostd_internal::{BinEdges, RegularBinEdges, validate_bin_edges};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, metric::Metric};

/// bin_slop values that exceed the recommended maximum by less than this
/// amount don't trigger a warning
const SLOP_WARN_MARGIN: f64 = 1e-4;

/// the relative binning error that the default bin_slop targets
const TARGET_BIN_ERROR: f64 = 0.1;

/// The binning topology
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinType {
    /// bins are uniform in `ln(sep)`
    #[default]
    Log,
    /// bins are uniform in `sep`
    Linear,
    /// a `nbins x nbins` grid of cells, uniform in the signed offsets
    /// `(dx, dy)`, spanning `-max_sep..max_sep` along both axes
    TwoD,
}

impl BinType {
    const NAMES: &'static [&'static str] = &["Log", "Linear", "TwoD"];
}

impl FromStr for BinType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Log" => Ok(BinType::Log),
            "Linear" => Ok(BinType::Linear),
            "TwoD" => Ok(BinType::TwoD),
            _ => Err(Error::unknown_name("bin_type", s, BinType::NAMES)),
        }
    }
}

/// The caller's (partial) binning specification.
///
/// The setters are chainable:
///
/// ```
/// use binnedcorr::{BinParams, BinType, resolve_bin_spec};
/// let spec = resolve_bin_spec(
///     &BinParams::new(BinType::Log).min_sep(1.0).max_sep(10.0).nbins(5),
/// ).unwrap();
/// assert_eq!(spec.nbins(), 5);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BinParams {
    pub bin_type: BinType,
    pub nbins: Option<usize>,
    pub bin_size: Option<f64>,
    pub min_sep: Option<f64>,
    pub max_sep: Option<f64>,
    /// How much slop to allow when placing pairs into bins. When `None`, we
    /// pick the value that caps the relative binning error at 10%.
    pub bin_slop: Option<f64>,
}

impl BinParams {
    pub fn new(bin_type: BinType) -> Self {
        BinParams {
            bin_type,
            ..Default::default()
        }
    }

    pub fn nbins(mut self, nbins: usize) -> Self {
        self.nbins = Some(nbins);
        self
    }

    pub fn bin_size(mut self, bin_size: f64) -> Self {
        self.bin_size = Some(bin_size);
        self
    }

    pub fn min_sep(mut self, min_sep: f64) -> Self {
        self.min_sep = Some(min_sep);
        self
    }

    pub fn max_sep(mut self, max_sep: f64) -> Self {
        self.max_sep = Some(max_sep);
        self
    }

    pub fn bin_slop(mut self, bin_slop: f64) -> Self {
        self.bin_slop = Some(bin_slop);
        self
    }

    fn given_names(&self) -> Vec<&'static str> {
        let mut given = Vec::new();
        if self.nbins.is_some() {
            given.push("nbins");
        }
        if self.bin_size.is_some() {
            given.push("bin_size");
        }
        if self.min_sep.is_some() {
            given.push("min_sep");
        }
        if self.max_sep.is_some() {
            given.push("max_sep");
        }
        given
    }
}

/// The supplied parameters, organized by which one is absent
#[derive(Clone, Copy, Debug)]
enum Knowns {
    NoNBins {
        bin_size: f64,
        min_sep: f64,
        max_sep: f64,
    },
    NoBinSize {
        nbins: usize,
        min_sep: f64,
        max_sep: f64,
    },
    NoMaxSep {
        nbins: usize,
        bin_size: f64,
        min_sep: f64,
    },
    NoMinSep {
        nbins: usize,
        bin_size: f64,
        max_sep: f64,
    },
}

/// the fully determined extent of a binning
#[derive(Clone, Copy, Debug)]
struct Extent {
    nbins: usize,
    bin_size: f64,
    min_sep: f64,
    max_sep: f64,
}

/// check the individual values (before we worry about how many were given)
fn check_values(params: &BinParams) -> Result<(), Error> {
    if params.nbins == Some(0) {
        return Err(Error::param_value("nbins", 0.0, "must be at least 1"));
    }
    if let Some(bin_size) = params.bin_size {
        if !(bin_size.is_finite() && bin_size > 0.0) {
            return Err(Error::param_value("bin_size", bin_size, "must be positive and finite"));
        }
    }
    for (name, val) in [("min_sep", params.min_sep), ("max_sep", params.max_sep)] {
        if let Some(val) = val {
            if !val.is_finite() {
                return Err(Error::param_value(name, val, "must be finite"));
            }
        }
    }
    if let Some(bin_slop) = params.bin_slop {
        if !(bin_slop.is_finite() && bin_slop >= 0.0) {
            return Err(Error::param_value("bin_slop", bin_slop, "must be finite and non-negative"));
        }
    }
    Ok(())
}

/// figure out which parameter is missing. Fails if the wrong number was given
fn classify(params: &BinParams) -> Result<Knowns, Error> {
    let BinParams {
        bin_type,
        nbins,
        bin_size,
        min_sep,
        max_sep,
        ..
    } = *params;

    let knowns = if bin_type == BinType::TwoD {
        if let Some(min_sep) = min_sep {
            return Err(Error::twod_min_sep(min_sep));
        }
        match (nbins, bin_size, max_sep) {
            (None, Some(bin_size), Some(max_sep)) => Knowns::NoNBins {
                bin_size,
                min_sep: 0.0,
                max_sep,
            },
            (Some(nbins), None, Some(max_sep)) => Knowns::NoBinSize {
                nbins,
                min_sep: 0.0,
                max_sep,
            },
            (Some(nbins), Some(bin_size), None) => Knowns::NoMaxSep {
                nbins,
                bin_size,
                min_sep: 0.0,
            },
            _ => {
                return Err(Error::bin_param_count(
                    bin_type,
                    2,
                    "nbins, bin_size, max_sep",
                    params.given_names(),
                ));
            }
        }
    } else {
        match (nbins, bin_size, min_sep, max_sep) {
            (None, Some(bin_size), Some(min_sep), Some(max_sep)) => Knowns::NoNBins {
                bin_size,
                min_sep,
                max_sep,
            },
            (Some(nbins), None, Some(min_sep), Some(max_sep)) => Knowns::NoBinSize {
                nbins,
                min_sep,
                max_sep,
            },
            (Some(nbins), Some(bin_size), Some(min_sep), None) => Knowns::NoMaxSep {
                nbins,
                bin_size,
                min_sep,
            },
            (Some(nbins), Some(bin_size), None, Some(max_sep)) => Knowns::NoMinSep {
                nbins,
                bin_size,
                max_sep,
            },
            _ => {
                return Err(Error::bin_param_count(
                    bin_type,
                    3,
                    "nbins, bin_size, min_sep, max_sep",
                    params.given_names(),
                ));
            }
        }
    };

    // when both ends of the range were given, they must be ordered
    match knowns {
        Knowns::NoNBins {
            min_sep, max_sep, ..
        }
        | Knowns::NoBinSize {
            min_sep, max_sep, ..
        } if min_sep >= max_sep => Err(Error::sep_ordering(min_sep, max_sep)),
        _ => Ok(knowns),
    }
}

/// the most bins (counting every cell of a TwoD grid) a binning may have
pub const MAX_BINS: usize = 1 << 24;

fn ceil_nbins(extent: f64, bin_size: f64) -> Result<usize, Error> {
    // extent and bin_size are both positive, so this is at least 1
    let nbins = (extent / bin_size).ceil();
    if !(nbins.is_finite() && nbins <= MAX_BINS as f64) {
        return Err(Error::param_value(
            "bin_size",
            bin_size,
            "is too small for the separation range",
        ));
    }
    Ok(nbins as usize)
}

/// `nbins` along each axis, or `None` when the layout has too many bins
fn total_bins(bin_type: BinType, nbins: usize) -> Option<usize> {
    let total = match bin_type {
        BinType::TwoD => nbins.checked_mul(nbins)?,
        BinType::Log | BinType::Linear => nbins,
    };
    (total <= MAX_BINS).then_some(total)
}

fn log_extent(knowns: Knowns) -> Result<Extent, Error> {
    let min_sep = match knowns {
        Knowns::NoNBins { min_sep, .. }
        | Knowns::NoBinSize { min_sep, .. }
        | Knowns::NoMaxSep { min_sep, .. } => Some(min_sep),
        Knowns::NoMinSep { .. } => None,
    };
    if let Some(min_sep) = min_sep {
        if min_sep <= 0.0 {
            return Err(Error::param_value("min_sep", min_sep, "must be positive for Log bins"));
        }
    }

    Ok(match knowns {
        Knowns::NoNBins {
            bin_size,
            min_sep,
            max_sep,
        } => {
            let log_ratio = (max_sep / min_sep).ln();
            let nbins = ceil_nbins(log_ratio, bin_size)?;
            Extent {
                nbins,
                bin_size: log_ratio / nbins as f64,
                min_sep,
                max_sep,
            }
        }
        Knowns::NoBinSize {
            nbins,
            min_sep,
            max_sep,
        } => Extent {
            nbins,
            bin_size: (max_sep / min_sep).ln() / nbins as f64,
            min_sep,
            max_sep,
        },
        Knowns::NoMaxSep {
            nbins,
            bin_size,
            min_sep,
        } => Extent {
            nbins,
            bin_size,
            min_sep,
            max_sep: min_sep * (nbins as f64 * bin_size).exp(),
        },
        Knowns::NoMinSep {
            nbins,
            bin_size,
            max_sep,
        } => Extent {
            nbins,
            bin_size,
            min_sep: max_sep * (-(nbins as f64) * bin_size).exp(),
            max_sep,
        },
    })
}

fn linear_extent(knowns: Knowns) -> Result<Extent, Error> {
    let extent = match knowns {
        Knowns::NoNBins {
            bin_size,
            min_sep,
            max_sep,
        } => {
            let nbins = ceil_nbins(max_sep - min_sep, bin_size)?;
            Extent {
                nbins,
                bin_size: (max_sep - min_sep) / nbins as f64,
                min_sep,
                max_sep,
            }
        }
        Knowns::NoBinSize {
            nbins,
            min_sep,
            max_sep,
        } => Extent {
            nbins,
            bin_size: (max_sep - min_sep) / nbins as f64,
            min_sep,
            max_sep,
        },
        Knowns::NoMaxSep {
            nbins,
            bin_size,
            min_sep,
        } => Extent {
            nbins,
            bin_size,
            min_sep,
            max_sep: min_sep + nbins as f64 * bin_size,
        },
        Knowns::NoMinSep {
            nbins,
            bin_size,
            max_sep,
        } => Extent {
            nbins,
            bin_size,
            min_sep: max_sep - nbins as f64 * bin_size,
            max_sep,
        },
    };
    if extent.min_sep < 0.0 {
        return Err(Error::param_value(
            "min_sep",
            extent.min_sep,
            "must be non-negative for Linear bins",
        ));
    }
    Ok(extent)
}

fn twod_extent(knowns: Knowns) -> Result<Extent, Error> {
    Ok(match knowns {
        Knowns::NoNBins {
            bin_size, max_sep, ..
        } => {
            let nbins = ceil_nbins(2.0 * max_sep, bin_size)?;
            Extent {
                nbins,
                bin_size: 2.0 * max_sep / nbins as f64,
                min_sep: 0.0,
                max_sep,
            }
        }
        Knowns::NoBinSize { nbins, max_sep, .. } => Extent {
            nbins,
            bin_size: 2.0 * max_sep / nbins as f64,
            min_sep: 0.0,
            max_sep,
        },
        Knowns::NoMaxSep {
            nbins, bin_size, ..
        } => Extent {
            nbins,
            bin_size,
            min_sep: 0.0,
            max_sep: nbins as f64 * bin_size / 2.0,
        },
        // classify never produces this for TwoD
        Knowns::NoMinSep { .. } => return Err(Error::twod_min_sep(0.0)),
    })
}

/// The concrete bin positions
#[derive(Clone, Debug, PartialEq)]
pub enum BinLayout {
    /// Log or Linear bins: 1 entry per bin
    Radial {
        /// nominal separation at the bin center
        rnom: Array1<f64>,
        /// `ln(rnom)`
        logr: Array1<f64>,
        left_edges: Array1<f64>,
        right_edges: Array1<f64>,
    },
    /// TwoD bins: `nbins x nbins` grids, indexed `[row, col]` where the row
    /// tracks `dy` and the column tracks `dx`
    TwoD {
        /// the signed bin centers along either axis
        axis: Array1<f64>,
        dx: Array2<f64>,
        dy: Array2<f64>,
        left_edges: Array2<f64>,
        right_edges: Array2<f64>,
        bottom_edges: Array2<f64>,
        top_edges: Array2<f64>,
        /// `sqrt(dx² + dy²)`
        rnom: Array2<f64>,
        /// `ln(rnom)`, holding `-inf` wherever `rnom == 0`
        logr: Array2<f64>,
    },
}

fn radial_layout(bin_type: BinType, extent: &Extent, axis: &RegularBinEdges) -> BinLayout {
    let Extent {
        nbins,
        bin_size,
        min_sep,
        ..
    } = *extent;
    let half_bin = 0.5 * bin_size;
    if bin_type == BinType::Log {
        let log_min = min_sep.ln();
        let logr = Array1::from_shape_fn(nbins, |k| log_min + k as f64 * bin_size + half_bin);
        let rnom = logr.mapv(f64::exp);
        let half_bin_factor = half_bin.exp();
        BinLayout::Radial {
            left_edges: rnom.mapv(|r| r / half_bin_factor),
            right_edges: rnom.mapv(|r| r * half_bin_factor),
            rnom,
            logr,
        }
    } else {
        let rnom = Array1::from_shape_fn(nbins, |k| axis.center(k));
        BinLayout::Radial {
            left_edges: rnom.mapv(|r| r - half_bin),
            right_edges: rnom.mapv(|r| r + half_bin),
            logr: rnom.mapv(f64::ln),
            rnom,
        }
    }
}

fn twod_layout(extent: &Extent, axis_edges: &RegularBinEdges) -> BinLayout {
    let n = extent.nbins;
    let half_bin = 0.5 * extent.bin_size;
    let axis = Array1::from_shape_fn(n, |k| axis_edges.center(k));
    let dx = Array2::from_shape_fn((n, n), |(_, col)| axis[col]);
    let dy = Array2::from_shape_fn((n, n), |(row, _)| axis[row]);
    let rnom = Array2::from_shape_fn((n, n), |(row, col)| axis[col].hypot(axis[row]));
    let logr = rnom.mapv(|r| if r > 0.0 { r.ln() } else { f64::NEG_INFINITY });
    BinLayout::TwoD {
        left_edges: dx.mapv(|x| x - half_bin),
        right_edges: dx.mapv(|x| x + half_bin),
        bottom_edges: dy.mapv(|y| y - half_bin),
        top_edges: dy.mapv(|y| y + half_bin),
        axis,
        dx,
        dy,
        rnom,
        logr,
    }
}

/// the quantities that govern how precisely the traversal places pairs
#[derive(Clone, Copy, Debug, PartialEq)]
struct Tolerance {
    bin_slop: f64,
    b: f64,
    min_log_bin_size: f64,
    max_log_bin_size: f64,
    max_good_slop: f64,
}

fn tolerance(bin_type: BinType, extent: &Extent, bin_slop: Option<f64>) -> Tolerance {
    let (min_log_bin_size, max_log_bin_size) = match bin_type {
        BinType::Log => (extent.bin_size, extent.bin_size),
        // a fixed linear width subtends the largest log-width at the small
        // separation end
        BinType::Linear | BinType::TwoD => (
            extent.bin_size / extent.max_sep,
            extent.bin_size / (extent.min_sep + 0.5 * extent.bin_size),
        ),
    };
    let max_good_slop = TARGET_BIN_ERROR / max_log_bin_size;
    let bin_slop = bin_slop.unwrap_or(max_good_slop.min(1.0));
    let b = min_log_bin_size * bin_slop;

    if bin_slop > max_good_slop + SLOP_WARN_MARGIN {
        log::warn!(
            "Using bin_slop = {bin_slop}, bin_size = {}, b = {b}. It is recommended to use \
             bin_slop <= {max_good_slop} in this case. Larger values of bin_slop (and hence b) \
             may result in significant inaccuracies.",
            extent.bin_size
        );
    } else {
        log::debug!("Using bin_slop = {bin_slop}, b = {b}");
    }

    Tolerance {
        bin_slop,
        b,
        min_log_bin_size,
        max_log_bin_size,
        max_good_slop,
    }
}

/// A fully resolved binning. Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct BinSpec {
    bin_type: BinType,
    nbins: usize,
    bin_size: f64,
    min_sep: f64,
    max_sep: f64,
    tolerance: Tolerance,
    // the bins along a single axis; in log-space for Log bins
    axis_edges: RegularBinEdges,
    layout: BinLayout,
}

/// Resolves `params` into a fully determined [`BinSpec`].
///
/// Fails with a configuration error when the wrong number of parameters is
/// supplied, when `min_sep >= max_sep`, when `min_sep` is given for TwoD
/// bins or when a parameter has an invalid value. A `bin_slop` that implies
/// more than 10% binning error is logged as a warning but otherwise honored.
pub fn resolve_bin_spec(params: &BinParams) -> Result<BinSpec, Error> {
    check_values(params)?;
    if let Some(nbins) = params.nbins {
        if total_bins(params.bin_type, nbins).is_none() {
            return Err(Error::param_value(
                "nbins",
                nbins as f64,
                "implies more bins than can be allocated",
            ));
        }
    }
    let knowns = classify(params)?;
    let bin_type = params.bin_type;
    let extent = match bin_type {
        BinType::Log => log_extent(knowns)?,
        BinType::Linear => linear_extent(knowns)?,
        BinType::TwoD => twod_extent(knowns)?,
    };
    if total_bins(bin_type, extent.nbins).is_none() {
        return Err(Error::param_value(
            "bin_size",
            extent.bin_size,
            "is too small for the separation range",
        ));
    }

    let axis_edges = match bin_type {
        BinType::Log => {
            RegularBinEdges::new(extent.min_sep.ln(), extent.max_sep.ln(), extent.nbins)
        }
        BinType::Linear => RegularBinEdges::new(extent.min_sep, extent.max_sep, extent.nbins),
        BinType::TwoD => RegularBinEdges::new(-extent.max_sep, extent.max_sep, extent.nbins),
    }
    .map_err(|what| Error::bin_edge("the separation range", what))?;

    let layout = match bin_type {
        BinType::Log | BinType::Linear => radial_layout(bin_type, &extent, &axis_edges),
        BinType::TwoD => twod_layout(&extent, &axis_edges),
    };
    check_layout(&layout)?;

    log::info!(
        "nbins = {}, min,max sep = {}..{}, bin_size = {}",
        extent.nbins,
        extent.min_sep,
        extent.max_sep,
        extent.bin_size
    );
    let tolerance = tolerance(bin_type, &extent, params.bin_slop);

    Ok(BinSpec {
        bin_type,
        nbins: extent.nbins,
        bin_size: extent.bin_size,
        min_sep: extent.min_sep,
        max_sep: extent.max_sep,
        tolerance,
        axis_edges,
        layout,
    })
}

/// verify that the edges along each axis are strictly increasing
fn check_layout(layout: &BinLayout) -> Result<(), Error> {
    let (left, right, who) = match layout {
        BinLayout::Radial {
            left_edges,
            right_edges,
            ..
        } => (left_edges.view(), right_edges.view(), "the radial bin edges"),
        BinLayout::TwoD {
            left_edges,
            right_edges,
            ..
        } => (left_edges.row(0), right_edges.row(0), "the TwoD axis edges"),
    };
    let mut edges: Vec<f64> = left.to_vec();
    if let Some(last) = right.last() {
        edges.push(*last);
    }
    validate_bin_edges(&edges).map_err(|what| Error::bin_edge(who, what))
}

impl BinSpec {
    pub fn bin_type(&self) -> BinType {
        self.bin_type
    }

    /// The number of bins along an axis. See [`BinSpec::n_effective_bins`]
    /// for the total number of bins.
    pub fn nbins(&self) -> usize {
        self.nbins
    }

    /// the total number of bins: `nbins` for radial bins and `nbins²` for
    /// TwoD bins. This is the length of a single statistic vector.
    pub fn n_effective_bins(&self) -> usize {
        match self.bin_type {
            // resolution caps nbins², so this can't overflow
            BinType::TwoD => self.nbins * self.nbins,
            BinType::Log | BinType::Linear => self.nbins,
        }
    }

    /// the bin width; in `ln(sep)` for Log bins
    pub fn bin_size(&self) -> f64 {
        self.bin_size
    }

    /// the lower end of the range (always 0 for TwoD bins)
    pub fn min_sep(&self) -> f64 {
        self.min_sep
    }

    pub fn max_sep(&self) -> f64 {
        self.max_sep
    }

    pub fn bin_slop(&self) -> f64 {
        self.tolerance.bin_slop
    }

    /// the traversal tolerance handed to the external tree traversal
    pub fn b(&self) -> f64 {
        self.tolerance.b
    }

    pub fn min_log_bin_size(&self) -> f64 {
        self.tolerance.min_log_bin_size
    }

    pub fn max_log_bin_size(&self) -> f64 {
        self.tolerance.max_log_bin_size
    }

    /// the largest bin_slop that keeps the binning error below 10%
    pub fn max_good_slop(&self) -> f64 {
        self.tolerance.max_good_slop
    }

    pub fn layout(&self) -> &BinLayout {
        &self.layout
    }

    /// Nominal separation of each radial bin. `None` for TwoD bins (use
    /// [`BinSpec::rnom_2d`]).
    pub fn rnom(&self) -> Option<ArrayView1<f64>> {
        match &self.layout {
            BinLayout::Radial { rnom, .. } => Some(rnom.view()),
            BinLayout::TwoD { .. } => None,
        }
    }

    /// `ln` of the nominal separation of each radial bin
    pub fn logr(&self) -> Option<ArrayView1<f64>> {
        match &self.layout {
            BinLayout::Radial { logr, .. } => Some(logr.view()),
            BinLayout::TwoD { .. } => None,
        }
    }

    /// the left edges along the separation axis. For TwoD bins, this is the
    /// edge along the dx axis
    pub fn left_edges(&self) -> ArrayView1<f64> {
        match &self.layout {
            BinLayout::Radial { left_edges, .. } => left_edges.view(),
            BinLayout::TwoD { left_edges, .. } => left_edges.row(0),
        }
    }

    pub fn right_edges(&self) -> ArrayView1<f64> {
        match &self.layout {
            BinLayout::Radial { right_edges, .. } => right_edges.view(),
            BinLayout::TwoD { right_edges, .. } => right_edges.row(0),
        }
    }

    /// Nominal separation of each TwoD cell. `None` for radial bins.
    pub fn rnom_2d(&self) -> Option<ArrayView2<f64>> {
        match &self.layout {
            BinLayout::TwoD { rnom, .. } => Some(rnom.view()),
            BinLayout::Radial { .. } => None,
        }
    }

    /// `ln` of the nominal separation of each TwoD cell.
    pub fn logr_2d(&self) -> Option<ArrayView2<f64>> {
        match &self.layout {
            BinLayout::TwoD { logr, .. } => Some(logr.view()),
            BinLayout::Radial { .. } => None,
        }
    }

    /// Locate the radial bin holding the separation `sep`. Bins don't
    /// include their right edge. Always `None` for TwoD bins.
    pub fn bin_index(&self, sep: f64) -> Option<usize> {
        match self.bin_type {
            BinType::Log if sep > 0.0 => self.axis_edges.bin_index(sep.ln()),
            BinType::Log => None,
            BinType::Linear => self.axis_edges.bin_index(sep),
            BinType::TwoD => None,
        }
    }

    /// Locate the TwoD cell holding the offset `(dx, dy)`, as a flattened
    /// row-major index (row = dy). Always `None` for radial bins.
    pub fn bin_index_2d(&self, dx: f64, dy: f64) -> Option<usize> {
        if self.bin_type != BinType::TwoD {
            return None;
        }
        let col = self.axis_edges.bin_index(dx)?;
        let row = self.axis_edges.bin_index(dy)?;
        Some(row * self.nbins + col)
    }

    /// The range of cell sizes that can influence whether the traversal
    /// splits a cell.
    ///
    /// For the Euclidean metric, cells smaller than `b·min_sep/(2+3b)` never
    /// need to be split further and cells larger than `b·max_sep` always
    /// need to be split. For any other metric, this returns `(0, 0)`, which
    /// tells the index to go all the way to the leaves.
    pub fn min_max_cell_size(&self, metric: Metric) -> (f64, f64) {
        if metric == Metric::Euclidean {
            // 2 cells that barely avoid splitting satisfy d + s1 + s2 = min_sep;
            // the largest s2 we need to consider is 2 s1 and s1 = b d / 2
            let b = self.b();
            let min_size = self.min_sep * b / (2.0 + 3.0 * b);
            let max_size = self.max_sep * b;
            (min_size, max_size)
        } else {
            (0.0, 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    #[test]
    fn log_scenario() {
        let params = BinParams::new(BinType::Log).min_sep(1.0).max_sep(10.0).nbins(5);
        let spec = resolve_bin_spec(&params).unwrap();
        assert!((spec.bin_size() - 10f64.ln() / 5.0).abs() < 1e-15);
        let rnom = spec.rnom().unwrap();
        assert!((rnom[0] - 1.2589254117941673).abs() < 1e-12);
        assert_eq!(spec.min_log_bin_size(), spec.bin_size());
        // bin_size > 0.1, so the default slop is 0.1 / bin_size
        assert!((spec.bin_slop() - 0.1 / spec.bin_size()).abs() < 1e-12);
        assert!((spec.b() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn nbins_rounds_up() {
        let spec = resolve_bin_spec(
            &BinParams::new(BinType::Linear).min_sep(0.0).max_sep(10.0).bin_size(3.0),
        )
        .unwrap();
        assert_eq!(spec.nbins(), 4);
        assert_eq!(spec.bin_size(), 2.5);
        assert_eq!(spec.rnom().unwrap().to_vec(), vec![1.25, 3.75, 6.25, 8.75]);
        // rnom = 1.25 gives max_log_bin_size = 2.5 / 1.25 = 2
        assert_eq!(spec.max_log_bin_size(), 2.0);
        assert_eq!(spec.bin_slop(), 0.05);
    }

    #[test]
    fn param_count() {
        let four = BinParams::new(BinType::Log)
            .min_sep(1.0)
            .max_sep(10.0)
            .nbins(5)
            .bin_size(0.1);
        let err = resolve_bin_spec(&four).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let two = BinParams::new(BinType::Linear).min_sep(1.0).max_sep(10.0);
        assert!(resolve_bin_spec(&two).is_err());

        let twod_three = BinParams::new(BinType::TwoD).max_sep(10.0).nbins(5).bin_size(4.0);
        assert!(resolve_bin_spec(&twod_three).is_err());

        let twod_min = BinParams::new(BinType::TwoD).min_sep(1.0).max_sep(10.0).nbins(5);
        assert!(resolve_bin_spec(&twod_min).is_err());
    }

    #[test]
    fn bad_values() {
        let base = BinParams::new(BinType::Log).max_sep(10.0).nbins(5);
        assert!(resolve_bin_spec(&base.clone().min_sep(0.0)).is_err());
        assert!(resolve_bin_spec(&base.clone().min_sep(10.0)).is_err());
        assert!(resolve_bin_spec(&base.clone().min_sep(20.0)).is_err());
        assert!(resolve_bin_spec(&base.clone().min_sep(1.0).bin_slop(-1.0)).is_err());
        let zero_bins = BinParams::new(BinType::Log).min_sep(1.0).max_sep(2.0).nbins(0);
        assert!(resolve_bin_spec(&zero_bins).is_err());
        assert!(
            resolve_bin_spec(&BinParams::new(BinType::Log).min_sep(1.0).max_sep(2.0).bin_size(0.0))
                .is_err()
        );
        // the derived min_sep would be negative
        let linear = BinParams::new(BinType::Linear).max_sep(1.0).nbins(10).bin_size(1.0);
        assert!(resolve_bin_spec(&linear).is_err());
    }

    #[test]
    fn too_many_bins() {
        let tiny = BinParams::new(BinType::Log).min_sep(1.0).max_sep(10.0).bin_size(1e-300);
        let err = resolve_bin_spec(&tiny).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let linear = BinParams::new(BinType::Linear).min_sep(0.0).max_sep(1.0).bin_size(1e-9);
        assert!(resolve_bin_spec(&linear).is_err());

        let huge = BinParams::new(BinType::Linear).min_sep(0.0).max_sep(1.0).nbins(usize::MAX);
        assert!(resolve_bin_spec(&huge).is_err());

        // 4097² exceeds the cap even though 4097 alone doesn't
        let grid = BinParams::new(BinType::TwoD).max_sep(1.0).nbins(4097);
        assert!(resolve_bin_spec(&grid).is_err());
        let grid = BinParams::new(BinType::TwoD).max_sep(1.0).nbins(usize::MAX);
        assert!(resolve_bin_spec(&grid).is_err());
        let grid = BinParams::new(BinType::TwoD).max_sep(1.0).bin_size(1e-4);
        assert!(resolve_bin_spec(&grid).is_err());

        assert_eq!(total_bins(BinType::TwoD, 4096), Some(MAX_BINS));
        assert_eq!(total_bins(BinType::Log, MAX_BINS + 1), None);
    }

    #[test]
    fn large_slop_is_honored() {
        let spec = resolve_bin_spec(
            &BinParams::new(BinType::Log)
                .min_sep(1.0)
                .max_sep(10.0)
                .nbins(5)
                .bin_slop(1.0),
        )
        .unwrap();
        assert_eq!(spec.bin_slop(), 1.0);
        assert_eq!(spec.b(), spec.bin_size());
    }

    #[test]
    fn bin_lookup() {
        let params = BinParams::new(BinType::Log).min_sep(1.0).max_sep(100.0).nbins(2);
        let spec = resolve_bin_spec(&params).unwrap();
        assert_eq!(spec.bin_index(0.5), None);
        assert_eq!(spec.bin_index(1.0), Some(0));
        assert_eq!(spec.bin_index(9.0), Some(0));
        assert_eq!(spec.bin_index(11.0), Some(1));
        assert_eq!(spec.bin_index(100.0), None);
        assert_eq!(spec.bin_index(-3.0), None);
        assert_eq!(spec.bin_index_2d(1.0, 1.0), None);

        let twod =
            resolve_bin_spec(&BinParams::new(BinType::TwoD).max_sep(2.0).nbins(4)).unwrap();
        assert_eq!(twod.bin_index(1.0), None);
        assert_eq!(twod.bin_index_2d(-1.5, -1.5), Some(0));
        assert_eq!(twod.bin_index_2d(1.5, -1.5), Some(3));
        assert_eq!(twod.bin_index_2d(-1.5, 0.5), Some(8));
        assert_eq!(twod.bin_index_2d(2.5, 0.5), None);
    }

    #[test]
    fn cell_sizes() {
        let spec = resolve_bin_spec(
            &BinParams::new(BinType::Log)
                .min_sep(1.0)
                .max_sep(10.0)
                .nbins(5)
                .bin_slop(0.5),
        )
        .unwrap();
        let b = spec.b();
        let (min_size, max_size) = spec.min_max_cell_size(Metric::Euclidean);
        assert_eq!(min_size, b / (2.0 + 3.0 * b));
        assert_eq!(max_size, 10.0 * b);
        assert_eq!(spec.min_max_cell_size(Metric::Arc), (0.0, 0.0));
    }

    #[test]
    fn parse_bin_type() {
        assert_eq!("TwoD".parse::<BinType>().unwrap(), BinType::TwoD);
        assert!("Logarithmic".parse::<BinType>().is_err());
    }
}
