// We keep the shape of the error type opaque: callers get a single `Error`
// struct and can ask which broad category it falls into, but the detailed
// variants stay private so we can rearrange them freely.
//
// Errors raised inside `binnedcorr_nostd_internal` are `&'static str`. We
// wrap them in `ErrorKind::Internal` at the crate boundary.

use crate::binning::BinType;
use crate::patch::PatchKey;

/// The broad categories of failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A problem with the supplied configuration (binning parameters,
    /// metric options, estimator settings). Raised when the configuration
    /// is resolved.
    Configuration,
    /// The accumulated per-patch results don't have the structure needed by
    /// a covariance estimator.
    PatchStructure,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The underlying internal error type
#[non_exhaustive]
#[derive(Clone, Debug, thiserror::Error)]
enum ErrorKind {
    /// The wrong number of binning parameters was supplied
    #[error(
        "{bin_type:?} binning requires exactly {expected} of {choices}, but {provided} were given \
         ({given:?})"
    )]
    BinParamCount {
        bin_type: BinType,
        expected: usize,
        provided: usize,
        choices: &'static str,
        given: Vec<&'static str>,
    },
    /// TwoD binning derives its own range, so min_sep can't be specified
    #[error(
        "min_sep ({min_sep}) can't be specified for TwoD binning; the range is -max_sep..max_sep"
    )]
    TwoDMinSep { min_sep: f64 },
    /// The resolved bin edges are unusable
    #[error("problem with {who}: {what}")]
    BinEdge {
        who: &'static str,
        what: &'static str,
    },
    /// min_sep and max_sep are out of order
    #[error("max_sep ({max_sep}) must be larger than min_sep ({min_sep})")]
    SepOrdering { min_sep: f64, max_sep: f64 },
    /// A numeric parameter has an invalid value
    #[error("{name} has a value of {value}; it {requirement}")]
    ParamValue {
        name: &'static str,
        value: f64,
        requirement: &'static str,
    },
    /// An unknown name was given for an enumerated option
    #[error("{actual:?} is not a valid {what}. Choices include: {choices:?}")]
    UnknownName {
        what: &'static str,
        actual: String,
        choices: &'static [&'static str],
    },
    /// A metric-specific option was misused
    #[error("{option} is not valid for the {metric} metric")]
    MetricOption {
        metric: &'static str,
        option: &'static str,
    },
    /// The Periodic metric needs a period along every axis
    #[error("Periodic metric requires setting the period to use (missing {axis})")]
    MissingPeriod { axis: &'static str },
    /// min_rpar and max_rpar are out of order
    #[error("min_rpar ({min_rpar}) must be <= max_rpar ({max_rpar})")]
    RparOrdering { min_rpar: f64, max_rpar: f64 },
    /// The configuration file couldn't be read or parsed
    #[error("problem with configuration {source_name}: {what}")]
    ConfigParse { source_name: String, what: String },
    /// A covariance method that resamples patches was requested without
    /// any patch-keyed results
    #[error("{method} covariance requires processing using patches")]
    PatchesRequired { method: &'static str },
    /// The patch indices along one axis aren't the contiguous range 0..n
    #[error("patch indices for catalog {axis} must be 0..{n}, found {found:?}")]
    PatchIndexGap {
        axis: u8,
        n: usize,
        found: Vec<usize>,
    },
    /// The two catalogs used incompatible patch counts
    #[error(
        "all catalogs must use the same number of patches or use 1 patch (got {npatch1} and \
         {npatch2})"
    )]
    PatchCountMismatch { npatch1: usize, npatch2: usize },
    /// Correlations combined in one covariance estimate used different patches
    #[error(
        "all correlation functions must have used the same patches: result set {index} has \
         {npatch1}x{npatch2} patches, expected each count to be 1 or {npatch}"
    )]
    MultiPatchMismatch {
        index: usize,
        npatch: usize,
        npatch1: usize,
        npatch2: usize,
    },
    /// Too few samples for an estimator's normalization
    #[error("{method} covariance requires at least 2 {what}, got {actual}")]
    TooFewSamples {
        method: &'static str,
        what: &'static str,
        actual: usize,
    },
    /// A partial result has the wrong length
    #[error("the result for {key} has length {actual}, expected {expected}")]
    StatLen {
        key: PatchKey,
        expected: usize,
        actual: usize,
    },
    /// An error that occurs within `binnedcorr_nostd_internal`, or a malformed
    /// argument reported in the same terse style
    #[error("{message}")]
    Internal {
        category: ErrorCategory,
        message: &'static str,
    },
}

impl ErrorKind {
    fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::BinParamCount { .. }
            | ErrorKind::TwoDMinSep { .. }
            | ErrorKind::BinEdge { .. }
            | ErrorKind::SepOrdering { .. }
            | ErrorKind::ParamValue { .. }
            | ErrorKind::UnknownName { .. }
            | ErrorKind::MetricOption { .. }
            | ErrorKind::MissingPeriod { .. }
            | ErrorKind::RparOrdering { .. }
            | ErrorKind::ConfigParse { .. } => ErrorCategory::Configuration,
            ErrorKind::PatchesRequired { .. }
            | ErrorKind::PatchIndexGap { .. }
            | ErrorKind::PatchCountMismatch { .. }
            | ErrorKind::MultiPatchMismatch { .. }
            | ErrorKind::TooFewSamples { .. }
            | ErrorKind::StatLen { .. } => ErrorCategory::PatchStructure,
            ErrorKind::Internal { category, .. } => *category,
        }
    }
}

// define constructor methods for Error
impl Error {
    /// Which broad category the error belongs to
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// produce an error indicating the wrong number of binning parameters
    /// were given
    pub(crate) fn bin_param_count(
        bin_type: BinType,
        expected: usize,
        choices: &'static str,
        given: Vec<&'static str>,
    ) -> Self {
        Error {
            kind: ErrorKind::BinParamCount {
                bin_type,
                expected,
                provided: given.len(),
                choices,
                given,
            },
        }
    }

    pub(crate) fn twod_min_sep(min_sep: f64) -> Self {
        Error {
            kind: ErrorKind::TwoDMinSep { min_sep },
        }
    }

    /// produce an error indicating that the resolved bin edges are unusable
    pub(crate) fn bin_edge(who: &'static str, what: &'static str) -> Self {
        Error {
            kind: ErrorKind::BinEdge { who, what },
        }
    }

    pub(crate) fn sep_ordering(min_sep: f64, max_sep: f64) -> Self {
        Error {
            kind: ErrorKind::SepOrdering { min_sep, max_sep },
        }
    }

    /// produce an error indicating that a numeric parameter is invalid.
    /// `requirement` should read naturally after "it", e.g. "must be positive"
    pub(crate) fn param_value(name: &'static str, value: f64, requirement: &'static str) -> Self {
        Error {
            kind: ErrorKind::ParamValue {
                name,
                value,
                requirement,
            },
        }
    }

    pub(crate) fn unknown_name(
        what: &'static str,
        actual: &str,
        choices: &'static [&'static str],
    ) -> Self {
        Error {
            kind: ErrorKind::UnknownName {
                what,
                actual: actual.to_owned(),
                choices,
            },
        }
    }

    pub(crate) fn metric_option(metric: &'static str, option: &'static str) -> Self {
        Error {
            kind: ErrorKind::MetricOption { metric, option },
        }
    }

    pub(crate) fn missing_period(axis: &'static str) -> Self {
        Error {
            kind: ErrorKind::MissingPeriod { axis },
        }
    }

    pub(crate) fn rpar_ordering(min_rpar: f64, max_rpar: f64) -> Self {
        Error {
            kind: ErrorKind::RparOrdering { min_rpar, max_rpar },
        }
    }

    pub(crate) fn config_parse(source_name: String, err: impl std::fmt::Display) -> Self {
        Error {
            kind: ErrorKind::ConfigParse {
                source_name,
                what: err.to_string(),
            },
        }
    }

    pub(crate) fn patches_required(method: &'static str) -> Self {
        Error {
            kind: ErrorKind::PatchesRequired { method },
        }
    }

    pub(crate) fn patch_index_gap(axis: u8, n: usize, found: Vec<usize>) -> Self {
        Error {
            kind: ErrorKind::PatchIndexGap { axis, n, found },
        }
    }

    pub(crate) fn patch_count_mismatch(npatch1: usize, npatch2: usize) -> Self {
        Error {
            kind: ErrorKind::PatchCountMismatch { npatch1, npatch2 },
        }
    }

    pub(crate) fn multi_patch_mismatch(
        index: usize,
        npatch: usize,
        npatch1: usize,
        npatch2: usize,
    ) -> Self {
        Error {
            kind: ErrorKind::MultiPatchMismatch {
                index,
                npatch,
                npatch1,
                npatch2,
            },
        }
    }

    pub(crate) fn too_few_samples(method: &'static str, what: &'static str, actual: usize) -> Self {
        Error {
            kind: ErrorKind::TooFewSamples {
                method,
                what,
                actual,
            },
        }
    }

    pub(crate) fn stat_len(key: PatchKey, expected: usize, actual: usize) -> Self {
        Error {
            kind: ErrorKind::StatLen {
                key,
                expected,
                actual,
            },
        }
    }

    /// wraps an error string from `binnedcorr_nostd_internal` raised while
    /// combining accumulated results
    pub(crate) fn internal(message: &'static str) -> Self {
        Error {
            kind: ErrorKind::Internal {
                category: ErrorCategory::PatchStructure,
                message,
            },
        }
    }

    /// like [`Error::internal`], for malformed caller-supplied arguments
    pub(crate) fn internal_config(message: &'static str) -> Self {
        Error {
            kind: ErrorKind::Internal {
                category: ErrorCategory::Configuration,
                message,
            },
        }
    }
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.kind, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_values() {
        let err = Error::sep_ordering(10.0, 1.0);
        assert_eq!(err.category(), ErrorCategory::Configuration);
        let msg = err.to_string();
        assert!(msg.contains("10") && msg.contains('1'), "{msg}");

        let err = Error::patch_count_mismatch(3, 4);
        assert_eq!(err.category(), ErrorCategory::PatchStructure);
        assert!(err.to_string().contains("3 and 4"));
    }

    #[test]
    fn param_count_lists_given() {
        let err = Error::bin_param_count(
            BinType::Log,
            3,
            "nbins, bin_size, min_sep, max_sep",
            vec!["nbins", "bin_size", "min_sep", "max_sep"],
        );
        let msg = err.to_string();
        assert!(msg.contains("exactly 3"), "{msg}");
        assert!(msg.contains("4 were given"), "{msg}");
    }

    #[test]
    fn internal_categories() {
        let err = Error::internal("can't merge buffers with different lengths");
        assert_eq!(err.category(), ErrorCategory::PatchStructure);
        let err = Error::internal_config("stat and weight must have the same length");
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.to_string(), "stat and weight must have the same length");
    }
}
