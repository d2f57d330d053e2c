//! Names the distance metric used by the external pair counter.
//!
//! We never compute distances here. The metric only matters in 2 places:
//! - it decides whether the cell-size bounds can be tightened (see
//!   [`crate::BinSpec::min_max_cell_size`])
//! - some options (Rparallel limits and periods) only make sense for some
//!   metrics, and we validate that up front.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The distance definition used when counting pairs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    /// straight line Euclidean distance between two points
    #[default]
    Euclidean,
    /// the perpendicular component of the distance, following Fisher et al.
    /// (1994). "Rperp" is an alias
    #[serde(alias = "Rperp")]
    FisherRperp,
    /// the older definition of the perpendicular component
    OldRperp,
    /// distance from the lens to the line joining the observer and source
    Rlens,
    /// great circle distance on the sphere
    Arc,
    /// Euclidean distance with periodic boundaries
    Periodic,
}

impl Metric {
    const NAMES: &'static [&'static str] = &[
        "Euclidean",
        "Rperp",
        "FisherRperp",
        "OldRperp",
        "Rlens",
        "Arc",
        "Periodic",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Euclidean => "Euclidean",
            Metric::FisherRperp => "FisherRperp",
            Metric::OldRperp => "OldRperp",
            Metric::Rlens => "Rlens",
            Metric::Arc => "Arc",
            Metric::Periodic => "Periodic",
        }
    }

    /// whether min_rpar/max_rpar may be used with this metric
    pub fn supports_rpar(&self) -> bool {
        matches!(
            self,
            Metric::FisherRperp | Metric::OldRperp | Metric::Rlens | Metric::Arc
        )
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Euclidean" => Ok(Metric::Euclidean),
            "Rperp" | "FisherRperp" => Ok(Metric::FisherRperp),
            "OldRperp" => Ok(Metric::OldRperp),
            "Rlens" => Ok(Metric::Rlens),
            "Arc" => Ok(Metric::Arc),
            "Periodic" => Ok(Metric::Periodic),
            _ => Err(Error::unknown_name("metric", s, Metric::NAMES)),
        }
    }
}

/// Metric-specific options, validated against the chosen [`Metric`].
///
/// A period of 0 (or `None`) means "no period along that axis".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricOptions {
    pub metric: Metric,
    pub min_rpar: Option<f64>,
    pub max_rpar: Option<f64>,
    pub xperiod: Option<f64>,
    pub yperiod: Option<f64>,
    pub zperiod: Option<f64>,
    /// whether the catalogs carry 3-d positions (then the Periodic metric
    /// also needs a z period)
    pub three_d: bool,
}

impl MetricOptions {
    pub fn new(metric: Metric) -> Self {
        MetricOptions {
            metric,
            ..Default::default()
        }
    }

    /// the smallest permitted difference in Rparallel
    pub fn min_rpar(&self) -> f64 {
        self.min_rpar.unwrap_or(-f64::MAX)
    }

    /// the largest permitted difference in Rparallel
    pub fn max_rpar(&self) -> f64 {
        self.max_rpar.unwrap_or(f64::MAX)
    }

    /// the periods along x, y and z (0 where unset)
    pub fn periods(&self) -> [f64; 3] {
        [
            self.xperiod.unwrap_or(0.0),
            self.yperiod.unwrap_or(0.0),
            self.zperiod.unwrap_or(0.0),
        ]
    }

    /// Checks that the options are consistent with the metric.
    pub fn validate(&self) -> Result<(), Error> {
        if self.min_rpar() > self.max_rpar() {
            return Err(Error::rpar_ordering(self.min_rpar(), self.max_rpar()));
        }
        if !self.metric.supports_rpar() {
            if self.min_rpar.is_some() {
                return Err(Error::metric_option(self.metric.name(), "min_rpar"));
            }
            if self.max_rpar.is_some() {
                return Err(Error::metric_option(self.metric.name(), "max_rpar"));
            }
        }

        let [xperiod, yperiod, zperiod] = self.periods();
        for (name, val) in [("xperiod", xperiod), ("yperiod", yperiod), ("zperiod", zperiod)] {
            if !val.is_finite() || val < 0.0 {
                return Err(Error::param_value(name, val, "must be finite and non-negative"));
            }
        }
        if self.metric == Metric::Periodic {
            if xperiod == 0.0 {
                return Err(Error::missing_period("xperiod"));
            } else if yperiod == 0.0 {
                return Err(Error::missing_period("yperiod"));
            } else if self.three_d && zperiod == 0.0 {
                return Err(Error::missing_period("zperiod"));
            }
        } else if xperiod != 0.0 || yperiod != 0.0 || zperiod != 0.0 {
            return Err(Error::metric_option(self.metric.name(), "period"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;

    #[test]
    fn parse_names() {
        assert_eq!("Rperp".parse::<Metric>().unwrap(), Metric::FisherRperp);
        assert_eq!("Arc".parse::<Metric>().unwrap(), Metric::Arc);
        let err = "Manhattan".parse::<Metric>().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("Manhattan"));
    }

    #[test]
    fn rpar_rules() {
        let mut opts = MetricOptions::new(Metric::Euclidean);
        assert!(opts.validate().is_ok());
        opts.min_rpar = Some(0.0);
        assert!(opts.validate().is_err());

        opts.metric = Metric::Rlens;
        assert!(opts.validate().is_ok());
        opts.max_rpar = Some(-1.0);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn period_rules() {
        let mut opts = MetricOptions::new(Metric::Periodic);
        assert!(opts.validate().is_err());
        opts.xperiod = Some(10.0);
        opts.yperiod = Some(12.0);
        assert!(opts.validate().is_ok());
        opts.three_d = true;
        assert!(opts.validate().is_err());
        opts.zperiod = Some(5.0);
        assert!(opts.validate().is_ok());

        opts.metric = Metric::Arc;
        assert!(opts.validate().is_err());
    }
}
