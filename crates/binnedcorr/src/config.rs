//! TOML configuration for a correlation calculation.
//!
//! Every key is optional. For example:
//!
//! ```toml
//! bin_type = "Linear"
//! min_sep = 1.0
//! max_sep = 20.0
//! nbins = 19
//! metric = "Rperp"
//! max_rpar = 30.0
//! var_method = "jackknife"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    Error,
    accumulate::Correlation,
    binning::{BinParams, BinType, resolve_bin_spec},
    covariance::{DEFAULT_NUM_BOOTSTRAP, VarMethod},
    metric::{Metric, MetricOptions},
};

/// The user-facing configuration. Unknown keys are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrConfig {
    pub bin_type: BinType,
    pub nbins: Option<usize>,
    pub bin_size: Option<f64>,
    pub min_sep: Option<f64>,
    pub max_sep: Option<f64>,
    pub bin_slop: Option<f64>,
    pub metric: Metric,
    pub min_rpar: Option<f64>,
    pub max_rpar: Option<f64>,
    /// the default for `xperiod`, `yperiod` and `zperiod`
    pub period: Option<f64>,
    pub xperiod: Option<f64>,
    pub yperiod: Option<f64>,
    pub zperiod: Option<f64>,
    /// whether positions are 3-d
    pub three_d: bool,
    pub var_method: VarMethod,
    pub num_bootstrap: usize,
}

impl Default for CorrConfig {
    fn default() -> Self {
        CorrConfig {
            bin_type: BinType::default(),
            nbins: None,
            bin_size: None,
            min_sep: None,
            max_sep: None,
            bin_slop: None,
            metric: Metric::default(),
            min_rpar: None,
            max_rpar: None,
            period: None,
            xperiod: None,
            yperiod: None,
            zperiod: None,
            three_d: false,
            var_method: VarMethod::default(),
            num_bootstrap: DEFAULT_NUM_BOOTSTRAP,
        }
    }
}

impl CorrConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::config_parse("<string>".to_owned(), e))
    }

    /// Load a configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| Error::config_parse(name.clone(), e))?;
        let config = toml::from_str(&text).map_err(|e| Error::config_parse(name, e))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn bin_params(&self) -> BinParams {
        BinParams {
            bin_type: self.bin_type,
            nbins: self.nbins,
            bin_size: self.bin_size,
            min_sep: self.min_sep,
            max_sep: self.max_sep,
            bin_slop: self.bin_slop,
        }
    }

    pub fn metric_options(&self) -> MetricOptions {
        MetricOptions {
            metric: self.metric,
            min_rpar: self.min_rpar,
            max_rpar: self.max_rpar,
            xperiod: self.xperiod.or(self.period),
            yperiod: self.yperiod.or(self.period),
            zperiod: self.zperiod.or(self.period),
            three_d: self.three_d,
        }
    }
}

impl Correlation {
    /// Resolve `config` and create a calculation for results holding
    /// `n_stats` statistics.
    pub fn from_config(config: &CorrConfig, n_stats: usize) -> Result<Self, Error> {
        let bin_spec = resolve_bin_spec(&config.bin_params())?;
        Ok(Correlation::new(bin_spec, config.metric_options(), n_stats)?
            .with_var_method(config.var_method)
            .with_num_bootstrap(config.num_bootstrap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = CorrConfig::from_toml_str("").unwrap();
        assert_eq!(config, CorrConfig::default());
        assert_eq!(config.num_bootstrap, 500);
        assert_eq!(config.var_method, VarMethod::Shot);
    }

    #[test]
    fn parse_and_build() {
        let config = CorrConfig::from_toml_str(
            r#"
            bin_type = "Linear"
            min_sep = 1.0
            max_sep = 20.0
            nbins = 19
            metric = "Rperp"
            max_rpar = 30.0
            var_method = "jackknife"
            num_bootstrap = 10
            some_unrelated_key = "ignored"
            "#,
        )
        .unwrap();
        assert_eq!(config.metric, Metric::FisherRperp);

        let corr = Correlation::from_config(&config, 2).unwrap();
        assert_eq!(corr.bin_spec().bin_type(), BinType::Linear);
        assert_eq!(corr.bin_spec().bin_size(), 1.0);
        assert_eq!(corr.stat_len(), 38);
        assert_eq!(corr.var_method(), VarMethod::Jackknife);
        assert_eq!(corr.metric_options().max_rpar(), 30.0);
    }

    #[test]
    fn period_fills_axes() {
        let config = CorrConfig::from_toml_str(
            "metric = \"Periodic\"\nperiod = 100.0\nzperiod = 50.0\n",
        )
        .unwrap();
        let opts = config.metric_options();
        assert_eq!(opts.periods(), [100.0, 100.0, 50.0]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn bad_values() {
        let err = CorrConfig::from_toml_str("var_method = \"marked\"").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);

        // 4 binning parameters is one too many
        let config = CorrConfig::from_toml_str(
            "min_sep = 1.0\nmax_sep = 10.0\nnbins = 5\nbin_size = 0.1\n",
        )
        .unwrap();
        let err = Correlation::from_config(&config, 1).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_sep = 5.0\nmax_sep = 500.0\nbin_size = 0.1").unwrap();
        let config = CorrConfig::from_path(file.path()).unwrap();
        assert_eq!(config.bin_size, Some(0.1));

        let missing = file.path().with_extension("missing");
        let err = CorrConfig::from_path(&missing).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
