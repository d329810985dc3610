//! Filter configuration.
//!
//! [`FilterConfig`] is the immutable parameter record handed to
//! [`ParticleFilter::new`](crate::filter::ParticleFilter::new). It can be written to and read
//! from JSON, YAML, or TOML files; the format is chosen by file extension.
//!
//! ```
//! use potfilter::config::FilterConfig;
//!
//! let config = FilterConfig {
//!     particle_count: 500,
//!     seed: 7,
//!     ..FilterConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::FilterError;
use crate::estimate::AveragingStrategy;
use crate::resample::ResamplingStrategy;

/// Default seed value for reproducible runs
fn default_seed() -> u64 {
    42
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Number of particles, fixed for the lifetime of a run.
    pub particle_count: usize,
    /// Mean of the Gaussian prior over the pot size.
    pub initial_estimate_mean: f64,
    /// Standard deviation of the Gaussian prior over the pot size.
    pub initial_estimate_std: f64,
    /// Fixed, externally known probability of winning; maps a pot size to an expected bid.
    pub win_probability: f64,
    /// Standard deviation of the random walk applied to every particle between observations.
    pub process_noise_std: f64,
    /// Assumed standard deviation of an observed bid around its predicted value.
    pub measurement_noise_std: f64,
    /// Seed for the filter's random number generator.
    ///
    /// Identical seeds, configurations, and observation sequences reproduce identical
    /// estimate sequences.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub resampling_strategy: ResamplingStrategy,
    #[serde(default)]
    pub averaging_strategy: AveragingStrategy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            particle_count: 1_000,
            initial_estimate_mean: 250_000.0,
            initial_estimate_std: 30_000.0,
            win_probability: 0.05,
            process_noise_std: 1_000.0,
            measurement_noise_std: 1_000.0,
            seed: default_seed(),
            resampling_strategy: ResamplingStrategy::default(),
            averaging_strategy: AveragingStrategy::default(),
        }
    }
}

impl FilterConfig {
    /// Check every parameter against its valid domain.
    ///
    /// # Errors
    /// Returns [`FilterError::Configuration`] naming the first offending parameter.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.particle_count < 1 {
            return Err(FilterError::configuration(
                "particle_count",
                "must be at least 1",
            ));
        }
        if !self.initial_estimate_mean.is_finite() {
            return Err(FilterError::configuration(
                "initial_estimate_mean",
                format!("must be finite, got {}", self.initial_estimate_mean),
            ));
        }
        non_negative_std("initial_estimate_std", self.initial_estimate_std)?;
        non_negative_std("process_noise_std", self.process_noise_std)?;
        non_negative_std("measurement_noise_std", self.measurement_noise_std)?;
        if self.measurement_noise_std == 0.0 {
            return Err(FilterError::configuration(
                "measurement_noise_std",
                "must be strictly positive",
            ));
        }
        if !(self.win_probability > 0.0 && self.win_probability <= 1.0) {
            return Err(FilterError::configuration(
                "win_probability",
                format!("must lie in (0, 1], got {}", self.win_probability),
            ));
        }
        Ok(())
    }

    /// Write the configuration, choosing the format from the extension (.json/.yaml/.yml/.toml).
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        let text = ConfigFormat::from_path(path)?.encode(self)?;
        fs::write(path, text)
    }

    /// Read a configuration written by [`FilterConfig::to_file`]. Missing optional fields take
    /// their defaults; the result is not validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        format.decode(&fs::read_to_string(path)?)
    }
}

/// On-disk configuration formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// # Errors
    /// Returns [`io::ErrorKind::InvalidInput`] for any other extension.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match extension.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported configuration file extension: {}", path.display()),
            )),
        }
    }

    fn encode(self, config: &FilterConfig) -> io::Result<String> {
        match self {
            ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(io::Error::other),
            ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(io::Error::other),
            ConfigFormat::Toml => toml::to_string(config).map_err(io::Error::other),
        }
    }

    fn decode(self, text: &str) -> io::Result<FilterConfig> {
        match self {
            ConfigFormat::Json => serde_json::from_str(text).map_err(io::Error::other),
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(io::Error::other),
            ConfigFormat::Toml => toml::from_str(text).map_err(io::Error::other),
        }
    }
}

pub(crate) fn non_negative_std(parameter: &'static str, value: f64) -> Result<(), FilterError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FilterError::configuration(
            parameter,
            format!("must be a finite, non-negative standard deviation, got {value}"),
        ))
    }
}
