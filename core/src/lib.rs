//! Pot-size particle filter
//!
//! This crate estimates a single hidden scalar, the size of a pot, from a stream of noisy
//! observed bids. The belief over the pot size is represented by a set of weighted particles
//! and updated online with sequential importance resampling (SIR). After every observation
//! the filter produces a point estimate that incorporates all evidence seen so far.
//!
//! This crate is primarily built off of three additional dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): vector storage and arithmetic for the particles and weights.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): seeded random number generation for the prior, process noise, and resampling.
//!
//! All other functionality (configuration files, CSV records, synthetic data) is auxiliary.
//!
//! ## Crate overview
//!
//! - [config]: The filter configuration and its JSON/YAML/TOML file I/O.
//! - [error]: The error type shared by the filter stages.
//! - [particle]: The weighted particle set and its in-place stage operations.
//! - [transition]: The random-walk process model (predict).
//! - [observation]: The bid observation model, Gaussian likelihood, and reweighting (update).
//! - [resample]: Systematic resampling and alternative strategies (resample).
//! - [estimate]: Weighted mean and variance (estimate).
//! - [filter]: The filtering loop tying the stages together.
//! - [sim]: Synthetic bid generation and CSV import/export for driving the filter.
//!
//! ## Model
//!
//! The hidden state $x$ is the pot size. Between observations it follows a random walk
//!
//! $$
//! x_k = x_{k-1} + w_k, \quad w_k \sim \mathcal{N}(0, \sigma_p^2)
//! $$
//!
//! and an observed bid $z_k$ is the pot size scaled by a fixed, known win probability $p$
//! plus measurement noise
//!
//! $$
//! z_k = p \, x_k + v_k, \quad v_k \sim \mathcal{N}(0, \sigma_m^2).
//! $$
//!
//! The prior is $x_0 \sim \mathcal{N}(\mu_0, \sigma_0^2)$. The filter resamples after every
//! update, so the reported estimate is the arithmetic mean of equally weighted particles.
//!
//! ## Example
//!
//! ```
//! use potfilter::config::FilterConfig;
//! use potfilter::filter::ParticleFilter;
//! use potfilter::sim::synthetic_bids;
//!
//! let config = FilterConfig::default();
//! let bids = synthetic_bids(260_750.0, config.win_probability, 0.1, 64, 7).unwrap();
//! let mut pf = ParticleFilter::new(config).unwrap();
//! let estimates = pf.run(bids).unwrap();
//! let last = estimates.last().unwrap();
//! assert!((last.mean - 260_750.0).abs() < 60_000.0);
//! ```
pub mod config;
pub mod error;
pub mod estimate;
pub mod filter;
pub mod observation;
pub mod particle;
pub mod resample;
pub mod sim;
pub mod transition;

pub use config::FilterConfig;
pub use error::FilterError;
pub use estimate::Estimate;
pub use filter::ParticleFilter;
pub use particle::ParticleSet;
