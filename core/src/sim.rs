//! Simulation utilities and CSV data loading for the pot-size filter.
//!
//! This module provides:
//! - A struct (`BidRecord`) for reading and writing observed bids to/from CSV files
//! - `synthetic_bids` for generating a seeded sequence of noisy bids around a known pot size
//! - `FilterResult` and `EstimateRecord` for storing and exporting the estimate sequence
//! - `ParticleRecord` for exporting a final particle snapshot
//! - `run_filter`, a convenience wrapper that runs a filter over a bid sequence

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::config::{FilterConfig, non_negative_std};
use crate::error::FilterError;
use crate::estimate::Estimate;
use crate::filter::ParticleFilter;
use crate::particle::ParticleSet;

/// A single observed bid, one per CSV row under a `bid` header.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct BidRecord {
    pub bid: f64,
}

impl BidRecord {
    /// Reads a CSV file and returns a vector of `BidRecord` structs.
    ///
    /// # Arguments
    /// * `path` - Path to the CSV file to read.
    ///
    /// # Returns
    /// * `Ok(Vec<BidRecord>)` if successful.
    /// * `Err` if the file cannot be read or parsed.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, Box<dyn std::error::Error>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }

    /// Writes a slice of `BidRecord` structs to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Extract the raw bid values, preserving order.
    pub fn bids(records: &[Self]) -> Vec<f64> {
        records.iter().map(|r| r.bid).collect()
    }
}

/// Generate `count` bids drawn from `N(true_pot * win_probability, (relative_noise * true_pot * win_probability)²)`.
///
/// The sequence depends only on the arguments, so the same `seed` reproduces the same bids.
///
/// # Errors
/// Returns [`FilterError::Configuration`] if `relative_noise` is negative or the implied
/// standard deviation is negative or not finite.
pub fn synthetic_bids(
    true_pot: f64,
    win_probability: f64,
    relative_noise: f64,
    count: usize,
    seed: u64,
) -> Result<Vec<f64>, FilterError> {
    let mean = true_pot * win_probability;
    let std = relative_noise * mean;
    non_negative_std("relative_noise", relative_noise)?;
    non_negative_std("relative_noise", std)?;
    let distribution = Normal::new(mean, std).map_err(|e| {
        FilterError::configuration("relative_noise", format!("{e} (std {std})"))
    })?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok((0..count).map(|_| distribution.sample(&mut rng)).collect())
}

/// One row of filter output.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct EstimateRecord {
    /// Zero-based index of the observation
    pub step: usize,
    /// The observed bid consumed at this step
    pub observation: f64,
    /// Point estimate of the pot size after this step
    pub estimate: f64,
    /// Variance of the particle cloud after this step
    pub variance: f64,
}

/// Estimate sequence produced by one filter run.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub records: Vec<EstimateRecord>,
    /// Name or identifier for this run
    pub name: String,
}

impl FilterResult {
    pub fn new(name: &str) -> Self {
        FilterResult {
            records: Vec::new(),
            name: name.to_string(),
        }
    }

    /// Append the estimate produced for `observation`.
    pub fn push(&mut self, observation: f64, estimate: &Estimate) {
        self.records.push(EstimateRecord {
            step: self.records.len(),
            observation,
            estimate: estimate.mean,
            variance: estimate.variance,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn estimates(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.estimate).collect()
    }

    pub fn final_estimate(&self) -> Option<f64> {
        self.records.last().map(|r| r.estimate)
    }

    /// Writes the estimate sequence to a CSV file with a `step,observation,estimate,variance` header.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads an estimate sequence previously written with [`FilterResult::to_csv`].
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        name: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut result = FilterResult::new(name);
        for record in rdr.deserialize() {
            let record: EstimateRecord = record?;
            if record.step != result.records.len() {
                return Err(format!(
                    "estimate records out of order: expected step {}, found {}",
                    result.records.len(),
                    record.step
                )
                .into());
            }
            result.records.push(record);
        }
        Ok(result)
    }
}

/// One particle of a snapshot, for external visualization.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ParticleRecord {
    pub particle: f64,
    pub weight: f64,
}

impl ParticleRecord {
    pub fn from_set(set: &ParticleSet) -> Vec<Self> {
        set.iter()
            .map(|(particle, weight)| ParticleRecord { particle, weight })
            .collect()
    }

    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Run a fresh filter over `observations` and collect the estimates.
///
/// # Errors
/// Returns the first error raised while building or stepping the filter.
pub fn run_filter(
    config: FilterConfig,
    observations: &[f64],
    name: &str,
) -> Result<FilterResult, FilterError> {
    let mut pf = ParticleFilter::new(config)?;
    let mut result = FilterResult::new(name);
    for &observation in observations {
        let estimate = pf.step(observation)?;
        result.push(observation, &estimate);
    }
    Ok(result)
}
