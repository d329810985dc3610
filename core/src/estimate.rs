//! Point estimates from a weighted particle set.
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Point estimate of the hidden pot size with its spread.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub mean: f64,
    pub variance: f64,
}

impl Estimate {
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum AveragingStrategy {
    /// Weighted mean and weighted variance.
    #[default]
    WeightedAverage,
    /// Arithmetic mean and population variance, ignoring the weights.
    UnweightedAverage,
    /// The single highest-weight particle, reported with zero variance.
    HighestWeight,
}

impl AveragingStrategy {
    /// Reduce `particles` and `weights` to an [`Estimate`].
    ///
    /// The weights need not be uniform, so the estimate can be taken before resampling for
    /// diagnostics. Both vectors must have the same, non-zero length.
    pub fn estimate(&self, particles: &DVector<f64>, weights: &DVector<f64>) -> Estimate {
        match self {
            AveragingStrategy::WeightedAverage => weighted_estimate(particles, weights),
            AveragingStrategy::UnweightedAverage => {
                let uniform = DVector::from_element(particles.len(), 1.0);
                weighted_estimate(particles, &uniform)
            }
            AveragingStrategy::HighestWeight => {
                let best = weights.imax();
                Estimate {
                    mean: particles[best],
                    variance: 0.0,
                }
            }
        }
    }
}

/// Weighted mean `Σ wᵢxᵢ / Σ wᵢ` and weighted variance `Σ wᵢ(xᵢ - mean)² / Σ wᵢ`.
pub fn weighted_estimate(particles: &DVector<f64>, weights: &DVector<f64>) -> Estimate {
    let total = weights.sum();
    let mean = particles.dot(weights) / total;
    let deviations = particles.map(|x| (x - mean).powi(2));
    let variance = deviations.dot(weights) / total;
    Estimate { mean, variance }
}
