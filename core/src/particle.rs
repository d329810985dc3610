//! Weighted particle set over a scalar hidden state.
//!
//! A [`ParticleSet`] owns N scalar hypotheses and their N weights. The particle count is fixed
//! at construction and never changes. Outside of the reweighting step the weights are
//! non-negative and sum to one.
//!
//! The set is mutated in place by the stages of the filtering loop:
//!
//! - [`ParticleSet::predict`] perturbs every particle (weights untouched),
//! - [`ParticleSet::update`] reweights against an observation,
//! - [`ParticleSet::resample`] redraws the particles and resets the weights to `1/N`.
//!
//! [`ParticleSet::estimate`] is the only read-only stage.
use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::fmt::{self, Debug};

use crate::config::non_negative_std;
use crate::error::FilterError;
use crate::estimate::{AveragingStrategy, Estimate};
use crate::observation::ObservationModel;
use crate::resample::ResamplingStrategy;
use crate::transition::RandomWalk;

/// Tolerance used when checking that the weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Clone, PartialEq)]
pub struct ParticleSet {
    particles: DVector<f64>,
    weights: DVector<f64>,
}

impl Debug for ParticleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self.weights.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_weight = self.weights.iter().cloned().fold(0.0, f64::max);
        let min_particle = self.particles.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_particle = self
            .particles
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        f.debug_struct("ParticleSet")
            .field("num_particles", &self.len())
            .field("effective_particles", &self.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field(
                "particle_range",
                &format_args!("[{:.2}, {:.2}]", min_particle, max_particle),
            )
            .finish()
    }
}

impl ParticleSet {
    /// Draw `count` particles from a Gaussian prior, each with weight `1/count`.
    ///
    /// # Errors
    /// Returns [`FilterError::Configuration`] if `count` is zero, `mean` is not finite, or `std`
    /// is negative or not finite.
    pub fn from_gaussian<R: Rng + ?Sized>(
        count: usize,
        mean: f64,
        std: f64,
        rng: &mut R,
    ) -> Result<Self, FilterError> {
        if count < 1 {
            return Err(FilterError::configuration(
                "particle_count",
                "must be at least 1",
            ));
        }
        non_negative_std("initial_estimate_std", std)?;
        if !mean.is_finite() {
            return Err(FilterError::configuration(
                "initial_estimate_mean",
                format!("must be finite, got {mean}"),
            ));
        }
        let prior = Normal::new(mean, std).map_err(|e| {
            FilterError::configuration("initial_estimate_std", format!("{e} (got {std})"))
        })?;
        let particles = DVector::from_fn(count, |_, _| prior.sample(&mut *rng));
        Ok(Self::with_uniform_weights(particles))
    }

    /// Build a uniformly weighted set from explicit particle values.
    ///
    /// # Errors
    /// Returns [`FilterError::Configuration`] if `values` is empty.
    pub fn from_particles(values: Vec<f64>) -> Result<Self, FilterError> {
        if values.is_empty() {
            return Err(FilterError::configuration(
                "particle_count",
                "must be at least 1",
            ));
        }
        Ok(Self::with_uniform_weights(DVector::from_vec(values)))
    }

    /// Build a set from explicit particles and weights. The weights are normalized.
    ///
    /// # Errors
    /// Returns [`FilterError::Configuration`] if the lengths differ, the set is empty, any weight
    /// is negative or non-finite, or the weights sum to zero.
    pub fn from_weighted(values: Vec<f64>, weights: Vec<f64>) -> Result<Self, FilterError> {
        if values.is_empty() {
            return Err(FilterError::configuration(
                "particle_count",
                "must be at least 1",
            ));
        }
        if values.len() != weights.len() {
            return Err(FilterError::configuration(
                "weights",
                format!(
                    "expected {} weights, got {}",
                    values.len(),
                    weights.len()
                ),
            ));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FilterError::configuration(
                "weights",
                "must be finite and non-negative",
            ));
        }
        let weights = DVector::from_vec(weights);
        let sum = weights.sum();
        if sum <= 0.0 {
            return Err(FilterError::configuration("weights", "must not sum to zero"));
        }
        Ok(ParticleSet {
            particles: DVector::from_vec(values),
            weights: weights / sum,
        })
    }

    fn with_uniform_weights(particles: DVector<f64>) -> Self {
        let n = particles.len();
        ParticleSet {
            particles,
            weights: DVector::from_element(n, 1.0 / n as f64),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Always false: a particle set holds at least one particle.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &DVector<f64> {
        &self.particles
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Iterate over `(particle, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.particles
            .iter()
            .cloned()
            .zip(self.weights.iter().cloned())
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.sum()
    }

    /// True when the weights sum to one within [`WEIGHT_SUM_TOLERANCE`].
    pub fn is_normalized(&self) -> bool {
        (self.weight_sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Kish effective sample size, `1 / Σ wᵢ²`. Reported for diagnostics only.
    pub fn effective_sample_size(&self) -> f64 {
        let sum_of_squares = self.weights.dot(&self.weights);
        if sum_of_squares > 0.0 {
            1.0 / sum_of_squares
        } else {
            0.0
        }
    }

    /// Perturb every particle with the transition model's process noise. Mutates in place.
    pub fn predict<R: Rng + ?Sized>(&mut self, model: &RandomWalk, rng: &mut R) {
        model.propagate(&mut self.particles, rng);
    }

    /// Reweight against `observed` and renormalize. Mutates in place.
    ///
    /// # Errors
    /// Returns [`FilterError::WeightCollapse`] if the unnormalized weights sum to (numerically)
    /// zero. The weights are left untouched in that case; `step` is reported in the error.
    pub fn update<M: ObservationModel + ?Sized>(
        &mut self,
        observed: f64,
        model: &M,
        step: usize,
    ) -> Result<(), FilterError> {
        let weights = crate::observation::reweight(&self.particles, &self.weights, observed, model)
            .map_err(|collapse| collapse.at_step(step))?;
        self.weights = weights;
        Ok(())
    }

    /// Resample with `strategy` and reset every weight to exactly `1/N`. Mutates in place.
    ///
    /// # Errors
    /// Returns [`FilterError::ResampleIndex`] if the weights are not a valid distribution.
    pub fn resample<R: Rng + ?Sized>(
        &mut self,
        strategy: &ResamplingStrategy,
        rng: &mut R,
    ) -> Result<(), FilterError> {
        let indices = strategy.resample(self.weights.as_slice(), rng)?;
        self.apply_indices(&indices)
    }

    /// Rebuild the particle array from `indices` and reset the weights to uniform.
    ///
    /// # Errors
    /// Returns [`FilterError::ResampleIndex`] if the index count differs from the particle count
    /// or any index is out of range.
    pub fn apply_indices(&mut self, indices: &[usize]) -> Result<(), FilterError> {
        let n = self.len();
        if indices.len() != n {
            return Err(FilterError::ResampleIndex {
                threshold: indices.len() as f64,
                cumulative: n as f64,
                len: n,
            });
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
            return Err(FilterError::ResampleIndex {
                threshold: bad as f64,
                cumulative: self.weight_sum(),
                len: n,
            });
        }
        let resampled = DVector::from_iterator(n, indices.iter().map(|&i| self.particles[i]));
        self.particles = resampled;
        self.weights.fill(1.0 / n as f64);
        Ok(())
    }

    /// Reduce the set to a point estimate. Accepts pre- or post-resample weights.
    pub fn estimate(&self, strategy: &AveragingStrategy) -> Estimate {
        strategy.estimate(&self.particles, &self.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_from_gaussian_uniform_weights() {
        let mut rng = StdRng::seed_from_u64(1);
        let set = ParticleSet::from_gaussian(100, 10.0, 2.0, &mut rng).unwrap();
        assert_eq!(set.len(), 100);
        assert!(set.weights().iter().all(|&w| w == 0.01));
        assert!(set.is_normalized());
    }

    #[test]
    fn test_from_gaussian_zero_std_is_constant() {
        let mut rng = StdRng::seed_from_u64(1);
        let set = ParticleSet::from_gaussian(5, 260_000.0, 0.0, &mut rng).unwrap();
        assert!(set.particles().iter().all(|&p| p == 260_000.0));
    }

    #[test]
    fn test_from_gaussian_rejects_bad_input() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(ParticleSet::from_gaussian(0, 0.0, 1.0, &mut rng).is_err());
        assert!(ParticleSet::from_gaussian(10, f64::INFINITY, 1.0, &mut rng).is_err());
        for std in [-1.0, -1e-12, f64::NAN, f64::INFINITY] {
            match ParticleSet::from_gaussian(10, 0.0, std, &mut rng) {
                Err(FilterError::Configuration { parameter, .. }) => {
                    assert_eq!(parameter, "initial_estimate_std")
                }
                other => panic!("std {std} accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn test_from_weighted_normalizes() {
        let set = ParticleSet::from_weighted(vec![1.0, 2.0, 3.0], vec![1.0, 1.0, 2.0]).unwrap();
        assert_approx_eq!(set.weights()[2], 0.5);
        assert!(set.is_normalized());
        assert!(ParticleSet::from_weighted(vec![1.0], vec![0.0]).is_err());
        assert!(ParticleSet::from_weighted(vec![1.0, 2.0], vec![1.0]).is_err());
        assert!(ParticleSet::from_weighted(vec![1.0], vec![-1.0]).is_err());
        assert!(ParticleSet::from_particles(Vec::new()).is_err());
    }

    #[test]
    fn test_effective_sample_size() {
        let uniform = ParticleSet::from_particles(vec![0.0; 4]).unwrap();
        assert_approx_eq!(uniform.effective_sample_size(), 4.0);
        let degenerate =
            ParticleSet::from_weighted(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0]).unwrap();
        assert_approx_eq!(degenerate.effective_sample_size(), 1.0);
    }

    #[test]
    fn test_apply_indices_resets_weights_exactly() {
        let mut set =
            ParticleSet::from_weighted(vec![10.0, 20.0, 30.0], vec![0.1, 0.1, 0.8]).unwrap();
        set.apply_indices(&[2, 2, 0]).unwrap();
        assert_eq!(set.particles().as_slice(), &[30.0, 30.0, 10.0]);
        assert!(set.weights().iter().all(|&w| w == 1.0 / 3.0));
    }

    #[test]
    fn test_apply_indices_out_of_range() {
        let mut set = ParticleSet::from_particles(vec![1.0, 2.0]).unwrap();
        let before = set.clone();
        assert!(matches!(
            set.apply_indices(&[0, 2]),
            Err(FilterError::ResampleIndex { .. })
        ));
        assert!(set.apply_indices(&[0]).is_err());
        assert_eq!(set, before);
    }

    #[test]
    fn test_debug_reports_summary() {
        let set = ParticleSet::from_particles(vec![1.0, 3.0]).unwrap();
        let text = format!("{set:?}");
        assert!(text.contains("num_particles: 2"));
        assert!(text.contains("effective_particles"));
    }
}
