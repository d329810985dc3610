//! Observation model and weight update.
//!
//! A pot-size hypothesis maps to an expected bid through a linear forward model,
//! `bid = pot * win_probability`. An observed bid is scored against that prediction with a
//! Gaussian density whose standard deviation is the assumed measurement noise.
//!
//! Other likelihoods can be plugged into the filter by implementing [`ObservationModel`].
//!
//! ```
//! use potfilter::observation::{BidObservationModel, ObservationModel};
//!
//! let model = BidObservationModel::new(0.05, 1_000.0).unwrap();
//! assert_eq!(model.predicted_observation(260_000.0), 13_000.0);
//! assert!(model.likelihood(13_000.0, 13_000.0) > model.likelihood(15_000.0, 13_000.0));
//! ```

use nalgebra::DVector;
use std::f64::consts::PI;

use crate::error::FilterError;

/// Unnormalized weight sums at or below this floor are treated as a weight collapse.
pub const MIN_WEIGHT_SUM: f64 = 1e-300;

/// Maps a hidden-state hypothesis to an expected observation and scores observations.
pub trait ObservationModel {
    /// Expected observation for a single particle.
    fn predicted_observation(&self, particle: f64) -> f64;
    /// Density of `observed` given the `predicted` observation. Must be non-negative.
    fn likelihood(&self, observed: f64, predicted: f64) -> f64;
}

/// Expected bid for a pot-size hypothesis.
pub fn predicted_observation(particle: f64, win_probability: f64) -> f64 {
    particle * win_probability
}

/// Gaussian probability density of `observed` under mean `predicted` and standard deviation
/// `measurement_noise_std`.
pub fn likelihood(observed: f64, predicted: f64, measurement_noise_std: f64) -> f64 {
    let z = (observed - predicted) / measurement_noise_std;
    (-0.5 * z * z).exp() / (measurement_noise_std * (2.0 * PI).sqrt())
}

/// The linear bid model with Gaussian measurement noise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BidObservationModel {
    win_probability: f64,
    measurement_noise_std: f64,
}

impl BidObservationModel {
    /// # Errors
    /// Returns [`FilterError::Configuration`] unless `win_probability` lies in `(0, 1]` and
    /// `measurement_noise_std` is finite and strictly positive.
    pub fn new(win_probability: f64, measurement_noise_std: f64) -> Result<Self, FilterError> {
        if !(win_probability > 0.0 && win_probability <= 1.0) {
            return Err(FilterError::configuration(
                "win_probability",
                format!("must lie in (0, 1], got {win_probability}"),
            ));
        }
        if !(measurement_noise_std.is_finite() && measurement_noise_std > 0.0) {
            return Err(FilterError::configuration(
                "measurement_noise_std",
                format!("must be finite and strictly positive, got {measurement_noise_std}"),
            ));
        }
        Ok(BidObservationModel {
            win_probability,
            measurement_noise_std,
        })
    }

    pub fn win_probability(&self) -> f64 {
        self.win_probability
    }

    pub fn measurement_noise_std(&self) -> f64 {
        self.measurement_noise_std
    }
}

impl ObservationModel for BidObservationModel {
    fn predicted_observation(&self, particle: f64) -> f64 {
        predicted_observation(particle, self.win_probability)
    }

    fn likelihood(&self, observed: f64, predicted: f64) -> f64 {
        likelihood(observed, predicted, self.measurement_noise_std)
    }
}

/// Multiply `weights` by the likelihood of `observed` under every particle and renormalize.
///
/// Returns the new weight vector and leaves the inputs untouched, so a collapse never
/// corrupts the caller's weights.
///
/// # Errors
/// Returns [`FilterError::WeightCollapse`] (with `step` 0) if the unnormalized sum is not
/// finite or does not exceed [`MIN_WEIGHT_SUM`].
pub fn reweight<M: ObservationModel + ?Sized>(
    particles: &DVector<f64>,
    weights: &DVector<f64>,
    observed: f64,
    model: &M,
) -> Result<DVector<f64>, FilterError> {
    let predicted = particles.map(|p| model.predicted_observation(p));
    let likelihoods = predicted.map(|z_hat| model.likelihood(observed, z_hat));
    let unnormalized = weights.component_mul(&likelihoods);
    let weight_sum = unnormalized.sum();
    if !weight_sum.is_finite() || weight_sum <= MIN_WEIGHT_SUM {
        return Err(FilterError::WeightCollapse {
            step: 0,
            observation: observed,
            min_predicted: predicted.min(),
            max_predicted: predicted.max(),
            weight_sum,
        });
    }
    Ok(unnormalized / weight_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_predicted_observation_is_linear() {
        assert_eq!(predicted_observation(260_000.0, 0.05), 13_000.0);
        assert_eq!(predicted_observation(0.0, 0.05), 0.0);
        assert_eq!(predicted_observation(100.0, 1.0), 100.0);
    }

    #[test]
    fn test_likelihood_matches_standard_normal() {
        assert_approx_eq!(likelihood(0.0, 0.0, 1.0), 0.398_942_280_401_432_7);
        assert_approx_eq!(likelihood(1.0, 0.0, 1.0), 0.241_970_724_519_143_37);
        // Scaling the std by k scales the peak density by 1/k
        assert_approx_eq!(likelihood(5.0, 5.0, 1_000.0), 0.398_942_280_401_432_7e-3);
        // Symmetric around the prediction
        assert_eq!(likelihood(3.0, 1.0, 2.0), likelihood(-1.0, 1.0, 2.0));
    }

    #[test]
    fn test_model_validation() {
        assert!(BidObservationModel::new(0.0, 1.0).is_err());
        assert!(BidObservationModel::new(1.1, 1.0).is_err());
        assert!(BidObservationModel::new(0.5, 0.0).is_err());
        assert!(BidObservationModel::new(0.5, -3.0).is_err());
        assert!(BidObservationModel::new(0.5, 3.0).is_ok());
    }

    #[test]
    fn test_reweight_normalizes_and_favors_consistent_particles() {
        let model = BidObservationModel::new(0.05, 1_000.0).unwrap();
        let particles = DVector::from_vec(vec![200_000.0, 260_000.0, 320_000.0]);
        let weights = DVector::from_element(3, 1.0 / 3.0);
        let updated = reweight(&particles, &weights, 13_000.0, &model).unwrap();
        assert!((updated.sum() - 1.0).abs() < 1e-12);
        assert!(updated[1] > updated[0]);
        assert!(updated[1] > updated[2]);
        // Equidistant hypotheses get equal weight
        assert_approx_eq!(updated[0], updated[2]);
    }

    #[test]
    fn test_reweight_keeps_prior_weights_in_product() {
        let model = BidObservationModel::new(1.0, 1.0).unwrap();
        let particles = DVector::from_vec(vec![0.0, 0.0]);
        let weights = DVector::from_vec(vec![0.25, 0.75]);
        let updated = reweight(&particles, &weights, 0.3, &model).unwrap();
        assert_approx_eq!(updated[0], 0.25);
        assert_approx_eq!(updated[1], 0.75);
    }

    #[test]
    fn test_reweight_detects_collapse() {
        let model = BidObservationModel::new(0.05, 1.0).unwrap();
        let particles = DVector::from_vec(vec![250_000.0, 251_000.0]);
        let weights = DVector::from_element(2, 0.5);
        match reweight(&particles, &weights, 1.0e6, &model) {
            Err(FilterError::WeightCollapse {
                observation,
                min_predicted,
                max_predicted,
                weight_sum,
                ..
            }) => {
                assert_eq!(observation, 1.0e6);
                assert_eq!(min_predicted, 12_500.0);
                assert_eq!(max_predicted, 12_550.0);
                assert!(weight_sum <= MIN_WEIGHT_SUM);
            }
            other => panic!("expected weight collapse, got {other:?}"),
        }
    }

    struct Uniform;

    impl ObservationModel for Uniform {
        fn predicted_observation(&self, particle: f64) -> f64 {
            particle
        }

        fn likelihood(&self, observed: f64, predicted: f64) -> f64 {
            if (observed - predicted).abs() <= 1.0 { 1.0 } else { 0.0 }
        }
    }

    #[test]
    fn test_custom_model_is_pluggable() {
        let particles = DVector::from_vec(vec![0.0, 5.0, 10.0, 5.5]);
        let weights = DVector::from_element(4, 0.25);
        let updated = reweight(&particles, &weights, 5.2, &Uniform).unwrap();
        assert_eq!(updated.as_slice(), &[0.0, 0.5, 0.0, 0.5]);
    }
}
