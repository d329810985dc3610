//! Transition (process) model for the predict step.
//!
//! Between observations the hidden pot size may drift, e.g. through side action the bidder
//! never sees. The model is a Gaussian random walk: every particle receives an independent
//! zero-mean draw with standard deviation `process_noise_std`. The mean of the particle cloud
//! is unchanged in expectation and its variance grows by `process_noise_std²`.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::FilterError;

#[derive(Clone, Debug)]
pub struct RandomWalk {
    process_noise_std: f64,
    noise: Normal<f64>,
}

impl RandomWalk {
    /// # Errors
    /// Returns [`FilterError::Configuration`] if `process_noise_std` is negative or not finite.
    pub fn new(process_noise_std: f64) -> Result<Self, FilterError> {
        if !process_noise_std.is_finite() || process_noise_std < 0.0 {
            return Err(FilterError::configuration(
                "process_noise_std",
                format!("must be a finite, non-negative standard deviation, got {process_noise_std}"),
            ));
        }
        let noise = Normal::new(0.0, process_noise_std)
            .map_err(|e| FilterError::configuration("process_noise_std", e.to_string()))?;
        Ok(RandomWalk {
            process_noise_std,
            noise,
        })
    }

    pub fn process_noise_std(&self) -> f64 {
        self.process_noise_std
    }

    /// Add independent process noise to every particle in place.
    pub fn propagate<R: Rng + ?Sized>(&self, particles: &mut DVector<f64>, rng: &mut R) {
        if self.process_noise_std == 0.0 {
            return;
        }
        for particle in particles.iter_mut() {
            *particle += self.noise.sample(rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mean_and_variance(values: &DVector<f64>) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.sum() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, variance)
    }

    #[test]
    fn test_rejects_negative_noise() {
        assert!(RandomWalk::new(-1.0).is_err());
        assert!(RandomWalk::new(f64::INFINITY).is_err());
        assert!(RandomWalk::new(0.0).is_ok());
    }

    #[test]
    fn test_zero_noise_is_identity() {
        let model = RandomWalk::new(0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut particles = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        model.propagate(&mut particles, &mut rng);
        assert_eq!(particles.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_predict_is_unbiased_and_adds_variance() {
        let mut rng = StdRng::seed_from_u64(11);
        let prior = Normal::new(250_000.0, 30_000.0).unwrap();
        let mut particles = DVector::from_fn(100_000, |_, _| prior.sample(&mut rng));
        let (mean_before, var_before) = mean_and_variance(&particles);

        let sigma_p = 10_000.0;
        let model = RandomWalk::new(sigma_p).unwrap();
        model.propagate(&mut particles, &mut rng);
        let (mean_after, var_after) = mean_and_variance(&particles);

        // Standard error of the mean shift is sigma_p / sqrt(N) ~ 32
        assert!(
            (mean_after - mean_before).abs() < 200.0,
            "mean moved from {mean_before} to {mean_after}"
        );
        let expected = var_before + sigma_p * sigma_p;
        assert!(
            ((var_after - expected) / expected).abs() < 0.03,
            "variance {var_after} expected close to {expected}"
        );
    }
}
