//! Sequential importance resampling filter over the pot size.
//!
//! [`ParticleFilter`] owns the particle set, the transition and observation models, and the
//! seeded random number generator. Each call to [`ParticleFilter::step`] consumes one observed
//! bid and runs the four stages in fixed order:
//!
//! 1. predict: random-walk process noise on every particle,
//! 2. update: reweight by the bid likelihood and renormalize,
//! 3. resample: systematic resampling (by default), weights back to `1/N`,
//! 4. estimate: weighted mean and variance of the resampled set.
//!
//! Nothing is rolled back. If the update collapses, the step returns
//! [`FilterError::WeightCollapse`]; the particles keep the perturbation from the predict stage
//! and the weights keep their previous normalized values. Recovering with
//! [`ParticleFilter::reinitialize`] is the caller's decision and is never done implicitly.
//!
//! ```
//! use potfilter::config::FilterConfig;
//! use potfilter::filter::ParticleFilter;
//!
//! let config = FilterConfig { particle_count: 200, ..FilterConfig::default() };
//! let mut pf = ParticleFilter::new(config).unwrap();
//! let estimates = pf.run([13_000.0, 13_100.0, 12_900.0]).unwrap();
//! assert_eq!(estimates.len(), 3);
//! ```

use log::{debug, trace, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt::{self, Debug};

use crate::config::FilterConfig;
use crate::error::FilterError;
use crate::estimate::Estimate;
use crate::observation::{BidObservationModel, ObservationModel};
use crate::particle::ParticleSet;
use crate::transition::RandomWalk;

pub struct ParticleFilter {
    config: FilterConfig,
    particles: ParticleSet,
    transition: RandomWalk,
    observation: Box<dyn ObservationModel>,
    rng: StdRng,
    steps: usize,
}

impl Debug for ParticleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let estimate = self.get_estimate();
        f.debug_struct("ParticleFilter")
            .field("steps", &self.steps)
            .field("particles", &self.particles)
            .field(
                "estimate",
                &format_args!("{:.2} ± {:.2}", estimate.mean, estimate.std_dev()),
            )
            .field("resampling_strategy", &self.config.resampling_strategy)
            .field("averaging_strategy", &self.config.averaging_strategy)
            .finish()
    }
}

impl ParticleFilter {
    /// Build a filter with the Gaussian bid observation model.
    ///
    /// # Errors
    /// Returns [`FilterError::Configuration`] if `config` fails [`FilterConfig::validate`].
    pub fn new(config: FilterConfig) -> Result<Self, FilterError> {
        config.validate()?;
        let observation =
            BidObservationModel::new(config.win_probability, config.measurement_noise_std)?;
        Self::with_observation_model(config, Box::new(observation))
    }

    /// Build a filter with a caller-supplied likelihood. `win_probability` and
    /// `measurement_noise_std` in `config` are still validated but otherwise unused.
    ///
    /// # Errors
    /// Returns [`FilterError::Configuration`] if `config` fails [`FilterConfig::validate`].
    pub fn with_observation_model(
        config: FilterConfig,
        observation: Box<dyn ObservationModel>,
    ) -> Result<Self, FilterError> {
        config.validate()?;
        let transition = RandomWalk::new(config.process_noise_std)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let particles = ParticleSet::from_gaussian(
            config.particle_count,
            config.initial_estimate_mean,
            config.initial_estimate_std,
            &mut rng,
        )?;
        debug!(
            "Initialized {} particles from N({}, {}²) with seed {}",
            config.particle_count,
            config.initial_estimate_mean,
            config.initial_estimate_std,
            config.seed
        );
        Ok(ParticleFilter {
            config,
            particles,
            transition,
            observation,
            rng,
            steps: 0,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Read-only view of the current particles and weights.
    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    /// Number of observations consumed so far, including one that collapsed.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn effective_sample_size(&self) -> f64 {
        self.particles.effective_sample_size()
    }

    /// Estimate over the current weights, without advancing the filter.
    pub fn get_estimate(&self) -> Estimate {
        self.particles.estimate(&self.config.averaging_strategy)
    }

    /// Consume one observation: predict, update, resample, estimate.
    ///
    /// # Errors
    /// Returns [`FilterError::WeightCollapse`] if the observation is implausible under every
    /// particle, or [`FilterError::ResampleIndex`] if resampling meets invalid weights.
    pub fn step(&mut self, observation: f64) -> Result<Estimate, FilterError> {
        let step = self.steps;
        self.steps += 1;

        self.particles.predict(&self.transition, &mut self.rng);
        self.particles
            .update(observation, self.observation.as_ref(), step)?;
        trace!(
            "Step {step}: effective sample size {:.1} before resampling",
            self.particles.effective_sample_size()
        );
        self.particles
            .resample(&self.config.resampling_strategy, &mut self.rng)?;
        let estimate = self.get_estimate();
        debug!(
            "Step {step}: observation {observation:.2} -> estimate {:.2} (std {:.2})",
            estimate.mean,
            estimate.std_dev()
        );
        Ok(estimate)
    }

    /// Consume `observations` in order and return one estimate per observation.
    ///
    /// This is all-or-nothing: on error the estimates produced before the failing observation
    /// are discarded, although the filter itself keeps the state they led to and
    /// [`ParticleFilter::steps`] tells how far it got. Callers that want to keep partial output
    /// or recover with [`ParticleFilter::reinitialize`] and continue should drive
    /// [`ParticleFilter::step`] directly.
    ///
    /// # Errors
    /// Stops at and returns the first error from [`ParticleFilter::step`]. Remaining
    /// observations are not consumed.
    pub fn run<I>(&mut self, observations: I) -> Result<Vec<Estimate>, FilterError>
    where
        I: IntoIterator<Item = f64>,
    {
        let observations = observations.into_iter();
        let mut estimates = Vec::with_capacity(observations.size_hint().0);
        for observation in observations {
            estimates.push(self.step(observation)?);
        }
        Ok(estimates)
    }

    /// Redraw the particle set from the configured prior.
    ///
    /// The random number generator is not reseeded, so the new particles differ from the
    /// initial draw. The step counter is kept.
    pub fn reinitialize(&mut self) -> Result<(), FilterError> {
        warn!(
            "Reinitializing {} particles from the prior after {} steps",
            self.config.particle_count, self.steps
        );
        self.particles = ParticleSet::from_gaussian(
            self.config.particle_count,
            self.config.initial_estimate_mean,
            self.config.initial_estimate_std,
            &mut self.rng,
        )?;
        Ok(())
    }
}
