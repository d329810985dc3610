//! Resampling algorithms.
//!
//! Every strategy maps a normalized weight vector of length N to N indices into the particle
//! array such that index `i` is selected `N * w_i` times in expectation. The filter resamples
//! after every update; afterwards all weights are reset to `1/N`.
//!
//! [`ResamplingStrategy::Systematic`] is the default. It draws a single uniform offset
//! `u ∈ [0, 1)`, forms the evenly spaced thresholds `t_j = (j + u) / N`, and walks a cumulative
//! weight pointer forward once, selecting for each threshold the first index whose inclusive
//! cumulative weight exceeds it. The pass is O(N) and index `i` is selected either
//! `floor(N w_i)` or `ceil(N w_i)` times.
//!
//! ```
//! use potfilter::resample::systematic_resample;
//!
//! let indices = systematic_resample(&[0.1, 0.2, 0.3, 0.4], 0.5).unwrap();
//! assert_eq!(indices, vec![1, 2, 3, 3]);
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Slack allowed when the final threshold lands past the rounded cumulative total.
const CUMULATIVE_TOLERANCE: f64 = 1e-9;
/// Slack allowed on the total weight before resampling refuses the input.
const NORMALIZATION_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ResamplingStrategy {
    /// One uniform offset, N evenly spaced thresholds.
    #[default]
    Systematic,
    /// One uniform draw inside each of the N strata.
    Stratified,
    /// N independent draws from the weight distribution.
    Multinomial,
    /// Deterministic `floor(N w_i)` copies, remainder drawn systematically from the residuals.
    Residual,
}

impl ResamplingStrategy {
    /// Draw N indices according to `weights`.
    ///
    /// # Errors
    /// Returns [`FilterError::ResampleIndex`] if `weights` is not a valid normalized distribution.
    pub fn resample<R: Rng + ?Sized>(
        &self,
        weights: &[f64],
        rng: &mut R,
    ) -> Result<Vec<usize>, FilterError> {
        match self {
            ResamplingStrategy::Systematic => systematic_resample(weights, rng.random::<f64>()),
            ResamplingStrategy::Stratified => stratified_resample(weights, rng),
            ResamplingStrategy::Multinomial => multinomial_resample(weights, rng),
            ResamplingStrategy::Residual => residual_resample(weights, rng),
        }
    }
}

/// Systematic resampling with an explicit offset `u ∈ [0, 1)`.
///
/// This is a pure function of `(weights, offset)`: identical inputs always select identical
/// indices.
///
/// # Errors
/// Returns [`FilterError::Configuration`] if `offset` lies outside `[0, 1)` and
/// [`FilterError::ResampleIndex`] if `weights` is not a valid normalized distribution.
pub fn systematic_resample(weights: &[f64], offset: f64) -> Result<Vec<usize>, FilterError> {
    if !(0.0..1.0).contains(&offset) {
        return Err(FilterError::configuration(
            "offset",
            format!("must lie in [0, 1), got {offset}"),
        ));
    }
    let n = weights.len();
    let thresholds = (0..n).map(|j| (j as f64 + offset) / n as f64);
    sweep(weights, thresholds, n)
}

/// Stratified resampling: threshold `j` is `(j + u_j) / N` with an independent `u_j` per stratum.
pub fn stratified_resample<R: Rng + ?Sized>(
    weights: &[f64],
    rng: &mut R,
) -> Result<Vec<usize>, FilterError> {
    let n = weights.len();
    let thresholds: Vec<f64> = (0..n)
        .map(|j| (j as f64 + rng.random::<f64>()) / n as f64)
        .collect();
    sweep(weights, thresholds, n)
}

/// Multinomial resampling: N independent uniform draws, sorted so a single sweep suffices.
pub fn multinomial_resample<R: Rng + ?Sized>(
    weights: &[f64],
    rng: &mut R,
) -> Result<Vec<usize>, FilterError> {
    let n = weights.len();
    let mut thresholds: Vec<f64> = (0..n).map(|_| rng.random::<f64>()).collect();
    thresholds.sort_by(f64::total_cmp);
    sweep(weights, thresholds, n)
}

/// Residual resampling.
///
/// Index `i` is first copied `floor(N w_i)` times. The remaining `M` slots are filled by
/// systematic resampling over the normalized residuals `N w_i - floor(N w_i)`.
pub fn residual_resample<R: Rng + ?Sized>(
    weights: &[f64],
    rng: &mut R,
) -> Result<Vec<usize>, FilterError> {
    check_normalized(weights)?;
    let n = weights.len();
    let mut indices = Vec::with_capacity(n);
    let mut residual = vec![0.0; n];
    for (i, &w) in weights.iter().enumerate() {
        let scaled = w * n as f64;
        let copies = scaled.floor() as usize;
        residual[i] = scaled - copies as f64;
        indices.extend(std::iter::repeat_n(i, copies));
    }
    // Rounding can hand out one copy too many when N w_i lands just above an integer.
    indices.truncate(n);
    let remaining = n - indices.len();
    if remaining > 0 {
        let sum_residual: f64 = residual.iter().sum();
        if sum_residual <= 0.0 {
            return Err(FilterError::ResampleIndex {
                threshold: remaining as f64,
                cumulative: sum_residual,
                len: n,
            });
        }
        residual.iter_mut().for_each(|r| *r /= sum_residual);
        let offset = rng.random::<f64>();
        let thresholds = (0..remaining).map(|k| (k as f64 + offset) / remaining as f64);
        indices.extend(sweep(&residual, thresholds, remaining)?);
    }
    Ok(indices)
}

fn check_normalized(weights: &[f64]) -> Result<(), FilterError> {
    let total: f64 = weights.iter().sum();
    let valid = weights.iter().all(|w| w.is_finite() && *w >= 0.0);
    if !valid || (total - 1.0).abs() > NORMALIZATION_TOLERANCE {
        return Err(FilterError::ResampleIndex {
            threshold: 1.0,
            cumulative: total,
            len: weights.len(),
        });
    }
    Ok(())
}

/// Walk a cumulative weight pointer over non-decreasing `thresholds` in `[0, 1)`.
///
/// For each threshold the first index whose inclusive cumulative weight exceeds it is
/// selected. The pointer never moves backwards.
fn sweep<I>(weights: &[f64], thresholds: I, count: usize) -> Result<Vec<usize>, FilterError>
where
    I: IntoIterator<Item = f64>,
{
    check_normalized(weights)?;
    let n = weights.len();
    let mut indices = Vec::with_capacity(count);
    if n == 0 {
        return Ok(indices);
    }
    // Trailing zero weights add nothing to the cumulative sum and must never be selected.
    let last = weights.iter().rposition(|&w| w > 0.0).unwrap_or(n - 1);
    let mut i = 0;
    let mut cumulative = weights[0];
    for threshold in thresholds {
        while cumulative <= threshold {
            if i == last {
                // Pointer is at the last weighted particle; only rounding slack is acceptable here.
                if threshold - cumulative > CUMULATIVE_TOLERANCE {
                    return Err(FilterError::ResampleIndex {
                        threshold,
                        cumulative,
                        len: n,
                    });
                }
                break;
            }
            i += 1;
            cumulative += weights[i];
        }
        indices.push(i);
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const ALL: [ResamplingStrategy; 4] = [
        ResamplingStrategy::Systematic,
        ResamplingStrategy::Stratified,
        ResamplingStrategy::Multinomial,
        ResamplingStrategy::Residual,
    ];

    fn counts(indices: &[usize], n: usize) -> Vec<usize> {
        let mut counts = vec![0; n];
        for &i in indices {
            counts[i] += 1;
        }
        counts
    }

    #[test]
    fn test_systematic_known_selection() {
        let weights = [0.1, 0.2, 0.3, 0.4];
        assert_eq!(systematic_resample(&weights, 0.5).unwrap(), vec![1, 2, 3, 3]);
        assert_eq!(systematic_resample(&weights, 0.0).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_systematic_is_deterministic_for_fixed_offset() {
        let weights = [0.05, 0.25, 0.0, 0.4, 0.3];
        for offset in [0.0, 0.1, 0.37, 0.999_999] {
            let first = systematic_resample(&weights, offset).unwrap();
            let second = systematic_resample(&weights, offset).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.len(), weights.len());
            // Indices come out sorted because thresholds increase monotonically
            assert!(first.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_systematic_never_selects_zero_weight() {
        let weights = [0.0, 0.5, 0.0, 0.5, 0.0];
        for k in 0..100 {
            let offset = k as f64 / 100.0;
            let indices = systematic_resample(&weights, offset).unwrap();
            assert!(indices.iter().all(|&i| i == 1 || i == 3), "{indices:?}");
        }
    }

    #[test]
    fn test_systematic_counts_are_floor_or_ceil() {
        let weights = [0.013, 0.287, 0.1, 0.35, 0.25];
        let n = weights.len() as f64;
        for k in 0..50 {
            let offset = k as f64 / 50.0;
            let c = counts(&systematic_resample(&weights, offset).unwrap(), weights.len());
            for (i, &w) in weights.iter().enumerate() {
                let expected = n * w;
                assert!(
                    c[i] as f64 >= expected.floor() && c[i] as f64 <= expected.ceil(),
                    "index {i} selected {} times, expected about {expected}",
                    c[i]
                );
            }
        }
    }

    #[test]
    fn test_systematic_frequencies_converge_to_weights() {
        let weights = [0.1, 0.2, 0.3, 0.4];
        let mut rng = StdRng::seed_from_u64(5);
        let trials = 10_000;
        let mut total = vec![0usize; weights.len()];
        for _ in 0..trials {
            let indices = ResamplingStrategy::Systematic
                .resample(&weights, &mut rng)
                .unwrap();
            for (t, c) in total.iter_mut().zip(counts(&indices, weights.len())) {
                *t += c;
            }
        }
        let draws = (trials * weights.len()) as f64;
        for (i, &w) in weights.iter().enumerate() {
            let frequency = total[i] as f64 / draws;
            assert!(
                (frequency - w).abs() < 0.01,
                "index {i}: frequency {frequency} vs weight {w}"
            );
        }
    }

    #[test]
    fn test_rounding_slack_selects_last_index() {
        // Sums to 1 - 1e-12: the last threshold may land past the cumulative total.
        let weights = [0.5, 0.5 - 1e-12];
        let indices = systematic_resample(&weights, 0.999_999_999_999).unwrap();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_rounding_slack_skips_trailing_zero_weights() {
        let weights = [0.5, 0.5 - 1e-12, 0.0];
        let indices = systematic_resample(&weights, 0.999_999_999_999).unwrap();
        assert_eq!(indices, vec![0, 1, 1]);
        let mut rng = StdRng::seed_from_u64(3);
        for strategy in ALL {
            let indices = strategy.resample(&weights, &mut rng).unwrap();
            assert!(!indices.contains(&2), "{strategy:?} selected {indices:?}");
        }
    }

    #[test]
    fn test_rejects_unnormalized_weights() {
        assert!(matches!(
            systematic_resample(&[0.1, 0.1], 0.5),
            Err(FilterError::ResampleIndex { .. })
        ));
        assert!(systematic_resample(&[f64::NAN, 1.0], 0.5).is_err());
        assert!(systematic_resample(&[-0.5, 1.5], 0.5).is_err());
    }

    #[test]
    fn test_rejects_offset_outside_unit_interval() {
        assert!(systematic_resample(&[1.0], 1.0).is_err());
        assert!(systematic_resample(&[1.0], -0.1).is_err());
    }

    #[test]
    fn test_single_particle_always_selected() {
        let mut rng = StdRng::seed_from_u64(9);
        for strategy in ALL {
            for _ in 0..20 {
                assert_eq!(strategy.resample(&[1.0], &mut rng).unwrap(), vec![0]);
            }
        }
    }

    #[test]
    fn test_all_strategies_return_valid_indices() {
        let weights = [0.0, 0.15, 0.35, 0.0, 0.2, 0.3];
        let mut rng = StdRng::seed_from_u64(21);
        for strategy in ALL {
            for _ in 0..200 {
                let indices = strategy.resample(&weights, &mut rng).unwrap();
                assert_eq!(indices.len(), weights.len(), "{strategy:?}");
                assert!(
                    indices.iter().all(|&i| i < weights.len() && weights[i] > 0.0),
                    "{strategy:?} selected {indices:?}"
                );
            }
        }
    }

    #[test]
    fn test_residual_keeps_deterministic_copies() {
        let weights = [0.5, 0.3, 0.2, 0.0];
        let mut rng = StdRng::seed_from_u64(2);
        let c = counts(&residual_resample(&weights, &mut rng).unwrap(), 4);
        assert_eq!(c[0], 2);
        assert!(c[1] >= 1);
        assert_eq!(c[3], 0);
        assert_eq!(c.iter().sum::<usize>(), 4);
    }
}
