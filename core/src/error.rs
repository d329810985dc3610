//! Error types raised by the filter core.
//!
//! Only two stages of the filtering loop can fail: building a filter from an invalid
//! configuration, and reweighting when every particle assigns negligible likelihood to an
//! observation. Resampling carries a third, defensive variant for the case where the
//! cumulative weight pointer would run off the end of the particle array.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// A configuration parameter is outside of its valid domain.
    #[error("invalid configuration: `{parameter}` {reason}")]
    Configuration {
        parameter: &'static str,
        reason: String,
    },
    /// The sum of the unnormalized weights fell below [`crate::observation::MIN_WEIGHT_SUM`].
    ///
    /// The observation is implausible under every current hypothesis. The particle weights
    /// are left exactly as they were before the update; the caller decides whether to abort
    /// or to reinitialize the particle set.
    #[error(
        "weight collapse at step {step}: observation {observation} is implausible under all particles \
         (predicted observations span [{min_predicted}, {max_predicted}], weight sum {weight_sum:e})"
    )]
    WeightCollapse {
        step: usize,
        observation: f64,
        min_predicted: f64,
        max_predicted: f64,
        weight_sum: f64,
    },
    /// Resampling threshold exceeded the total cumulative weight.
    #[error(
        "resampling threshold {threshold} exceeds cumulative weight {cumulative} over {len} particles"
    )]
    ResampleIndex {
        threshold: f64,
        cumulative: f64,
        len: usize,
    },
}

impl FilterError {
    pub(crate) fn configuration(parameter: &'static str, reason: impl Into<String>) -> Self {
        FilterError::Configuration {
            parameter,
            reason: reason.into(),
        }
    }

    /// Attach the filter step index to a weight-collapse error.
    pub(crate) fn at_step(self, step: usize) -> Self {
        match self {
            FilterError::WeightCollapse {
                observation,
                min_predicted,
                max_predicted,
                weight_sum,
                ..
            } => FilterError::WeightCollapse {
                step,
                observation,
                min_predicted,
                max_predicted,
                weight_sum,
            },
            other => other,
        }
    }

    /// True for the recoverable weight-collapse condition.
    pub fn is_weight_collapse(&self) -> bool {
        matches!(self, FilterError::WeightCollapse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_names_parameter() {
        let err = FilterError::configuration("particle_count", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration: `particle_count` must be at least 1"
        );
        assert!(!err.is_weight_collapse());
    }

    #[test]
    fn test_weight_collapse_message_carries_context() {
        let err = FilterError::WeightCollapse {
            step: 3,
            observation: 1.0e6,
            min_predicted: 12_000.0,
            max_predicted: 13_000.0,
            weight_sum: 0.0,
        };
        let message = err.to_string();
        assert!(message.contains("step 3"));
        assert!(message.contains("1000000"));
        assert!(message.contains("[12000, 13000]"));
        assert!(err.is_weight_collapse());
    }
}
