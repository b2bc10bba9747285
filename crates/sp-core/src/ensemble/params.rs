//! Tunable constants of the model-selection update.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Constants controlling how weights respond to evidence.
///
/// The defaults are empirically chosen and should only be changed with
/// care; they are exposed so deployments can pin them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSelectionParams {
    /// Relative weight given to a candidate that starts participating again.
    #[serde(default = "default_reentry_weight")]
    pub reentry_weight: f64,

    /// Cap on the per-sample log-likelihood deficit applied in one update.
    #[serde(default = "default_max_penalty")]
    pub max_penalty: f64,

    /// Per-sample deficit allowed before any samples have been seen.
    #[serde(default = "default_penalty_base")]
    pub penalty_base: f64,

    /// Normalized weight below which a candidate is ignored by moment queries.
    #[serde(default = "default_minimum_significant_weight")]
    pub minimum_significant_weight: f64,

    /// Target relative error of the truncated c.d.f. and tail calculations.
    #[serde(default = "default_maximum_relative_error")]
    pub maximum_relative_error: f64,
}

fn default_reentry_weight() -> f64 {
    1e-6
}

fn default_max_penalty() -> f64 {
    100.0
}

fn default_penalty_base() -> f64 {
    10.0
}

fn default_minimum_significant_weight() -> f64 {
    0.01
}

fn default_maximum_relative_error() -> f64 {
    1e-3
}

impl Default for ModelSelectionParams {
    fn default() -> Self {
        Self {
            reentry_weight: default_reentry_weight(),
            max_penalty: default_max_penalty(),
            penalty_base: default_penalty_base(),
            minimum_significant_weight: default_minimum_significant_weight(),
            maximum_relative_error: default_maximum_relative_error(),
        }
    }
}

impl ModelSelectionParams {
    /// The per-sample log-likelihood deficit allowed after `number_samples`
    /// samples. Grows with the evidence seen up to `max_penalty`.
    pub fn max_model_penalty(&self, number_samples: f64) -> f64 {
        (self.penalty_base + number_samples).min(self.max_penalty)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.reentry_weight > 0.0 && self.reentry_weight <= 1.0) {
            return Err(invalid(
                "selection.reentry_weight",
                format!("must be in (0, 1], got {}", self.reentry_weight),
            ));
        }
        if !(self.max_penalty > 0.0 && self.max_penalty.is_finite()) {
            return Err(invalid(
                "selection.max_penalty",
                format!("must be positive and finite, got {}", self.max_penalty),
            ));
        }
        if !(self.penalty_base >= 0.0 && self.penalty_base.is_finite()) {
            return Err(invalid(
                "selection.penalty_base",
                format!("must be non-negative and finite, got {}", self.penalty_base),
            ));
        }
        if !(0.0..1.0).contains(&self.minimum_significant_weight) {
            return Err(invalid(
                "selection.minimum_significant_weight",
                format!("must be in [0, 1), got {}", self.minimum_significant_weight),
            ));
        }
        if !(self.maximum_relative_error > 0.0 && self.maximum_relative_error < 1.0) {
            return Err(invalid(
                "selection.maximum_relative_error",
                format!("must be in (0, 1), got {}", self.maximum_relative_error),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    }
}
