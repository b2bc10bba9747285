//! Log-domain posterior weight of one candidate model.

use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumBuilder;
use crate::types::MINUS_INF;

/// Posterior weight of a candidate, stored as a log-weight.
///
/// The long-term log-weight is the prior weight the candidate was created
/// with. Ageing pulls the log-weight back towards it, so that old evidence
/// is forgotten at the same rate as the candidates forget their data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelWeight {
    #[serde(rename = "LOG_WEIGHT")]
    log_weight: f64,
    #[serde(rename = "LONG_TERM_LOG_WEIGHT")]
    long_term_log_weight: f64,
}

impl ModelWeight {
    pub fn new(weight: f64) -> Self {
        let log_weight = if weight > 0.0 { weight.ln() } else { MINUS_INF };
        Self {
            log_weight,
            long_term_log_weight: log_weight,
        }
    }

    /// Age by the multiplicative decay factor `alpha` in [0, 1].
    ///
    /// `age(1)` is the identity and `age(0)` forgets all evidence. Since
    /// the log-weight relaxes linearly to the long-term value, ageing by
    /// `a` then `b` is ageing by `a * b`.
    pub fn age(&mut self, alpha: f64) {
        self.log_weight = alpha * self.log_weight + (1.0 - alpha) * self.long_term_log_weight;
    }

    pub fn add_log_factor(&mut self, log_factor: f64) {
        self.log_weight += log_factor;
    }

    pub fn log_weight(&self) -> f64 {
        self.log_weight
    }

    pub fn set_log_weight(&mut self, log_weight: f64) {
        self.log_weight = log_weight;
    }

    pub fn long_term_log_weight(&self) -> f64 {
        self.long_term_log_weight
    }

    /// Unnormalized weight; zero for the excluded sentinel.
    pub fn weight(&self) -> f64 {
        self.log_weight.exp()
    }

    pub fn checksum(&self, builder: ChecksumBuilder) -> ChecksumBuilder {
        builder
            .add_f64(self.log_weight)
            .add_f64(self.long_term_log_weight)
    }
}

impl Default for ModelWeight {
    fn default() -> Self {
        Self::new(1.0)
    }
}
