//! Aggregation of per-sample tail probabilities into a joint probability.
//!
//! Each probability `p` is mapped to the squared normal deviate that has
//! two-sided tail probability `p`. The weighted sum of these deviates is
//! chi-squared under the null hypothesis, so the joint probability of
//! seeing a less likely collection of samples is the chi-squared
//! survival function evaluated at the summed deviation.

use serde::{Deserialize, Serialize};

use super::gamma::gamma_q;
use super::normal::{normal_cdf, normal_quantile};
use super::stable::truncate;

const NEGLIGIBLE_DISTANCE: f64 = 1e-8;

/// Running joint probability of less likely samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointProbabilityOfLessLikelySamples {
    /// A single unit-weight probability, kept exactly until a second one arrives.
    only_probability: Option<f64>,
    distance: f64,
    number_samples: f64,
}

impl JointProbabilityOfLessLikelySamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add probability `probability` observed with weight `weight`.
    pub fn add(&mut self, probability: f64, weight: f64) {
        let probability = probability.max(f64::MIN_POSITIVE);

        if self.number_samples == 0.0 && self.only_probability.is_none() && weight == 1.0 {
            self.only_probability = Some(probability);
            return;
        }
        if let Some(only) = self.only_probability.take() {
            self.distance += deviation(only);
            self.number_samples += 1.0;
        }
        self.distance += weight * deviation(probability);
        self.number_samples += weight;
    }

    /// Fold `other` into this aggregate.
    pub fn merge(&mut self, other: &Self) {
        if let Some(only) = other.only_probability {
            self.add(only, 1.0);
        }
        if other.number_samples > 0.0 {
            if let Some(only) = self.only_probability.take() {
                self.distance += deviation(only);
                self.number_samples += 1.0;
            }
            self.distance += other.distance;
            self.number_samples += other.number_samples;
        }
    }

    /// Joint probability in [0, 1]; 1 when nothing has been added.
    pub fn calculate(&self) -> f64 {
        if let Some(only) = self.only_probability {
            return truncate(only, 0.0, 1.0);
        }
        if self.number_samples == 0.0 || self.distance / self.number_samples < NEGLIGIBLE_DISTANCE {
            return 1.0;
        }
        let result = gamma_q(0.5 * self.number_samples, 0.5 * self.distance);
        if result.is_nan() {
            return 1.0;
        }
        truncate(result, 0.0, 1.0)
    }

    /// The two-sided tail probability of the mean deviation.
    pub fn average_probability(&self) -> f64 {
        if let Some(only) = self.only_probability {
            return truncate(only, 0.0, 1.0);
        }
        if self.number_samples == 0.0 {
            return 1.0;
        }
        let rms = (self.distance / self.number_samples).sqrt();
        truncate(2.0 * normal_cdf(-rms), 0.0, 1.0)
    }

    pub fn number_samples(&self) -> f64 {
        self.number_samples + if self.only_probability.is_some() { 1.0 } else { 0.0 }
    }
}

fn deviation(probability: f64) -> f64 {
    let z = normal_quantile(0.5 * probability);
    z * z
}
