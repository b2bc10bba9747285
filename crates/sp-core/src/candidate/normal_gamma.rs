//! Normal-gamma conjugate posterior shared by the normal and log-normal
//! candidates.
//!
//! Prior: μ | τ ~ Normal(mean, 1/(precision·τ)), τ ~ Gamma(shape, rate).
//! The posterior predictive of one sample is Student-t with `2·shape`
//! degrees of freedom, location `mean` and squared scale
//! `rate·(precision + 1)/(shape·precision)`.

use serde::{Deserialize, Serialize};
use sp_math::{log_gamma, student_t};

use crate::checksum::ChecksumBuilder;

pub const NON_INFORMATIVE_SHAPE: f64 = 1.0;
pub const NON_INFORMATIVE_RATE: f64 = 0.0;
pub const NON_INFORMATIVE_PRECISION: f64 = 0.0;

const LOG_2PI: f64 = 1.837_877_066_409_345_5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalGamma {
    pub mean: f64,
    pub precision: f64,
    pub shape: f64,
    pub rate: f64,
}

impl NormalGamma {
    pub fn non_informative(mean: f64) -> Self {
        Self {
            mean,
            precision: NON_INFORMATIVE_PRECISION,
            shape: NON_INFORMATIVE_SHAPE,
            rate: NON_INFORMATIVE_RATE,
        }
    }

    /// The prior is improper until both the mean and the precision have
    /// been constrained by data.
    pub fn is_non_informative(&self) -> bool {
        self.precision <= 0.0 || self.rate <= 0.0
    }

    /// Posterior after observing `values` with count weights `weights`.
    pub fn updated(&self, values: &[f64], weights: &[f64]) -> Self {
        let n: f64 = weights.iter().sum();
        if n <= 0.0 {
            return *self;
        }
        let sample_mean = values.iter().zip(weights).map(|(x, w)| w * x).sum::<f64>() / n;
        let sum_squares: f64 = values
            .iter()
            .zip(weights)
            .map(|(x, w)| w * (x - sample_mean) * (x - sample_mean))
            .sum();
        let precision = self.precision + n;
        let deviation = sample_mean - self.mean;
        Self {
            mean: (self.precision * self.mean + n * sample_mean) / precision,
            precision,
            shape: self.shape + 0.5 * n,
            rate: self.rate
                + 0.5 * (sum_squares + self.precision * n * deviation * deviation / precision),
        }
    }

    /// log p(values | prior), integrating out mean and precision.
    ///
    /// Only meaningful for an informative prior.
    pub fn log_evidence(&self, values: &[f64], weights: &[f64]) -> f64 {
        let n: f64 = weights.iter().sum();
        let posterior = self.updated(values, weights);
        log_gamma(posterior.shape) - log_gamma(self.shape) + self.shape * self.rate.ln()
            - posterior.shape * posterior.rate.ln()
            + 0.5 * (self.precision / posterior.precision).ln()
            - 0.5 * n * LOG_2PI
    }

    pub fn degrees_freedom(&self) -> f64 {
        2.0 * self.shape
    }

    pub fn predictive_scale(&self) -> f64 {
        (self.rate * (self.precision + 1.0) / (self.shape * self.precision)).sqrt()
    }

    /// Predictive c.d.f. and survival function at `y`.
    pub fn predictive_tails(&self, y: f64) -> (f64, f64) {
        let t = (y - self.mean) / self.predictive_scale();
        let df = self.degrees_freedom();
        (student_t::cdf(t, df), student_t::survival(t, df))
    }

    pub fn predictive_quantile(&self, p: f64) -> f64 {
        self.mean + self.predictive_scale() * student_t::quantile(p, self.degrees_freedom())
    }

    /// Variance of the predictive; infinite for two or fewer degrees of freedom.
    pub fn predictive_variance(&self) -> Option<f64> {
        if self.is_non_informative() || self.shape <= 1.0 {
            return None;
        }
        Some(self.rate * (self.precision + 1.0) / (self.precision * (self.shape - 1.0)))
    }

    /// Relax towards the non-informative prior by the factor `alpha`.
    ///
    /// The gamma shape and rate are scaled together, which widens the
    /// precision distribution while holding its mean fixed.
    pub fn age(&mut self, alpha: f64) {
        let beta = 1.0 - alpha;
        self.precision = alpha * self.precision + beta * NON_INFORMATIVE_PRECISION;
        let factor = ((alpha * self.shape + beta * NON_INFORMATIVE_SHAPE) / self.shape).min(1.0);
        self.shape *= factor;
        self.rate *= factor;
    }

    pub fn checksum(&self, builder: ChecksumBuilder) -> ChecksumBuilder {
        builder
            .add_f64(self.mean)
            .add_f64(self.precision)
            .add_f64(self.shape)
            .add_f64(self.rate)
    }
}
