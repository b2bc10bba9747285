//! Poisson candidate with a gamma prior on the rate.
//!
//! The predictive is negative binomial with `r = shape` and
//! `p = rate / (rate + 1)`. Negative values are outside the support: a
//! batch containing one is rejected and the candidate stops participating
//! in model selection until it is reset.

use serde::{Deserialize, Serialize};
use sp_math::{log_gamma, negative_binomial};
use std::mem;

use super::{
    central_interval, check_batch, less_likely_from_tails, minus_log_sum, quantile_samples,
    CandidateDocument, CandidateError, CandidateKind, CandidateModel,
};
use crate::checksum::ChecksumBuilder;
use crate::types::{
    DataType, LogLikelihood, ProbabilityBounds, ProbabilityCalculation, Tail, IMPROPER_CDF, INF,
};

const NON_INFORMATIVE_SHAPE: f64 = 1.0;
const NON_INFORMATIVE_RATE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoissonCandidate {
    data_type: DataType,
    decay_rate: f64,
    number_samples: f64,
    shape: f64,
    rate: f64,
    participating: bool,
}

impl PoissonCandidate {
    pub fn new(data_type: DataType, decay_rate: f64) -> Self {
        Self {
            data_type,
            decay_rate,
            number_samples: 0.0,
            shape: NON_INFORMATIVE_SHAPE,
            rate: NON_INFORMATIVE_RATE,
            participating: true,
        }
    }

    fn success_probability(&self) -> f64 {
        self.rate / (self.rate + 1.0)
    }

    /// `(P(X <= x), P(X >= x))` under the predictive.
    fn tails(&self, x: f64) -> (f64, f64) {
        let p = self.success_probability();
        let below = negative_binomial::cdf(x, self.shape, p);
        let above = negative_binomial::survival(x.ceil() - 1.0, self.shape, p);
        (below, above)
    }
}

impl CandidateModel for PoissonCandidate {
    fn kind(&self) -> CandidateKind {
        CandidateKind::Poisson
    }

    fn clone_box(&self) -> Box<dyn CandidateModel> {
        Box::new(self.clone())
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
    }

    fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    fn set_decay_rate(&mut self, decay_rate: f64) {
        self.decay_rate = decay_rate;
    }

    fn number_samples(&self) -> f64 {
        self.number_samples
    }

    fn set_to_non_informative(&mut self, _offset: f64, decay_rate: f64) {
        self.shape = NON_INFORMATIVE_SHAPE;
        self.rate = NON_INFORMATIVE_RATE;
        self.decay_rate = decay_rate;
        self.number_samples = 0.0;
        self.participating = true;
    }

    fn is_non_informative(&self) -> bool {
        self.rate <= NON_INFORMATIVE_RATE
    }

    fn participates_in_model_selection(&self) -> bool {
        self.participating
    }

    fn add_samples(&mut self, values: &[f64], weights: &[f64]) -> Result<(), CandidateError> {
        check_batch(values, weights)?;
        if let Some(&value) = values.iter().find(|&&x| x < 0.0) {
            self.participating = false;
            return Err(CandidateError::OutOfSupport {
                value,
                lower: 0.0,
                upper: INF,
            });
        }
        let n: f64 = weights.iter().sum();
        let total: f64 = values.iter().zip(weights).map(|(x, w)| w * x).sum();
        self.shape += total;
        self.rate += n;
        self.number_samples += n;
        Ok(())
    }

    fn propagate_forwards_by_time(&mut self, time: f64) {
        let alpha = (-self.decay_rate * time).exp();
        let beta = 1.0 - alpha;
        // Widen the rate distribution while holding its mean fixed.
        let factor = ((alpha * self.shape + beta * NON_INFORMATIVE_SHAPE) / self.shape).min(1.0);
        self.shape *= factor;
        self.rate *= factor;
        self.number_samples *= alpha;
    }

    fn marginal_likelihood_support(&self) -> (f64, f64) {
        (0.0, INF)
    }

    fn marginal_likelihood_mean(&self) -> f64 {
        if self.is_non_informative() {
            return 0.0;
        }
        self.shape / self.rate
    }

    fn marginal_likelihood_mode(&self) -> f64 {
        if self.is_non_informative() || self.shape <= 1.0 {
            return 0.0;
        }
        ((self.shape - 1.0) / self.rate).floor()
    }

    fn marginal_likelihood_variance(&self) -> f64 {
        if self.is_non_informative() {
            return INF;
        }
        self.shape * (self.rate + 1.0) / (self.rate * self.rate)
    }

    fn marginal_likelihood_confidence_interval(&self, percentage: f64) -> (f64, f64) {
        if self.is_non_informative() {
            return self.marginal_likelihood_support();
        }
        let (lower, upper) = central_interval(percentage);
        let p = self.success_probability();
        (
            negative_binomial::quantile(lower, self.shape, p),
            negative_binomial::quantile(upper, self.shape, p).min(INF),
        )
    }

    fn joint_log_marginal_likelihood(&self, values: &[f64], weights: &[f64]) -> LogLikelihood {
        if check_batch(values, weights).is_err() {
            return LogLikelihood::failed();
        }
        if self.is_non_informative() || values.iter().any(|&x| x < 0.0) {
            return LogLikelihood::overflowed();
        }
        let n: f64 = weights.iter().sum();
        let total: f64 = values.iter().zip(weights).map(|(x, w)| w * x).sum();
        let factorials: f64 = values
            .iter()
            .zip(weights)
            .map(|(x, w)| w * log_gamma(x + 1.0))
            .sum();
        let result = self.shape * self.rate.ln() - log_gamma(self.shape)
            + log_gamma(self.shape + total)
            - (self.shape + total) * (self.rate + n).ln()
            - factorials;
        LogLikelihood::from_value(result)
    }

    fn minus_log_joint_cdf(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), CandidateError> {
        check_batch(values, weights)?;
        if self.is_non_informative() {
            let improper = -IMPROPER_CDF.ln();
            return Ok((improper, improper));
        }
        let value = minus_log_sum(values, weights, |x| self.tails(x).0);
        Ok((value, value))
    }

    fn minus_log_joint_cdf_complement(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), CandidateError> {
        check_batch(values, weights)?;
        if self.is_non_informative() {
            let improper = -IMPROPER_CDF.ln();
            return Ok((improper, improper));
        }
        let p = self.success_probability();
        let value = minus_log_sum(values, weights, |x| {
            negative_binomial::survival(x, self.shape, p)
        });
        Ok((value, value))
    }

    fn probability_of_less_likely_samples(
        &self,
        calculation: ProbabilityCalculation,
        values: &[f64],
        weights: &[f64],
    ) -> Result<ProbabilityBounds, CandidateError> {
        check_batch(values, weights)?;
        if self.is_non_informative() {
            return Ok(ProbabilityBounds::exact(1.0, Tail::Undetermined));
        }
        Ok(less_likely_from_tails(calculation, values, weights, |x| {
            self.tails(x)
        }))
    }

    fn sample_marginal_likelihood(&self, n: usize) -> Vec<f64> {
        if self.is_non_informative() {
            return Vec::new();
        }
        let p = self.success_probability();
        quantile_samples(n, |q| {
            negative_binomial::quantile(q, self.shape, p).min(INF)
        })
    }

    fn checksum(&self, seed: u64) -> u64 {
        ChecksumBuilder::new(seed)
            .add_str(self.kind().tag())
            .add_str(&self.data_type.to_string())
            .add_f64(self.decay_rate)
            .add_f64(self.number_samples)
            .add_f64(self.shape)
            .add_f64(self.rate)
            .add_u64(u64::from(self.participating))
            .finish()
    }

    fn memory_usage(&self) -> usize {
        mem::size_of::<Self>()
    }

    fn persist(&self) -> serde_json::Result<CandidateDocument> {
        Ok(CandidateDocument {
            tag: self.kind().tag().to_string(),
            state: serde_json::to_value(self)?,
        })
    }
}
