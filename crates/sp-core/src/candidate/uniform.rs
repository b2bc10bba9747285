//! Uniform candidate on a fixed interval.
//!
//! The support is part of the model's identity and is never learned, so
//! this candidate is always informative. Samples outside the support have
//! zero likelihood and are reported as overflowed.

use serde::{Deserialize, Serialize};
use sp_math::truncate;
use std::mem;

use super::{
    central_interval, check_batch, less_likely_from_tails, minus_log_sum, quantile_samples,
    CandidateDocument, CandidateError, CandidateKind, CandidateModel,
};
use crate::checksum::ChecksumBuilder;
use crate::types::{DataType, LogLikelihood, ProbabilityBounds, ProbabilityCalculation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformCandidate {
    data_type: DataType,
    decay_rate: f64,
    number_samples: f64,
    lower: f64,
    upper: f64,
}

impl UniformCandidate {
    pub fn new(data_type: DataType, lower: f64, upper: f64, decay_rate: f64) -> Self {
        Self {
            data_type,
            decay_rate,
            number_samples: 0.0,
            lower,
            upper,
        }
    }

    fn width(&self) -> f64 {
        self.upper - self.lower
    }

    fn cdf(&self, x: f64) -> f64 {
        truncate((x - self.lower) / self.width(), 0.0, 1.0)
    }

    fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }
}

impl CandidateModel for UniformCandidate {
    fn kind(&self) -> CandidateKind {
        CandidateKind::Uniform
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
        self.decay_rate = decay_rate;
        self.number_samples = 0.0;
    }

    fn is_non_informative(&self) -> bool {
        false
    }

    fn add_samples(&mut self, values: &[f64], weights: &[f64]) -> Result<(), CandidateError> {
        check_batch(values, weights)?;
        self.number_samples += weights.iter().sum::<f64>();
        Ok(())
    }

    fn propagate_forwards_by_time(&mut self, time: f64) {
        self.number_samples *= (-self.decay_rate * time).exp();
    }

    fn marginal_likelihood_support(&self) -> (f64, f64) {
        (self.lower, self.upper)
    }

    fn marginal_likelihood_mean(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    fn marginal_likelihood_mode(&self) -> f64 {
        self.marginal_likelihood_mean()
    }

    fn marginal_likelihood_variance(&self) -> f64 {
        self.width() * self.width() / 12.0
    }

    fn marginal_likelihood_confidence_interval(&self, percentage: f64) -> (f64, f64) {
        let (lower, upper) = central_interval(percentage);
        (
            self.lower + lower * self.width(),
            self.lower + upper * self.width(),
        )
    }

    fn joint_log_marginal_likelihood(&self, values: &[f64], weights: &[f64]) -> LogLikelihood {
        if check_batch(values, weights).is_err() {
            return LogLikelihood::failed();
        }
        if !values.iter().all(|&x| self.contains(x)) {
            return LogLikelihood::overflowed();
        }
        let n: f64 = weights.iter().sum();
        LogLikelihood::from_value(-n * self.width().ln())
    }

    fn minus_log_joint_cdf(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), CandidateError> {
        check_batch(values, weights)?;
        let value = minus_log_sum(values, weights, |x| self.cdf(x));
        Ok((value, value))
    }

    fn minus_log_joint_cdf_complement(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), CandidateError> {
        check_batch(values, weights)?;
        let value = minus_log_sum(values, weights, |x| 1.0 - self.cdf(x));
        Ok((value, value))
    }

    fn probability_of_less_likely_samples(
        &self,
        calculation: ProbabilityCalculation,
        values: &[f64],
        weights: &[f64],
    ) -> Result<ProbabilityBounds, CandidateError> {
        check_batch(values, weights)?;
        Ok(less_likely_from_tails(calculation, values, weights, |x| {
            let cdf = self.cdf(x);
            (cdf, 1.0 - cdf)
        }))
    }

    fn sample_marginal_likelihood(&self, n: usize) -> Vec<f64> {
        quantile_samples(n, |p| self.lower + p * self.width())
    }

    fn checksum(&self, seed: u64) -> u64 {
        ChecksumBuilder::new(seed)
            .add_str(self.kind().tag())
            .add_str(&self.data_type.to_string())
            .add_f64(self.decay_rate)
            .add_f64(self.number_samples)
            .add_f64(self.lower)
            .add_f64(self.upper)
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
