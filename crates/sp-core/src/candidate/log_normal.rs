//! Log-normal candidate: a normal-gamma posterior on `ln(x + offset)`.
//!
//! The offset shifts the support so that values at or below zero can be
//! modelled. When a sample arrives within `offset_margin` of the support's
//! lower end the offset is moved and the posterior is refitted to samples
//! of the old predictive; the loss in likelihood this causes is returned as
//! a penalty for the ensemble to apply.

use serde::{Deserialize, Serialize};
use std::mem;

use super::normal_gamma::NormalGamma;
use super::{
    central_interval, check_batch, less_likely_from_tails, minus_log_sum, quantile_samples,
    CandidateDocument, CandidateError, CandidateKind, CandidateModel,
};
use crate::checksum::ChecksumBuilder;
use crate::types::{
    DataType, LogLikelihood, ProbabilityBounds, ProbabilityCalculation, Tail, IMPROPER_CDF, INF,
};

/// Number of predictive samples used to refit after an offset change.
const ADJUST_OFFSET_SAMPLE_SIZE: usize = 50;

pub const DEFAULT_OFFSET_MARGIN: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogNormalCandidate {
    data_type: DataType,
    decay_rate: f64,
    number_samples: f64,
    offset: f64,
    offset_margin: f64,
    posterior: NormalGamma,
}

impl LogNormalCandidate {
    pub fn new(data_type: DataType, offset_margin: f64, decay_rate: f64) -> Self {
        Self {
            data_type,
            decay_rate,
            number_samples: 0.0,
            offset: 0.0,
            offset_margin,
            posterior: NormalGamma::non_informative(0.0),
        }
    }

    fn log_shifted(&self, x: f64) -> Option<f64> {
        let shifted = x + self.offset;
        if shifted > 0.0 {
            Some(shifted.ln())
        } else {
            None
        }
    }

    /// Variance of the log-scale predictive used by the moment formulas.
    fn log_scale_variance(&self) -> f64 {
        self.posterior.rate / self.posterior.shape * (1.0 + 1.0 / self.posterior.precision)
    }

    fn tails(&self, x: f64) -> (f64, f64) {
        match self.log_shifted(x) {
            Some(y) => self.posterior.predictive_tails(y),
            None => (0.0, 1.0),
        }
    }

    fn quantile(&self, p: f64) -> f64 {
        (self.posterior.predictive_quantile(p).exp() - self.offset).min(INF)
    }
}

impl CandidateModel for LogNormalCandidate {
    fn kind(&self) -> CandidateKind {
        CandidateKind::LogNormal
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

    fn set_to_non_informative(&mut self, offset: f64, decay_rate: f64) {
        self.offset = offset;
        self.posterior = NormalGamma::non_informative(0.0);
        self.decay_rate = decay_rate;
        self.number_samples = 0.0;
    }

    fn is_non_informative(&self) -> bool {
        self.posterior.is_non_informative()
    }

    fn needs_offset(&self) -> bool {
        true
    }

    fn adjust_offset(&mut self, values: &[f64], _weights: &[f64]) -> f64 {
        let minimum = values.iter().copied().fold(f64::INFINITY, f64::min);
        if !minimum.is_finite() || minimum + self.offset >= self.offset_margin {
            return 0.0;
        }
        let new_offset = self.offset_margin - minimum;

        if self.is_non_informative() {
            self.offset = new_offset;
            return 0.0;
        }

        let resamples = self.sample_marginal_likelihood(ADJUST_OFFSET_SAMPLE_SIZE);
        if resamples.is_empty() {
            self.offset = new_offset;
            return 0.0;
        }
        let weight = self.number_samples / resamples.len() as f64;
        let resample_weights = vec![weight; resamples.len()];
        let before = self.joint_log_marginal_likelihood(&resamples, &resample_weights);

        let number_samples = self.number_samples;
        self.offset = new_offset;
        self.posterior = NormalGamma::non_informative(0.0);
        let logs: Vec<f64> = resamples
            .iter()
            .filter_map(|&x| self.log_shifted(x))
            .collect();
        if logs.len() == resamples.len() {
            self.posterior = self.posterior.updated(&logs, &resample_weights);
        }
        self.number_samples = number_samples;

        let after = self.joint_log_marginal_likelihood(&resamples, &resample_weights);
        if before.is_ok() && after.is_ok() {
            (after.value - before.value).min(0.0)
        } else {
            0.0
        }
    }

    fn offset(&self) -> f64 {
        self.offset
    }

    fn offset_margin(&self) -> f64 {
        self.offset_margin
    }

    fn add_samples(&mut self, values: &[f64], weights: &[f64]) -> Result<(), CandidateError> {
        check_batch(values, weights)?;
        let mut logs = Vec::with_capacity(values.len());
        for &x in values {
            match self.log_shifted(x) {
                Some(y) => logs.push(y),
                None => {
                    return Err(CandidateError::OutOfSupport {
                        value: x,
                        lower: -self.offset,
                        upper: INF,
                    })
                }
            }
        }
        self.posterior = self.posterior.updated(&logs, weights);
        self.number_samples += weights.iter().sum::<f64>();
        Ok(())
    }

    fn propagate_forwards_by_time(&mut self, time: f64) {
        let alpha = (-self.decay_rate * time).exp();
        self.posterior.age(alpha);
        self.number_samples *= alpha;
    }

    fn marginal_likelihood_support(&self) -> (f64, f64) {
        (-self.offset, INF)
    }

    fn marginal_likelihood_mean(&self) -> f64 {
        if self.is_non_informative() {
            return self.posterior.mean.exp() - self.offset;
        }
        let variance = self.log_scale_variance();
        ((self.posterior.mean + 0.5 * variance).exp() - self.offset).min(INF)
    }

    fn marginal_likelihood_mode(&self) -> f64 {
        if self.is_non_informative() {
            return self.posterior.mean.exp() - self.offset;
        }
        let variance = self.log_scale_variance();
        (self.posterior.mean - variance).exp() - self.offset
    }

    fn marginal_likelihood_variance(&self) -> f64 {
        if self.is_non_informative() {
            return INF;
        }
        let variance = self.log_scale_variance();
        let result = variance.exp_m1() * (2.0 * self.posterior.mean + variance).exp();
        if result.is_finite() {
            result.min(INF)
        } else {
            INF
        }
    }

    fn marginal_likelihood_confidence_interval(&self, percentage: f64) -> (f64, f64) {
        if self.is_non_informative() {
            return self.marginal_likelihood_support();
        }
        let (lower, upper) = central_interval(percentage);
        (self.quantile(lower), self.quantile(upper))
    }

    fn joint_log_marginal_likelihood(&self, values: &[f64], weights: &[f64]) -> LogLikelihood {
        if check_batch(values, weights).is_err() {
            return LogLikelihood::failed();
        }
        if self.is_non_informative() {
            return LogLikelihood::overflowed();
        }
        let mut logs = Vec::with_capacity(values.len());
        for &x in values {
            match self.log_shifted(x) {
                Some(y) => logs.push(y),
                None => return LogLikelihood::overflowed(),
            }
        }
        // Change of variables: p(x) = p(y) / (x + offset).
        let jacobian: f64 = logs.iter().zip(weights).map(|(y, w)| w * y).sum();
        LogLikelihood::from_value(self.posterior.log_evidence(&logs, weights) - jacobian)
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
        let value = minus_log_sum(values, weights, |x| self.tails(x).1);
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
        quantile_samples(n, |p| self.quantile(p))
    }

    fn checksum(&self, seed: u64) -> u64 {
        let builder = ChecksumBuilder::new(seed)
            .add_str(self.kind().tag())
            .add_str(&self.data_type.to_string())
            .add_f64(self.decay_rate)
            .add_f64(self.number_samples)
            .add_f64(self.offset)
            .add_f64(self.offset_margin);
        self.posterior.checksum(builder).finish()
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
