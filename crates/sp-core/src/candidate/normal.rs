//! Normal candidate with unknown mean and precision.

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
    MINUS_INF,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalCandidate {
    data_type: DataType,
    decay_rate: f64,
    number_samples: f64,
    posterior: NormalGamma,
}

impl NormalCandidate {
    pub fn new(data_type: DataType, decay_rate: f64) -> Self {
        Self {
            data_type,
            decay_rate,
            number_samples: 0.0,
            posterior: NormalGamma::non_informative(0.0),
        }
    }

    pub fn posterior(&self) -> &NormalGamma {
        &self.posterior
    }
}

impl CandidateModel for NormalCandidate {
    fn kind(&self) -> CandidateKind {
        CandidateKind::Normal
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
        self.posterior = NormalGamma::non_informative(offset);
        self.decay_rate = decay_rate;
        self.number_samples = 0.0;
    }

    fn is_non_informative(&self) -> bool {
        self.posterior.is_non_informative()
    }

    fn add_samples(&mut self, values: &[f64], weights: &[f64]) -> Result<(), CandidateError> {
        check_batch(values, weights)?;
        self.posterior = self.posterior.updated(values, weights);
        self.number_samples += weights.iter().sum::<f64>();
        Ok(())
    }

    fn propagate_forwards_by_time(&mut self, time: f64) {
        let alpha = (-self.decay_rate * time).exp();
        self.posterior.age(alpha);
        self.number_samples *= alpha;
    }

    fn marginal_likelihood_support(&self) -> (f64, f64) {
        (MINUS_INF, INF)
    }

    fn marginal_likelihood_mean(&self) -> f64 {
        self.posterior.mean
    }

    fn marginal_likelihood_mode(&self) -> f64 {
        self.posterior.mean
    }

    fn marginal_likelihood_variance(&self) -> f64 {
        self.posterior.predictive_variance().unwrap_or(INF)
    }

    fn marginal_likelihood_confidence_interval(&self, percentage: f64) -> (f64, f64) {
        if self.is_non_informative() {
            return self.marginal_likelihood_support();
        }
        let (lower, upper) = central_interval(percentage);
        (
            self.posterior.predictive_quantile(lower).max(MINUS_INF),
            self.posterior.predictive_quantile(upper).min(INF),
        )
    }

    fn joint_log_marginal_likelihood(&self, values: &[f64], weights: &[f64]) -> LogLikelihood {
        if check_batch(values, weights).is_err() {
            return LogLikelihood::failed();
        }
        if self.is_non_informative() {
            // The improper prior assigns zero likelihood everywhere.
            return LogLikelihood::overflowed();
        }
        LogLikelihood::from_value(self.posterior.log_evidence(values, weights))
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
        let value = minus_log_sum(values, weights, |x| self.posterior.predictive_tails(x).0);
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
        let value = minus_log_sum(values, weights, |x| self.posterior.predictive_tails(x).1);
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
            self.posterior.predictive_tails(x)
        }))
    }

    fn sample_marginal_likelihood(&self, n: usize) -> Vec<f64> {
        if self.is_non_informative() {
            return Vec::new();
        }
        quantile_samples(n, |p| self.posterior.predictive_quantile(p))
    }

    fn checksum(&self, seed: u64) -> u64 {
        let builder = ChecksumBuilder::new(seed)
            .add_str(self.kind().tag())
            .add_str(&self.data_type.to_string())
            .add_f64(self.decay_rate)
            .add_f64(self.number_samples);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn fitted() -> NormalCandidate {
        let mut model = NormalCandidate::new(DataType::Continuous, 0.0);
        let values = [-1.2, 0.3, 0.9, -0.4, 1.6, 0.1, -0.7, 0.5];
        model.add_samples(&values, &[1.0; 8]).unwrap();
        model
    }

    #[test]
    fn starts_non_informative() {
        let model = NormalCandidate::new(DataType::Continuous, 0.0);
        assert!(model.is_non_informative());
        let ll = model.joint_log_marginal_likelihood(&[1.0], &[1.0]);
        assert_eq!(ll, LogLikelihood::overflowed());
        assert_eq!(model.marginal_likelihood_variance(), INF);
        assert!(model.sample_marginal_likelihood(5).is_empty());
    }

    #[test]
    fn posterior_tracks_sample_mean() {
        let model = fitted();
        assert!(!model.is_non_informative());
        assert!(approx_eq(model.marginal_likelihood_mean(), 0.1375, 1e-12));
        assert_eq!(model.number_samples(), 8.0);
        assert!(model.marginal_likelihood_variance() > 0.0);
    }

    #[test]
    fn likelihood_prefers_typical_values() {
        let model = fitted();
        let near = model.joint_log_marginal_likelihood(&[0.2], &[1.0]);
        let far = model.joint_log_marginal_likelihood(&[8.0], &[1.0]);
        assert!(near.is_ok() && far.is_ok());
        assert!(near.value > far.value);
    }

    #[test]
    fn cdf_and_complement_agree() {
        let model = fitted();
        let (lower, _) = model.minus_log_joint_cdf(&[0.1375], &[1.0]).unwrap();
        let (lower_c, _) = model.minus_log_joint_cdf_complement(&[0.1375], &[1.0]).unwrap();
        assert!(approx_eq(lower, 2f64.ln(), 1e-9));
        assert!(approx_eq(lower_c, 2f64.ln(), 1e-9));
    }

    #[test]
    fn outlier_is_in_right_tail() {
        let model = fitted();
        let bounds = model
            .probability_of_less_likely_samples(ProbabilityCalculation::TwoSided, &[9.0], &[1.0])
            .unwrap();
        assert_eq!(bounds.tail, Tail::Right);
        assert!(bounds.upper < 0.01);
    }

    #[test]
    fn samples_are_sorted_quantiles() {
        let model = fitted();
        let samples = model.sample_marginal_likelihood(10);
        assert_eq!(samples.len(), 10);
        assert!(samples.windows(2).all(|w| w[0] < w[1]));
        let mean: f64 = samples.iter().sum::<f64>() / 10.0;
        assert!(approx_eq(mean, model.marginal_likelihood_mean(), 1e-6));
    }

    #[test]
    fn decay_relaxes_towards_non_informative() {
        let mut model = fitted();
        model.set_decay_rate(0.5);
        let before = model.posterior().precision;
        model.propagate_forwards_by_time(1.0);
        assert!(model.posterior().precision < before);
        assert!(approx_eq(model.number_samples(), 8.0 * (-0.5f64).exp(), 1e-12));
    }

    #[test]
    fn persist_round_trips() {
        let model = fitted();
        let doc = model.persist().unwrap();
        assert_eq!(doc.tag, "normal");
        let restored: NormalCandidate = serde_json::from_value(doc.state).unwrap();
        assert_eq!(restored, model);
        assert_eq!(restored.checksum(3), model.checksum(3));
    }
}
