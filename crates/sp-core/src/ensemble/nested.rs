//! The ensemble is itself a candidate model, so ensembles can nest.

use sp_math::truncate;
use tracing::warn;

use super::{EnsembleError, OneOfNPrior};
use crate::candidate::{
    check_batch, CandidateDocument, CandidateError, CandidateKind, CandidateModel,
};
use crate::canonicalize::CanonicalizeWeights;
use crate::sampling::DeterministicSampler;
use crate::types::{
    DataType, FpStatus, LogLikelihood, ProbabilityBounds, ProbabilityCalculation, INF, MINUS_INF,
};

fn to_candidate_error(err: EnsembleError) -> CandidateError {
    match err {
        EnsembleError::Candidate(err) => err,
        other => CandidateError::Numerical(other.to_string()),
    }
}

impl OneOfNPrior {
    /// Weight-averaged query over the significant candidates, or `None`
    /// when no candidate is significant.
    fn significant_average(&self, query: impl Fn(&dyn CandidateModel) -> f64) -> Option<f64> {
        let threshold = self.params.minimum_significant_weight;
        let mut total = 0.0;
        let mut z = 0.0;
        for (weight, entry) in self.weights().into_iter().zip(&self.entries) {
            if weight > threshold {
                total += weight * query(entry.model.as_ref());
                z += weight;
            }
        }
        (z > 0.0).then(|| total / z)
    }
}

impl CandidateModel for OneOfNPrior {
    fn kind(&self) -> CandidateKind {
        CandidateKind::OneOfN
    }

    fn clone_box(&self) -> Box<dyn CandidateModel> {
        Box::new(self.clone())
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn set_data_type(&mut self, data_type: DataType) {
        OneOfNPrior::set_data_type(self, data_type);
    }

    fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    fn set_decay_rate(&mut self, decay_rate: f64) {
        OneOfNPrior::set_decay_rate(self, decay_rate);
    }

    fn number_samples(&self) -> f64 {
        self.number_samples
    }

    /// Reset every candidate and forget all weight evidence.
    fn set_to_non_informative(&mut self, offset: f64, decay_rate: f64) {
        {
            let mut entries = CanonicalizeWeights::new(&mut self.entries);
            for entry in entries.iter_mut() {
                let long_term = entry.weight.long_term_log_weight();
                entry.weight.set_log_weight(long_term);
                entry.model.set_to_non_informative(offset, decay_rate);
            }
        }
        self.decay_rate = decay_rate;
        self.number_samples = 0.0;
    }

    /// Non-informative while any participating candidate is.
    fn is_non_informative(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.model.participates_in_model_selection() && e.model.is_non_informative())
    }

    fn participates_in_model_selection(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.model.participates_in_model_selection())
    }

    fn unmarginalized_parameters(&self) -> f64 {
        self.weights()
            .into_iter()
            .zip(&self.entries)
            .map(|(w, e)| w * e.model.unmarginalized_parameters())
            .sum()
    }

    fn needs_offset(&self) -> bool {
        self.entries.iter().any(|e| e.model.needs_offset())
    }

    fn adjust_offset(&mut self, values: &[f64], weights: &[f64]) -> f64 {
        OneOfNPrior::adjust_offset(self, values, weights)
    }

    fn offset(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.model.offset())
            .fold(0.0, f64::max)
    }

    fn offset_margin(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.model.offset_margin())
            .fold(0.0, f64::max)
    }

    fn add_samples(&mut self, values: &[f64], weights: &[f64]) -> Result<(), CandidateError> {
        check_batch(values, weights)?;
        OneOfNPrior::add_samples(self, values, weights).map_err(to_candidate_error)
    }

    fn propagate_forwards_by_time(&mut self, time: f64) {
        if let Err(err) = OneOfNPrior::propagate_forwards_by_time(self, time) {
            warn!(error = %err, "nested ensemble not propagated");
        }
    }

    /// Intersection of the participating candidates' supports.
    fn marginal_likelihood_support(&self) -> (f64, f64) {
        self.entries
            .iter()
            .filter(|e| e.model.participates_in_model_selection())
            .map(|e| e.model.marginal_likelihood_support())
            .fold((MINUS_INF, INF), |(lower, upper), (l, u)| {
                (lower.max(l), upper.min(u))
            })
    }

    fn marginal_likelihood_mean(&self) -> f64 {
        if self.is_non_informative() {
            return self.median_model_mean();
        }
        self.significant_average(|model| model.marginal_likelihood_mean())
            .unwrap_or_else(|| self.median_model_mean())
    }

    fn nearest_marginal_likelihood_mean(&self, value: f64) -> f64 {
        if self.is_non_informative() {
            return self.median_model_mean();
        }
        self.significant_average(|model| model.nearest_marginal_likelihood_mean(value))
            .unwrap_or_else(|| self.median_model_mean())
    }

    /// Modes of the candidates weighted by their posterior weight times
    /// their likelihood at the mode.
    fn marginal_likelihood_mode(&self) -> f64 {
        if self.is_non_informative() {
            return self.median_model_mean();
        }
        let mut total = 0.0;
        let mut z = 0.0;
        for (weight, entry) in self.weights().into_iter().zip(&self.entries) {
            if weight <= 0.0 || !entry.model.participates_in_model_selection() {
                continue;
            }
            let mode = entry.model.marginal_likelihood_mode();
            let ll = entry.model.joint_log_marginal_likelihood(&[mode], &[1.0]);
            if ll.is_ok() {
                let p = weight * ll.value.exp();
                total += p * mode;
                z += p;
            }
        }
        let mode = total / z;
        if z > 0.0 && mode.is_finite() {
            let (lower, upper) = self.marginal_likelihood_support();
            truncate(mode, lower, upper)
        } else {
            self.marginal_likelihood_mean()
        }
    }

    fn marginal_likelihood_variance(&self) -> f64 {
        if self.is_non_informative() {
            return INF;
        }
        self.significant_average(|model| model.marginal_likelihood_variance())
            .unwrap_or(INF)
    }

    /// Weighted average of the candidates' intervals.
    fn marginal_likelihood_confidence_interval(&self, percentage: f64) -> (f64, f64) {
        let support = self.marginal_likelihood_support();
        if self.is_non_informative() || truncate(percentage / 100.0, 0.0, 1.0) >= 1.0 {
            return support;
        }
        let threshold = self.params.maximum_relative_error;
        let mut lower = 0.0;
        let mut upper = 0.0;
        let mut z = 0.0;
        for (weight, entry) in self.weights().into_iter().zip(&self.entries) {
            if weight >= threshold {
                let (l, u) = entry.model.marginal_likelihood_confidence_interval(percentage);
                lower += weight * l;
                upper += weight * u;
                z += weight;
            }
        }
        if z > 0.0 {
            (lower / z, upper / z)
        } else {
            support
        }
    }

    /// `log Σ_i w_i·L_i(values)` over the participating candidates.
    fn joint_log_marginal_likelihood(&self, values: &[f64], weights: &[f64]) -> LogLikelihood {
        if check_batch(values, weights).is_err() {
            return LogLikelihood::failed();
        }
        let mut terms = Vec::with_capacity(self.entries.len());
        let mut z = 0.0;
        for entry in &self.entries {
            if !entry.model.participates_in_model_selection() {
                continue;
            }
            let log_weight = entry.weight.log_weight();
            z += log_weight.exp();
            let ll = entry.model.joint_log_marginal_likelihood(values, weights);
            match ll.status {
                FpStatus::Failed => return ll,
                FpStatus::Overflowed => {}
                FpStatus::Ok => terms.push(ll.value + log_weight),
            }
        }
        let Some(max) = terms.iter().copied().reduce(f64::max) else {
            return LogLikelihood::overflowed();
        };
        let sum: f64 = terms.iter().map(|t| (t - max).exp()).sum();
        LogLikelihood::from_value(max + (sum / z).ln())
    }

    fn minus_log_joint_cdf(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), CandidateError> {
        check_batch(values, weights)?;
        OneOfNPrior::minus_log_joint_cdf(self, values, weights).map_err(to_candidate_error)
    }

    fn minus_log_joint_cdf_complement(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), CandidateError> {
        check_batch(values, weights)?;
        OneOfNPrior::minus_log_joint_cdf_complement(self, values, weights)
            .map_err(to_candidate_error)
    }

    fn probability_of_less_likely_samples(
        &self,
        calculation: ProbabilityCalculation,
        values: &[f64],
        weights: &[f64],
    ) -> Result<ProbabilityBounds, CandidateError> {
        check_batch(values, weights)?;
        OneOfNPrior::probability_of_less_likely_samples(self, calculation, values, weights)
            .map_err(to_candidate_error)
    }

    /// Evenly allocated samples; see [`OneOfNPrior::sample_with`].
    fn sample_marginal_likelihood(&self, n: usize) -> Vec<f64> {
        self.sample_with(n, &mut DeterministicSampler)
            .unwrap_or_default()
    }

    fn checksum(&self, seed: u64) -> u64 {
        self.checksum_with(seed)
    }

    fn memory_usage(&self) -> usize {
        self.memory_usage_of()
    }

    fn persist(&self) -> serde_json::Result<CandidateDocument> {
        Ok(CandidateDocument {
            tag: self.kind().tag().to_string(),
            state: serde_json::to_value(self.to_document()?)?,
        })
    }
}
