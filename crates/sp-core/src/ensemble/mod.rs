//! The one-of-n model-selection ensemble.
//!
//! `OneOfNPrior` keeps a fixed set of candidate distribution families and a
//! posterior weight for each. Every batch of samples updates each candidate
//! and multiplies its weight by the candidate's marginal likelihood of the
//! batch, so over time the weight concentrates on the family that explains
//! the data best. Queries average the candidates by weight.
//!
//! Weight updates are guarded:
//! - A candidate can never fall further behind the best one than a bounded
//!   per-sample penalty in a single batch, so one outlier cannot zero it.
//! - Candidates that stop participating are excluded with a finite
//!   `MINUS_INF` log-weight and re-enter at a small relative weight.
//! - Every mutation renormalizes through [`CanonicalizeWeights`] and a
//!   non-finite result resets the ensemble to non-informative.

mod nested;
pub mod params;
mod query;

use std::fmt;
use std::mem;

use sp_math::log_sum_exp;
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::candidate::{CandidateError, CandidateKind, CandidateModel};
use crate::canonicalize::{canonicalize, CanonicalizeWeights};
use crate::checksum::ChecksumBuilder;
use crate::config::{ConfigError, EnsembleConfig};
use crate::model_weight::ModelWeight;
use crate::types::{DataType, FpStatus, MINUS_INF};

pub use params::ModelSelectionParams;

/// Normalized weight a candidate needs to be listed by `Display`.
const PRINT_WEIGHT_THRESHOLD: f64 = 0.05;

/// Errors from ensemble operations.
#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("an ensemble needs at least one candidate model")]
    NoModels,

    #[error("invalid samples: {reason}")]
    Validation { reason: String },

    #[error("{model} failed to compute the log-likelihood of the samples")]
    NumericFailure { model: String },

    #[error("update produced non-finite weights {weights}; reset to non-informative")]
    BadWeights { weights: String },

    #[error("invalid propagation time {0}")]
    InvalidPropagationTime(f64),

    #[error("refusing to remove every candidate model")]
    WouldRemoveAllModels,

    #[error("sampler returned {got} counts for {expected} models")]
    SamplingFailed { expected: usize, got: usize },

    #[error(transparent)]
    Candidate(#[from] CandidateError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EnsembleError {
    /// Stable numeric code, continuing the configuration error range.
    pub fn code(&self) -> u32 {
        match self {
            EnsembleError::NoModels => 70,
            EnsembleError::Validation { .. } => 71,
            EnsembleError::NumericFailure { .. } => 72,
            EnsembleError::BadWeights { .. } => 73,
            EnsembleError::InvalidPropagationTime(_) => 74,
            EnsembleError::WouldRemoveAllModels => 75,
            EnsembleError::SamplingFailed { .. } => 76,
            EnsembleError::Candidate(_) => 77,
            EnsembleError::Config(err) => err.code(),
        }
    }
}

/// One candidate and its posterior weight.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) weight: ModelWeight,
    pub(crate) model: Box<dyn CandidateModel>,
}

impl Entry {
    pub fn weight(&self) -> &ModelWeight {
        &self.weight
    }

    pub fn model(&self) -> &dyn CandidateModel {
        self.model.as_ref()
    }
}

/// Bayesian model selection over a fixed set of candidate families.
///
/// Cloning is deep: the clone shares no state with the original.
#[derive(Debug, Clone)]
pub struct OneOfNPrior {
    entries: Vec<Entry>,
    data_type: DataType,
    decay_rate: f64,
    number_samples: f64,
    params: ModelSelectionParams,
}

impl OneOfNPrior {
    /// Ensemble over `models` with uniform prior weights.
    pub fn new(
        models: Vec<Box<dyn CandidateModel>>,
        data_type: DataType,
        decay_rate: f64,
    ) -> Result<Self, EnsembleError> {
        let weighted = models.into_iter().map(|model| (1.0, model)).collect();
        Self::with_weights(weighted, data_type, decay_rate)
    }

    /// Ensemble with explicit prior weights, which are normalized.
    pub fn with_weights(
        models: Vec<(f64, Box<dyn CandidateModel>)>,
        data_type: DataType,
        decay_rate: f64,
    ) -> Result<Self, EnsembleError> {
        Self::with_params(models, data_type, decay_rate, ModelSelectionParams::default())
    }

    pub fn with_params(
        models: Vec<(f64, Box<dyn CandidateModel>)>,
        data_type: DataType,
        decay_rate: f64,
        params: ModelSelectionParams,
    ) -> Result<Self, EnsembleError> {
        if models.is_empty() {
            error!("cannot build an ensemble without candidate models");
            return Err(EnsembleError::NoModels);
        }
        if let Some((weight, _)) = models.iter().find(|(w, _)| !(w.is_finite() && *w >= 0.0)) {
            return Err(EnsembleError::Validation {
                reason: format!("prior weight {weight} is not a finite non-negative number"),
            });
        }
        let mut entries: Vec<Entry> = models
            .into_iter()
            .map(|(weight, mut model)| {
                model.set_data_type(data_type);
                model.set_decay_rate(decay_rate);
                Entry {
                    weight: ModelWeight::new(weight),
                    model,
                }
            })
            .collect();
        canonicalize(&mut entries);
        Ok(Self {
            entries,
            data_type,
            decay_rate,
            number_samples: 0.0,
            params,
        })
    }

    /// Build the ensemble a configuration file describes.
    pub fn from_config(config: &EnsembleConfig) -> Result<Self, EnsembleError> {
        config.validate()?;
        let models = config
            .candidates
            .iter()
            .map(|spec| (spec.weight(), spec.build(config.data_type, config.decay_rate)))
            .collect();
        Self::with_params(models, config.data_type, config.decay_rate, config.selection)
    }

    pub(crate) fn from_parts(
        entries: Vec<Entry>,
        data_type: DataType,
        decay_rate: f64,
        number_samples: f64,
        params: ModelSelectionParams,
    ) -> Self {
        Self {
            entries,
            data_type,
            decay_rate,
            number_samples,
            params,
        }
    }

    pub fn params(&self) -> &ModelSelectionParams {
        &self.params
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The candidate models, in construction order.
    pub fn models(&self) -> Vec<&dyn CandidateModel> {
        self.entries.iter().map(|e| e.model.as_ref()).collect()
    }

    pub fn swap(&mut self, other: &mut OneOfNPrior) {
        mem::swap(self, other);
    }

    /// Update every candidate and reweight them by how well they predicted
    /// the batch.
    ///
    /// Invalid batches are rejected without touching any state. A candidate
    /// failing to evaluate the batch aborts the update with all state
    /// restored. A candidate rejecting the samples only logs a warning.
    pub fn add_samples(&mut self, values: &[f64], weights: &[f64]) -> Result<(), EnsembleError> {
        validate_batch(values, weights)?;

        // Offset adjustment mutates candidates before the likelihoods are
        // known, so keep what is needed to undo it.
        let saved_weights: Vec<ModelWeight> = self.entries.iter().map(|e| e.weight).collect();
        let saved_models: Vec<(usize, Box<dyn CandidateModel>)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.model.needs_offset())
            .map(|(i, e)| (i, e.model.clone()))
            .collect();

        self.adjust_offset(values, weights);

        let n: f64 = weights.iter().sum();
        let number_samples_before = self.number_samples;
        let number_samples_after = number_samples_before + n;
        let penalty = if number_samples_before > 0.0 {
            0.5 * (number_samples_before.ln() - number_samples_after.ln())
        } else {
            0.0
        };
        let was_non_informative = self.is_non_informative();
        let max_model_penalty = self.params.max_model_penalty(number_samples_after);
        let reentry_log_weight = self.params.reentry_weight.ln();

        // `None` marks a candidate whose likelihood overflowed.
        let mut log_likelihoods: Vec<Option<f64>> = Vec::with_capacity(self.entries.len());
        let mut used = Vec::with_capacity(self.entries.len());
        let mut failed = None;
        for entry in &self.entries {
            let participates = entry.model.participates_in_model_selection();
            used.push(participates);
            if !participates {
                log_likelihoods.push(None);
                continue;
            }
            let ll = entry.model.joint_log_marginal_likelihood(values, weights);
            match ll.status {
                FpStatus::Failed => {
                    failed = Some(entry.model.kind().to_string());
                    break;
                }
                FpStatus::Overflowed => log_likelihoods.push(None),
                FpStatus::Ok => log_likelihoods.push(Some(
                    ll.value + entry.model.unmarginalized_parameters() * penalty,
                )),
            }
        }
        if let Some(model) = failed {
            error!(
                model = %model,
                samples = ?values,
                "failed to compute the log-likelihood of the samples"
            );
            for (entry, weight) in self.entries.iter_mut().zip(saved_weights) {
                entry.weight = weight;
            }
            for (i, model) in saved_models {
                self.entries[i].model = model;
            }
            return Err(EnsembleError::NumericFailure { model });
        }

        {
            let mut entries = CanonicalizeWeights::new(&mut self.entries);

            let mut uses = Vec::with_capacity(entries.len());
            for entry in entries.iter_mut() {
                if let Err(err) = entry.model.add_samples(values, weights) {
                    warn!(model = %entry.model.kind(), error = %err, "candidate rejected samples");
                }
                uses.push(entry.model.participates_in_model_selection());
            }

            // Candidates that stopped participating drop out before any
            // re-entry weight is set relative to the others.
            for (entry, &u) in entries.iter_mut().zip(&uses) {
                if !u {
                    entry.weight.set_log_weight(MINUS_INF);
                }
            }

            let max_log_likelihood = log_likelihoods
                .iter()
                .zip(&used)
                .filter_map(|(ll, &u)| if u { *ll } else { None })
                .fold(None, |max: Option<f64>, ll| Some(max.map_or(ll, |m| m.max(ll))));

            if !was_non_informative {
                if let Some(max_log_likelihood) = max_log_likelihood {
                    let min_log_likelihood = max_log_likelihood - n * max_model_penalty;
                    for (i, entry) in entries.iter_mut().enumerate() {
                        if used[i] && uses[i] {
                            let ll = log_likelihoods[i].unwrap_or(MINUS_INF).max(min_log_likelihood);
                            entry.weight.add_log_factor(ll);
                        }
                    }
                    let max_log_weight = entries
                        .iter()
                        .enumerate()
                        .filter(|&(i, _)| used[i] && uses[i])
                        .map(|(_, e)| e.weight.log_weight())
                        .fold(MINUS_INF, f64::max);
                    for (i, entry) in entries.iter_mut().enumerate() {
                        if !used[i] && uses[i] {
                            debug!(model = %entry.model.kind(), "candidate re-enters model selection");
                            entry.weight.set_log_weight(max_log_weight + reentry_log_weight);
                        }
                    }
                }
            }
        }

        self.number_samples = number_samples_after;

        if self.bad_weights() {
            let weights = self.debug_weights();
            error!(weights = %weights, "update produced non-finite weights; resetting");
            let decay_rate = self.decay_rate;
            let offset_margin = self.offset_margin();
            self.set_to_non_informative(offset_margin, decay_rate);
            return Err(EnsembleError::BadWeights { weights });
        }
        trace!(
            weights = %self.debug_weights(),
            number_samples = self.number_samples,
            "updated weights"
        );
        Ok(())
    }

    /// Forget evidence at the decay rate for `time` units.
    ///
    /// Weights relax towards their long-term values and every candidate
    /// ages by the same factor.
    pub fn propagate_forwards_by_time(&mut self, time: f64) -> Result<(), EnsembleError> {
        if !time.is_finite() || time < 0.0 {
            error!(time, "bad propagation time");
            return Err(EnsembleError::InvalidPropagationTime(time));
        }
        if time == 0.0 {
            return Ok(());
        }
        let alpha = (-self.decay_rate * time).exp();
        {
            let mut entries = CanonicalizeWeights::new(&mut self.entries);
            for entry in entries.iter_mut() {
                entry.weight.age(alpha);
                entry.model.propagate_forwards_by_time(time);
            }
        }
        self.number_samples *= alpha;
        Ok(())
    }

    /// Remove every candidate whose kind matches `filter`, returning how
    /// many were removed. Removing them all is refused.
    pub fn remove_models<F>(&mut self, filter: F) -> Result<usize, EnsembleError>
    where
        F: Fn(CandidateKind) -> bool,
    {
        let before = self.entries.len();
        let remaining = self.entries.iter().filter(|e| !filter(e.model.kind())).count();
        if remaining == 0 {
            warn!(models = before, "filter matches every candidate; nothing removed");
            return Err(EnsembleError::WouldRemoveAllModels);
        }
        let mut entries = CanonicalizeWeights::new(&mut self.entries);
        entries.retain(|e| !filter(e.model.kind()));
        Ok(before - remaining)
    }

    pub fn set_decay_rate(&mut self, decay_rate: f64) {
        self.decay_rate = decay_rate;
        for entry in &mut self.entries {
            entry.model.set_decay_rate(decay_rate);
        }
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
        for entry in &mut self.entries {
            entry.model.set_data_type(data_type);
        }
    }

    /// Shift candidates that need it so the samples are in their support.
    ///
    /// Each participating candidate's log-weight absorbs the likelihood
    /// cost of its move. Returns the weighted mean cost.
    pub fn adjust_offset(&mut self, values: &[f64], weights: &[f64]) -> f64 {
        let mut penalties = Vec::with_capacity(self.entries.len());
        let mut total = 0.0;
        let mut z = 0.0;
        for entry in &mut self.entries {
            let penalty = entry.model.adjust_offset(values, weights);
            let w = entry.weight.weight();
            if penalty.is_finite() {
                total += w * penalty;
                z += w;
            }
            penalties.push(penalty);
        }
        let mean = if z > 0.0 { total / z } else { 0.0 };
        if mean != 0.0 {
            let mut entries = CanonicalizeWeights::new(&mut self.entries);
            for (entry, penalty) in entries.iter_mut().zip(penalties) {
                if entry.model.participates_in_model_selection() && penalty.is_finite() {
                    entry.weight.add_log_factor(penalty);
                }
            }
        }
        mean
    }

    /// Normalized weights, one per candidate in construction order.
    pub fn weights(&self) -> Vec<f64> {
        self.log_weights().into_iter().map(f64::exp).collect()
    }

    /// Normalized log-weights, one per candidate in construction order.
    pub fn log_weights(&self) -> Vec<f64> {
        let raw: Vec<f64> = self.entries.iter().map(|e| e.weight.log_weight()).collect();
        let log_z = log_sum_exp(&raw);
        if log_z.is_finite() {
            raw.into_iter().map(|lw| lw - log_z).collect()
        } else {
            raw
        }
    }

    /// `(log_weight, index)` of the participating candidates, normalized
    /// over them and sorted by decreasing weight.
    pub fn normalized_log_weights(&self) -> Vec<(f64, usize)> {
        let mut result: Vec<(f64, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.model.participates_in_model_selection())
            .map(|(i, e)| (e.weight.log_weight(), i))
            .collect();
        let log_weights: Vec<f64> = result.iter().map(|(lw, _)| *lw).collect();
        let log_z = log_sum_exp(&log_weights);
        if log_z.is_finite() {
            for (lw, _) in &mut result {
                *lw -= log_z;
            }
        }
        result.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        result
    }

    /// True if any stored log-weight is NaN or infinite.
    pub fn bad_weights(&self) -> bool {
        self.entries.iter().any(|e| !e.weight.log_weight().is_finite())
    }

    pub fn debug_weights(&self) -> String {
        let weights: Vec<String> = self.weights().iter().map(|w| format!("{w:.3e}")).collect();
        format!("[{}]", weights.join(", "))
    }

    /// The median of the candidates' means, over the participating ones if
    /// there are any.
    pub fn median_model_mean(&self) -> f64 {
        let participating: Vec<f64> = self
            .entries
            .iter()
            .filter(|e| e.model.participates_in_model_selection())
            .map(|e| e.model.marginal_likelihood_mean())
            .collect();
        let mut means = if participating.is_empty() {
            self.entries
                .iter()
                .map(|e| e.model.marginal_likelihood_mean())
                .collect()
        } else {
            participating
        };
        median(&mut means)
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

/// Reject batches that no candidate could use.
fn validate_batch(values: &[f64], weights: &[f64]) -> Result<(), EnsembleError> {
    let reason = if values.is_empty() {
        Some("no samples".to_string())
    } else if values.len() != weights.len() {
        Some(format!("{} values but {} weights", values.len(), weights.len()))
    } else if let Some(x) = values.iter().find(|x| !x.is_finite()) {
        Some(format!("sample {x} is not finite"))
    } else {
        weights
            .iter()
            .find(|w| !(w.is_finite() && **w >= 0.0))
            .map(|w| format!("sample weight {w} is not a finite non-negative number"))
    };
    match reason {
        Some(reason) => {
            warn!(reason = %reason, "ignoring invalid samples");
            Err(EnsembleError::Validation { reason })
        }
        None => Ok(()),
    }
}

impl OneOfNPrior {
    pub(crate) fn checksum_with(&self, seed: u64) -> u64 {
        let builder = ChecksumBuilder::new(seed)
            .add_str(CandidateKind::OneOfN.tag())
            .add_str(&self.data_type.to_string())
            .add_f32(self.decay_rate)
            .add_f32(self.number_samples);
        self.entries
            .iter()
            .fold(builder, |builder, entry| {
                entry.weight.checksum(builder).add_u64(entry.model.checksum(seed))
            })
            .finish()
    }

    pub(crate) fn memory_usage_of(&self) -> usize {
        mem::size_of::<Self>()
            + self.entries.capacity() * mem::size_of::<Entry>()
            + self
                .entries
                .iter()
                .map(|e| e.model.memory_usage())
                .sum::<usize>()
    }
}

impl fmt::Display for OneOfNPrior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "one-of-n")?;
        if self.is_non_informative() {
            return write!(f, " non-informative");
        }
        for (weight, entry) in self.weights().into_iter().zip(&self.entries) {
            if weight >= PRINT_WEIGHT_THRESHOLD {
                write!(
                    f,
                    "\n  {:.3} {} mean={:.6e} variance={:.6e}",
                    weight,
                    entry.model.kind(),
                    entry.model.marginal_likelihood_mean(),
                    entry.model.marginal_likelihood_variance()
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{NormalCandidate, PoissonCandidate, UniformCandidate};

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn ensemble(decay_rate: f64) -> OneOfNPrior {
        let models: Vec<Box<dyn CandidateModel>> = vec![
            Box::new(NormalCandidate::new(DataType::Continuous, decay_rate)),
            Box::new(UniformCandidate::new(DataType::Continuous, -10.0, 10.0, decay_rate)),
        ];
        OneOfNPrior::new(models, DataType::Continuous, decay_rate).unwrap()
    }

    fn weight_sum(prior: &OneOfNPrior) -> f64 {
        prior.entries.iter().map(|e| e.weight.weight()).sum()
    }

    #[test]
    fn construction_normalizes_weights() {
        let models: Vec<(f64, Box<dyn CandidateModel>)> = vec![
            (3.0, Box::new(NormalCandidate::new(DataType::Continuous, 0.0))),
            (1.0, Box::new(UniformCandidate::new(DataType::Continuous, 0.0, 1.0, 0.0))),
        ];
        let prior = OneOfNPrior::with_weights(models, DataType::Continuous, 0.0).unwrap();
        let weights = prior.weights();
        assert!(approx_eq(weights[0], 0.75, 1e-12));
        assert!(approx_eq(weight_sum(&prior), 1.0, 1e-12));
    }

    #[test]
    fn empty_construction_fails() {
        let err = OneOfNPrior::new(Vec::new(), DataType::Continuous, 0.0).unwrap_err();
        assert!(matches!(err, EnsembleError::NoModels));
        assert_eq!(err.code(), 70);
    }

    #[test]
    fn construction_propagates_decay_rate() {
        let prior = ensemble(0.25);
        assert!(prior.models().iter().all(|m| m.decay_rate() == 0.25));
    }

    #[test]
    fn invalid_batches_change_nothing() {
        let mut prior = ensemble(0.0);
        prior.add_samples(&[0.1, -0.2, 0.3], &[1.0; 3]).unwrap();
        let checksum = prior.checksum(0);

        let cases: [(&[f64], &[f64]); 4] = [
            (&[], &[]),
            (&[1.0, 2.0], &[1.0]),
            (&[f64::NAN], &[1.0]),
            (&[1.0], &[-1.0]),
        ];
        for (values, weights) in cases {
            let err = prior.add_samples(values, weights).unwrap_err();
            assert!(matches!(err, EnsembleError::Validation { .. }));
            assert_eq!(prior.checksum(0), checksum);
        }
    }

    #[test]
    fn first_batch_does_not_move_weights() {
        // The normal candidate is non-informative until it has seen data.
        let mut prior = ensemble(0.0);
        prior.add_samples(&[0.5], &[1.0]).unwrap();
        let weights = prior.weights();
        assert!(approx_eq(weights[0], 0.5, 1e-12));
        assert!(approx_eq(prior.number_samples(), 1.0, 1e-12));
    }

    #[test]
    fn weights_stay_normalized() {
        let mut prior = ensemble(0.0);
        for i in 0..20 {
            let x = (i as f64 * 0.37).sin();
            prior.add_samples(&[x, -x], &[1.0, 1.0]).unwrap();
            assert!(approx_eq(weight_sum(&prior), 1.0, 1e-9));
        }
    }

    #[test]
    fn propagate_rejects_bad_times() {
        let mut prior = ensemble(0.1);
        assert!(matches!(
            prior.propagate_forwards_by_time(-1.0),
            Err(EnsembleError::InvalidPropagationTime(t)) if t == -1.0
        ));
        assert!(prior.propagate_forwards_by_time(f64::NAN).is_err());
    }

    #[test]
    fn propagate_decays_number_samples() {
        let mut prior = ensemble(0.1);
        prior.add_samples(&[0.0, 1.0], &[1.0, 1.0]).unwrap();
        prior.propagate_forwards_by_time(2.0).unwrap();
        assert!(approx_eq(prior.number_samples(), 2.0 * (-0.2f64).exp(), 1e-12));
    }

    #[test]
    fn propagate_zero_is_identity() {
        let mut prior = ensemble(0.1);
        for x in [0.3, -1.2, 0.8, 2.1] {
            prior.add_samples(&[x], &[1.0]).unwrap();
        }
        let checksum = prior.checksum(3);
        prior.propagate_forwards_by_time(0.0).unwrap();
        assert_eq!(prior.checksum(3), checksum);
    }

    #[test]
    fn remove_models_keeps_rest_normalized() {
        let models: Vec<Box<dyn CandidateModel>> = vec![
            Box::new(NormalCandidate::new(DataType::Continuous, 0.0)),
            Box::new(PoissonCandidate::new(DataType::Continuous, 0.0)),
            Box::new(UniformCandidate::new(DataType::Continuous, -10.0, 10.0, 0.0)),
        ];
        let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();
        let removed = prior
            .remove_models(|kind| kind == CandidateKind::Poisson)
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(prior.models().len(), 2);
        assert!(approx_eq(weight_sum(&prior), 1.0, 1e-12));
    }

    #[test]
    fn remove_all_models_is_refused() {
        let mut prior = ensemble(0.0);
        let err = prior.remove_models(|_| true).unwrap_err();
        assert!(matches!(err, EnsembleError::WouldRemoveAllModels));
        assert_eq!(prior.models().len(), 2);
    }

    #[test]
    fn clone_is_independent() {
        let mut prior = ensemble(0.0);
        prior.add_samples(&[0.1, 0.2], &[1.0, 1.0]).unwrap();
        let copy = prior.clone();
        let checksum = copy.checksum(0);
        prior.add_samples(&[5.0], &[1.0]).unwrap();
        assert_eq!(copy.checksum(0), checksum);
        assert_ne!(prior.checksum(0), checksum);
    }

    #[test]
    fn swap_exchanges_state() {
        let mut a = ensemble(0.0);
        let mut b = ensemble(0.5);
        a.swap(&mut b);
        assert_eq!(a.decay_rate(), 0.5);
        assert_eq!(b.decay_rate(), 0.0);
    }

    #[test]
    fn set_decay_rate_reaches_candidates() {
        let mut prior = ensemble(0.0);
        prior.set_decay_rate(0.3);
        assert!(prior.models().iter().all(|m| m.decay_rate() == 0.3));
        prior.set_data_type(DataType::Integer);
        assert!(prior.models().iter().all(|m| m.data_type() == DataType::Integer));
    }

    #[test]
    fn normalized_log_weights_are_sorted() {
        let mut prior = ensemble(0.0);
        for i in 0..30 {
            let x = 0.1 * (i as f64 - 15.0);
            prior.add_samples(&[x], &[1.0]).unwrap();
        }
        let normalized = prior.normalized_log_weights();
        assert_eq!(normalized.len(), 2);
        assert!(normalized[0].0 >= normalized[1].0);
        let total: f64 = normalized.iter().map(|(lw, _)| lw.exp()).sum();
        assert!(approx_eq(total, 1.0, 1e-12));
    }

    #[test]
    fn median_of_means() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&mut []), 0.0);
    }

    #[test]
    fn display_lists_significant_models() {
        let mut prior = ensemble(0.0);
        assert_eq!(prior.to_string(), "one-of-n non-informative");
        for x in [0.1, -0.4, 0.7, -0.2, 0.3] {
            prior.add_samples(&[x], &[1.0]).unwrap();
        }
        let text = prior.to_string();
        assert!(text.starts_with("one-of-n"));
        assert!(text.contains("normal"));
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(EnsembleError::InvalidPropagationTime(-1.0).code(), 74);
        assert_eq!(EnsembleError::WouldRemoveAllModels.code(), 75);
        assert_eq!(
            EnsembleError::Candidate(CandidateError::EmptySamples).code(),
            77
        );
    }
}
