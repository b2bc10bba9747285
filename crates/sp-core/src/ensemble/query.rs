//! Tail and sampling queries that mix the candidates by weight.
//!
//! The c.d.f. queries walk the candidates from heaviest to lightest and
//! stop once the remaining weight cannot move the result by more than the
//! configured relative error.

use sp_math::{log_will_underflow, shift_left, shift_right, truncate};
use tracing::error;

use super::{validate_batch, EnsembleError, OneOfNPrior};
use crate::candidate::{CandidateError, CandidateModel};
use crate::sampling::WeightedSampler;
use crate::types::{ProbabilityBounds, ProbabilityCalculation, Tail, IMPROPER_CDF, MINUS_INF};

/// Probability bounds may exceed one by this much from rounding before it
/// is worth reporting.
const PROBABILITY_SLACK: f64 = 1.001;

impl OneOfNPrior {
    /// Bounds on `-log` of the mixture's joint c.d.f. at the samples.
    pub fn minus_log_joint_cdf(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), EnsembleError> {
        self.minus_log_joint_cdf_with(values, weights, |model, values, weights| {
            model.minus_log_joint_cdf(values, weights)
        })
    }

    /// Bounds on `-log` of the mixture's joint complementary c.d.f.
    pub fn minus_log_joint_cdf_complement(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), EnsembleError> {
        self.minus_log_joint_cdf_with(values, weights, |model, values, weights| {
            model.minus_log_joint_cdf_complement(values, weights)
        })
    }

    fn minus_log_joint_cdf_with<F>(
        &self,
        values: &[f64],
        weights: &[f64],
        cdf: F,
    ) -> Result<(f64, f64), EnsembleError>
    where
        F: Fn(&dyn CandidateModel, &[f64], &[f64]) -> Result<(f64, f64), CandidateError>,
    {
        validate_batch(values, weights)?;
        if self.is_non_informative() {
            let improper = -IMPROPER_CDF.ln();
            return Ok((improper, improper));
        }

        let log_weights = self.normalized_log_weights();
        let n = log_weights.len();
        let log_tolerance = self.params.maximum_relative_error.ln();

        // Log of each candidate's weighted c.d.f. bounds. The larger
        // probability gives the lower bound on -log.
        let mut lower_terms = Vec::with_capacity(n);
        let mut upper_terms = Vec::with_capacity(n);
        let mut max_lower = MINUS_INF;
        let mut max_upper = MINUS_INF;
        let mut log_remainder = None;

        for (i, &(log_weight, index)) in log_weights.iter().enumerate() {
            let model = self.entries[index].model.as_ref();
            let (lower, upper) = cdf(model, values, weights).map_err(|err| {
                error!(model = %model.kind(), error = %err, "failed to compute c.d.f.");
                EnsembleError::from(err)
            })?;
            let li = log_weight - lower;
            let ui = log_weight - upper;
            lower_terms.push(li);
            upper_terms.push(ui);
            max_lower = max_lower.max(li);
            max_upper = max_upper.max(ui);

            if let Some(&(next_log_weight, _)) = log_weights.get(i + 1) {
                let remainder = ((n - i - 1) as f64).ln() + next_log_weight;
                if remainder < max_lower + log_tolerance && remainder < max_upper + log_tolerance {
                    log_remainder = Some(remainder);
                    break;
                }
            }
        }

        let mut lower = minus_log_sum_exp(&lower_terms, max_lower);
        let upper = minus_log_sum_exp(&upper_terms, max_upper);
        if let Some(remainder) = log_remainder {
            // Skipped candidates add at most exp(remainder) to the c.d.f.
            // More probability means a smaller -log, so the remainder
            // widens the lower bound and leaves the upper bound alone.
            lower -= (remainder + lower).exp().ln_1p();
        }
        Ok((lower.max(0.0), upper.max(0.0)))
    }

    /// Bounds on the probability of samples less likely than these under
    /// the mixture, with the tail they fall in.
    pub fn probability_of_less_likely_samples(
        &self,
        calculation: ProbabilityCalculation,
        values: &[f64],
        weights: &[f64],
    ) -> Result<ProbabilityBounds, EnsembleError> {
        validate_batch(values, weights)?;
        if self.is_non_informative() {
            return Ok(ProbabilityBounds::exact(1.0, Tail::Undetermined));
        }

        let n_models = self.entries.len();
        let relative_error = self.params.maximum_relative_error;
        let mut lower = 0.0;
        let mut upper = 0.0;
        let mut heaviest: Option<(f64, Tail)> = None;

        for (i, (log_weight, index)) in self.normalized_log_weights().into_iter().enumerate() {
            let weight = log_weight.exp();
            if lower > (n_models - i) as f64 * weight / relative_error {
                break;
            }
            let model = self.entries[index].model.as_ref();
            let bounds = model
                .probability_of_less_likely_samples(calculation, values, weights)
                .map_err(|err| {
                    error!(model = %model.kind(), error = %err, "failed to compute probability");
                    EnsembleError::from(err)
                })?;
            lower += weight * bounds.lower;
            upper += weight * bounds.upper;
            let contribution = (weight * (bounds.lower + bounds.upper), bounds.tail);
            heaviest = match heaviest {
                Some(current) if compare(current, contribution).is_ge() => Some(current),
                _ => Some(contribution),
            };
        }

        if !(0.0..=PROBABILITY_SLACK).contains(&lower) || !(0.0..=PROBABILITY_SLACK).contains(&upper) {
            error!(lower, upper, weights = %self.debug_weights(), "bad probability bounds");
        }
        let lower = if lower.is_nan() { 0.0 } else { truncate(lower, 0.0, 1.0) };
        let upper = if upper.is_nan() { 1.0 } else { truncate(upper, 0.0, 1.0) };
        Ok(ProbabilityBounds {
            lower,
            upper,
            tail: heaviest.map_or(Tail::Undetermined, |(_, tail)| tail),
        })
    }

    /// Draw `n` samples, splitting them between candidates by weight with
    /// `sampler`. Samples are kept strictly inside the mixture's support.
    pub fn sample_with(
        &self,
        n: usize,
        sampler: &mut dyn WeightedSampler,
    ) -> Result<Vec<f64>, EnsembleError> {
        if n == 0 || self.is_non_informative() {
            return Ok(Vec::new());
        }
        let counts = sampler.sample(n, &self.weights());
        if counts.len() != self.entries.len() {
            error!(
                expected = self.entries.len(),
                got = counts.len(),
                weights = %self.debug_weights(),
                "sampler returned the wrong number of counts"
            );
            return Err(EnsembleError::SamplingFailed {
                expected: self.entries.len(),
                got: counts.len(),
            });
        }

        let (lower, upper) = self.marginal_likelihood_support();
        let (lower, upper) = (shift_right(lower), shift_left(upper));
        let mut samples = Vec::with_capacity(n);
        for (entry, count) in self.entries.iter().zip(counts) {
            if count == 0 {
                continue;
            }
            samples.extend(
                entry
                    .model
                    .sample_marginal_likelihood(count)
                    .into_iter()
                    .map(|x| truncate(x, lower, upper)),
            );
        }
        Ok(samples)
    }
}

fn compare(a: (f64, Tail), b: (f64, Tail)) -> std::cmp::Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// `-log(Σ exp(terms))`, shifting by `max` only when the terms would
/// otherwise underflow.
fn minus_log_sum_exp(terms: &[f64], max: f64) -> f64 {
    let shift = if log_will_underflow(max) { max } else { 0.0 };
    let sum: f64 = terms.iter().map(|t| (t - shift).exp()).sum();
    -sum.ln() - shift
}
