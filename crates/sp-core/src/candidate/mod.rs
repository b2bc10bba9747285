//! The candidate model capability contract and the built-in families.
//!
//! A candidate is one distribution family with its own Bayesian posterior.
//! The ensemble owns each candidate exclusively as a `Box<dyn
//! CandidateModel>` and only ever talks to it through this trait, so new
//! families can be added without touching the ensemble.

pub mod log_normal;
pub mod normal;
pub mod normal_gamma;
pub mod poisson;
pub mod uniform;

use serde::{Deserialize, Serialize};
use sp_math::{truncate, JointProbabilityOfLessLikelySamples};
use std::fmt;
use thiserror::Error;

use crate::types::{DataType, LogLikelihood, ProbabilityBounds, ProbabilityCalculation, Tail};

pub use log_normal::LogNormalCandidate;
pub use normal::NormalCandidate;
pub use poisson::PoissonCandidate;
pub use uniform::UniformCandidate;

/// Errors reported by candidate models.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CandidateError {
    #[error("no samples supplied")]
    EmptySamples,

    #[error("{values} values but {weights} weights")]
    LengthMismatch { values: usize, weights: usize },

    #[error("sample {value} is outside the support [{lower}, {upper}]")]
    OutOfSupport { value: f64, lower: f64, upper: f64 },

    #[error("data type mismatch: {0}")]
    DataTypeMismatch(String),

    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// Identity of a candidate family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    Normal,
    LogNormal,
    Poisson,
    Uniform,
    OneOfN,
    /// A family defined outside this crate.
    Custom(&'static str),
}

impl CandidateKind {
    /// Discriminator used in persisted documents.
    pub fn tag(&self) -> &'static str {
        match self {
            CandidateKind::Normal => "normal",
            CandidateKind::LogNormal => "log_normal",
            CandidateKind::Poisson => "poisson",
            CandidateKind::Uniform => "uniform",
            CandidateKind::OneOfN => "one_of_n",
            CandidateKind::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Persisted form of a candidate: a type tag and opaque state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDocument {
    #[serde(rename = "type")]
    pub tag: String,
    pub state: serde_json::Value,
}

/// A probability model the ensemble can select between.
///
/// Implementations never panic on bad floating point input; the ensemble
/// validates batches before handing them over.
pub trait CandidateModel: fmt::Debug + Send {
    fn kind(&self) -> CandidateKind;

    /// Deep copy.
    fn clone_box(&self) -> Box<dyn CandidateModel>;

    fn data_type(&self) -> DataType;

    fn set_data_type(&mut self, data_type: DataType);

    fn decay_rate(&self) -> f64;

    fn set_decay_rate(&mut self, decay_rate: f64);

    /// Effective (decayed) number of samples seen.
    fn number_samples(&self) -> f64;

    /// Forget everything and restart from the non-informative prior.
    fn set_to_non_informative(&mut self, offset: f64, decay_rate: f64);

    fn is_non_informative(&self) -> bool;

    /// False once the model's state is unreliable for model selection.
    fn participates_in_model_selection(&self) -> bool {
        true
    }

    /// Number of parameters whose uncertainty the marginal likelihood does
    /// not integrate out.
    fn unmarginalized_parameters(&self) -> f64 {
        0.0
    }

    fn needs_offset(&self) -> bool {
        false
    }

    /// Move the offset so the samples are in support, returning the change
    /// in log-likelihood this costs.
    fn adjust_offset(&mut self, _values: &[f64], _weights: &[f64]) -> f64 {
        0.0
    }

    fn offset(&self) -> f64 {
        0.0
    }

    /// Distance kept between the samples and the lower end of the support.
    fn offset_margin(&self) -> f64 {
        0.0
    }

    /// Bayesian update with weighted samples.
    fn add_samples(&mut self, values: &[f64], weights: &[f64]) -> Result<(), CandidateError>;

    fn propagate_forwards_by_time(&mut self, time: f64);

    fn marginal_likelihood_support(&self) -> (f64, f64);

    fn marginal_likelihood_mean(&self) -> f64;

    fn nearest_marginal_likelihood_mean(&self, _value: f64) -> f64 {
        self.marginal_likelihood_mean()
    }

    fn marginal_likelihood_mode(&self) -> f64;

    fn marginal_likelihood_variance(&self) -> f64;

    /// Central interval containing `percentage` percent of the mass.
    fn marginal_likelihood_confidence_interval(&self, percentage: f64) -> (f64, f64);

    fn joint_log_marginal_likelihood(&self, values: &[f64], weights: &[f64]) -> LogLikelihood;

    /// Bounds on `-log(Π F(x_i)^w_i)`.
    fn minus_log_joint_cdf(&self, values: &[f64], weights: &[f64])
        -> Result<(f64, f64), CandidateError>;

    /// Bounds on `-log(Π (1 - F(x_i))^w_i)`.
    fn minus_log_joint_cdf_complement(
        &self,
        values: &[f64],
        weights: &[f64],
    ) -> Result<(f64, f64), CandidateError>;

    fn probability_of_less_likely_samples(
        &self,
        calculation: ProbabilityCalculation,
        values: &[f64],
        weights: &[f64],
    ) -> Result<ProbabilityBounds, CandidateError>;

    fn sample_marginal_likelihood(&self, n: usize) -> Vec<f64>;

    fn checksum(&self, seed: u64) -> u64;

    fn memory_usage(&self) -> usize;

    fn persist(&self) -> serde_json::Result<CandidateDocument>;
}

impl Clone for Box<dyn CandidateModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

pub(crate) fn check_batch(values: &[f64], weights: &[f64]) -> Result<(), CandidateError> {
    if values.is_empty() {
        return Err(CandidateError::EmptySamples);
    }
    if values.len() != weights.len() {
        return Err(CandidateError::LengthMismatch {
            values: values.len(),
            weights: weights.len(),
        });
    }
    Ok(())
}

/// `Σ w·(−ln p(x))` for per-sample probabilities, flooring at the
/// smallest normal double so the result stays finite.
pub(crate) fn minus_log_sum(values: &[f64], weights: &[f64], probability: impl Fn(f64) -> f64) -> f64 {
    values
        .iter()
        .zip(weights)
        .map(|(&x, &w)| -w * probability(x).max(f64::MIN_POSITIVE).ln())
        .sum()
}

/// Joint probability of less likely samples from per-sample tail masses.
///
/// `tails(x)` returns `(P(X <= x), P(X >= x))`. The two-sided probability
/// of a sample is twice its smaller tail.
pub(crate) fn less_likely_from_tails(
    calculation: ProbabilityCalculation,
    values: &[f64],
    weights: &[f64],
    tails: impl Fn(f64) -> (f64, f64),
) -> ProbabilityBounds {
    let mut joint = JointProbabilityOfLessLikelySamples::new();
    let mut tail = Tail::Undetermined;
    for (&x, &w) in values.iter().zip(weights) {
        let (below, above) = tails(x);
        let (p, t) = match calculation {
            ProbabilityCalculation::OneSidedBelow => (below, Tail::Left),
            ProbabilityCalculation::OneSidedAbove => (above, Tail::Right),
            ProbabilityCalculation::TwoSided => {
                let t = if below < above {
                    Tail::Left
                } else if above < below {
                    Tail::Right
                } else {
                    Tail::Undetermined
                };
                (2.0 * below.min(above), t)
            }
        };
        joint.add(truncate(p, 0.0, 1.0), w);
        tail = tail.combine(t);
    }
    ProbabilityBounds::exact(joint.calculate(), tail)
}

/// The lower and upper probabilities of a central interval.
pub(crate) fn central_interval(percentage: f64) -> (f64, f64) {
    let p = truncate(percentage / 100.0, 0.0, 1.0);
    (0.5 * (1.0 - p), 0.5 * (1.0 + p))
}

/// `n` samples at the evenly spaced quantiles `(i + 0.5) / n`.
pub(crate) fn quantile_samples(n: usize, quantile: impl Fn(f64) -> f64) -> Vec<f64> {
    let n_f = n as f64;
    (0..n).map(|i| quantile((i as f64 + 0.5) / n_f)).collect()
}
