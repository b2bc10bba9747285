//! Online Bayesian model selection for streaming data.
//!
//! [`OneOfNPrior`] maintains a set of candidate distribution families
//! (normal, log-normal, Poisson, uniform, or nested ensembles) and learns
//! which one explains a stream of weighted samples best. It answers the
//! usual predictive queries (moments, intervals, tail probabilities,
//! samples) by mixing the candidates by posterior weight, and can be
//! persisted and restored exactly.
//!
//! ```
//! use sp_core::{CandidateModel, DataType, NormalCandidate, OneOfNPrior, UniformCandidate};
//!
//! let models: Vec<Box<dyn CandidateModel>> = vec![
//!     Box::new(NormalCandidate::new(DataType::Continuous, 0.0)),
//!     Box::new(UniformCandidate::new(DataType::Continuous, -10.0, 10.0, 0.0)),
//! ];
//! let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();
//! for x in [0.3, -0.1, 0.4, 0.0, -0.2] {
//!     prior.add_samples(&[x], &[1.0]).unwrap();
//! }
//! let weights = prior.weights();
//! assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
//! ```

pub mod candidate;
pub mod canonicalize;
pub mod checksum;
pub mod config;
pub mod ensemble;
pub mod logging;
pub mod model_weight;
pub mod persist;
pub mod sampling;
pub mod types;

pub use candidate::{
    CandidateDocument, CandidateError, CandidateKind, CandidateModel, LogNormalCandidate,
    NormalCandidate, PoissonCandidate, UniformCandidate,
};
pub use canonicalize::CanonicalizeWeights;
pub use checksum::ChecksumBuilder;
pub use config::{CandidateSpec, ConfigError, EnsembleConfig};
pub use ensemble::{EnsembleError, Entry, ModelSelectionParams, OneOfNPrior};
pub use model_weight::ModelWeight;
pub use persist::{
    CandidateFactory, DefaultCandidateFactory, EnsembleDocument, ModelDocument, RestoreError,
    RestoreParams,
};
pub use sampling::{DeterministicSampler, RandomSampler, WeightedSampler};
pub use types::{
    DataType, FpStatus, LogLikelihood, ProbabilityBounds, ProbabilityCalculation, Tail, INF,
    IMPROPER_CDF, MINUS_INF,
};
