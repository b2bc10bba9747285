//! Persistence of ensembles as structured documents.
//!
//! An ensemble is written as an ordered list of `{WEIGHT, PRIOR}` records
//! plus the ensemble decay rate and sample count. Each `PRIOR` is a tagged
//! [`CandidateDocument`], resolved back to a model by a
//! [`CandidateFactory`] on restore, so families defined outside this crate
//! can be restored by supplying a factory that knows their tags.
//!
//! The decay rate and sample count are stored at single precision.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::candidate::{
    CandidateDocument, CandidateModel, LogNormalCandidate, NormalCandidate, PoissonCandidate,
    UniformCandidate,
};
use crate::ensemble::{Entry, ModelSelectionParams, OneOfNPrior};
use crate::model_weight::ModelWeight;
use crate::types::DataType;

/// Errors from restoring persisted state.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("model {index} has no weight")]
    MissingWeight { index: usize },

    #[error("model {index} has no prior")]
    MissingModel { index: usize },

    #[error("unknown candidate type: {tag}")]
    UnknownCandidate { tag: String },

    #[error("invalid state for {tag} candidate: {source}")]
    InvalidState {
        tag: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("persisted ensemble has no models")]
    NoModels,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted candidate and its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(rename = "WEIGHT", default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<ModelWeight>,
    #[serde(rename = "PRIOR", default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<CandidateDocument>,
}

/// Persisted form of a [`OneOfNPrior`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDocument {
    #[serde(rename = "MODEL", default)]
    pub models: Vec<ModelDocument>,
    #[serde(rename = "DECAY_RATE")]
    pub decay_rate: f32,
    #[serde(rename = "NUMBER_SAMPLES")]
    pub number_samples: f32,
}

/// Context that is not persisted but is needed to rebuild an ensemble.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreParams {
    pub data_type: DataType,
    pub selection: ModelSelectionParams,
}

/// Rebuilds candidate models from their persisted documents.
pub trait CandidateFactory {
    fn restore(
        &self,
        params: &RestoreParams,
        document: &CandidateDocument,
    ) -> Result<Box<dyn CandidateModel>, RestoreError>;
}

/// Restores the built-in candidate families, including nested ensembles.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCandidateFactory;

fn state<T: for<'de> Deserialize<'de>>(document: &CandidateDocument) -> Result<T, RestoreError> {
    serde_json::from_value(document.state.clone()).map_err(|source| RestoreError::InvalidState {
        tag: document.tag.clone(),
        source,
    })
}

impl CandidateFactory for DefaultCandidateFactory {
    fn restore(
        &self,
        params: &RestoreParams,
        document: &CandidateDocument,
    ) -> Result<Box<dyn CandidateModel>, RestoreError> {
        let model: Box<dyn CandidateModel> = match document.tag.as_str() {
            "normal" => Box::new(state::<NormalCandidate>(document)?),
            "log_normal" => Box::new(state::<LogNormalCandidate>(document)?),
            "poisson" => Box::new(state::<PoissonCandidate>(document)?),
            "uniform" => Box::new(state::<UniformCandidate>(document)?),
            "one_of_n" => {
                let nested: EnsembleDocument = state(document)?;
                Box::new(OneOfNPrior::restore(params, &nested, self)?)
            }
            other => {
                return Err(RestoreError::UnknownCandidate {
                    tag: other.to_string(),
                })
            }
        };
        Ok(model)
    }
}

impl OneOfNPrior {
    pub fn to_document(&self) -> serde_json::Result<EnsembleDocument> {
        let models = self
            .entries()
            .iter()
            .map(|entry| {
                Ok(ModelDocument {
                    weight: Some(*entry.weight()),
                    prior: Some(entry.model().persist()?),
                })
            })
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(EnsembleDocument {
            models,
            decay_rate: self.decay_rate() as f32,
            number_samples: self.number_samples() as f32,
        })
    }

    /// Rebuild an ensemble from its document.
    ///
    /// Every record must carry both a weight and a prior. The candidates
    /// keep the decay rate they were persisted with.
    pub fn restore(
        params: &RestoreParams,
        document: &EnsembleDocument,
        factory: &dyn CandidateFactory,
    ) -> Result<Self, RestoreError> {
        if document.models.is_empty() {
            error!("persisted ensemble has no models");
            return Err(RestoreError::NoModels);
        }
        let entries = document
            .models
            .iter()
            .enumerate()
            .map(|(index, model)| {
                let weight = model.weight.ok_or(RestoreError::MissingWeight { index })?;
                let prior = model
                    .prior
                    .as_ref()
                    .ok_or(RestoreError::MissingModel { index })?;
                let model = factory.restore(params, prior)?;
                Ok(Entry { weight, model })
            })
            .collect::<Result<Vec<_>, RestoreError>>()
            .inspect_err(|err| error!(error = %err, "failed to restore ensemble"))?;
        Ok(OneOfNPrior::from_parts(
            entries,
            params.data_type,
            f64::from(document.decay_rate),
            f64::from(document.number_samples),
            params.selection,
        ))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_document()?)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_document()?)
    }

    pub fn from_json(
        params: &RestoreParams,
        json: &str,
        factory: &dyn CandidateFactory,
    ) -> Result<Self, RestoreError> {
        let document: EnsembleDocument = serde_json::from_str(json)?;
        Self::restore(params, &document, factory)
    }
}
