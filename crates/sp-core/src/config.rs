//! Ensemble configuration files.
//!
//! A configuration names the data type, decay rate, model-selection
//! constants and the candidate families to start with:
//!
//! ```toml
//! data_type = "continuous"
//! decay_rate = 0.001
//!
//! [selection]
//! max_penalty = 100.0
//!
//! [[candidates]]
//! type = "normal"
//!
//! [[candidates]]
//! type = "uniform"
//! lower = -10.0
//! upper = 10.0
//! weight = 0.5
//! ```
//!
//! Files ending in `.json` are parsed as JSON, anything else as TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::candidate::log_normal::DEFAULT_OFFSET_MARGIN;
use crate::candidate::{
    CandidateModel, LogNormalCandidate, NormalCandidate, PoissonCandidate, UniformCandidate,
};
use crate::ensemble::ModelSelectionParams;
use crate::types::DataType;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Io(_) => 60,
            ConfigError::Parse(_) => 61,
            ConfigError::InvalidValue { .. } => 65,
        }
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// One candidate family to include in the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateSpec {
    Normal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
    },
    LogNormal {
        #[serde(default = "default_offset_margin")]
        offset_margin: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
    },
    Poisson {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
    },
    Uniform {
        lower: f64,
        upper: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight: Option<f64>,
    },
}

fn default_offset_margin() -> f64 {
    DEFAULT_OFFSET_MARGIN
}

impl CandidateSpec {
    /// Prior weight; unweighted candidates get one.
    pub fn weight(&self) -> f64 {
        let weight = match self {
            CandidateSpec::Normal { weight }
            | CandidateSpec::LogNormal { weight, .. }
            | CandidateSpec::Poisson { weight }
            | CandidateSpec::Uniform { weight, .. } => weight,
        };
        weight.unwrap_or(1.0)
    }

    pub fn build(&self, data_type: DataType, decay_rate: f64) -> Box<dyn CandidateModel> {
        match *self {
            CandidateSpec::Normal { .. } => Box::new(NormalCandidate::new(data_type, decay_rate)),
            CandidateSpec::LogNormal { offset_margin, .. } => Box::new(LogNormalCandidate::new(
                data_type,
                offset_margin,
                decay_rate,
            )),
            CandidateSpec::Poisson { .. } => Box::new(PoissonCandidate::new(data_type, decay_rate)),
            CandidateSpec::Uniform { lower, upper, .. } => {
                Box::new(UniformCandidate::new(data_type, lower, upper, decay_rate))
            }
        }
    }

    fn validate(&self, index: usize) -> ConfigResult<()> {
        let weight = self.weight();
        if !(weight.is_finite() && weight > 0.0) {
            return Err(invalid(
                format!("candidates[{index}].weight"),
                format!("must be positive and finite, got {weight}"),
            ));
        }
        match *self {
            CandidateSpec::LogNormal { offset_margin, .. }
                if !(offset_margin.is_finite() && offset_margin >= 0.0) =>
            {
                Err(invalid(
                    format!("candidates[{index}].offset_margin"),
                    format!("must be non-negative and finite, got {offset_margin}"),
                ))
            }
            CandidateSpec::Uniform { lower, upper, .. }
                if !(lower.is_finite() && upper.is_finite() && lower < upper) =>
            {
                Err(invalid(
                    format!("candidates[{index}]"),
                    format!("uniform support [{lower}, {upper}] is empty or unbounded"),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Everything needed to build a [`crate::OneOfNPrior`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub data_type: DataType,

    #[serde(default)]
    pub decay_rate: f64,

    #[serde(default)]
    pub selection: ModelSelectionParams,

    #[serde(default = "default_candidates")]
    pub candidates: Vec<CandidateSpec>,
}

fn default_candidates() -> Vec<CandidateSpec> {
    vec![
        CandidateSpec::Normal { weight: None },
        CandidateSpec::LogNormal {
            offset_margin: DEFAULT_OFFSET_MARGIN,
            weight: None,
        },
        CandidateSpec::Poisson { weight: None },
    ]
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            data_type: DataType::default(),
            decay_rate: 0.0,
            selection: ModelSelectionParams::default(),
            candidates: default_candidates(),
        }
    }
}

impl EnsembleConfig {
    /// Load from a file, choosing the format by extension.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.decay_rate.is_finite() && self.decay_rate >= 0.0) {
            return Err(invalid(
                "decay_rate",
                format!("must be non-negative and finite, got {}", self.decay_rate),
            ));
        }
        if self.candidates.is_empty() {
            return Err(invalid("candidates", "at least one candidate is required"));
        }
        self.selection.validate()?;
        for (index, candidate) in self.candidates.iter().enumerate() {
            candidate.validate(index)?;
        }
        Ok(())
    }
}
