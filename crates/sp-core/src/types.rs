//! Value types shared by the ensemble and its candidate models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Factor applied to the extreme doubles so that sentinels never overflow
/// when they are scaled or added to other finite values.
pub const DERATE: f64 = 0.99999;

/// Finite stand-in for log(0).
pub const MINUS_INF: f64 = DERATE * f64::MIN;

/// Finite stand-in for +infinity.
pub const INF: f64 = DERATE * f64::MAX;

/// The value used for the c.d.f. of an improper (non-informative) distribution.
pub const IMPROPER_CDF: f64 = 0.5;

/// The kind of values a model is fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Continuous,
    Integer,
    Discrete,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Continuous => write!(f, "continuous"),
            DataType::Integer => write!(f, "integer"),
            DataType::Discrete => write!(f, "discrete"),
        }
    }
}

/// Floating point outcome of a likelihood calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FpStatus {
    #[default]
    Ok,
    /// The true value is below the representable range; the value is `MINUS_INF`.
    Overflowed,
    /// The value is undefined for the input.
    Failed,
}

/// A log-likelihood together with the status of its calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLikelihood {
    pub status: FpStatus,
    pub value: f64,
}

impl LogLikelihood {
    pub fn ok(value: f64) -> Self {
        Self {
            status: FpStatus::Ok,
            value,
        }
    }

    pub fn overflowed() -> Self {
        Self {
            status: FpStatus::Overflowed,
            value: MINUS_INF,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: FpStatus::Failed,
            value: f64::NAN,
        }
    }

    /// Classify a raw value: NaN fails, -inf or anything below `MINUS_INF`
    /// overflows, +inf fails.
    pub fn from_value(value: f64) -> Self {
        if value.is_nan() || value == f64::INFINITY {
            Self::failed()
        } else if value <= MINUS_INF {
            Self::overflowed()
        } else {
            Self::ok(value)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FpStatus::Ok
    }
}

/// Which side of the distribution a set of samples is unusual on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tail {
    #[default]
    Undetermined,
    Left,
    Right,
    MixedOrNeither,
}

impl Tail {
    /// Combine the tails of two sample sets.
    pub fn combine(self, other: Tail) -> Tail {
        match (self, other) {
            (Tail::Undetermined, t) | (t, Tail::Undetermined) => t,
            (a, b) if a == b => a,
            _ => Tail::MixedOrNeither,
        }
    }
}

/// Which tail(s) count as "less likely" when computing probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityCalculation {
    OneSidedBelow,
    #[default]
    TwoSided,
    OneSidedAbove,
}

/// Bounds on the probability of seeing less likely samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityBounds {
    pub lower: f64,
    pub upper: f64,
    pub tail: Tail,
}

impl ProbabilityBounds {
    pub fn exact(probability: f64, tail: Tail) -> Self {
        Self {
            lower: probability,
            upper: probability,
            tail,
        }
    }
}
