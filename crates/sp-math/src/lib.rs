//! streamprior math utilities.

pub mod math;

pub use math::aggregate::JointProbabilityOfLessLikelySamples;
pub use math::beta::*;
pub use math::gamma::*;
pub use math::negative_binomial;
pub use math::normal::*;
pub use math::stable::*;
pub use math::student_t;
