//! Core math modules.

pub mod aggregate;
pub mod beta;
pub mod gamma;
pub mod negative_binomial;
pub mod normal;
pub mod stable;
pub mod student_t;
