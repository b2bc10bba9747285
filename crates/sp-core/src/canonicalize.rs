//! Scoped renormalization of ensemble weights.

use std::ops::{Deref, DerefMut};

use sp_math::log_sum_exp;

use crate::ensemble::Entry;

/// Renormalizes log-weights when dropped.
///
/// Every mutation of ensemble weights holds one of these for its duration.
/// Whatever path leaves the scope (success, early return or `?`), the
/// weights are shifted by `-log(Σ exp(log_weight))` exactly once. A
/// non-finite sum is left alone for the bad-weights check to handle.
pub struct CanonicalizeWeights<'a> {
    entries: &'a mut Vec<Entry>,
}

impl<'a> CanonicalizeWeights<'a> {
    pub fn new(entries: &'a mut Vec<Entry>) -> Self {
        Self { entries }
    }
}

impl Deref for CanonicalizeWeights<'_> {
    type Target = Vec<Entry>;

    fn deref(&self) -> &Self::Target {
        self.entries
    }
}

impl DerefMut for CanonicalizeWeights<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.entries
    }
}

impl Drop for CanonicalizeWeights<'_> {
    fn drop(&mut self) {
        canonicalize(self.entries);
    }
}

/// Normalizers this close to zero are rounding left by a previous pass.
const LOG_NORMALIZER_TOLERANCE: f64 = 1e-12;

/// Shift log-weights so that they sum to one.
///
/// Idempotent: weights that already sum to one within rounding are left
/// bit-for-bit unchanged.
pub(crate) fn canonicalize(entries: &mut [Entry]) {
    let log_weights: Vec<f64> = entries.iter().map(|e| e.weight.log_weight()).collect();
    let log_z = log_sum_exp(&log_weights);
    if !log_z.is_finite() || log_z.abs() <= LOG_NORMALIZER_TOLERANCE {
        return;
    }
    for entry in entries.iter_mut() {
        let shifted = entry.weight.log_weight() - log_z;
        entry.weight.set_log_weight(shifted);
    }
}
