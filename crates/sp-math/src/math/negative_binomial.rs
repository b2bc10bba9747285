//! Negative binomial distribution: number of failures `k` before the
//! `r`-th success with success probability `p`. `r` may be fractional,
//! which is the gamma-Poisson predictive.

use super::beta::beta_cdf;
use super::stable::log_gamma;

/// log P(K = k).
///
/// `k` need not be integral: the continuous extension through Γ is used so
/// that continuous data can be scored. Negative `k` has probability zero.
pub fn log_pmf(k: f64, r: f64, p: f64) -> f64 {
    if !valid(r, p) || k.is_nan() {
        return f64::NAN;
    }
    if k < 0.0 {
        return f64::NEG_INFINITY;
    }
    let failures = if k == 0.0 { 0.0 } else { k * (-p).ln_1p() };
    log_gamma(k + r) - log_gamma(k + 1.0) - log_gamma(r) + r * p.ln() + failures
}

/// P(K <= k) = I_p(r, k + 1).
pub fn cdf(k: f64, r: f64, p: f64) -> f64 {
    if !valid(r, p) || k.is_nan() {
        return f64::NAN;
    }
    let k = k.floor();
    if k < 0.0 {
        return 0.0;
    }
    if k.is_infinite() {
        return 1.0;
    }
    beta_cdf(p, r, k + 1.0)
}

/// P(K > k) = I_{1-p}(k + 1, r).
pub fn survival(k: f64, r: f64, p: f64) -> f64 {
    if !valid(r, p) || k.is_nan() {
        return f64::NAN;
    }
    let k = k.floor();
    if k < 0.0 {
        return 1.0;
    }
    if k.is_infinite() {
        return 0.0;
    }
    beta_cdf(1.0 - p, k + 1.0, r)
}

/// Smallest `k` with P(K <= k) >= q.
pub fn quantile(q: f64, r: f64, p: f64) -> f64 {
    if !valid(r, p) || q.is_nan() || !(0.0..=1.0).contains(&q) {
        return f64::NAN;
    }
    if q == 1.0 {
        return f64::INFINITY;
    }
    if cdf(0.0, r, p) >= q {
        return 0.0;
    }
    let mut lo = 0.0;
    let mut hi = 1.0_f64;
    while cdf(hi, r, p) < q {
        lo = hi;
        hi *= 2.0;
        if hi > 1e15 {
            return hi;
        }
    }
    // cdf(lo) < q <= cdf(hi)
    while hi - lo > 1.0 {
        let mid = (0.5 * (lo + hi)).floor();
        if cdf(mid, r, p) < q {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

fn valid(r: f64, p: f64) -> bool {
    r > 0.0 && r.is_finite() && p > 0.0 && p <= 1.0
}
