//! Standard Student's t distribution with `df` degrees of freedom.
//!
//! Location and scale are applied by callers; the normal-gamma candidates
//! use this as their posterior predictive.

use super::beta::beta_cdf;
use super::stable::log_gamma;
use std::f64::consts::PI;

const QUANTILE_MAX_ITERS: usize = 200;

/// log density at `t`.
pub fn log_pdf(t: f64, df: f64) -> f64 {
    if df <= 0.0 || df.is_nan() || t.is_nan() {
        return f64::NAN;
    }
    log_gamma(0.5 * (df + 1.0)) - log_gamma(0.5 * df) - 0.5 * (df * PI).ln()
        - 0.5 * (df + 1.0) * (t * t / df).ln_1p()
}

/// P(T <= t).
pub fn cdf(t: f64, df: f64) -> f64 {
    if df <= 0.0 || df.is_nan() || t.is_nan() {
        return f64::NAN;
    }
    if t.is_infinite() {
        return if t > 0.0 { 1.0 } else { 0.0 };
    }
    let tail = lower_tail_of_abs(t, df);
    if t < 0.0 {
        tail
    } else {
        1.0 - tail
    }
}

/// P(T > t).
pub fn survival(t: f64, df: f64) -> f64 {
    cdf(-t, df)
}

/// P(T <= -|t|) = I_{df/(df+t²)}(df/2, 1/2) / 2
fn lower_tail_of_abs(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    0.5 * beta_cdf(x, 0.5 * df, 0.5)
}

/// Inverse CDF by bracketing and bisection.
pub fn quantile(p: f64, df: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) || df <= 0.0 || df.is_nan() {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    if p == 0.5 {
        return 0.0;
    }
    // Solve in the lower tail for precision and reflect.
    let target = p.min(1.0 - p);
    let mut lo = -1.0;
    while cdf(lo, df) > target {
        lo *= 2.0;
        if lo < -1e300 {
            break;
        }
    }
    let mut hi = 0.0;
    for _ in 0..QUANTILE_MAX_ITERS {
        let mid = 0.5 * (lo + hi);
        if mid == lo || mid == hi {
            break;
        }
        if cdf(mid, df) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let x = 0.5 * (lo + hi);
    if p < 0.5 {
        x
    } else {
        -x
    }
}
