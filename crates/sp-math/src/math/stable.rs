//! Log-domain arithmetic and floating point helpers.
//!
//! Posterior weights and joint likelihoods live in log space and routinely
//! reach magnitudes where `exp` under- or overflows. Sums are taken
//! relative to their largest term; interval helpers nudge values by a
//! relative epsilon so that truncation never lands exactly on an open
//! boundary.

use std::f64::consts::PI;

/// ln(sqrt(2π)).
const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;

/// Lanczos approximation with g = 7, n = 9.
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)]
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// ln(Σ exp(v)) evaluated relative to the largest term.
///
/// Empty input sums to zero, so the result is `-inf`. A NaN anywhere
/// poisons the result, and an infinite maximum is returned as is.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        return max;
    }
    let scaled: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + scaled.ln()
}

/// ln|Γ(z)|.
///
/// Lanczos for z ≥ 1/2 and the reflection formula below it. Poles at the
/// non-positive integers give NaN.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return z;
    }
    if z <= 0.0 && z == z.round() {
        return f64::NAN;
    }
    if z < 0.5 {
        let sin = (PI * z).sin().abs();
        return PI.ln() - sin.ln() - log_gamma(1.0 - z);
    }

    let x = z - 1.0;
    let series = LANCZOS[1..]
        .iter()
        .zip(1u32..)
        .fold(LANCZOS[0], |acc, (c, k)| acc + c / (x + f64::from(k)));
    let t = x + LANCZOS_G + 0.5;
    HALF_LN_2PI + (x + 0.5) * t.ln() - t + series.ln()
}

/// ln B(a, b).
pub fn log_beta(a: f64, b: f64) -> f64 {
    log_gamma(a) + log_gamma(b) - log_gamma(a + b)
}

/// Whether `exp(x)` falls below the smallest normal double.
pub fn log_will_underflow(x: f64) -> bool {
    x < f64::MIN_POSITIVE.ln()
}

/// Clamp `x` to `[lower, upper]`; an empty interval yields `upper`.
///
/// Unlike [`f64::clamp`] this never panics on `lower > upper`.
pub fn truncate(x: f64, lower: f64, upper: f64) -> f64 {
    x.max(lower).min(upper)
}

/// Move `x` up by one relative epsilon.
pub fn shift_right(x: f64) -> f64 {
    if x == 0.0 {
        f64::MIN_POSITIVE
    } else {
        x + f64::EPSILON * x.abs()
    }
}

/// Move `x` down by one relative epsilon.
pub fn shift_left(x: f64) -> f64 {
    if x == 0.0 {
        -f64::MIN_POSITIVE
    } else {
        x - f64::EPSILON * x.abs()
    }
}
