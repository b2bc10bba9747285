//! Standard normal distribution helpers.
//!
//! The error function is expressed through the regularized incomplete gamma
//! function (erf(z) = P(1/2, z²)), so tails keep relative precision out to
//! the smallest normal doubles.

use super::gamma::{gamma_p, gamma_q};

const SQRT_2: f64 = std::f64::consts::SQRT_2;
const SQRT_2PI: f64 = 2.506_628_274_631_000_5;
const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

// Acklam's rational approximation to the normal quantile.
#[allow(clippy::excessive_precision)]
const ACKLAM_A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_690e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
#[allow(clippy::excessive_precision)]
const ACKLAM_B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
#[allow(clippy::excessive_precision)]
const ACKLAM_C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
#[allow(clippy::excessive_precision)]
const ACKLAM_D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const ACKLAM_P_LOW: f64 = 0.024_25;

/// Error function.
pub fn erf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    let p = gamma_p(0.5, z * z);
    if z < 0.0 {
        -p
    } else {
        p
    }
}

/// Complementary error function, accurate in the upper tail.
pub fn erfc(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z < 0.0 {
        1.0 + gamma_p(0.5, z * z)
    } else {
        gamma_q(0.5, z * z)
    }
}

/// log density of N(0, 1).
pub fn normal_log_pdf(x: f64) -> f64 {
    -0.5 * x * x - LOG_SQRT_2PI
}

/// Φ(x) for the standard normal.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// 1 − Φ(x), computed without cancellation.
pub fn normal_survival(x: f64) -> f64 {
    0.5 * erfc(x / SQRT_2)
}

/// Inverse of Φ.
///
/// Returns ∓∞ at 0 and 1 and NaN outside [0, 1]. A single Halley step is
/// applied to the rational approximation, which brings it to near machine
/// precision.
pub fn normal_quantile(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    let x = if p < ACKLAM_P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        tail_rational(q)
    } else if p <= 1.0 - ACKLAM_P_LOW {
        let q = p - 0.5;
        let r = q * q;
        let num = ((((ACKLAM_A[0] * r + ACKLAM_A[1]) * r + ACKLAM_A[2]) * r + ACKLAM_A[3]) * r
            + ACKLAM_A[4])
            * r
            + ACKLAM_A[5];
        let den = ((((ACKLAM_B[0] * r + ACKLAM_B[1]) * r + ACKLAM_B[2]) * r + ACKLAM_B[3]) * r
            + ACKLAM_B[4])
            * r
            + 1.0;
        num * q / den
    } else {
        let q = (-2.0 * (-p).ln_1p()).sqrt();
        -tail_rational(q)
    };

    // Refine against whichever tail is representable.
    let e = if x < 0.0 {
        normal_cdf(x) - p
    } else {
        (1.0 - p) - normal_survival(x)
    };
    let u = e * SQRT_2PI * (0.5 * x * x).exp();
    if u.is_finite() {
        x - u / (1.0 + 0.5 * x * u)
    } else {
        x
    }
}

fn tail_rational(q: f64) -> f64 {
    let num = ((((ACKLAM_C[0] * q + ACKLAM_C[1]) * q + ACKLAM_C[2]) * q + ACKLAM_C[3]) * q
        + ACKLAM_C[4])
        * q
        + ACKLAM_C[5];
    let den = (((ACKLAM_D[0] * q + ACKLAM_D[1]) * q + ACKLAM_D[2]) * q + ACKLAM_D[3]) * q + 1.0;
    num / den
}
