//! Numerically stable primitives for log-domain probability math.

use std::f64::consts::{LN_2, PI};

const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)] // These are published numerical constants
const LANCZOS_COEFFS: [f64; 9] = [
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

/// Smallest probability reported anywhere in the workspace.
///
/// Used instead of a literal zero so that log-probabilities stay finite.
pub const MIN_PROBABILITY: f64 = f64::MIN_POSITIVE;

/// `ln(MIN_PROBABILITY)`, roughly -708.4.
pub fn min_log_probability() -> f64 {
    MIN_PROBABILITY.ln()
}

/// Clamp a probability into `[MIN_PROBABILITY, 1]`. NaN maps to `MIN_PROBABILITY`.
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        return MIN_PROBABILITY;
    }
    p.clamp(MIN_PROBABILITY, 1.0)
}

/// Clamp a log-probability into `[ln(MIN_PROBABILITY), 0]`.
pub fn clamp_log_probability(log_p: f64) -> f64 {
    let floor = min_log_probability();
    if log_p.is_nan() {
        return floor;
    }
    log_p.clamp(floor, 0.0)
}

/// Stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (-diff).exp().ln_1p()
}

/// Stable log(1 - exp(x)) for x <= 0.
///
/// Switches between `expm1` and `ln_1p` at `-ln 2` so that neither branch
/// subtracts two nearly equal numbers.
pub fn log1m_exp(x: f64) -> f64 {
    if x.is_nan() || x > 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::NEG_INFINITY;
    }
    if x > -LN_2 {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// Natural log of the Gamma function (log |Gamma(z)|).
///
/// Lanczos approximation, with reflection for z < 0.5.
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z <= 0.0 && (z - z.round()).abs() < 1e-15 {
        // Poles at the non-positive integers.
        return f64::NAN;
    }
    if z < 0.5 {
        let sin_pi = (PI * z).sin();
        if sin_pi == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - sin_pi.abs().ln() - log_gamma(1.0 - z);
    }

    let z_minus = z - 1.0;
    let series = LANCZOS_COEFFS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEFFS[0], |acc, (i, coeff)| {
            acc + coeff / (z_minus + i as f64)
        });
    let t = z_minus + LANCZOS_G + 0.5;
    LOG_SQRT_2PI + (z_minus + 0.5) * t.ln() - t + series.ln()
}

/// log(n!) using the Gamma function.
pub fn log_factorial(n: u64) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    log_gamma((n as f64) + 1.0)
}
