//! Regularized incomplete gamma functions and chi-square tails.
//!
//! The chi-square tails are what the waiting-time scan uses to combine
//! per-gap p-values: under the null, `-2 * sum(ln p_i)` over `k` gaps is
//! chi-square with `2k` degrees of freedom, and
//! `Q_{chi2(2k)}(x) = Q(k, x / 2)`.
//!
//! Both tails are computed directly (series for the lower, continued fraction
//! for the upper) in the region where each is the smaller one, so a tiny tail
//! is never obtained as `1 - (something close to 1)`.

use super::stable::{log_gamma, MIN_PROBABILITY};

const GAMMAINC_MAX_ITERS: usize = 500;
const GAMMAINC_EPS: f64 = 3.0e-14;
const GAMMAINC_FPMIN: f64 = 1.0e-300;

/// Regularized lower incomplete gamma function P(a, x).
///
/// P(a, x) = γ(a, x) / Γ(a), the CDF of Gamma(a, 1) at x.
pub fn gamma_p(a: f64, x: f64) -> f64 {
    if a.is_nan() || x.is_nan() || a <= 0.0 || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return 0.0;
    }
    if x.is_infinite() {
        return 1.0;
    }

    if x < a + 1.0 {
        gammainc_series(a, x)
    } else {
        1.0 - gammainc_cf(a, x)
    }
}

/// Regularized upper incomplete gamma function Q(a, x) = 1 - P(a, x).
pub fn gamma_q(a: f64, x: f64) -> f64 {
    if a.is_nan() || x.is_nan() || a <= 0.0 || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }

    if x < a + 1.0 {
        1.0 - gammainc_series(a, x)
    } else {
        gammainc_cf(a, x)
    }
}

/// Series expansion for P(a, x), x < a + 1.
///
/// P(a, x) = e^(-x) * x^a * Σ_{n>=0} x^n / Γ(a+n+1)
fn gammainc_series(a: f64, x: f64) -> f64 {
    let log_prefactor = a * x.ln() - x - log_gamma(a);

    let mut term = 1.0 / a;
    let mut sum = term;
    for n in 1..=GAMMAINC_MAX_ITERS {
        term *= x / (a + n as f64);
        sum += term;
        if term.abs() < GAMMAINC_EPS * sum.abs() {
            break;
        }
    }

    (log_prefactor.exp() * sum).clamp(0.0, 1.0)
}

/// Continued fraction for Q(a, x), x >= a + 1 (modified Lentz).
fn gammainc_cf(a: f64, x: f64) -> f64 {
    let log_prefactor = a * x.ln() - x - log_gamma(a);

    let mut b = x - a + 1.0;
    let mut c = 1.0 / GAMMAINC_FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;

    for i in 1..=GAMMAINC_MAX_ITERS {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < GAMMAINC_FPMIN {
            d = GAMMAINC_FPMIN;
        }
        c = b + an / c;
        if c.abs() < GAMMAINC_FPMIN {
            c = GAMMAINC_FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < GAMMAINC_EPS {
            break;
        }
    }

    (log_prefactor.exp() * h).clamp(0.0, 1.0)
}

/// Chi-square survival function P(X > x) for `dof` degrees of freedom.
pub fn chi_square_sf(x: f64, dof: f64) -> f64 {
    if x.is_nan() || dof.is_nan() || dof <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    gamma_q(0.5 * dof, 0.5 * x)
}

/// Chi-square CDF P(X <= x) for `dof` degrees of freedom.
pub fn chi_square_cdf(x: f64, dof: f64) -> f64 {
    if x.is_nan() || dof.is_nan() || dof <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    gamma_p(0.5 * dof, 0.5 * x)
}

/// `ln` of the chi-square survival function, floored at `ln(MIN_PROBABILITY)`.
pub fn chi_square_log_sf(x: f64, dof: f64) -> f64 {
    floor_log(chi_square_sf(x, dof))
}

/// `ln` of the chi-square CDF, floored at `ln(MIN_PROBABILITY)`.
pub fn chi_square_log_cdf(x: f64, dof: f64) -> f64 {
    floor_log(chi_square_cdf(x, dof))
}

fn floor_log(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    p.max(MIN_PROBABILITY).min(1.0).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    fn rel_eq(a: f64, b: f64, rel_tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        let max_ab = a.abs().max(b.abs());
        if max_ab == 0.0 {
            return a == b;
        }
        (a - b).abs() / max_ab <= rel_tol
    }

    #[test]
    fn gamma_p_known_values() {
        // P(1, 1) = 1 - e^(-1)
        let p = gamma_p(1.0, 1.0);
        let expected = 1.0 - (-1.0_f64).exp();
        assert!(rel_eq(p, expected, 1e-10), "P(1,1): got {p}, expected {expected}");

        // P(2, 2) = 1 - 3 e^(-2)
        let p2 = gamma_p(2.0, 2.0);
        let expected2 = 1.0 - 3.0 * (-2.0_f64).exp();
        assert!(rel_eq(p2, expected2, 1e-10), "P(2,2): got {p2}, expected {expected2}");
    }

    #[test]
    fn gamma_q_complements_p() {
        for (a, x) in [(2.5, 1.5), (0.5, 3.0), (10.0, 9.0), (40.0, 55.0)] {
            let sum = gamma_p(a, x) + gamma_q(a, x);
            assert!(approx_eq(sum, 1.0, 1e-10), "P+Q at a={a}, x={x}: {sum}");
        }
    }

    #[test]
    fn gamma_boundary_values() {
        assert_eq!(gamma_p(2.0, 0.0), 0.0);
        assert_eq!(gamma_p(2.0, f64::INFINITY), 1.0);
        assert_eq!(gamma_q(2.0, 0.0), 1.0);
        assert_eq!(gamma_q(2.0, f64::INFINITY), 0.0);
        assert!(gamma_p(-1.0, 1.0).is_nan());
        assert!(gamma_q(1.0, -1.0).is_nan());
    }

    #[test]
    fn chi_square_two_dof_is_exponential() {
        // chi2(2) survival at x is exp(-x/2).
        for x in [0.1, 1.0, 4.0, 30.0] {
            let sf = chi_square_sf(x, 2.0);
            assert!(rel_eq(sf, (-0.5 * x).exp(), 1e-10), "sf({x}) = {sf}");
        }
    }

    #[test]
    fn chi_square_four_dof_closed_form() {
        // chi2(4) survival: exp(-x/2) * (1 + x/2)
        let x = 7.0_f64;
        let expected = (-0.5 * x).exp() * (1.0 + 0.5 * x);
        assert!(rel_eq(chi_square_sf(x, 4.0), expected, 1e-10));
        assert!(rel_eq(chi_square_cdf(x, 4.0), 1.0 - expected, 1e-10));
    }

    #[test]
    fn chi_square_far_tail_stays_accurate() {
        // exp(-400) is far below 1e-16 but still representable.
        let log_sf = chi_square_log_sf(800.0, 2.0);
        assert!(approx_eq(log_sf, -400.0, 1e-6), "log sf: {log_sf}");
    }

    #[test]
    fn chi_square_log_floor() {
        let log_sf = chi_square_log_sf(1e6, 2.0);
        assert!(log_sf.is_finite());
        assert!(approx_eq(log_sf, MIN_PROBABILITY.ln(), 1e-9));
        assert_eq!(chi_square_log_cdf(0.0, 4.0), MIN_PROBABILITY.ln());
    }
}
