//! Posterior-predictive tail probabilities.
//!
//! With a Gamma(α*, β*) posterior on the rate, the number of events in a
//! further window of effective duration `t` is negative binomial:
//!
//! ```text
//! P(X = i) = Γ(α* + i) / (Γ(α*) i!) · p^α* · q^i,   p = β*/(β* + t), q = 1 - p
//! ```
//!
//! No closed form exists for its tails. Single terms come from the closed
//! form above; tail masses are summed term by term with the ratio
//! `P(X = i) / P(X = i - 1) = q (α* + i - 1) / i`, always walking away from
//! the mode `floor((α* - 1) t / β*)` so the terms shrink. The tail on the
//! mode's side is the complement of the far one, which is never close to
//! one, so a query costs on the order of the predictive standard deviation
//! rather than its mean.
//!
//! # Round-off
//!
//! - Terms are carried as logs; sums are rescaled linear accumulators, so a
//!   `P(X = 0)` far below `f64::MIN_POSITIVE` still yields finite logs.
//! - A far tail is a sum of positive terms; only the near tail is taken as a
//!   complement.
//! - A sum stops once a geometric bound on the unseen mass is below `1e-16`
//!   of the smallest tail it still needs, or the term budget runs out.
//!
//! # Two-sided p-values
//!
//! The extremeness of a count is `g(i) = min(P(X <= i), P(X >= i))`. The
//! survivor midpoint `m` is the first count with `P(X <= m) >= 1/2`; below it
//! `g` is the lower tail, above it the upper tail. The two-sided endpoints
//! are `P(g(X) < g(r))` and `P(g(X) <= g(r))`: the mass of every count at
//! least as extreme as the observed one, gathered from both sides of `m`.
//! They are read off a table of the counts around the mode, wide enough that
//! the mass left outside is negligible next to `g(r)`.

use std::f64::consts::LN_2;

use ppcp_config::TailMode;
use ppcp_math::{
    chi_square_log_sf, clamp_log_probability, log1m_exp, log_add_exp, log_gamma,
    min_log_probability,
};
use serde::Serialize;
use tracing::{trace, warn};

use crate::error::{ModelError, Result};
use crate::model::GammaPosterior;

/// Hard cap on the number of pmf terms one sum may walk in each direction.
pub const MAX_SWEEP_TERMS: u64 = 10_000_000;

/// Relative size of unseen tail mass at which a sum stops.
const LN_TAIL_TOLERANCE: f64 = -36.841_361_487_904_734; // ln(1e-16)

/// Predictive count distribution over a window of effective duration `t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegBinomialPredictive {
    alpha: f64,
    beta: f64,
    duration: f64,
    /// `ln P(X = 0) = α* (ln β* - ln(β* + t))`.
    log_p0: f64,
    /// `ln q = ln t - ln(β* + t)`.
    log_q: f64,
}

/// Which one-sided tail to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// Evidence of too few events: `P(X < r)`, `P(X <= r)`.
    Lower,
    /// Evidence of too many events: `P(X > r)`, `P(X >= r)`.
    Upper,
}

/// One step of the pmf sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmfTerm {
    pub index: u64,
    pub log_pmf: f64,
    /// `ln P(X <= index)`.
    pub log_cdf: f64,
    /// Log of an upper bound on `P(X > index)`; `+inf` until the terms start
    /// decaying geometrically.
    pub log_tail_bound: f64,
}

impl PmfTerm {
    pub fn pmf(&self) -> f64 {
        self.log_pmf.exp()
    }

    pub fn cdf(&self) -> f64 {
        self.log_cdf.exp().min(1.0)
    }
}

/// Iterator over the predictive pmf from `r = 0` upward.
///
/// Yields at most [`MAX_SWEEP_TERMS`] terms.
#[derive(Debug, Clone)]
pub struct PmfSweep {
    alpha: f64,
    log_q: f64,
    index: u64,
    log_pmf: f64,
    log_ratio: f64,
    cdf: ScaledSum,
}

impl Iterator for PmfSweep {
    type Item = PmfTerm;

    fn next(&mut self) -> Option<PmfTerm> {
        if self.index >= MAX_SWEEP_TERMS {
            return None;
        }
        let i = self.index;
        if i > 0 {
            self.log_pmf += self.log_ratio;
        }
        self.cdf.add(self.log_pmf);

        // ratio to the next term: q (α + i) / (i + 1)
        self.log_ratio = self.log_q + (self.alpha + i as f64).ln() - ((i + 1) as f64).ln();
        let log_tail_bound = geometric_tail_bound(self.log_pmf, self.log_ratio, self.log_q);

        self.index += 1;
        Some(PmfTerm {
            index: i,
            log_pmf: self.log_pmf,
            log_cdf: self.cdf.ln().min(0.0),
            log_tail_bound,
        })
    }
}

/// Bound on `Σ_{j > i} P(X = j)` given the current term and ratio.
///
/// For `α >= 1` the ratios are non-increasing and for `α < 1` they stay
/// below `q`, so `max(ratio, q)` bounds every later ratio.
fn geometric_tail_bound(log_pmf: f64, log_ratio: f64, log_q: f64) -> f64 {
    geometric_bound(log_pmf, log_ratio.max(log_q))
}

/// `ln(term · ρ / (1 - ρ))`: everything after `term` in a series whose
/// ratios never exceed `ρ`. Infinite when `ρ >= 1`.
fn geometric_bound(log_term: f64, log_rho: f64) -> f64 {
    if log_rho < 0.0 {
        log_term + log_rho - log1m_exp(log_rho)
    } else {
        f64::INFINITY
    }
}

/// `ln(1 - e^x)` for a log-probability that may have rounded above zero.
fn log_complement(log_p: f64) -> f64 {
    log1m_exp(log_p.min(0.0))
}

/// Linear running sum stored relative to the largest term seen so far.
#[derive(Debug, Clone, Copy)]
struct ScaledSum {
    log_offset: f64,
    sum: f64,
}

impl ScaledSum {
    fn new() -> Self {
        Self {
            log_offset: f64::NEG_INFINITY,
            sum: 0.0,
        }
    }

    fn add(&mut self, log_term: f64) {
        if log_term == f64::NEG_INFINITY {
            return;
        }
        if log_term > self.log_offset {
            self.sum = self.sum * (self.log_offset - log_term).exp() + 1.0;
            self.log_offset = log_term;
        } else {
            self.sum += (log_term - self.log_offset).exp();
        }
    }

    fn ln(&self) -> f64 {
        if self.sum == 0.0 {
            return f64::NEG_INFINITY;
        }
        self.log_offset + self.sum.ln()
    }
}

/// Predictive pmf at an observed count together with its extremeness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictivePmf {
    pub log_pmf: f64,
    /// `min(P(X <= r), P(X >= r))`.
    pub minimum_tail: f64,
}

/// First count whose cumulative mass reaches one half.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurvivorMidpoint {
    pub index: u64,
    /// `min(P(X <= index), P(X >= index))`.
    pub tail: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbabilityScale {
    Linear,
    Log,
}

/// A p-value bracketed by a strict and a non-strict tail mass.
///
/// For discrete data the observed count's own mass sits between the two;
/// the reported scalar is the mid-p value `(lower + upper) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PValueEndpoints {
    pub lower: f64,
    pub upper: f64,
    pub scale: ProbabilityScale,
}

impl PValueEndpoints {
    /// Endpoints given as probabilities, clamped into `[0, 1]`.
    pub fn linear(lower: f64, upper: f64) -> Self {
        Self {
            lower: clamp_unit(lower),
            upper: clamp_unit(upper),
            scale: ProbabilityScale::Linear,
        }
    }

    /// Endpoints given as log-probabilities, clamped to `<= 0`.
    pub fn log(lower: f64, upper: f64) -> Self {
        Self {
            lower: clamp_log_unit(lower),
            upper: clamp_log_unit(upper),
            scale: ProbabilityScale::Log,
        }
    }

    /// Both endpoints equal to `ln p`.
    pub fn point_log(log_p: f64) -> Self {
        Self::log(log_p, log_p)
    }

    pub fn log_lower(&self) -> f64 {
        match self.scale {
            ProbabilityScale::Log => self.lower,
            ProbabilityScale::Linear => self.lower.ln(),
        }
    }

    pub fn log_upper(&self) -> f64 {
        match self.scale {
            ProbabilityScale::Log => self.upper,
            ProbabilityScale::Linear => self.upper.ln(),
        }
    }

    pub fn to_log(self) -> Self {
        Self::log(self.log_lower(), self.log_upper())
    }

    pub fn to_linear(self) -> Self {
        Self::linear(self.log_lower().exp(), self.log_upper().exp())
    }

    /// `ln((lower + upper) / 2)`, clamped to `[ln MIN_PROBABILITY, 0]`.
    pub fn log_mid_p(&self) -> f64 {
        let (lower, upper) = (self.log_lower(), self.log_upper());
        if lower == upper {
            return clamp_log_probability(upper);
        }
        clamp_log_probability(log_add_exp(lower, upper) - LN_2)
    }

    /// Combine endpoints from several sub-intervals into one log p-value.
    ///
    /// A single interval reports its own mid-p. Several are combined with
    /// Fisher's method: `-2 Σ ln p_k` is χ² with `2k` degrees of freedom.
    /// An empty slice carries no evidence and returns `ln 1 = 0`.
    pub fn combine(endpoints: &[PValueEndpoints]) -> f64 {
        match endpoints {
            [] => 0.0,
            [single] => single.log_mid_p(),
            many => {
                let statistic: f64 = -2.0 * many.iter().map(|e| e.log_mid_p()).sum::<f64>();
                chi_square_log_sf(statistic, 2.0 * many.len() as f64)
            }
        }
    }
}

fn clamp_unit(p: f64) -> f64 {
    if p.is_nan() {
        return 0.0;
    }
    p.clamp(0.0, 1.0)
}

fn clamp_log_unit(log_p: f64) -> f64 {
    if log_p.is_nan() {
        return f64::NEG_INFINITY;
    }
    log_p.min(0.0)
}

impl NegBinomialPredictive {
    /// Predictive distribution for a window of effective duration `duration`
    /// after observing data summarized by `posterior`.
    pub fn new(posterior: GammaPosterior, duration: f64) -> Result<Self> {
        if !posterior.shape.is_finite() || posterior.shape <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "posterior.shape",
                value: posterior.shape,
            });
        }
        if !posterior.rate.is_finite() || posterior.rate <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "posterior.rate",
                value: posterior.rate,
            });
        }
        if duration.is_nan() {
            return Err(ModelError::InvalidParameter {
                name: "duration",
                value: duration,
            });
        }

        let (alpha, beta) = (posterior.shape, posterior.rate);
        // ln p = -ln(1 + t/β*), ln q = -ln(1 + β*/t)
        let (log_p0, log_q) = if duration > 0.0 {
            (
                -alpha * (duration / beta).ln_1p(),
                -(beta / duration).ln_1p(),
            )
        } else {
            (0.0, f64::NEG_INFINITY)
        };

        Ok(Self {
            alpha,
            beta,
            duration,
            log_p0,
            log_q,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Predictive mean `α* t / β*`.
    pub fn mean(&self) -> f64 {
        self.alpha * self.duration.max(0.0) / self.beta
    }

    /// Most likely count, `floor((α* - 1) t / β*)`; zero when `α* <= 1`.
    pub fn mode(&self) -> u64 {
        if self.is_degenerate() || self.alpha <= 1.0 {
            return 0;
        }
        ((self.alpha - 1.0) * self.duration / self.beta).floor() as u64
    }

    /// `ln P(X = 0)`; the probability of an empty window.
    pub fn log_prob_zero(&self) -> f64 {
        self.log_p0
    }

    fn is_degenerate(&self) -> bool {
        self.duration <= 0.0
    }

    /// With no exposure the count is surely zero.
    fn degenerate_endpoints(r: u64) -> PValueEndpoints {
        if r == 0 {
            PValueEndpoints::point_log(0.0)
        } else {
            PValueEndpoints::point_log(min_log_probability())
        }
    }

    /// Sweep of pmf terms from zero upward.
    pub fn sweep(&self) -> PmfSweep {
        PmfSweep {
            alpha: self.alpha,
            log_q: self.log_q,
            index: 0,
            log_pmf: self.log_p0,
            log_ratio: 0.0,
            cdf: ScaledSum::new(),
        }
    }

    /// `ln P(X = r)` from the closed form.
    fn log_pmf_direct(&self, r: u64) -> f64 {
        let r = r as f64;
        log_gamma(self.alpha + r) - log_gamma(self.alpha) - log_gamma(r + 1.0)
            + self.log_p0
            + r * self.log_q
    }

    /// `ln(P(X = j + 1) / P(X = j))`.
    fn log_ratio_up(&self, j: u64) -> f64 {
        self.log_q + (self.alpha + j as f64).ln() - (j as f64 + 1.0).ln()
    }

    /// Bound on `Σ_{i > j} P(X = i)` given `ln P(X = j)`.
    fn bound_above(&self, j: u64, log_pmf: f64) -> f64 {
        geometric_tail_bound(log_pmf, self.log_ratio_up(j), self.log_q)
    }

    /// Bound on `Σ_{i < j} P(X = i)` given `ln P(X = j)`.
    ///
    /// Walking down, the ratios `P(X = i - 1) / P(X = i)` shrink only when
    /// `α* >= 1`; below that no bound is offered and the sum runs to zero.
    fn bound_below(&self, j: u64, log_pmf: f64) -> f64 {
        if j == 0 {
            return f64::NEG_INFINITY;
        }
        if self.alpha < 1.0 {
            return f64::INFINITY;
        }
        geometric_bound(log_pmf, -self.log_ratio_up(j - 1))
    }

    /// `ln Σ_{j > r} P(X = j)` by forward summation from `ln P(X = r)`.
    fn log_mass_above(&self, r: u64, log_pmf_r: f64) -> f64 {
        let mut acc = ScaledSum::new();
        let mut log_pmf = log_pmf_r;
        let mut j = r;
        while j < u64::MAX {
            log_pmf += self.log_ratio_up(j);
            j += 1;
            acc.add(log_pmf);

            let needed = acc.ln().max(min_log_probability());
            if self.bound_above(j, log_pmf) <= needed + LN_TAIL_TOLERANCE {
                trace!(start = r, end = j, "upper tail series converged");
                break;
            }
            if j - r >= MAX_SWEEP_TERMS {
                warn!(start = r, "upper tail series hit the term budget");
                break;
            }
        }
        acc.ln()
    }

    /// `ln Σ_{j < r} P(X = j)` by backward summation from `ln P(X = r)`.
    fn log_mass_below(&self, r: u64, log_pmf_r: f64) -> f64 {
        let mut acc = ScaledSum::new();
        let mut log_pmf = log_pmf_r;
        let mut j = r;
        while j > 0 {
            log_pmf -= self.log_ratio_up(j - 1);
            j -= 1;
            acc.add(log_pmf);

            let needed = acc.ln().max(min_log_probability());
            if self.bound_below(j, log_pmf) <= needed + LN_TAIL_TOLERANCE {
                trace!(start = r, end = j, "lower tail series converged");
                break;
            }
            if r - j >= MAX_SWEEP_TERMS {
                warn!(start = r, "lower tail series hit the term budget");
                break;
            }
        }
        acc.ln()
    }

    /// `(ln P(X = r), ln P(X < r), ln P(X > r))`.
    ///
    /// The tail on the far side of `r` from the mode is summed; the other is
    /// its complement.
    fn log_masses(&self, r: u64) -> (f64, f64, f64) {
        let log_pmf = self.log_pmf_direct(r);
        if r <= self.mode() {
            let below = self.log_mass_below(r, log_pmf);
            let above = log_complement(log_add_exp(below, log_pmf));
            (log_pmf, below, above)
        } else {
            let above = self.log_mass_above(r, log_pmf);
            let below = log_complement(log_add_exp(above, log_pmf));
            (log_pmf, below, above)
        }
    }

    /// Pmf and extremeness at the observed count `r`.
    pub fn log_pmf(&self, r: u64) -> PredictivePmf {
        if self.is_degenerate() {
            let (log_pmf, minimum_tail) = if r == 0 {
                (0.0, 1.0)
            } else {
                (min_log_probability(), ppcp_math::MIN_PROBABILITY)
            };
            return PredictivePmf {
                log_pmf,
                minimum_tail,
            };
        }

        let (log_pmf, below, above) = self.log_masses(r);
        let log_cdf = log_add_exp(log_pmf, below);
        let log_sf = log_add_exp(log_pmf, above);
        PredictivePmf {
            log_pmf,
            minimum_tail: log_cdf.min(log_sf).exp().clamp(0.0, 1.0),
        }
    }

    /// One-sided endpoints at `r`.
    ///
    /// Lower: `(P(X < r), P(X <= r))`. Upper: `(P(X > r), P(X >= r))`.
    pub fn one_sided(&self, r: u64, tail: Tail) -> PValueEndpoints {
        if self.is_degenerate() {
            return Self::degenerate_endpoints(r);
        }
        let (log_pmf, below, above) = self.log_masses(r);
        match tail {
            Tail::Lower => PValueEndpoints::log(below, log_add_exp(log_pmf, below)),
            Tail::Upper => PValueEndpoints::log(above, log_add_exp(log_pmf, above)),
        }
    }

    /// First count `m` with `P(X <= m) >= 1/2`.
    pub fn survivor_midpoint(&self) -> SurvivorMidpoint {
        if self.is_degenerate() {
            return SurvivorMidpoint { index: 0, tail: 1.0 };
        }
        let table = TailTable::around_mode(self, -LN_2);
        let m = table.midpoint;
        SurvivorMidpoint {
            index: table.first + m as u64,
            tail: table.extremeness(m).exp().clamp(0.0, 1.0),
        }
    }

    /// Two-sided endpoints `(P(g(X) < g(r)), P(g(X) <= g(r)))`.
    pub fn two_sided(&self, r: u64) -> PValueEndpoints {
        if self.is_degenerate() {
            return Self::degenerate_endpoints(r);
        }
        let (log_pmf_r, below, above) = self.log_masses(r);
        let log_cdf_r = log_add_exp(log_pmf_r, below);
        let log_sf_r = log_add_exp(log_pmf_r, above);

        let table = TailTable::around_mode(self, log_cdf_r.min(log_sf_r));
        let Some(r) = table.position(r) else {
            // g(r) is below the smallest reportable probability, and so is
            // the mass of the opposite side that could match it
            trace!(count = r, "count outside the predictive bulk");
            return if r < table.first {
                PValueEndpoints::log(below, log_cdf_r)
            } else {
                PValueEndpoints::log(above, log_sf_r)
            };
        };

        let m = table.midpoint;
        let observed = table.extremeness(r);

        let side_mass = |strict: bool| {
            let hits = |v: f64| if strict { v < observed } else { v <= observed };
            // below the midpoint g is the cdf, increasing: a prefix
            let a = table.log_cdf[..m].partition_point(|c| hits(*c));
            let low = if a > 0 {
                table.log_cdf[a - 1]
            } else {
                f64::NEG_INFINITY
            };
            let mid = if hits(table.extremeness(m)) {
                table.log_pmf[m]
            } else {
                f64::NEG_INFINITY
            };
            // above the midpoint g is the survival function, decreasing: a suffix
            let tail = &table.log_sf[m + 1..];
            let b = tail.partition_point(|s| !hits(*s));
            let high = tail.get(b).copied().unwrap_or(f64::NEG_INFINITY);
            log_add_exp(log_add_exp(low, mid), high)
        };

        PValueEndpoints::log(side_mass(true), side_mass(false))
    }

    /// Endpoints for the configured tail mode.
    pub fn endpoints(&self, r: u64, mode: TailMode) -> PValueEndpoints {
        match mode {
            TailMode::Lower => self.one_sided(r, Tail::Lower),
            TailMode::Upper => self.one_sided(r, Tail::Upper),
            TailMode::TwoSided => self.two_sided(r),
        }
    }

    /// Mid-p log p-value for the configured tail mode.
    pub fn log_p_value(&self, r: u64, mode: TailMode) -> f64 {
        self.endpoints(r, mode).log_mid_p()
    }
}

/// Log pmf, cdf and survival values over the counts `first..` around the
/// mode. The mass left outside on either side is bounded by `1e-16` of the
/// smallest tail the caller needs.
struct TailTable {
    first: u64,
    log_pmf: Vec<f64>,
    log_cdf: Vec<f64>,
    log_sf: Vec<f64>,
    midpoint: usize,
}

impl TailTable {
    fn around_mode(engine: &NegBinomialPredictive, log_needed: f64) -> Self {
        let mode = engine.mode();
        let log_mode = engine.log_pmf_direct(mode);
        let stop = log_needed.max(min_log_probability()) + LN_TAIL_TOLERANCE;

        let mut descending = Vec::new();
        let (mut j, mut log_pmf) = (mode, log_mode);
        while engine.bound_below(j, log_pmf) > stop {
            if mode - j >= MAX_SWEEP_TERMS {
                warn!(mode, "two-sided table hit the term budget below the mode");
                break;
            }
            log_pmf -= engine.log_ratio_up(j - 1);
            j -= 1;
            descending.push(log_pmf);
        }
        let first = j;

        let mut log_pmf_table: Vec<f64> = descending.into_iter().rev().collect();
        log_pmf_table.push(log_mode);
        let (mut j, mut log_pmf) = (mode, log_mode);
        while j < u64::MAX && engine.bound_above(j, log_pmf) > stop {
            if j - mode >= MAX_SWEEP_TERMS {
                warn!(mode, "two-sided table hit the term budget above the mode");
                break;
            }
            log_pmf += engine.log_ratio_up(j);
            j += 1;
            log_pmf_table.push(log_pmf);
        }

        let mut acc = ScaledSum::new();
        let log_cdf: Vec<f64> = log_pmf_table
            .iter()
            .map(|term| {
                acc.add(*term);
                acc.ln().min(0.0)
            })
            .collect();
        let mut log_sf = vec![f64::NEG_INFINITY; log_pmf_table.len()];
        let mut acc = ScaledSum::new();
        for i in (0..log_pmf_table.len()).rev() {
            acc.add(log_pmf_table[i]);
            log_sf[i] = acc.ln().min(0.0);
        }

        let last = log_cdf.len() - 1;
        let midpoint = log_cdf.partition_point(|c| *c < -LN_2).min(last);
        trace!(
            first,
            terms = log_pmf_table.len(),
            midpoint = first + midpoint as u64,
            "tail table built"
        );

        Self {
            first,
            log_pmf: log_pmf_table,
            log_cdf,
            log_sf,
            midpoint,
        }
    }

    /// Table row of count `r`, if the table reaches it.
    fn position(&self, r: u64) -> Option<usize> {
        let offset = usize::try_from(r.checked_sub(self.first)?).ok()?;
        (offset < self.log_pmf.len()).then_some(offset)
    }

    /// `ln g(i)` for table row `i`.
    fn extremeness(&self, i: usize) -> f64 {
        self.log_cdf[i].min(self.log_sf[i])
    }
}
