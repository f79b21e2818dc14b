//! Conjugate Gamma-Poisson segment model.
//!
//! Events in a segment arrive as a Poisson process with unknown rate λ and a
//! Gamma(α, β) prior. After `r` events over effective duration `d`:
//!
//! ```text
//! posterior:  λ | r, d ~ Gamma(α + r, β + d)
//! marginal:   ln p(r | d) = α ln β - ln Γ(α) + ln Γ(r + α) - (r + α) ln(β + d)
//! ```
//!
//! (the `r!` term is dropped; it cancels in every likelihood ratio the
//! changepoint sampler forms).
//!
//! Ordering violations are handled two ways. Likelihood queries log a warning
//! and return [`LOG_LIKELIHOOD_FLOOR`] so bulk evaluation keeps going.
//! Posterior queries return an error, since no valid state can be built.

use std::fmt;
use std::sync::Arc;

use ppcp_config::{validate_model, ModelConfig, TailMode};
use ppcp_math::{log_gamma, sample_gamma};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{CumulativeSeries, DataIndexOracle};
use crate::error::{ModelError, Result};
use crate::predictive::{NegBinomialPredictive, PValueEndpoints};
use crate::time_scale::{TimeScale, TimeScaleAdapter};

/// Log-likelihood reported for intervals with negative effective duration.
pub const LOG_LIKELIHOOD_FLOOR: f64 = -1e300;

/// Gamma prior on the Poisson rate (shape/rate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaPrior {
    pub shape: f64,
    pub rate: f64,
}

/// Gamma posterior `(α*, β*) = (α + r, β + d)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaPosterior {
    pub shape: f64,
    pub rate: f64,
}

/// Interval endpoint: a time and the number of events observed before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Changepoint {
    pub time: f64,
    pub data_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PosteriorMean {
    pub mean: f64,
    pub variance: f64,
}

/// How posterior means are reported.
#[derive(Debug, Clone, Default)]
pub enum MeanMode {
    /// `α* / β*`.
    #[default]
    Expected,
    /// A draw from the posterior using a generator owned by this model.
    Sampled(StdRng),
}

/// Where segment counts come from.
#[derive(Clone)]
pub enum CountSource {
    /// Continuous event times; a segment's count is its index difference.
    EventTimes(Arc<dyn DataIndexOracle>),
    /// Binned counts (regression mode); data indices are bin boundaries.
    Regression(Arc<CumulativeSeries>),
}

impl fmt::Debug for CountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountSource::EventTimes(oracle) => {
                write!(f, "EventTimes({} events)", oracle.len())
            }
            CountSource::Regression(series) => f.debug_tuple("Regression").field(series).finish(),
        }
    }
}

impl CountSource {
    pub fn kind(&self) -> &'static str {
        match self {
            CountSource::EventTimes(_) => "event-time",
            CountSource::Regression(_) => "regression",
        }
    }
}

/// Capabilities a changepoint sampler needs from a per-segment model.
pub trait SegmentModel {
    fn log_likelihood_interval(&self, start: &Changepoint, end: &Changepoint) -> Result<f64>;

    fn posterior_parameters(&self, start: &Changepoint, end: &Changepoint)
        -> Result<GammaPosterior>;

    fn posterior_mean(&mut self, start: &Changepoint, end: &Changepoint) -> Result<PosteriorMean>;
}

impl GammaPrior {
    pub fn new(shape: f64, rate: f64) -> Result<Self> {
        if !shape.is_finite() || shape <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "prior.shape",
                value: shape,
            });
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "prior.rate",
                value: rate,
            });
        }
        Ok(Self { shape, rate })
    }

    /// Prior fitted to the first tenth of the observation span.
    ///
    /// `β` is the effective duration of `[0, t_last / 10]` and `α` the number
    /// of events in it, at least one.
    pub fn empirical(oracle: &dyn DataIndexOracle, time_scale: &TimeScale) -> Result<Self> {
        let last = oracle.last_time().ok_or(ModelError::InvalidParameter {
            name: "event_count",
            value: 0.0,
        })?;
        let t = 0.1 * last;
        let rate = time_scale.duration(0.0, t);
        let count = oracle.count_up_to(t, None, None).max(1);
        Self::new(count as f64, rate)
    }

    pub fn posterior(&self, count: u64, duration: f64) -> GammaPosterior {
        GammaPosterior {
            shape: self.shape + count as f64,
            rate: self.rate + duration,
        }
    }
}

impl From<ppcp_config::GammaParams> for GammaPrior {
    fn from(params: ppcp_config::GammaParams) -> Self {
        Self {
            shape: params.shape,
            rate: params.rate,
        }
    }
}

impl GammaPosterior {
    pub fn mean(&self) -> f64 {
        self.shape / self.rate
    }

    /// Absorb `count` further events over `duration`.
    pub fn update(&mut self, count: u64, duration: f64) {
        self.shape += count as f64;
        self.rate += duration;
    }

    /// Predictive count distribution for a following window.
    pub fn predictive(&self, duration: f64) -> Result<NegBinomialPredictive> {
        NegBinomialPredictive::new(*self, duration)
    }
}

/// Conjugate Poisson-process model over one data set.
#[derive(Debug, Clone)]
pub struct PoissonProcessModel {
    prior: GammaPrior,
    /// `α ln β`
    log_rate_term: f64,
    /// `α ln β - ln Γ(α)`
    log_norm_term: f64,
    source: CountSource,
    time_scale: TimeScale,
    mean_mode: MeanMode,
}

impl PoissonProcessModel {
    pub fn new(prior: GammaPrior, source: CountSource, time_scale: TimeScale) -> Self {
        let log_rate_term = prior.shape * prior.rate.ln();
        Self {
            prior,
            log_rate_term,
            log_norm_term: log_rate_term - log_gamma(prior.shape),
            source,
            time_scale,
            mean_mode: MeanMode::Expected,
        }
    }

    /// Point-process model over event times, configured from `model.json`.
    pub fn from_config(config: &ModelConfig, events: Arc<dyn DataIndexOracle>) -> Result<Self> {
        validate_model(config)?;
        if config.is_regression() {
            return Err(ModelError::UnsupportedSource {
                operation: "regression configuration",
                source_kind: "event-time",
            });
        }
        let prior = GammaPrior::new(config.prior.shape, config.prior.rate)?;
        let model = Self::new(
            prior,
            CountSource::EventTimes(events),
            TimeScale::from_config(config)?,
        );
        Ok(model.with_config_mean_mode(config))
    }

    /// Regression model over binned counts, configured from `model.json`.
    ///
    /// Intensity multipliers come from the `regression` section when present.
    pub fn regression_from_config(config: &ModelConfig, bin_counts: &[u64]) -> Result<Self> {
        validate_model(config)?;
        let multipliers = config
            .regression
            .as_ref()
            .and_then(|r| r.intensity_multipliers.as_deref());
        let series = CumulativeSeries::new(bin_counts, multipliers)?;
        let prior = GammaPrior::new(config.prior.shape, config.prior.rate)?;
        let model = Self::new(
            prior,
            CountSource::Regression(Arc::new(series)),
            TimeScale::Linear,
        );
        Ok(model.with_config_mean_mode(config))
    }

    fn with_config_mean_mode(self, config: &ModelConfig) -> Self {
        match &config.random_mean {
            Some(random) => self.with_random_mean(random.seed),
            None => self,
        }
    }

    /// Report posterior means as seeded draws from the posterior.
    pub fn with_random_mean(mut self, seed: u64) -> Self {
        self.mean_mode = MeanMode::Sampled(StdRng::seed_from_u64(seed));
        self
    }

    /// Restart the random-mean stream from `seed`.
    ///
    /// Clones share generator state; reseed each replica so they draw
    /// independent streams. No effect in expected-mean mode.
    pub fn reseed(&mut self, seed: u64) {
        if let MeanMode::Sampled(rng) = &mut self.mean_mode {
            *rng = StdRng::seed_from_u64(seed);
        }
    }

    pub fn prior(&self) -> GammaPrior {
        self.prior
    }

    pub fn source(&self) -> &CountSource {
        &self.source
    }

    pub fn time_scale(&self) -> &TimeScale {
        &self.time_scale
    }

    pub fn mean_mode(&self) -> &MeanMode {
        &self.mean_mode
    }

    pub fn duration(&self, t1: f64, t2: f64) -> f64 {
        self.time_scale.duration(t1, t2)
    }

    /// Marginal log-likelihood of `count` events over effective duration `d`.
    fn log_marginal(&self, duration: f64, count: u64) -> f64 {
        if duration <= 0.0 {
            return 0.0;
        }
        let alpha = self.prior.shape;
        let log_total = (self.prior.rate + duration).ln();
        if count == 0 {
            return self.log_rate_term - alpha * log_total;
        }
        let shape = count as f64 + alpha;
        self.log_norm_term + log_gamma(shape) - shape * log_total
    }

    /// Marginal log-likelihood of `count` events in `(t1, t2]`.
    pub fn log_likelihood_with_count(&self, t1: f64, t2: f64, count: u64) -> f64 {
        let duration = self.duration(t1, t2);
        if duration < 0.0 {
            warn!(t1, t2, duration, "negative interval duration in likelihood");
            return LOG_LIKELIHOOD_FLOOR;
        }
        let shot_noise = match self.time_scale.decay_rate() {
            Some(rate) => rate * count as f64 * t1,
            None => 0.0,
        };
        shot_noise + self.log_marginal(duration, count)
    }

    fn regression_series(&self, operation: &'static str) -> Result<&CumulativeSeries> {
        match &self.source {
            CountSource::Regression(series) => Ok(series),
            other => Err(ModelError::UnsupportedSource {
                operation,
                source_kind: other.kind(),
            }),
        }
    }

    fn event_oracle(&self, operation: &'static str) -> Result<&dyn DataIndexOracle> {
        match &self.source {
            CountSource::EventTimes(oracle) => Ok(oracle.as_ref()),
            other => Err(ModelError::UnsupportedSource {
                operation,
                source_kind: other.kind(),
            }),
        }
    }

    /// Regression-mode likelihood of bins `i1..i2`.
    pub fn log_likelihood_by_indices(&self, i1: usize, i2: usize) -> Result<f64> {
        let series = self.regression_series("log_likelihood_by_indices")?;
        if i1 == i2 {
            return Ok(0.0);
        }
        let count = series.count_between(i1, i2)?;
        let exposure = series.exposure_between(i1, i2)?;
        Ok(self.log_marginal(exposure, count))
    }

    /// Likelihood of the segment between two changepoints.
    pub fn log_likelihood_interval(&self, start: &Changepoint, end: &Changepoint) -> Result<f64> {
        if let CountSource::Regression(_) = self.source {
            return self.log_likelihood_by_indices(start.data_index, end.data_index);
        }
        let count = index_span(start, end)?;
        Ok(self.log_likelihood_with_count(start.time, end.time, count))
    }

    /// Likelihood of `(t1, t2]`, counting events from the data.
    pub fn log_likelihood_between(&self, t1: f64, t2: f64) -> Result<f64> {
        match &self.source {
            CountSource::EventTimes(oracle) => {
                let r1 = oracle.count_up_to(t1, None, None);
                let r2 = oracle.count_up_to(t2, Some(r1 as usize), None);
                Ok(self.log_likelihood_with_count(t1, t2, r2.saturating_sub(r1)))
            }
            CountSource::Regression(series) => {
                let (i1, i2) = (bin_index(series, t1), bin_index(series, t2));
                self.log_likelihood_by_indices(i1, i2)
            }
        }
    }

    /// Likelihood of `[0, t]`.
    pub fn log_likelihood_up_to(&self, t: f64) -> Result<f64> {
        match &self.source {
            CountSource::EventTimes(oracle) => {
                let count = oracle.count_up_to(t, None, None);
                Ok(self.log_likelihood_with_count(0.0, t, count))
            }
            CountSource::Regression(series) => {
                self.log_likelihood_by_indices(0, bin_index(series, t))
            }
        }
    }

    /// Pooled likelihood of several segments sharing one rate.
    pub fn log_likelihood_segments(&self, segments: &[(Changepoint, Changepoint)]) -> Result<f64> {
        let mut count = 0u64;
        let mut duration = 0.0;
        for (start, end) in segments {
            match &self.source {
                CountSource::Regression(series) => {
                    count += series.count_between(start.data_index, end.data_index)?;
                    duration += series.exposure_between(start.data_index, end.data_index)?;
                }
                CountSource::EventTimes(_) => {
                    count += index_span(start, end)?;
                    let d = self.duration(start.time, end.time);
                    if d < 0.0 {
                        warn!(
                            t1 = start.time,
                            t2 = end.time,
                            duration = d,
                            "negative segment duration in pooled likelihood"
                        );
                        return Ok(LOG_LIKELIHOOD_FLOOR);
                    }
                    duration += d;
                }
            }
        }
        Ok(self.log_marginal(duration, count))
    }

    /// Posterior after the data between two changepoints.
    pub fn posterior_parameters(
        &self,
        start: &Changepoint,
        end: &Changepoint,
    ) -> Result<GammaPosterior> {
        let (count, duration) = match &self.source {
            CountSource::Regression(series) => {
                let count = series.count_between(start.data_index, end.data_index)?;
                let exposure = series.exposure_between(start.data_index, end.data_index)?;
                (count, exposure)
            }
            CountSource::EventTimes(_) => {
                let count = index_span(start, end)?;
                let duration = self.duration(start.time, end.time);
                if duration < 0.0 {
                    return Err(ModelError::IntervalOrdering {
                        start: start.time,
                        end: end.time,
                        duration,
                    });
                }
                (count, duration)
            }
        };
        Ok(self.prior.posterior(count, duration))
    }

    /// Posterior mean rate of a segment, with variance `mean / β*`.
    pub fn posterior_mean(&mut self, start: &Changepoint, end: &Changepoint) -> Result<PosteriorMean> {
        let posterior = self.posterior_parameters(start, end)?;
        let mean = match &mut self.mean_mode {
            MeanMode::Expected => posterior.mean(),
            MeanMode::Sampled(rng) => sample_gamma(rng, posterior.shape, posterior.rate).ok_or(
                ModelError::InvalidParameter {
                    name: "posterior.shape",
                    value: posterior.shape,
                },
            )?,
        };
        Ok(PosteriorMean {
            mean,
            variance: mean / posterior.rate,
        })
    }

    /// Predictive p-value for the events in `(t2, t3]` given a fit on `(t1, t2]`.
    pub fn predictive_tail_between(
        &self,
        t1: f64,
        t2: f64,
        t3: f64,
        mode: TailMode,
    ) -> Result<PValueEndpoints> {
        let oracle = self.event_oracle("predictive_tail_between")?;
        let fit_duration = self.duration(t1, t2);
        if fit_duration < 0.0 {
            return Err(ModelError::IntervalOrdering {
                start: t1,
                end: t2,
                duration: fit_duration,
            });
        }
        let window = self.duration(t2, t3);

        let r1 = oracle.count_up_to(t1, None, None);
        let r2 = oracle.count_up_to(t2, Some(r1 as usize), None);
        let r3 = oracle.count_up_to(t3, Some(r2 as usize), None);

        let posterior = self.prior.posterior(r2.saturating_sub(r1), fit_duration);
        let engine = posterior.predictive(window)?;
        Ok(engine.endpoints(r3.saturating_sub(r2), mode))
    }
}

impl SegmentModel for PoissonProcessModel {
    fn log_likelihood_interval(&self, start: &Changepoint, end: &Changepoint) -> Result<f64> {
        PoissonProcessModel::log_likelihood_interval(self, start, end)
    }

    fn posterior_parameters(
        &self,
        start: &Changepoint,
        end: &Changepoint,
    ) -> Result<GammaPosterior> {
        PoissonProcessModel::posterior_parameters(self, start, end)
    }

    fn posterior_mean(&mut self, start: &Changepoint, end: &Changepoint) -> Result<PosteriorMean> {
        PoissonProcessModel::posterior_mean(self, start, end)
    }
}

fn index_span(start: &Changepoint, end: &Changepoint) -> Result<u64> {
    if end.data_index < start.data_index {
        return Err(ModelError::IndexOrdering {
            start: start.data_index,
            end: end.data_index,
        });
    }
    Ok((end.data_index - start.data_index) as u64)
}

/// Bin boundary at or after time `t` for unit-width bins.
fn bin_index(series: &CumulativeSeries, t: f64) -> usize {
    if !(t > 0.0) {
        return 0;
    }
    (t.ceil() as usize).min(series.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EventTimes;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn cp(time: f64, data_index: usize) -> Changepoint {
        Changepoint { time, data_index }
    }

    fn events(times: &[f64]) -> CountSource {
        CountSource::EventTimes(Arc::new(EventTimes::new(times.to_vec()).unwrap()))
    }

    fn linear_model(alpha: f64, beta: f64, times: &[f64]) -> PoissonProcessModel {
        PoissonProcessModel::new(
            GammaPrior::new(alpha, beta).unwrap(),
            events(times),
            TimeScale::Linear,
        )
    }

    #[test]
    fn empty_interval_has_zero_likelihood() {
        let model = linear_model(3.0, 0.5, &[]);
        assert_eq!(model.log_likelihood_with_count(2.0, 2.0, 0), 0.0);
    }

    #[test]
    fn zero_count_likelihood() {
        let model = linear_model(1.0, 1.0, &[]);
        let ll = model.log_likelihood_with_count(0.0, 2.0, 0);
        assert!(approx_eq(ll, -(3.0f64.ln()), 1e-12), "ll = {ll}");
    }

    #[test]
    fn positive_count_likelihood() {
        // α = 2, β = 1, d = 1, r = 3: 2 ln 1 - ln Γ(2) + ln Γ(5) - 5 ln 2
        let model = linear_model(2.0, 1.0, &[]);
        let ll = model.log_likelihood_with_count(0.0, 1.0, 3);
        assert!(approx_eq(ll, 24.0f64.ln() - 5.0 * 2.0f64.ln(), 1e-10));
    }

    #[test]
    fn inverted_interval_returns_floor() {
        let model = linear_model(1.0, 1.0, &[]);
        assert_eq!(model.log_likelihood_with_count(3.0, 1.0, 2), LOG_LIKELIHOOD_FLOOR);
    }

    #[test]
    fn shot_noise_adds_start_term() {
        let scale = TimeScale::shot_noise(0.5).unwrap();
        let model = PoissonProcessModel::new(GammaPrior::new(1.0, 1.0).unwrap(), events(&[]), scale);
        let d = model.duration(2.0, 3.0);
        let linear_part = model.log_marginal(d, 2);
        let ll = model.log_likelihood_with_count(2.0, 3.0, 2);
        assert!(approx_eq(ll - linear_part, 0.5 * 2.0 * 2.0, 1e-12));
    }

    #[test]
    fn posterior_and_mean_scenario() {
        let mut model = linear_model(2.0, 1.0, &[]);
        let (start, end) = (cp(0.0, 0), cp(1.0, 3));
        let post = model.posterior_parameters(&start, &end).unwrap();
        assert_eq!(post, GammaPosterior { shape: 5.0, rate: 2.0 });
        let mean = model.posterior_mean(&start, &end).unwrap();
        assert_eq!(mean.mean, 2.5);
        assert_eq!(mean.variance, 1.25);
    }

    #[test]
    fn posterior_ordering_errors() {
        let model = linear_model(1.0, 1.0, &[]);
        let err = model.posterior_parameters(&cp(0.0, 4), &cp(1.0, 2)).unwrap_err();
        assert!(matches!(err, ModelError::IndexOrdering { start: 4, end: 2 }));
        let err = model.posterior_parameters(&cp(2.0, 0), &cp(1.0, 1)).unwrap_err();
        assert!(matches!(err, ModelError::IntervalOrdering { .. }));
        assert!(err.is_ordering_violation());
    }

    #[test]
    fn interval_likelihood_counts_by_index() {
        let model = linear_model(1.5, 2.0, &[0.5, 1.0, 1.5]);
        let by_marker = model.log_likelihood_interval(&cp(0.0, 0), &cp(2.0, 3)).unwrap();
        let by_time = model.log_likelihood_between(0.0, 2.0).unwrap();
        let direct = model.log_likelihood_with_count(0.0, 2.0, 3);
        assert_eq!(by_marker, direct);
        assert_eq!(by_time, direct);
        assert_eq!(model.log_likelihood_up_to(2.0).unwrap(), direct);
    }

    #[test]
    fn pooled_segments_share_one_rate() {
        let model = linear_model(2.0, 1.0, &[0.5, 1.5, 4.5]);
        let segments = [(cp(0.0, 0), cp(2.0, 2)), (cp(4.0, 2), cp(5.0, 3))];
        let pooled = model.log_likelihood_segments(&segments).unwrap();
        let single = model.log_likelihood_with_count(0.0, 3.0, 3);
        assert!(approx_eq(pooled, single, 1e-12));
    }

    #[test]
    fn regression_likelihood_uses_cumulative_arrays() {
        let series = CumulativeSeries::new(&[2, 1, 0, 3], Some(&[1.0, 0.5, 0.5, 2.0])).unwrap();
        let model = PoissonProcessModel::new(
            GammaPrior::new(1.0, 1.0).unwrap(),
            CountSource::Regression(Arc::new(series)),
            TimeScale::Linear,
        );
        assert_eq!(model.log_likelihood_by_indices(2, 2).unwrap(), 0.0);
        let ll = model.log_likelihood_by_indices(1, 4).unwrap();
        // r = 4 over exposure 3: ln Γ(5) - 5 ln 4
        assert!(approx_eq(ll, 24.0f64.ln() - 5.0 * 4.0f64.ln(), 1e-10));
        assert!(matches!(
            model.log_likelihood_by_indices(3, 1),
            Err(ModelError::IndexOrdering { .. })
        ));
        let post = model.posterior_parameters(&cp(0.0, 0), &cp(0.0, 2)).unwrap();
        assert_eq!(post, GammaPosterior { shape: 4.0, rate: 2.5 });
        assert_eq!(
            model.log_likelihood_interval(&cp(0.0, 1), &cp(0.0, 4)).unwrap(),
            ll
        );
    }

    #[test]
    fn indices_require_regression_source() {
        let model = linear_model(1.0, 1.0, &[1.0]);
        assert!(matches!(
            model.log_likelihood_by_indices(0, 1),
            Err(ModelError::UnsupportedSource { .. })
        ));
    }

    #[test]
    fn random_mean_is_reproducible() {
        let base = linear_model(3.0, 1.0, &[]).with_random_mean(11);
        let (start, end) = (cp(0.0, 0), cp(2.0, 5));
        let mut a = base.clone();
        let mut b = base.clone();
        let draws_a: Vec<f64> = (0..5).map(|_| a.posterior_mean(&start, &end).unwrap().mean).collect();
        let draws_b: Vec<f64> = (0..5).map(|_| b.posterior_mean(&start, &end).unwrap().mean).collect();
        assert_eq!(draws_a, draws_b);

        b.reseed(12);
        let other = b.posterior_mean(&start, &end).unwrap();
        assert_ne!(other.mean, draws_a[0]);
        assert!(approx_eq(other.variance, other.mean / 3.0, 1e-15));
    }

    #[test]
    fn sampled_means_center_on_the_posterior_mean() {
        // Gamma(3 + 5, 1 + 2): mean 8/3, sd sqrt(8)/3
        let mut model = linear_model(3.0, 1.0, &[]).with_random_mean(3);
        let (start, end) = (cp(0.0, 0), cp(2.0, 5));
        let n = 4_000;
        let total: f64 = (0..n)
            .map(|_| model.posterior_mean(&start, &end).unwrap().mean)
            .sum();
        let average = total / n as f64;
        assert!(approx_eq(average, 8.0 / 3.0, 0.06), "average draw {average}");
    }

    #[test]
    fn empirical_prior_from_first_tenth() {
        let oracle = EventTimes::new(vec![1.0, 3.0, 5.0, 50.0, 100.0]).unwrap();
        let prior = GammaPrior::empirical(&oracle, &TimeScale::Linear).unwrap();
        assert_eq!(prior, GammaPrior { shape: 3.0, rate: 10.0 });

        let sparse = EventTimes::new(vec![20.0, 100.0]).unwrap();
        let prior = GammaPrior::empirical(&sparse, &TimeScale::Linear).unwrap();
        assert_eq!(prior.shape, 1.0);

        assert!(GammaPrior::empirical(&EventTimes::default(), &TimeScale::Linear).is_err());
    }

    #[test]
    fn predictive_tail_between_uses_fit_window() {
        let model = linear_model(1.0, 1.0, &[0.5, 1.5, 2.5, 3.1, 3.2, 3.3, 3.4]);
        let ends = model
            .predictive_tail_between(0.0, 3.0, 3.5, TailMode::Upper)
            .unwrap();
        // fit: 3 events over 3 -> Gamma(4, 4); window 0.5 with 4 events
        let engine = GammaPosterior { shape: 4.0, rate: 4.0 }.predictive(0.5).unwrap();
        let expected = engine.endpoints(4, TailMode::Upper);
        assert_eq!(ends, expected);
        assert!(ends.log_mid_p() < (0.05f64).ln());
        assert!(model
            .predictive_tail_between(3.0, 1.0, 4.0, TailMode::Upper)
            .is_err());
    }

    #[test]
    fn from_config_builds_scale_and_mean_mode() {
        let json = r#"{"schema_version":"1.0.0","prior":{"shape":2.0,"rate":1.0},
                       "decay_rate":0.2,"random_mean":{"seed":5}}"#;
        let config = ModelConfig::from_str(json).unwrap();
        let oracle: Arc<dyn DataIndexOracle> = Arc::new(EventTimes::new(vec![1.0]).unwrap());
        let model = PoissonProcessModel::from_config(&config, oracle.clone()).unwrap();
        assert_eq!(model.time_scale().decay_rate(), Some(0.2));
        assert!(matches!(model.mean_mode(), MeanMode::Sampled(_)));

        let mut regression = config.clone();
        regression.regression = Some(ppcp_config::RegressionConfig::default());
        assert!(PoissonProcessModel::from_config(&regression, oracle).is_err());
        let binned = PoissonProcessModel::regression_from_config(&regression, &[1, 2, 3]).unwrap();
        assert_eq!(binned.source().kind(), "regression");

        let mut invalid = config;
        invalid.prior.shape = -1.0;
        let err = PoissonProcessModel::regression_from_config(&invalid, &[1]).unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn segment_model_trait_dispatch() {
        let mut model = linear_model(2.0, 1.0, &[]);
        let dynamic: &mut dyn SegmentModel = &mut model;
        let (start, end) = (cp(0.0, 0), cp(1.0, 3));
        assert_eq!(dynamic.posterior_mean(&start, &end).unwrap().mean, 2.5);
        assert!(dynamic.log_likelihood_interval(&start, &end).unwrap() < 0.0);
    }
}
