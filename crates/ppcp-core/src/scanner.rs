//! Sequential surprise scan.
//!
//! Walks a fixed time grid forward, scoring each increment against the
//! posterior fitted to everything before it, then folding the increment into
//! the posterior. State is carried, never recomputed, so the cost per step is
//! the cost of scoring plus O(1) per newly observed event.
//!
//! Two scoring styles:
//!
//! - **Event count**: the number of events in the increment against the
//!   negative-binomial predictive.
//! - **Waiting time**: each inter-event gap in the increment, plus the
//!   trailing partial gap, scored as `P(no event in gap)`. Per-gap log
//!   p-values are combined with `-2 Σ ln p ~ χ²(2k)`.

use std::f64::consts::LN_2;
use std::io::Write;
use std::sync::Arc;

use ppcp_config::{validate_scan, ScanConfig, ScanStyle, TailMode};
use ppcp_math::{
    chi_square_log_cdf, chi_square_log_sf, clamp_log_probability, log1m_exp, min_log_probability,
};
use serde::Serialize;
use tracing::debug;

use crate::data::DataIndexOracle;
use crate::error::{ModelError, Result};
use crate::model::{CountSource, GammaPosterior, PoissonProcessModel};
use crate::predictive::PValueEndpoints;
use crate::time_scale::{TimeScale, TimeScaleAdapter};

/// Running state of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanState {
    pub time: f64,
    /// Events observed up to `time`.
    pub count: u64,
    /// Index of the next unconsumed event.
    pub data_index: usize,
    pub posterior: GammaPosterior,
}

/// Score for one grid increment `(start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanStep {
    pub start: f64,
    pub end: f64,
    pub new_events: u64,
    /// Effective duration of the increment.
    pub duration: f64,
    pub log_p: f64,
    /// False when the increment carried no exposure to score.
    pub observable: bool,
    pub endpoints: Option<PValueEndpoints>,
}

impl ScanStep {
    pub fn probability(&self) -> f64 {
        self.log_p.exp()
    }
}

pub struct SequentialScanner {
    oracle: Arc<dyn DataIndexOracle>,
    time_scale: TimeScale,
    config: ScanConfig,
    state: ScanState,
    next_step: usize,
    total_steps: usize,
}

impl std::fmt::Debug for SequentialScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialScanner")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("next_step", &self.next_step)
            .field("total_steps", &self.total_steps)
            .finish()
    }
}

impl SequentialScanner {
    /// Position a scan at `config.start` with the posterior fitted to
    /// `[0, start]`.
    pub fn new(model: &PoissonProcessModel, config: ScanConfig) -> Result<Self> {
        validate_scan(&config)?;
        let oracle = match model.source() {
            CountSource::EventTimes(oracle) => Arc::clone(oracle),
            other => {
                return Err(ModelError::UnsupportedSource {
                    operation: "sequential scan",
                    source_kind: other.kind(),
                })
            }
        };
        let time_scale = model.time_scale().clone();

        let count = oracle.count_up_to(config.start, None, None);
        let elapsed = time_scale.duration(0.0, config.start);
        if elapsed < 0.0 {
            return Err(ModelError::IntervalOrdering {
                start: 0.0,
                end: config.start,
                duration: elapsed,
            });
        }

        let state = ScanState {
            time: config.start,
            count,
            data_index: count as usize,
            posterior: model.prior().posterior(count, elapsed),
        };
        let total_steps = config.step_count();
        Ok(Self {
            oracle,
            time_scale,
            config,
            state,
            next_step: 0,
            total_steps,
        })
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn is_finished(&self) -> bool {
        self.next_step >= self.total_steps
    }

    /// Score the next increment and advance, or `None` at the end.
    pub fn step(&mut self) -> Option<Result<ScanStep>> {
        if self.is_finished() {
            return None;
        }
        let k = self.next_step as f64;
        let end = (self.config.start + (k + 1.0) * self.config.increment).min(self.config.end);
        self.next_step += 1;

        let result = match self.config.style {
            ScanStyle::EventCount => self.event_count_step(end),
            ScanStyle::WaitingTime => self.waiting_time_step(end),
        };
        if result.is_err() {
            // state may be half-updated; a failed scan cannot continue
            self.next_step = self.total_steps;
        }
        Some(result)
    }

    /// Run the scan to completion.
    pub fn run(&mut self) -> Result<Vec<ScanStep>> {
        let mut steps = Vec::new();
        while let Some(step) = self.step() {
            steps.push(step?);
        }
        Ok(steps)
    }

    /// Run the scan, writing one probability per line. Returns the step count.
    pub fn write_probabilities<W: Write>(&mut self, mut writer: W) -> Result<usize> {
        let mut written = 0;
        while let Some(step) = self.step() {
            writeln!(writer, "{}", step?.probability())?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }

    /// Run the scan, writing each step as one JSON object per line.
    pub fn write_steps_jsonl<W: Write>(&mut self, mut writer: W) -> Result<usize> {
        let mut written = 0;
        while let Some(step) = self.step() {
            serde_json::to_writer(&mut writer, &step?)?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }

    fn event_count_step(&mut self, end: f64) -> Result<ScanStep> {
        let start = self.state.time;
        let duration = self.time_scale.duration(start, end);
        if duration < 0.0 {
            return Err(ModelError::IntervalOrdering {
                start,
                end,
                duration,
            });
        }
        let total = self
            .oracle
            .count_up_to(end, Some(self.state.data_index), None);
        let new_events = total.saturating_sub(self.state.count);

        let (log_p, endpoints) = if duration > 0.0 {
            let endpoints = self
                .state
                .posterior
                .predictive(duration)?
                .endpoints(new_events, self.config.tail);
            (endpoints.log_mid_p(), Some(endpoints))
        } else {
            (min_log_probability(), None)
        };

        self.state.count += new_events;
        self.state.data_index = total as usize;
        self.state.posterior.update(new_events, duration);
        self.state.time = end;

        debug!(start, end, new_events, duration, log_p, "event-count scan step");
        Ok(ScanStep {
            start,
            end,
            new_events,
            duration,
            log_p,
            observable: endpoints.is_some(),
            endpoints,
        })
    }

    fn waiting_time_step(&mut self, end: f64) -> Result<ScanStep> {
        let start = self.state.time;
        let total = self
            .oracle
            .count_up_to(end, Some(self.state.data_index), None) as usize;
        let tail = self.config.tail;

        let mut sum_log_p = 0.0;
        let mut gaps = 0u32;
        let mut cursor = start;
        let mut new_events = 0u64;
        while self.state.data_index < total {
            let index = self.state.data_index;
            let event_time = self.oracle.event_time(index).ok_or_else(|| {
                ModelError::InvalidScan(format!("event {} missing from data source", index))
            })?;
            let gap = self.time_scale.duration(cursor, event_time);
            if !(gap > 0.0) {
                return Err(ModelError::NonPositiveGap { index, gap });
            }
            sum_log_p += gap_log_p(&self.state.posterior, gap, tail)?;
            gaps += 1;

            self.state.posterior.update(1, gap);
            self.state.count += 1;
            self.state.data_index += 1;
            new_events += 1;
            cursor = event_time;
        }

        let residual = self.time_scale.duration(cursor, end);
        if residual > 0.0 {
            sum_log_p += gap_log_p(&self.state.posterior, residual, tail)?;
            gaps += 1;
            self.state.posterior.update(0, residual);
        }
        self.state.time = end;

        let observable = gaps > 0;
        let log_p = if observable {
            combine_gaps(sum_log_p, gaps, tail)
        } else {
            min_log_probability()
        };
        let duration = self.time_scale.duration(start, end);

        debug!(start, end, new_events, gaps, log_p, "waiting-time scan step");
        Ok(ScanStep {
            start,
            end,
            new_events,
            duration,
            log_p,
            observable,
            endpoints: observable.then(|| PValueEndpoints::point_log(log_p)),
        })
    }
}

impl Iterator for SequentialScanner {
    type Item = Result<ScanStep>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

/// Log p-value of one waiting gap: `ln P(no event)`, or its complement for
/// the lower tail. Two-sided scans score gaps on the upper tail and fold at
/// combination time.
fn gap_log_p(posterior: &GammaPosterior, gap: f64, tail: TailMode) -> Result<f64> {
    let log_empty = posterior.predictive(gap)?.log_prob_zero();
    Ok(match tail {
        TailMode::Lower => log1m_exp(log_empty),
        TailMode::Upper | TailMode::TwoSided => log_empty,
    })
}

/// Combine `k` per-gap log p-values into one.
///
/// A single gap keeps its own p-value. Otherwise `-2 Σ ln p` is referred to
/// χ² with `2k` degrees of freedom. Two-sided scans take the smaller of the
/// two χ² tails and double it.
pub fn combine_gaps(sum_log_p: f64, gaps: u32, tail: TailMode) -> f64 {
    let statistic = -2.0 * sum_log_p;
    let dof = 2.0 * gaps as f64;
    let upper = if gaps == 1 {
        sum_log_p
    } else {
        chi_square_log_sf(statistic, dof)
    };
    let log_p = match tail {
        TailMode::TwoSided => {
            let complement = if gaps == 1 {
                log1m_exp(sum_log_p)
            } else {
                chi_square_log_cdf(statistic, dof)
            };
            (upper.min(complement) + LN_2).min(0.0)
        }
        TailMode::Lower | TailMode::Upper => upper,
    };
    clamp_log_probability(log_p)
}
