//! Effective-duration time scales.
//!
//! A time scale maps a pair of raw times to the exposure the Poisson rate
//! accumulates between them. The conjugate model only ever sees these
//! effective durations, so warping the clock (seasonal weighting, decaying
//! influence of older events) needs no change to the likelihood algebra.
//!
//! Inverted arguments give a negative duration, returned as-is. Callers decide
//! whether that is a diagnostic or an error.

use std::fmt;
use std::sync::Arc;

use ppcp_config::{ModelConfig, SeasonalConfig};

use crate::error::{ModelError, Result};

/// Anything that can measure effective duration between two times.
pub trait TimeScaleAdapter {
    /// Effective duration of `(t1, t2]`; monotone non-decreasing in `t2`.
    fn duration(&self, t1: f64, t2: f64) -> f64;
}

/// Time scales selectable at model construction.
#[derive(Clone, Default)]
pub enum TimeScale {
    /// Plain elapsed time.
    #[default]
    Linear,
    /// Exponentially decaying exposure: `(1 - exp(-rate * (t2 - t1))) / rate`.
    ShotNoise { rate: f64 },
    /// Periodic piecewise-constant intensity weighting.
    Seasonal(SeasonalProfile),
    Custom(Arc<dyn TimeScaleAdapter + Send + Sync>),
}

impl fmt::Debug for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeScale::Linear => write!(f, "Linear"),
            TimeScale::ShotNoise { rate } => {
                f.debug_struct("ShotNoise").field("rate", rate).finish()
            }
            TimeScale::Seasonal(profile) => f.debug_tuple("Seasonal").field(profile).finish(),
            TimeScale::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl TimeScaleAdapter for TimeScale {
    fn duration(&self, t1: f64, t2: f64) -> f64 {
        match self {
            TimeScale::Linear => t2 - t1,
            TimeScale::ShotNoise { rate } => {
                let elapsed = t2 - t1;
                if *rate == 0.0 {
                    elapsed
                } else {
                    -(-rate * elapsed).exp_m1() / rate
                }
            }
            TimeScale::Seasonal(profile) => {
                profile.cumulative_weight(t2) - profile.cumulative_weight(t1)
            }
            TimeScale::Custom(adapter) => adapter.duration(t1, t2),
        }
    }
}

impl TimeScale {
    /// Shot-noise time scale; a zero rate degenerates to linear time.
    pub fn shot_noise(rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "decay_rate",
                value: rate,
            });
        }
        Ok(TimeScale::ShotNoise { rate })
    }

    /// Pick the time scale a model configuration asks for.
    ///
    /// A seasonal profile takes precedence; otherwise a positive decay rate
    /// selects shot noise and anything else is linear.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        if let Some(seasonal) = &config.seasonal {
            return Ok(TimeScale::Seasonal(SeasonalProfile::from_config(seasonal)?));
        }
        if config.decay_rate > 0.0 {
            return Self::shot_noise(config.decay_rate);
        }
        Ok(TimeScale::Linear)
    }

    /// Decay rate when this is a shot-noise scale with non-zero rate.
    pub fn decay_rate(&self) -> Option<f64> {
        match self {
            TimeScale::ShotNoise { rate } if *rate > 0.0 => Some(*rate),
            _ => None,
        }
    }
}

/// One period of piecewise-constant weights, repeated forever in both
/// directions. `weights[i]` applies on `[breakpoints[i], breakpoints[i + 1])`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalProfile {
    period: f64,
    breakpoints: Vec<f64>,
    weights: Vec<f64>,
    /// Weight accumulated from the start of the period up to each breakpoint.
    offsets: Vec<f64>,
    period_weight: f64,
}

impl SeasonalProfile {
    pub fn new(period: f64, breakpoints: Vec<f64>, weights: Vec<f64>) -> Result<Self> {
        if !period.is_finite() || period <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "seasonal.period",
                value: period,
            });
        }
        if breakpoints.is_empty() || breakpoints.len() != weights.len() || breakpoints[0] != 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "seasonal.breakpoints",
                value: breakpoints.len() as f64,
            });
        }
        if let Some(bad) = breakpoints
            .windows(2)
            .find(|pair| !(pair[1] > pair[0]) || pair[1] >= period)
        {
            return Err(ModelError::InvalidParameter {
                name: "seasonal.breakpoints",
                value: bad[1],
            });
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ModelError::InvalidParameter {
                name: "seasonal.weights",
                value: *bad,
            });
        }

        let mut offsets = Vec::with_capacity(breakpoints.len());
        let mut acc = 0.0;
        for (i, w) in weights.iter().enumerate() {
            offsets.push(acc);
            let segment_end = breakpoints.get(i + 1).copied().unwrap_or(period);
            acc += w * (segment_end - breakpoints[i]);
        }

        Ok(Self {
            period,
            breakpoints,
            weights,
            offsets,
            period_weight: acc,
        })
    }

    pub fn from_config(config: &SeasonalConfig) -> Result<Self> {
        Self::new(config.period, config.breakpoints.clone(), config.weights.clone())
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    /// Total weight of one full period.
    pub fn period_weight(&self) -> f64 {
        self.period_weight
    }

    /// Weight accumulated from time 0 to `t` (negative for `t < 0`).
    pub fn cumulative_weight(&self, t: f64) -> f64 {
        let cycles = (t / self.period).floor();
        let phase = (t - cycles * self.period).clamp(0.0, self.period);
        cycles * self.period_weight + self.within_period(phase)
    }

    fn within_period(&self, phase: f64) -> f64 {
        let seg = self
            .breakpoints
            .partition_point(|b| *b <= phase)
            .saturating_sub(1);
        self.offsets[seg] + self.weights[seg] * (phase - self.breakpoints[seg])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn linear_is_difference() {
        let scale = TimeScale::Linear;
        assert_eq!(scale.duration(1.5, 4.0), 2.5);
        assert_eq!(scale.duration(4.0, 1.5), -2.5);
    }

    #[test]
    fn shot_noise_small_rate_is_linear() {
        let scale = TimeScale::shot_noise(1e-9).unwrap();
        assert!(approx_eq(scale.duration(0.0, 3.0), 3.0, 1e-6));
        assert_eq!(TimeScale::shot_noise(0.0).unwrap().duration(2.0, 5.0), 3.0);
    }

    #[test]
    fn shot_noise_saturates_at_inverse_rate() {
        let scale = TimeScale::shot_noise(2.0).unwrap();
        assert!(approx_eq(scale.duration(0.0, 100.0), 0.5, 1e-12));
        let expected = (1.0 - (-2.0_f64).exp()) / 2.0;
        assert!(approx_eq(scale.duration(3.0, 4.0), expected, 1e-12));
    }

    #[test]
    fn shot_noise_inverted_is_negative() {
        let scale = TimeScale::shot_noise(0.5).unwrap();
        assert!(scale.duration(2.0, 1.0) < 0.0);
        assert!(TimeScale::shot_noise(-1.0).is_err());
    }

    #[test]
    fn seasonal_full_period() {
        let profile =
            SeasonalProfile::new(24.0, vec![0.0, 8.0, 20.0], vec![0.5, 2.0, 1.0]).unwrap();
        // 8 * 0.5 + 12 * 2 + 4 * 1
        assert!(approx_eq(profile.period_weight(), 32.0, 1e-12));
        let scale = TimeScale::Seasonal(profile);
        assert!(approx_eq(scale.duration(0.0, 24.0), 32.0, 1e-12));
        assert!(approx_eq(scale.duration(5.0, 29.0), 32.0, 1e-12));
        assert!(approx_eq(scale.duration(0.0, 72.0), 96.0, 1e-9));
    }

    #[test]
    fn seasonal_partial_segments() {
        let scale = TimeScale::Seasonal(
            SeasonalProfile::new(24.0, vec![0.0, 8.0, 20.0], vec![0.5, 2.0, 1.0]).unwrap(),
        );
        // 2 h at 0.5 then 3 h at 2.0
        assert!(approx_eq(scale.duration(6.0, 11.0), 7.0, 1e-12));
        // wraps: 2 h at 1.0 then 1 h at 0.5
        assert!(approx_eq(scale.duration(22.0, 25.0), 2.5, 1e-12));
        assert!(scale.duration(25.0, 22.0) < 0.0);
    }

    #[test]
    fn seasonal_zero_weight_gap() {
        let profile = SeasonalProfile::new(10.0, vec![0.0, 5.0], vec![1.0, 0.0]).unwrap();
        let scale = TimeScale::Seasonal(profile);
        assert_eq!(scale.duration(6.0, 9.0), 0.0);
        assert!(approx_eq(scale.duration(4.0, 16.0), 6.0, 1e-12));
    }

    #[test]
    fn seasonal_rejects_bad_profiles() {
        assert!(SeasonalProfile::new(0.0, vec![0.0], vec![1.0]).is_err());
        assert!(SeasonalProfile::new(5.0, vec![1.0], vec![1.0]).is_err());
        assert!(SeasonalProfile::new(5.0, vec![0.0, 6.0], vec![1.0, 1.0]).is_err());
        assert!(SeasonalProfile::new(5.0, vec![0.0, 2.0], vec![1.0, -1.0]).is_err());
    }

    struct Doubled;

    impl TimeScaleAdapter for Doubled {
        fn duration(&self, t1: f64, t2: f64) -> f64 {
            2.0 * (t2 - t1)
        }
    }

    #[test]
    fn custom_adapter_is_used() {
        let scale = TimeScale::Custom(Arc::new(Doubled));
        assert_eq!(scale.duration(1.0, 2.5), 3.0);
        assert_eq!(format!("{:?}", scale), "Custom(..)");
    }

    #[test]
    fn from_config_selects_scale() {
        let mut cfg = ModelConfig::default();
        assert!(matches!(TimeScale::from_config(&cfg).unwrap(), TimeScale::Linear));

        cfg.decay_rate = 0.3;
        let scale = TimeScale::from_config(&cfg).unwrap();
        assert_eq!(scale.decay_rate(), Some(0.3));

        cfg.decay_rate = 0.0;
        cfg.seasonal = Some(SeasonalConfig {
            period: 7.0,
            breakpoints: vec![0.0, 5.0],
            weights: vec![1.0, 0.25],
        });
        assert!(matches!(TimeScale::from_config(&cfg).unwrap(), TimeScale::Seasonal(_)));
    }
}
