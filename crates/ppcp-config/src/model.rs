//! Model configuration types (`model.json`).

use serde::{Deserialize, Serialize};

use crate::validate::ValidationError;

/// Construction-time configuration of the conjugate Poisson-process model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Gamma prior on the Poisson rate.
    pub prior: GammaParams,

    /// Shot-noise decay rate; zero means linear time.
    #[serde(default)]
    pub decay_rate: f64,

    /// Draw posterior means from the posterior instead of reporting `α*/β*`.
    #[serde(default)]
    pub random_mean: Option<RandomMeanConfig>,

    /// Binned counts with optional per-bin intensity multipliers.
    #[serde(default)]
    pub regression: Option<RegressionConfig>,

    /// Periodic piecewise-constant time warping.
    #[serde(default)]
    pub seasonal: Option<SeasonalConfig>,
}

/// Gamma distribution parameters (shape/rate parameterization).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaParams {
    pub shape: f64,
    pub rate: f64,
}

/// Seed for the model-owned generator used by randomized posterior means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomMeanConfig {
    pub seed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionConfig {
    /// One multiplier per bin; absent means every bin has unit exposure.
    #[serde(default)]
    pub intensity_multipliers: Option<Vec<f64>>,
}

/// Seasonal weighting: `weights[i]` applies from `breakpoints[i]` up to the
/// next breakpoint (or the end of the period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalConfig {
    pub period: f64,
    pub breakpoints: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            prior: GammaParams {
                shape: 1.0,
                rate: 1.0,
            },
            decay_rate: 0.0,
            random_mean: None,
            regression: None,
            seasonal: None,
        }
    }
}

impl ModelConfig {
    /// Load a model configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_str(&content)
    }

    /// Parse a model configuration from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Whether the model runs on binned counts rather than event times.
    pub fn is_regression(&self) -> bool {
        self.regression.is_some()
    }
}
