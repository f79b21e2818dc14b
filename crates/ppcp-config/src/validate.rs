//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::model::{GammaParams, ModelConfig, SeasonalConfig};
use crate::scan::{ScanConfig, MAX_SCAN_STEPS};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate a model configuration semantically.
pub fn validate_model(config: &ModelConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    validate_gamma_params("prior", &config.prior)?;

    if !config.decay_rate.is_finite() || config.decay_rate < 0.0 {
        return Err(invalid(
            "decay_rate",
            format!("Must be finite and non-negative, got {}", config.decay_rate),
        ));
    }

    if let Some(seasonal) = &config.seasonal {
        if config.decay_rate > 0.0 {
            return Err(ValidationError::SemanticError(
                "decay_rate and seasonal are mutually exclusive time scales".to_string(),
            ));
        }
        validate_seasonal(seasonal)?;
    }

    if let Some(regression) = &config.regression {
        if let Some(multipliers) = &regression.intensity_multipliers {
            if multipliers.is_empty() {
                return Err(invalid(
                    "regression.intensity_multipliers",
                    "Must not be empty when present",
                ));
            }
            if let Some((i, m)) = multipliers
                .iter()
                .enumerate()
                .find(|(_, m)| !m.is_finite() || **m < 0.0)
            {
                return Err(invalid(
                    format!("regression.intensity_multipliers[{}]", i),
                    format!("Must be finite and non-negative, got {}", m),
                ));
            }
        }
    }

    Ok(())
}

/// Validate Gamma distribution parameters.
fn validate_gamma_params(field: &str, params: &GammaParams) -> ValidationResult<()> {
    if !params.shape.is_finite() || params.shape <= 0.0 {
        return Err(invalid(
            format!("{}.shape", field),
            format!("Must be positive, got {}", params.shape),
        ));
    }

    if !params.rate.is_finite() || params.rate <= 0.0 {
        return Err(invalid(
            format!("{}.rate", field),
            format!("Must be positive, got {}", params.rate),
        ));
    }

    Ok(())
}

fn validate_seasonal(seasonal: &SeasonalConfig) -> ValidationResult<()> {
    if !seasonal.period.is_finite() || seasonal.period <= 0.0 {
        return Err(invalid(
            "seasonal.period",
            format!("Must be positive, got {}", seasonal.period),
        ));
    }
    if seasonal.breakpoints.is_empty() || seasonal.breakpoints.len() != seasonal.weights.len() {
        return Err(ValidationError::SemanticError(format!(
            "seasonal needs one weight per breakpoint, got {} breakpoints and {} weights",
            seasonal.breakpoints.len(),
            seasonal.weights.len()
        )));
    }
    if seasonal.breakpoints[0] != 0.0 {
        return Err(invalid(
            "seasonal.breakpoints[0]",
            format!("Must be 0, got {}", seasonal.breakpoints[0]),
        ));
    }
    for (i, pair) in seasonal.breakpoints.windows(2).enumerate() {
        if !(pair[1] > pair[0]) || pair[1] >= seasonal.period {
            return Err(invalid(
                format!("seasonal.breakpoints[{}]", i + 1),
                format!(
                    "Must be strictly increasing within [0, {}), got {}",
                    seasonal.period, pair[1]
                ),
            ));
        }
    }
    for (i, w) in seasonal.weights.iter().enumerate() {
        if !w.is_finite() || *w < 0.0 {
            return Err(invalid(
                format!("seasonal.weights[{}]", i),
                format!("Must be finite and non-negative, got {}", w),
            ));
        }
    }
    if seasonal.weights.iter().all(|w| *w == 0.0) {
        return Err(ValidationError::SemanticError(
            "seasonal weights are all zero".to_string(),
        ));
    }
    Ok(())
}

/// Validate a scan configuration semantically.
pub fn validate_scan(config: &ScanConfig) -> ValidationResult<()> {
    for (field, value) in [
        ("start", config.start),
        ("end", config.end),
        ("increment", config.increment),
    ] {
        if !value.is_finite() {
            return Err(invalid(field, format!("Must be finite, got {}", value)));
        }
    }
    if config.start < 0.0 {
        return Err(invalid(
            "start",
            format!("Must be non-negative, got {}", config.start),
        ));
    }
    if config.increment <= 0.0 {
        return Err(invalid(
            "increment",
            format!("Must be positive, got {}", config.increment),
        ));
    }
    if config.end <= config.start {
        return Err(ValidationError::SemanticError(format!(
            "scan end {} must be after start {}",
            config.end, config.start
        )));
    }
    if (config.end - config.start) / config.increment > MAX_SCAN_STEPS as f64 {
        return Err(invalid(
            "increment",
            format!(
                "Grid from {} to {} in steps of {} exceeds {} steps",
                config.start, config.end, config.increment, MAX_SCAN_STEPS
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegressionConfig;

    #[test]
    fn test_gamma_validation() {
        let valid = GammaParams {
            shape: 2.0,
            rate: 0.001,
        };
        assert!(validate_gamma_params("test", &valid).is_ok());

        let invalid = GammaParams {
            shape: 0.0,
            rate: 0.001,
        };
        assert!(validate_gamma_params("test", &invalid).is_err());

        let nan = GammaParams {
            shape: 1.0,
            rate: f64::NAN,
        };
        assert!(validate_gamma_params("test", &nan).is_err());
    }

    #[test]
    fn test_default_model_is_valid() {
        assert!(validate_model(&ModelConfig::default()).is_ok());
    }

    #[test]
    fn test_version_mismatch() {
        let cfg = ModelConfig {
            schema_version: "0.9.0".to_string(),
            ..ModelConfig::default()
        };
        let err = validate_model(&cfg).unwrap_err();
        assert_eq!(err.code(), 66);
    }

    #[test]
    fn test_negative_decay_rate() {
        let cfg = ModelConfig {
            decay_rate: -0.1,
            ..ModelConfig::default()
        };
        assert!(matches!(
            validate_model(&cfg),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_decay_and_seasonal_conflict() {
        let cfg = ModelConfig {
            decay_rate: 0.5,
            seasonal: Some(SeasonalConfig {
                period: 1.0,
                breakpoints: vec![0.0],
                weights: vec![1.0],
            }),
            ..ModelConfig::default()
        };
        assert_eq!(validate_model(&cfg).unwrap_err().code(), 63);
    }

    #[test]
    fn test_seasonal_breakpoints() {
        let mut seasonal = SeasonalConfig {
            period: 24.0,
            breakpoints: vec![0.0, 8.0, 20.0],
            weights: vec![0.5, 2.0, 1.0],
        };
        assert!(validate_seasonal(&seasonal).is_ok());

        seasonal.breakpoints = vec![0.0, 20.0, 8.0];
        assert!(validate_seasonal(&seasonal).is_err());

        seasonal.breakpoints = vec![0.0, 8.0, 24.0];
        assert!(validate_seasonal(&seasonal).is_err());

        seasonal.breakpoints = vec![1.0, 8.0, 20.0];
        assert!(validate_seasonal(&seasonal).is_err());

        seasonal.breakpoints = vec![0.0, 8.0];
        assert!(validate_seasonal(&seasonal).is_err());
    }

    #[test]
    fn test_multiplier_validation() {
        let mut cfg = ModelConfig {
            regression: Some(RegressionConfig {
                intensity_multipliers: Some(vec![1.0, 0.0, 3.5]),
            }),
            ..ModelConfig::default()
        };
        assert!(validate_model(&cfg).is_ok());

        cfg.regression = Some(RegressionConfig {
            intensity_multipliers: Some(vec![1.0, -2.0]),
        });
        match validate_model(&cfg) {
            Err(ValidationError::InvalidValue { field, .. }) => {
                assert_eq!(field, "regression.intensity_multipliers[1]")
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_validation() {
        assert!(validate_scan(&ScanConfig::default()).is_ok());

        let backwards = ScanConfig {
            start: 5.0,
            end: 1.0,
            ..ScanConfig::default()
        };
        assert_eq!(validate_scan(&backwards).unwrap_err().code(), 63);

        let zero_step = ScanConfig {
            increment: 0.0,
            ..ScanConfig::default()
        };
        assert_eq!(validate_scan(&zero_step).unwrap_err().code(), 65);

        let negative_start = ScanConfig {
            start: -1.0,
            ..ScanConfig::default()
        };
        assert!(validate_scan(&negative_start).is_err());
    }

    #[test]
    fn test_scan_grid_must_be_walkable() {
        let huge = ScanConfig {
            start: 0.0,
            end: 1e30,
            increment: 1e-6,
            ..ScanConfig::default()
        };
        let err = validate_scan(&huge).unwrap_err();
        assert_eq!(err.code(), 65);
        assert!(err.to_string().contains("increment"));

        let largest = ScanConfig {
            start: 0.0,
            end: MAX_SCAN_STEPS as f64,
            increment: 1.0,
            ..ScanConfig::default()
        };
        assert!(validate_scan(&largest).is_ok());
        assert_eq!(largest.step_count(), MAX_SCAN_STEPS);
    }
}
