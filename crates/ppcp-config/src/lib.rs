//! Configuration for the Poisson-process changepoint model.
//!
//! This crate provides:
//! - Typed structs for `model.json` (prior, time scale, mean mode, regression)
//!   and `scan.json` (sequential scan grid and tail mode)
//! - Config resolution (explicit path → env → XDG → defaults)
//! - Semantic validation

pub mod model;
pub mod resolve;
pub mod scan;
pub mod validate;

pub use model::{GammaParams, ModelConfig, RandomMeanConfig, RegressionConfig, SeasonalConfig};
pub use resolve::{load_model_config, load_scan_config, resolve_config, ConfigPaths, ConfigSource};
pub use scan::{ScanConfig, ScanStyle, TailMode, MAX_SCAN_STEPS};
pub use validate::{validate_model, validate_scan, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
