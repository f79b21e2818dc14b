//! Configuration resolution and path discovery.
//!
//! Resolution order: explicit path → environment variables → XDG paths → defaults.

use std::path::{Path, PathBuf};

use crate::model::ModelConfig;
use crate::scan::ScanConfig;
use crate::validate::{validate_model, validate_scan, ValidationResult};

/// Discovered configuration file paths.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to model.json (or None if not found).
    pub model: Option<PathBuf>,

    /// Path to scan.json (or None if not found).
    pub scan: Option<PathBuf>,

    pub model_source: ConfigSource,
    pub scan_source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Passed in by the caller.
    Explicit,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Explicit => write!(f, "explicit path"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

pub const ENV_MODEL_PATH: &str = "PPCP_CONFIG";
pub const ENV_SCAN_PATH: &str = "PPCP_SCAN_CONFIG";
pub const ENV_CONFIG_DIR: &str = "PPCP_CONFIG_DIR";

pub const MODEL_FILENAME: &str = "model.json";
pub const SCAN_FILENAME: &str = "scan.json";

const APP_NAME: &str = "ppcp";

/// Resolve configuration paths using the standard resolution order.
///
/// For each file:
/// 1. Explicit path (if provided and present)
/// 2. Environment variable (`PPCP_CONFIG`, `PPCP_SCAN_CONFIG`)
/// 3. `PPCP_CONFIG_DIR` + filename
/// 4. XDG config directory (`~/.config/ppcp/`)
/// 5. Built-in defaults (None)
pub fn resolve_config(explicit_model: Option<&Path>, explicit_scan: Option<&Path>) -> ConfigPaths {
    let mut paths = ConfigPaths::default();

    paths.model = resolve_single_config(
        explicit_model,
        ENV_MODEL_PATH,
        MODEL_FILENAME,
        &mut paths.model_source,
    );
    paths.scan = resolve_single_config(
        explicit_scan,
        ENV_SCAN_PATH,
        SCAN_FILENAME,
        &mut paths.scan_source,
    );

    paths
}

fn resolve_single_config(
    explicit: Option<&Path>,
    env_var: &str,
    filename: &str,
    source: &mut ConfigSource,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            *source = ConfigSource::Explicit;
            return Some(path.to_path_buf());
        }
    }

    if let Ok(env_path) = std::env::var(env_var) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            *source = ConfigSource::Environment;
            return Some(path);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(filename);
        if path.exists() {
            *source = ConfigSource::Environment;
            return Some(path);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(filename);
        if path.exists() {
            *source = ConfigSource::XdgConfig;
            return Some(path);
        }
    }

    *source = ConfigSource::BuiltinDefault;
    None
}

/// XDG config directory for this toolkit.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Load and validate the resolved model config, falling back to the default.
pub fn load_model_config(paths: &ConfigPaths) -> ValidationResult<ModelConfig> {
    let config = match &paths.model {
        Some(path) => ModelConfig::from_file(path)?,
        None => ModelConfig::default(),
    };
    validate_model(&config)?;
    Ok(config)
}

/// Load and validate the resolved scan config, falling back to the default.
pub fn load_scan_config(paths: &ConfigPaths) -> ValidationResult<ScanConfig> {
    let config = match &paths.scan {
        Some(path) => ScanConfig::from_file(path)?,
        None => ScanConfig::default(),
    };
    validate_scan(&config)?;
    Ok(config)
}
