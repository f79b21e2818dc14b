//! Configuration loading and resolution tests against real files.
//!
//! Covers:
//! - Resolution order (explicit > env path > config dir)
//! - Validation failures surfacing through the loaders

use ppcp_config::resolve::{ENV_CONFIG_DIR, ENV_MODEL_PATH, ENV_SCAN_PATH};
use ppcp_config::{
    load_model_config, load_scan_config, resolve_config, ConfigSource, ScanStyle, TailMode,
    ValidationError,
};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let saved = keys.iter().map(|key| env::var(key).ok()).collect();
        for key in keys {
            env::remove_var(key);
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, saved) in self.keys.iter().zip(&self.saved) {
            match saved {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    let _env = EnvGuard::new(&[ENV_MODEL_PATH, ENV_SCAN_PATH, ENV_CONFIG_DIR]);
    f()
}

fn write_model(dest: &Path, shape: f64) {
    let json = format!(
        r#"{{"schema_version":"1.0.0","prior":{{"shape":{shape},"rate":2.0}},"decay_rate":0.25}}"#
    );
    fs::write(dest, json).expect("write model config");
}

#[test]
fn explicit_path_wins_over_environment() {
    with_env_lock(|| {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("explicit.json");
        let from_env = dir.path().join("env.json");
        write_model(&explicit, 3.0);
        write_model(&from_env, 4.0);
        env::set_var(ENV_MODEL_PATH, &from_env);

        let paths = resolve_config(Some(&explicit), None);
        assert_eq!(paths.model_source, ConfigSource::Explicit);
        let cfg = load_model_config(&paths).unwrap();
        assert_eq!(cfg.prior.shape, 3.0);
        assert_eq!(cfg.decay_rate, 0.25);
    });
}

#[test]
fn missing_explicit_path_falls_through_to_env() {
    with_env_lock(|| {
        let dir = TempDir::new().unwrap();
        let from_env = dir.path().join("env.json");
        write_model(&from_env, 4.0);
        env::set_var(ENV_MODEL_PATH, &from_env);

        let paths = resolve_config(Some(&dir.path().join("absent.json")), None);
        assert_eq!(paths.model_source, ConfigSource::Environment);
        assert_eq!(load_model_config(&paths).unwrap().prior.shape, 4.0);
    });
}

#[test]
fn config_dir_supplies_both_files() {
    with_env_lock(|| {
        let dir = TempDir::new().unwrap();
        write_model(&dir.path().join("model.json"), 1.5);
        fs::write(
            dir.path().join("scan.json"),
            r#"{"start":0,"end":10,"increment":0.5,"tail":"lower","style":"waiting_time"}"#,
        )
        .unwrap();
        env::set_var(ENV_CONFIG_DIR, dir.path());

        let paths = resolve_config(None, None);
        assert_eq!(paths.model_source, ConfigSource::Environment);
        assert_eq!(paths.scan_source, ConfigSource::Environment);

        let scan = load_scan_config(&paths).unwrap();
        assert_eq!(scan.tail, TailMode::Lower);
        assert_eq!(scan.style, ScanStyle::WaitingTime);
        assert_eq!(scan.step_count(), 20);
    });
}

#[test]
fn invalid_prior_is_rejected_on_load() {
    with_env_lock(|| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        write_model(&path, -1.0);

        let paths = resolve_config(Some(&path), None);
        match load_model_config(&paths) {
            Err(ValidationError::InvalidValue { field, .. }) => assert_eq!(field, "prior.shape"),
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    });
}

#[test]
fn unreadable_json_reports_parse_error() {
    with_env_lock(|| {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.json");
        fs::write(&path, "start = 0").unwrap();

        let paths = resolve_config(None, Some(&path));
        let err = load_scan_config(&paths).unwrap_err();
        assert_eq!(err.code(), 61);
    });
}
