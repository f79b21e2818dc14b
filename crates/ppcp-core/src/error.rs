//! Errors surfaced by the model, predictive engine and scanner.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Effective duration between the endpoints came out negative.
    #[error("interval ordering violated: duration from {start} to {end} is {duration}")]
    IntervalOrdering { start: f64, end: f64, duration: f64 },

    #[error("index ordering violated: end index {end} precedes start index {start}")]
    IndexOrdering { start: usize, end: usize },

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("intensity multipliers cover {multipliers} bins but counts cover {counts}")]
    MultiplierLength { counts: usize, multipliers: usize },

    #[error("non-positive waiting time {gap} before event {index}")]
    NonPositiveGap { index: usize, gap: f64 },

    #[error("{operation} is not supported for {source_kind} data")]
    UnsupportedSource {
        operation: &'static str,
        source_kind: &'static str,
    },

    #[error("invalid scan: {0}")]
    InvalidScan(String),

    #[error("configuration error: {0}")]
    Config(#[from] ppcp_config::ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ModelError {
    /// True for violations of an interval or index ordering contract.
    pub fn is_ordering_violation(&self) -> bool {
        matches!(
            self,
            ModelError::IntervalOrdering { .. } | ModelError::IndexOrdering { .. }
        )
    }
}
