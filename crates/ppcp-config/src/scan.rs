//! Sequential scan configuration (`scan.json`).

use serde::{Deserialize, Serialize};

use crate::validate::ValidationError;

/// Which tail of the predictive distribution counts as surprising.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailMode {
    /// Too few events.
    Lower,
    /// Too many events.
    Upper,
    #[default]
    TwoSided,
}

/// How each scan step is scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStyle {
    /// Predictive count distribution over each increment.
    #[default]
    EventCount,
    /// Each inter-event gap scored separately and combined per increment.
    WaitingTime,
}

/// Grid and scoring mode of a forward scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub start: f64,
    pub end: f64,
    pub increment: f64,

    #[serde(default)]
    pub tail: TailMode,

    #[serde(default)]
    pub style: ScanStyle,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 1.0,
            increment: 1.0,
            tail: TailMode::default(),
            style: ScanStyle::default(),
        }
    }
}

/// Largest grid a scan will walk.
pub const MAX_SCAN_STEPS: usize = u32::MAX as usize;

impl ScanConfig {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Number of grid steps the scan will emit, capped at [`MAX_SCAN_STEPS`].
    pub fn step_count(&self) -> usize {
        if !(self.increment > 0.0) || self.end <= self.start {
            return 0;
        }
        let steps = ((self.end - self.start) / self.increment - 1e-9).ceil().max(0.0);
        if steps > MAX_SCAN_STEPS as f64 {
            return MAX_SCAN_STEPS;
        }
        steps as usize
    }
}
