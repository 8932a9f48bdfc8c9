//! Tunable parameters of the arrival inference.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CASE_CONTINUITY_WINDOW_SECS: u64 = 10 * 60;
pub const DEFAULT_TELEMETRY_ASSIGNMENT_WINDOW_SECS: u64 = 20 * 60;
pub const DEFAULT_MIN_FORECAST_HORIZON_SECS: i64 = 120;

/// Parameters passed to every stage of the pipeline.
///
/// Stored as a JSON object on disk; missing keys fall back to the defaults:
/// ```json
/// {
///   "case_continuity_window_secs": 600,
///   "telemetry_assignment_window_secs": 1200,
///   "min_forecast_horizon_secs": 120,
///   "workers": 8
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Largest gap between consecutive scheduled forecasts of one case.
    pub case_continuity_window_secs: u64,
    /// Largest forecast-time distance at which telemetry joins a case.
    pub telemetry_assignment_window_secs: u64,
    /// Telemetry with a horizon below this is trusted as the actual arrival.
    pub min_forecast_horizon_secs: i64,
    /// Worker threads for the batch; `None` lets the pool decide.
    pub workers: Option<usize>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            case_continuity_window_secs: DEFAULT_CASE_CONTINUITY_WINDOW_SECS,
            telemetry_assignment_window_secs: DEFAULT_TELEMETRY_ASSIGNMENT_WINDOW_SECS,
            min_forecast_horizon_secs: DEFAULT_MIN_FORECAST_HORIZON_SECS,
            workers: None,
        }
    }
}

impl InferenceConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InferenceConfig::default();
        assert_eq!(config.case_continuity_window_secs, 600);
        assert_eq!(config.telemetry_assignment_window_secs, 1200);
        assert_eq!(config.min_forecast_horizon_secs, 120);
        assert_eq!(config.workers, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = InferenceConfig::from_json(r#"{"min_forecast_horizon_secs": 60}"#).unwrap();
        assert_eq!(config.min_forecast_horizon_secs, 60);
        assert_eq!(config.case_continuity_window_secs, 600);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(InferenceConfig::from_json("not json").is_err());
    }
}
