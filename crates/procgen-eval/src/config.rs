//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Host-supplied scheduling limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Wall-clock budget of one scheduling slice, in milliseconds.
    pub compute_duration_ms: u64,
}

impl EngineConfig {
    pub fn compute_duration(&self) -> Duration {
        Duration::from_millis(self.compute_duration_ms)
    }

    /// Load from JSON; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compute_duration_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.compute_duration(), Duration::from_secs(1));
    }

    #[test]
    fn camel_case_keys() {
        let config = EngineConfig::from_json(r#"{"computeDurationMs": 16}"#).unwrap();
        assert_eq!(config.compute_duration_ms, 16);
    }
}
