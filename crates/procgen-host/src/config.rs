//! Host configuration file.

use crate::error::HostResult;
use procgen_domains::SceneConfig;
use procgen_eval::EngineConfig;
use serde::{Deserialize, Serialize};

/// `{"engine": {"computeDurationMs": ..}, "scene": {"sliceProgress": .., "retryDelay": ..}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostConfig {
    pub engine: EngineConfig,
    pub scene: SceneConfig,
}

impl HostConfig {
    pub fn from_json(json: &str) -> HostResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_sections_keep_defaults() {
        let config = HostConfig::from_json(r#"{"scene": {"sliceProgress": 0.5}}"#).unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.scene.slice_progress, 0.5);
        assert_eq!(config.scene.retry_delay, SceneConfig::default().retry_delay);
    }

    #[test]
    fn zero_retry_delay_is_rejected() {
        let err = HostConfig::from_json(r#"{"scene": {"retryDelay": 0}}"#).unwrap_err();
        assert!(matches!(err, crate::HostError::Json(_)));
    }
}
