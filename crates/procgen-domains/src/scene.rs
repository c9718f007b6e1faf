//! The scene domain: streets, footwalks and the agents moving on them.

use crate::network::PathwayNetwork;
use crate::{motion, pathway};
use procgen_eval::{Domain, EngineConfig, EvalError, EvalResult, Interpreter, OperationRegistry, Queue};
use procgen_types::{MotionEntity, Progress, Raw, Variables};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// Scene tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneConfig {
    /// Simulated seconds one slice may advance before it publishes.
    pub slice_progress: f64,
    /// Seconds an operation waits before re-issuing itself. Must be
    /// positive so a retrying entity keeps advancing.
    #[serde(deserialize_with = "positive_seconds")]
    pub retry_delay: f64,
}

fn positive_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let seconds = f64::deserialize(deserializer)?;
    if seconds > 0.0 && seconds.is_finite() {
        Ok(seconds)
    } else {
        Err(D::Error::custom(format!(
            "expected a positive number of seconds, got {seconds}"
        )))
    }
}

impl SceneConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            slice_progress: 3.0,
            retry_delay: 0.01,
        }
    }
}

/// An agent in a published snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    /// Id of the entry that produced it.
    pub id: String,
    #[serde(flatten)]
    pub entity: MotionEntity,
}

/// What a scene slice publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<Arc<PathwayNetwork>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footwalk: Option<Arc<PathwayNetwork>>,
    /// In-flight agents in priority order, then finished agents.
    pub agents: Vec<Agent>,
}

#[derive(Debug, Clone, Default)]
pub struct SceneDomain {
    config: SceneConfig,
}

impl SceneDomain {
    pub fn new(config: SceneConfig) -> Self {
        Self { config }
    }

    /// Every built-in operation, configured for this scene.
    pub fn operations(&self) -> OperationRegistry {
        let mut registry = motion::operations(self.config.retry_delay);
        registry.merge(pathway::operations());
        registry
    }

    /// An interpreter over this scene with its built-in operations.
    pub fn into_interpreter(self, engine: EngineConfig) -> Interpreter<SceneDomain> {
        let operations = self.operations();
        Interpreter::new(self, operations, engine)
    }
}

impl Domain for SceneDomain {
    type Payload = SceneSnapshot;

    /// Root values by the `type` variable: `street` and `footwalk` start a
    /// pathway, every other type names a motion entity (`pedestrian` when
    /// absent).
    fn create_value(&self, initial_variables: &Variables, ast_id: &str) -> EvalResult<Raw> {
        let kind = match initial_variables.get("type") {
            None | Some(Raw::Nil) => "pedestrian".to_string(),
            Some(Raw::String(kind)) => kind.clone(),
            Some(other) => {
                return Err(EvalError::UnknownEntityType {
                    type_name: other.to_string(),
                })
            }
        };
        match kind.as_str() {
            "street" | "footwalk" => Ok(pathway::create_pathway(&kind, initial_variables, ast_id).into()),
            _ => motion::create_motion_entity(&kind, initial_variables, ast_id).map(Raw::Motion),
        }
    }

    fn compute_progress(&self, raw: &Raw) -> Progress {
        match raw {
            Raw::Motion(entity) => Progress(entity.current_time()),
            _ => Progress::STATIC,
        }
    }

    fn should_interrupt(&self, start: Progress, current: Progress) -> bool {
        current.value() - start.value() > self.config.slice_progress
    }

    fn serialize(
        &self,
        queue: &mut Queue,
        _prev_progress: Option<Progress>,
        _current_progress: Option<Progress>,
    ) -> SceneSnapshot {
        let street = PathwayNetwork::cached(queue, "street");
        let footwalk = PathwayNetwork::cached(queue, "footwalk");
        let agents = queue
            .in_flight()
            .chain(queue.results())
            .filter_map(|entry| match entry.raw() {
                Raw::Motion(entity) => Some(Agent {
                    id: entry.id.clone(),
                    entity: entity.clone(),
                }),
                _ => None,
            })
            .collect();
        SceneSnapshot {
            street,
            footwalk,
            agents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_camel_case() {
        assert_eq!(SceneConfig::from_json("{}").unwrap(), SceneConfig::default());
        let config = SceneConfig::from_json(r#"{"sliceProgress": 1.5}"#).unwrap();
        assert_eq!(config.slice_progress, 1.5);
        assert_eq!(config.retry_delay, 0.01);
    }

    #[test]
    fn retry_delay_must_be_positive() {
        for json in [r#"{"retryDelay": 0}"#, r#"{"retryDelay": -0.5}"#] {
            let err = SceneConfig::from_json(json).unwrap_err();
            assert!(err.to_string().contains("positive"), "{err}");
        }
        assert_eq!(SceneConfig::from_json(r#"{"retryDelay": 0.5}"#).unwrap().retry_delay, 0.5);
    }

    #[test]
    fn values_by_type() {
        let scene = SceneDomain::default();
        let mut variables = Variables::new();
        let walker = scene.create_value(&variables, "n").unwrap();
        assert!(matches!(&walker, Raw::Motion(e) if e.kind == "pedestrian" && e.radius == 1.0));
        assert_eq!(scene.compute_progress(&walker), Progress(0.0));

        variables.insert("type".into(), Raw::from("footwalk"));
        let footwalk = scene.create_value(&variables, "n").unwrap();
        assert!(matches!(&footwalk, Raw::Pathway(p) if p.kind == "footwalk"));
        assert_eq!(scene.compute_progress(&footwalk), Progress::STATIC);

        variables.insert("type".into(), Raw::from("building"));
        assert_eq!(
            scene.create_value(&variables, "n").unwrap_err(),
            EvalError::UnknownEntityType {
                type_name: "building".into()
            }
        );
    }

    #[test]
    fn interrupts_after_the_slice_progress() {
        let scene = SceneDomain::default();
        assert!(!scene.should_interrupt(Progress(1.0), Progress(4.0)));
        assert!(scene.should_interrupt(Progress(1.0), Progress(4.5)));
    }
}
