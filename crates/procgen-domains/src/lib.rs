//! Built-in procgen domains.
//!
//! - [`motion`]: animated agents (`moveTo`, `follow`, `spawnOn`, ...)
//! - [`pathway`]: streets and footwalks (`pathwayFrom`, `pathwayTo`)
//! - [`network`]: the pathway network derived from finished pathways
//! - [`scene`]: the [`SceneDomain`] tying them together for a host

pub mod motion;
pub mod network;
pub mod pathway;
pub mod scene;

pub use network::{PathwayNetwork, Segment};
pub use scene::{Agent, SceneConfig, SceneDomain, SceneSnapshot};
