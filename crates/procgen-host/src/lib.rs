//! Host side of the procgen engine.
//!
//! A [`Session`] turns [`ControlMessage`]s into [`Emission`]s without
//! assuming any particular transport. The `procgen-run` binary drives a
//! scene session from a JSON program on disk.

pub mod config;
pub mod error;
pub mod message;
pub mod session;

pub use config::HostConfig;
pub use error::{HostError, HostResult};
pub use message::{ControlMessage, Emission};
pub use session::Session;

use procgen_domains::SceneDomain;

/// A session over the built-in scene domain.
pub fn scene_session(config: HostConfig) -> Session<SceneDomain> {
    Session::new(SceneDomain::new(config.scene).into_interpreter(config.engine))
}
