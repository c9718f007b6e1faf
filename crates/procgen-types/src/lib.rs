//! Shared types for the procgen engine.
//!
//! This crate defines the transformation AST, the description graph that
//! forms a program, the [`Raw`] payload union, the per-entry [`Value`],
//! scheduling [`Progress`], and the seed-stable hash used for every
//! deterministic branch decision.

mod hash;
mod progress;
mod raw;
mod value;
pub mod ast;

pub use hash::{cyrb53, cyrb53_random};
pub use progress::Progress;
pub use raw::{Keyframe, MotionEntity, Pathway, PathwayPoint, Point, Raw};
pub use value::{Value, Variables, INDEX_VARIABLE};
