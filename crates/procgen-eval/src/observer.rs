//! Optional evaluation hooks for debugging and tooling.

use procgen_types::ast::Transformation;
use procgen_types::Value;

/// Receives notifications while the scheduler evaluates nodes.
///
/// Every hook defaults to a no-op; implement only what you need.
pub trait Observer {
    /// A stochastic switch picked `branch` for the entry holding `value`.
    fn on_stochastic_switch(&mut self, _node: &Transformation, _value: &Value, _branch: usize) {}

    /// `node` is about to run against `value`.
    fn on_before_transformation(&mut self, _node: &Transformation, _value: &Value) {}

    /// `node` ran; `values` holds one value per resulting entry (several
    /// after a fission, none when a fork produced no branches).
    fn on_after_transformation(&mut self, _node: &Transformation, _values: &[&Value]) {}
}

impl Observer for () {}
