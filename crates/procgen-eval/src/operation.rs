//! Pluggable operations and the explicit step protocol.
//!
//! Evaluating a node never calls back into the scheduler. It returns a
//! [`Step`] and the active driver decides what that step means: the
//! suspending driver applies all variants to the queue, the synchronous
//! driver rejects fission.

use crate::error::{EvalError, EvalResult};
use crate::queue::Queue;
use procgen_types::ast::Transformation;
use procgen_types::{MotionEntity, Pathway, Point, Raw};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ══════════════════════════════════════════════════════════════════════════════
// Step
// ══════════════════════════════════════════════════════════════════════════════

/// The outcome of evaluating one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace the raw value (when `Some`) and run `push` next, in order,
    /// ahead of the remaining stack.
    Continue {
        raw: Option<Raw>,
        push: Vec<Arc<Transformation>>,
    },
    /// Fission: one new entry per raw, each inheriting the remaining stack
    /// with `push` in front of it.
    Fork {
        raws: Vec<Raw>,
        push: Vec<Arc<Transformation>>,
    },
    /// Fission with one child transformation per new entry; the raw value is
    /// cloned into every branch.
    Parallel(Vec<Arc<Transformation>>),
}

impl Step {
    /// Leave the value alone and move on.
    pub fn pass() -> Self {
        Step::Continue {
            raw: None,
            push: Vec::new(),
        }
    }

    pub fn replace(raw: impl Into<Raw>) -> Self {
        Step::Continue {
            raw: Some(raw.into()),
            push: Vec::new(),
        }
    }

    pub fn then(push: Vec<Arc<Transformation>>) -> Self {
        Step::Continue { raw: None, push }
    }

    pub fn replace_then(raw: impl Into<Raw>, push: Vec<Arc<Transformation>>) -> Self {
        Step::Continue {
            raw: Some(raw.into()),
            push,
        }
    }

    pub fn fork(raws: Vec<Raw>) -> Self {
        Step::Fork {
            raws,
            push: Vec::new(),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Call
// ══════════════════════════════════════════════════════════════════════════════

/// Everything an operation receives when it is invoked.
pub struct Call<'a> {
    /// Registry name the operation was invoked under.
    pub identifier: &'a str,
    /// The invoking node; re-push it to retry with fresh parameters.
    pub node: &'a Arc<Transformation>,
    /// `entry id + seed`, the key for any randomness the operation needs.
    pub identity: String,
    /// Clone of the current raw value when the descriptor sets `include_this`.
    pub this: Option<Raw>,
    /// The live queue when the descriptor sets `include_queue`.
    pub queue: Option<&'a mut Queue>,
    /// Resolved parameters, in declaration order.
    pub parameters: Vec<Raw>,
}

impl<'a> Call<'a> {
    pub fn ast_id(&self) -> &str {
        &self.node.ast_id
    }

    /// Parameter `index`; `nil` counts as absent.
    pub fn parameter(&self, index: usize) -> Option<&Raw> {
        self.parameters.get(index).filter(|raw| !raw.is_nil())
    }

    pub fn number(&self, index: usize) -> EvalResult<f64> {
        match self.parameter(index) {
            Some(Raw::Number(n)) => Ok(*n),
            Some(other) => Err(self.parameter_error(
                index,
                format!("expected number, got {}", other.type_name()),
            )),
            None => Err(self.parameter_error(index, "missing number")),
        }
    }

    pub fn optional_number(&self, index: usize) -> EvalResult<Option<f64>> {
        match self.parameter(index) {
            None => Ok(None),
            Some(_) => self.number(index).map(Some),
        }
    }

    pub fn number_or(&self, index: usize, default: f64) -> EvalResult<f64> {
        Ok(self.optional_number(index)?.unwrap_or(default))
    }

    pub fn string(&self, index: usize) -> EvalResult<String> {
        match self.parameter(index) {
            Some(Raw::String(s)) => Ok(s.clone()),
            Some(Raw::Number(n)) => Ok(Raw::Number(*n).to_string()),
            Some(other) => Err(self.parameter_error(
                index,
                format!("expected string, got {}", other.type_name()),
            )),
            None => Err(self.parameter_error(index, "missing string")),
        }
    }

    pub fn string_or(&self, index: usize, default: &str) -> EvalResult<String> {
        match self.parameter(index) {
            None => Ok(default.to_string()),
            Some(_) => self.string(index),
        }
    }

    /// Parameter `index` as a point; `None` when it is absent.
    pub fn optional_point(&self, index: usize) -> EvalResult<Option<Point>> {
        match self.parameter(index) {
            None => Ok(None),
            Some(Raw::Point(p)) => Ok(Some(*p)),
            Some(other) => Err(self.parameter_error(
                index,
                format!("expected point, got {}", other.type_name()),
            )),
        }
    }

    /// Take the current value as a motion entity.
    pub fn take_motion(&mut self) -> EvalResult<MotionEntity> {
        match self.this.take() {
            Some(Raw::Motion(entity)) => Ok(entity),
            other => Err(self.payload_mismatch("motion entity", other.as_ref())),
        }
    }

    /// Take the current value as a pathway.
    pub fn take_pathway(&mut self) -> EvalResult<Pathway> {
        match self.this.take() {
            Some(Raw::Pathway(pathway)) => Ok(pathway),
            other => Err(self.payload_mismatch("pathway", other.as_ref())),
        }
    }

    /// The live queue. Only present for descriptors with `include_queue`.
    pub fn queue(&mut self) -> EvalResult<&mut Queue> {
        let ast_id = self.node.ast_id.clone();
        let identifier = self.identifier.to_string();
        self.queue
            .as_deref_mut()
            .ok_or_else(|| EvalError::InvalidProgram {
                ast_id,
                message: format!("operation \"{identifier}\" did not request the queue"),
            })
    }

    pub fn parameter_error(&self, index: usize, message: impl Into<String>) -> EvalError {
        EvalError::InvalidParameter {
            ast_id: self.node.ast_id.clone(),
            operation: self.identifier.to_string(),
            index,
            message: message.into(),
        }
    }

    fn payload_mismatch(&self, expected: &'static str, found: Option<&Raw>) -> EvalError {
        EvalError::PayloadMismatch {
            ast_id: self.node.ast_id.clone(),
            operation: self.identifier.to_string(),
            expected,
            found: found.map_or("nothing", Raw::type_name),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Registry
// ══════════════════════════════════════════════════════════════════════════════

pub type ExecuteFn = Box<dyn Fn(Call<'_>) -> EvalResult<Step>>;

/// A named behavior callable from the AST.
pub struct OperationDescriptor {
    pub execute: ExecuteFn,
    /// Pass a clone of the current raw value as `Call::this`.
    pub include_this: bool,
    /// Pass the live queue as `Call::queue`.
    pub include_queue: bool,
    /// Reserved for default-argument filling; not consulted by the evaluator.
    pub default_parameters: Vec<Arc<Transformation>>,
}

impl OperationDescriptor {
    pub fn new(execute: impl Fn(Call<'_>) -> EvalResult<Step> + 'static) -> Self {
        Self {
            execute: Box::new(execute),
            include_this: false,
            include_queue: false,
            default_parameters: Vec::new(),
        }
    }

    pub fn with_this(mut self) -> Self {
        self.include_this = true;
        self
    }

    pub fn with_queue(mut self) -> Self {
        self.include_queue = true;
        self
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("include_this", &self.include_this)
            .field("include_queue", &self.include_queue)
            .field("default_parameters", &self.default_parameters.len())
            .finish_non_exhaustive()
    }
}

/// Operation name → descriptor.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, OperationDescriptor>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an operation.
    pub fn register(&mut self, name: impl Into<String>, descriptor: OperationDescriptor) {
        self.operations.insert(name.into(), descriptor);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, descriptor: OperationDescriptor) -> Self {
        self.register(name, descriptor);
        self
    }

    /// Move every operation of `other` into this registry.
    pub fn merge(&mut self, other: OperationRegistry) {
        self.operations.extend(other.operations);
    }

    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call<'a>(node: &'a Arc<Transformation>, this: Option<Raw>, parameters: Vec<Raw>) -> Call<'a> {
        Call {
            identifier: "inspect",
            node,
            identity: "00".into(),
            this,
            queue: None,
            parameters,
        }
    }

    #[test]
    fn typed_parameter_access() {
        let node = Transformation::this("9");
        let c = call(
            &node,
            None,
            vec![Raw::Number(2.0), Raw::Nil, Raw::from("street"), Raw::Bool(true)],
        );
        assert_eq!(c.number(0).unwrap(), 2.0);
        assert_eq!(c.optional_number(1).unwrap(), None);
        assert_eq!(c.number_or(1, 7.0).unwrap(), 7.0);
        assert_eq!(c.number_or(9, 1.5).unwrap(), 1.5);
        assert_eq!(c.string(2).unwrap(), "street");
        assert_eq!(c.string_or(5, "footwalk").unwrap(), "footwalk");
        assert!(matches!(
            c.number(3),
            Err(EvalError::InvalidParameter { index: 3, .. })
        ));
    }

    #[test]
    fn payload_mismatch_names_both_variants() {
        let node = Transformation::this("9");
        let mut c = call(&node, Some(Raw::Number(1.0)), vec![]);
        let err = c.take_motion().unwrap_err();
        assert_eq!(
            err,
            EvalError::PayloadMismatch {
                ast_id: "9".into(),
                operation: "inspect".into(),
                expected: "motion entity",
                found: "number",
            }
        );
    }

    #[test]
    fn queue_is_only_available_when_requested() {
        let node = Transformation::this("9");
        let mut c = call(&node, None, vec![]);
        assert!(matches!(c.queue(), Err(EvalError::InvalidProgram { .. })));
    }

    #[test]
    fn registry_merge_and_lookup() {
        let mut registry = OperationRegistry::new()
            .with("a", OperationDescriptor::new(|_| Ok(Step::pass())).with_this());
        registry.merge(
            OperationRegistry::new()
                .with("b", OperationDescriptor::new(|_| Ok(Step::pass())).with_queue()),
        );
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(registry.get("a").unwrap().include_this);
        assert!(registry.get("b").unwrap().include_queue);
        assert!(!registry.contains("c"));
    }
}
