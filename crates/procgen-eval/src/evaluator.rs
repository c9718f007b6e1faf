//! One dispatch over every transformation variant, two drivers.
//!
//! [`Evaluator::step`] evaluates a single node and reports the outcome as a
//! [`Step`]. The scheduler applies that step to the queue (the suspending
//! driver); [`Evaluator::evaluate`] applies it in place and recurses (the
//! synchronous driver used for conditions, selectors, operands and
//! operation parameters).

use crate::error::{EvalError, EvalResult};
use crate::observer::Observer;
use crate::operation::{Call, OperationRegistry, Step};
use crate::queue::Queue;
use procgen_types::ast::{BinaryOperator, Descriptions, Transformation, TransformationKind, UnaryOperator};
use procgen_types::{cyrb53_random, Raw, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// Evaluation context for one queue entry.
pub struct Evaluator<'a> {
    program: &'a Descriptions,
    operations: &'a OperationRegistry,
    queue: &'a mut Queue,
    observer: &'a mut dyn Observer,
    entry_id: &'a str,
    seed: &'a str,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        program: &'a Descriptions,
        operations: &'a OperationRegistry,
        queue: &'a mut Queue,
        observer: &'a mut dyn Observer,
        entry_id: &'a str,
        seed: &'a str,
    ) -> Self {
        Self {
            program,
            operations,
            queue,
            observer,
            entry_id,
            seed,
        }
    }

    /// `entry id + seed`: the key of every deterministic draw for this entry.
    pub fn identity(&self) -> String {
        format!("{}{}", self.entry_id, self.seed)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Dispatch
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate one node against `value`.
    ///
    /// Only `setVariable` mutates `value` directly; every other change is
    /// carried by the returned step.
    pub fn step(&mut self, value: &mut Value, node: &Arc<Transformation>) -> EvalResult<Step> {
        match &node.kind {
            TransformationKind::Sequential { children } => Ok(Step::then(children.clone())),
            TransformationKind::Parallel { children } => Ok(Step::Parallel(children.clone())),

            TransformationKind::Operation {
                identifier,
                children,
            } => {
                let parameters = children
                    .iter()
                    .map(|child| self.resolve(value, child))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.invoke(value, node, identifier, parameters)
            }
            TransformationKind::PrecomputedOperation {
                identifier,
                parameters,
            } => self.invoke(value, node, identifier, parameters.clone()),

            TransformationKind::Raw { value: raw } => Ok(Step::replace(raw.clone())),
            TransformationKind::This => Ok(Step::pass()),

            TransformationKind::NounReference {
                description_identifier,
                noun_identifier,
            } => {
                let noun = self
                    .program
                    .noun(description_identifier, noun_identifier)
                    .ok_or_else(|| EvalError::UnknownNoun {
                        ast_id: node.ast_id.clone(),
                        description: description_identifier.clone(),
                        noun: noun_identifier.clone(),
                    })?;
                Ok(Step::then(vec![noun.transformation.clone()]))
            }

            TransformationKind::UnaryOperator { operator, child } => {
                let operand = self.resolve(value, child)?;
                apply_unary(*operator, operand, &node.ast_id).map(Step::replace)
            }
            TransformationKind::BinaryOperator {
                operator,
                left,
                right,
            } => {
                let left = self.resolve(value, left)?;
                let right = self.resolve(value, right)?;
                apply_binary(*operator, left, right, &node.ast_id).map(Step::replace)
            }

            TransformationKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let branch = if self.resolve(value, condition)?.is_truthy() {
                    then_branch
                } else {
                    else_branch
                };
                Ok(Step::then(vec![branch.clone()]))
            }
            TransformationKind::Switch { cases, children } => {
                self.switch(value, node, cases, children)
            }
            TransformationKind::StochasticSwitch {
                probabilities,
                children,
            } => self.stochastic_switch(value, node, probabilities, children),

            TransformationKind::GetVariable { identifier } => value
                .variable(identifier)
                .cloned()
                .map(Step::replace)
                .ok_or_else(|| EvalError::UnknownVariable {
                    ast_id: node.ast_id.clone(),
                    name: identifier.clone(),
                }),
            TransformationKind::SetVariable {
                identifier,
                value: expression,
            } => {
                let raw = self.resolve(value, expression)?;
                value.variables.insert(identifier.clone(), raw);
                Ok(Step::pass())
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Synchronous driver
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate `node` to completion against `value`, in place.
    ///
    /// Fission cannot be expressed here and fails with
    /// [`EvalError::ForkInSynchronousEvaluation`].
    pub fn evaluate(&mut self, value: &mut Value, node: &Arc<Transformation>) -> EvalResult<()> {
        match self.step(value, node)? {
            Step::Continue { raw, push } => {
                if let Some(raw) = raw {
                    value.raw = raw;
                }
                for next in &push {
                    self.evaluate(value, next)?;
                }
                Ok(())
            }
            Step::Fork { .. } | Step::Parallel(_) => Err(EvalError::ForkInSynchronousEvaluation {
                ast_id: node.ast_id.clone(),
            }),
        }
    }

    /// Evaluate `node` against a private clone of `value` and return the
    /// resulting raw. `value` itself is never touched.
    pub fn resolve(&mut self, value: &Value, node: &Arc<Transformation>) -> EvalResult<Raw> {
        let mut scratch = value.clone();
        self.evaluate(&mut scratch, node)?;
        Ok(scratch.raw)
    }

    // ── Operations ───────────────────────────────────────────────────────

    fn invoke(
        &mut self,
        value: &Value,
        node: &Arc<Transformation>,
        identifier: &str,
        parameters: Vec<Raw>,
    ) -> EvalResult<Step> {
        let operations = self.operations;
        let descriptor = operations
            .get(identifier)
            .ok_or_else(|| EvalError::UnknownOperation {
                ast_id: node.ast_id.clone(),
                identifier: identifier.to_string(),
            })?;
        let call = Call {
            identifier,
            node,
            identity: self.identity(),
            this: descriptor.include_this.then(|| value.raw.clone()),
            queue: if descriptor.include_queue {
                Some(&mut *self.queue)
            } else {
                None
            },
            parameters,
        };
        (descriptor.execute)(call)
    }

    // ── Control flow ─────────────────────────────────────────────────────

    fn switch(
        &mut self,
        value: &Value,
        node: &Arc<Transformation>,
        cases: &[Vec<Raw>],
        children: &[Arc<Transformation>],
    ) -> EvalResult<Step> {
        let selector = children.first().ok_or_else(|| EvalError::InvalidProgram {
            ast_id: node.ast_id.clone(),
            message: "switch without a selector".into(),
        })?;
        let selected = self.resolve(value, selector)?;
        let index = cases
            .iter()
            .position(|case| case.contains(&selected))
            .ok_or_else(|| EvalError::NoCaseMatched {
                ast_id: node.ast_id.clone(),
                selector: selected.to_string(),
            })?;
        let branch = children
            .get(index + 1)
            .ok_or_else(|| missing_branch(node, index))?;
        Ok(Step::then(vec![branch.clone()]))
    }

    fn stochastic_switch(
        &mut self,
        value: &Value,
        node: &Arc<Transformation>,
        probabilities: &[f64],
        children: &[Arc<Transformation>],
    ) -> EvalResult<Step> {
        let draw = cyrb53_random(&self.identity());
        let index = select_branch(probabilities, draw).ok_or_else(|| EvalError::InvalidProgram {
            ast_id: node.ast_id.clone(),
            message: "stochastic switch without probabilities".into(),
        })?;
        let branch = children
            .get(index)
            .ok_or_else(|| missing_branch(node, index))?;
        self.observer.on_stochastic_switch(node, value, index);
        Ok(Step::then(vec![branch.clone()]))
    }
}

fn missing_branch(node: &Transformation, index: usize) -> EvalError {
    EvalError::InvalidProgram {
        ast_id: node.ast_id.clone(),
        message: format!("{} has no branch {index}", node.type_name()),
    }
}

/// Index picked by a cumulative scan of `probabilities` for `draw`: the
/// first index whose running sum reaches `draw`. A shortfall selects the
/// last index; an empty list selects nothing.
pub fn select_branch(probabilities: &[f64], draw: f64) -> Option<usize> {
    let last = probabilities.len().checked_sub(1)?;
    let mut sum = 0.0;
    for (index, probability) in probabilities.iter().enumerate() {
        sum += probability;
        if draw <= sum {
            return Some(index);
        }
    }
    Some(last)
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

fn apply_unary(operator: UnaryOperator, operand: Raw, ast_id: &str) -> EvalResult<Raw> {
    match (operator, operand) {
        (UnaryOperator::Not, operand) => Ok(Raw::Bool(!operand.is_truthy())),
        (UnaryOperator::Negate, Raw::Number(n)) => Ok(Raw::Number(-n)),
        (UnaryOperator::Negate, operand) => Err(EvalError::TypeMismatch {
            ast_id: ast_id.to_string(),
            message: format!("cannot negate {}", operand.type_name()),
        }),
    }
}

fn apply_binary(operator: BinaryOperator, left: Raw, right: Raw, ast_id: &str) -> EvalResult<Raw> {
    let mismatch = |left: &Raw, right: &Raw| EvalError::TypeMismatch {
        ast_id: ast_id.to_string(),
        message: format!(
            "cannot apply '{operator}' to {} and {}",
            left.type_name(),
            right.type_name()
        ),
    };

    match operator {
        BinaryOperator::And => Ok(if left.is_truthy() { right } else { left }),
        BinaryOperator::Or => Ok(if left.is_truthy() { left } else { right }),
        BinaryOperator::Equal => Ok(Raw::Bool(left == right)),
        BinaryOperator::NotEqual => Ok(Raw::Bool(left != right)),

        BinaryOperator::Add => match (&left, &right) {
            (Raw::Number(a), Raw::Number(b)) => Ok(Raw::Number(a + b)),
            (Raw::String(_), Raw::String(_) | Raw::Number(_))
            | (Raw::Number(_), Raw::String(_)) => Ok(Raw::String(format!("{left}{right}"))),
            _ => Err(mismatch(&left, &right)),
        },
        BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => match (&left, &right) {
            (Raw::Number(a), Raw::Number(b)) => Ok(Raw::Number(match operator {
                BinaryOperator::Subtract => a - b,
                BinaryOperator::Multiply => a * b,
                BinaryOperator::Divide => a / b,
                _ => a % b,
            })),
            _ => Err(mismatch(&left, &right)),
        },

        BinaryOperator::Greater
        | BinaryOperator::GreaterEqual
        | BinaryOperator::Less
        | BinaryOperator::LessEqual => {
            let ordering = match (&left, &right) {
                (Raw::Number(a), Raw::Number(b)) => a.partial_cmp(b),
                (Raw::String(a), Raw::String(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch(&left, &right)),
            };
            // NaN compares false on every side.
            let holds = ordering.is_some_and(|ordering| match operator {
                BinaryOperator::Greater => ordering == Ordering::Greater,
                BinaryOperator::GreaterEqual => ordering != Ordering::Less,
                BinaryOperator::Less => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            });
            Ok(Raw::Bool(holds))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(operator: BinaryOperator, left: impl Into<Raw>, right: impl Into<Raw>) -> EvalResult<Raw> {
        apply_binary(operator, left.into(), right.into(), "op")
    }

    #[test]
    fn select_branch_boundaries() {
        assert_eq!(select_branch(&[0.3, 0.7], 0.3), Some(0));
        assert_eq!(select_branch(&[0.3, 0.7], 0.31), Some(1));
        assert_eq!(select_branch(&[0.3, 0.7], 0.0), Some(0));
        assert_eq!(select_branch(&[], 0.5), None);
    }

    #[test]
    fn select_branch_clamps_shortfall_to_last() {
        assert_eq!(select_branch(&[0.1, 0.2], 0.9), Some(1));
        assert_eq!(select_branch(&[0.0], 0.5), Some(0));
    }

    #[test]
    fn arithmetic_and_concatenation() {
        assert_eq!(binary(BinaryOperator::Add, 2.0, 3.0), Ok(Raw::Number(5.0)));
        assert_eq!(binary(BinaryOperator::Add, "car", "s"), Ok(Raw::from("cars")));
        assert_eq!(binary(BinaryOperator::Add, "lane", 2.0), Ok(Raw::from("lane2")));
        assert_eq!(binary(BinaryOperator::Modulo, 7.0, 4.0), Ok(Raw::Number(3.0)));
        assert_eq!(
            binary(BinaryOperator::Divide, 1.0, 0.0),
            Ok(Raw::Number(f64::INFINITY))
        );
    }

    #[test]
    fn logical_operators_return_an_operand() {
        assert_eq!(binary(BinaryOperator::And, 0.0, "x"), Ok(Raw::Number(0.0)));
        assert_eq!(binary(BinaryOperator::And, 1.0, "x"), Ok(Raw::from("x")));
        assert_eq!(binary(BinaryOperator::Or, "", 4.0), Ok(Raw::Number(4.0)));
        assert_eq!(binary(BinaryOperator::Or, "a", 4.0), Ok(Raw::from("a")));
    }

    #[test]
    fn comparisons() {
        assert_eq!(binary(BinaryOperator::Less, 1.0, 2.0), Ok(Raw::Bool(true)));
        assert_eq!(binary(BinaryOperator::GreaterEqual, 2.0, 2.0), Ok(Raw::Bool(true)));
        assert_eq!(binary(BinaryOperator::Greater, "b", "a"), Ok(Raw::Bool(true)));
        assert_eq!(binary(BinaryOperator::LessEqual, f64::NAN, 1.0), Ok(Raw::Bool(false)));
        assert_eq!(binary(BinaryOperator::Equal, "a", "a"), Ok(Raw::Bool(true)));
        assert_eq!(binary(BinaryOperator::NotEqual, 1.0, "1"), Ok(Raw::Bool(true)));
    }

    #[test]
    fn mismatched_operands_are_reported() {
        let err = binary(BinaryOperator::Subtract, "a", 1.0).unwrap_err();
        assert_eq!(
            err,
            EvalError::TypeMismatch {
                ast_id: "op".into(),
                message: "cannot apply '-' to string and number".into(),
            }
        );
        assert!(apply_unary(UnaryOperator::Negate, Raw::Bool(true), "u").is_err());
        assert_eq!(
            apply_unary(UnaryOperator::Not, Raw::Nil, "u"),
            Ok(Raw::Bool(true))
        );
    }
}
