//! Engine error types.
//!
//! Every variant is fatal for the interpretation that raised it. Expected
//! conditions (a target entity not spawned yet, a cached artifact not yet
//! buildable) never surface here; operations reschedule themselves instead.

use thiserror::Error;

/// Fatal evaluation or control error, labelled with the node id or name
/// needed to locate the offending program fragment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A description's root noun does not exist.
    #[error("unknown noun \"{noun}\" at description \"{description}\"")]
    UnknownRootNoun { description: String, noun: String },

    /// A noun reference points at a missing description or noun.
    #[error("unknown noun \"{noun}\" from description \"{description}\" (node {ast_id})")]
    UnknownNoun {
        ast_id: String,
        description: String,
        noun: String,
    },

    #[error("unknown operation \"{identifier}\" (node {ast_id})")]
    UnknownOperation { ast_id: String, identifier: String },

    #[error("unknown variable \"{name}\" (node {ast_id})")]
    UnknownVariable { ast_id: String, name: String },

    #[error("no case matched selector {selector} (node {ast_id})")]
    NoCaseMatched { ast_id: String, selector: String },

    /// An operation or `parallel` node asked for fission while a nested
    /// expression was being resolved to a single value.
    #[error("unable to compute parallel values in synchronous evaluation (node {ast_id})")]
    ForkInSynchronousEvaluation { ast_id: String },

    #[error("unknown entity type \"{type_name}\"")]
    UnknownEntityType { type_name: String },

    /// An operator received operands it cannot combine.
    #[error("type mismatch: {message} (node {ast_id})")]
    TypeMismatch { ast_id: String, message: String },

    /// An operation was applied to the wrong payload variant.
    #[error("operation \"{operation}\" expects {expected}, got {found} (node {ast_id})")]
    PayloadMismatch {
        ast_id: String,
        operation: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("operation \"{operation}\" parameter {index}: {message} (node {ast_id})")]
    InvalidParameter {
        ast_id: String,
        operation: String,
        index: usize,
        message: String,
    },

    /// Structurally inconsistent node (e.g. a switch without a selector).
    #[error("invalid program: {message} (node {ast_id})")]
    InvalidProgram { ast_id: String, message: String },

    #[error("unable to interprete while interpretation is already running")]
    AlreadyRunning,

    #[error("unable to update requested progress when interpretation has not yet been started")]
    NotStarted,

    /// The resumption was cancelled or superseded by a newer one.
    #[error("resumption is no longer valid")]
    StaleResumption,

    /// A previous fatal error stopped this interpretation.
    #[error("interpretation halted by an earlier error")]
    Halted,
}

/// Result alias for engine operations.
pub type EvalResult<T> = Result<T, EvalError>;
