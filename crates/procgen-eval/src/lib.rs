//! Procgen execution engine.
//!
//! Runs a [`Descriptions`](procgen_types::ast::Descriptions) program as a
//! set of queue entries, lowest progress first, in wall-clock bounded
//! slices. Domain behavior plugs in through two seams: the
//! [`OperationRegistry`] for callable operations and the [`Domain`] trait
//! for value creation, progress, interrupts and serialization.

pub mod config;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod observer;
pub mod operation;
pub mod queue;

pub use config::EngineConfig;
pub use domain::Domain;
pub use error::{EvalError, EvalResult};
pub use evaluator::{select_branch, Evaluator};
pub use interpreter::{Interpreter, Resumption, SliceReport, Snapshot};
pub use observer::Observer;
pub use operation::{Call, ExecuteFn, OperationDescriptor, OperationRegistry, Step};
pub use queue::{EntryState, Queue, QueueEntry};
