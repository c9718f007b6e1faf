//! Time-sliced scheduler with resumption.
//!
//! An [`Interpreter`] runs a program in slices. Each slice pops the entry
//! with the lowest progress, evaluates its next transformation, and applies
//! the resulting [`Step`] to the queue, until the queue drains, the wall
//! clock budget is spent, or the domain asks to publish. Every slice ends
//! with a [`Snapshot`]; when more work is wanted the report also carries a
//! [`Resumption`] the host hands back to continue.

use crate::config::EngineConfig;
use crate::domain::Domain;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::observer::Observer;
use crate::operation::{OperationRegistry, Step};
use crate::queue::{Queue, QueueEntry};
use procgen_types::ast::Descriptions;
use procgen_types::{Progress, Raw, Value, INDEX_VARIABLE};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Token for continuing a suspended run.
///
/// Only the most recently issued token is valid; `cancel`,
/// `request_progress` and `begin` supersede it.
#[must_use = "a suspended run only continues when its resumption is passed to `resume`"]
#[derive(Debug, PartialEq, Eq)]
pub struct Resumption {
    generation: u64,
}

/// What one slice published.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<P> {
    pub payload: P,
    /// Queue progress when the slice started.
    pub prev_progress: Option<Progress>,
    /// Queue progress when the slice ended.
    pub current_progress: Option<Progress>,
    /// `true` once no entry has work left.
    pub is_final: bool,
    /// Nodes evaluated during the slice.
    pub steps: usize,
}

/// A snapshot plus the token to continue, if the run wants to.
#[derive(Debug)]
pub struct SliceReport<P> {
    pub snapshot: Snapshot<P>,
    pub resume: Option<Resumption>,
}

/// Drives programs over a [`Domain`].
pub struct Interpreter<D: Domain> {
    domain: D,
    operations: OperationRegistry,
    config: EngineConfig,
    observer: Box<dyn Observer>,
    program: Option<Arc<Descriptions>>,
    queue: Queue,
    requested: Progress,
    generation: u64,
    /// Generation of the outstanding resumption.
    pending: Option<u64>,
    halted: bool,
}

impl<D: Domain> Interpreter<D> {
    pub fn new(domain: D, operations: OperationRegistry, config: EngineConfig) -> Self {
        Self {
            domain,
            operations,
            config,
            observer: Box::new(()),
            program: None,
            queue: Queue::new(),
            requested: Progress::STATIC,
            generation: 0,
            pending: None,
            halted: false,
        }
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// `true` while a resumption is outstanding.
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    // ══════════════════════════════════════════════════════════════════════
    // Control
    // ══════════════════════════════════════════════════════════════════════

    /// Start interpreting `program` and run its first slice.
    ///
    /// Each interpreted description contributes one root entry whose id is
    /// the description's ordinal. Descriptions with `interprete: false` are
    /// skipped but still consume their ordinal.
    pub fn begin(
        &mut self,
        program: impl Into<Arc<Descriptions>>,
        requested: impl Into<Progress>,
    ) -> EvalResult<SliceReport<D::Payload>> {
        if self.pending.is_some() {
            return Err(EvalError::AlreadyRunning);
        }
        let program = program.into();
        self.requested = requested.into();
        self.queue = Queue::new();
        self.halted = false;
        self.program = Some(program.clone());
        info!(
            descriptions = program.len(),
            requested = %self.requested,
            "interpretation started"
        );

        if let Err(error) = self.seed(&program) {
            return Err(self.halt(error));
        }
        self.run_slice()
    }

    /// Continue a suspended run.
    pub fn resume(&mut self, token: Resumption) -> EvalResult<SliceReport<D::Payload>> {
        if self.halted {
            return Err(EvalError::Halted);
        }
        if self.pending != Some(token.generation) {
            return Err(EvalError::StaleResumption);
        }
        self.run_slice()
    }

    /// Raise (or lower) the target progress and run a slice immediately on
    /// the accumulated state. Any outstanding resumption becomes stale.
    pub fn request_progress(
        &mut self,
        requested: impl Into<Progress>,
    ) -> EvalResult<SliceReport<D::Payload>> {
        if self.program.is_none() {
            return Err(EvalError::NotStarted);
        }
        if self.halted {
            return Err(EvalError::Halted);
        }
        self.requested = requested.into();
        self.pending = None;
        debug!(requested = %self.requested, "requested progress updated");
        self.run_slice()
    }

    /// Invalidate the outstanding resumption. Returns whether one existed.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.pending.take().is_some();
        if cancelled {
            info!(
                progress = ?self.queue.current_progress(),
                "interpretation cancelled"
            );
        }
        cancelled
    }

    // ══════════════════════════════════════════════════════════════════════
    // Scheduling
    // ══════════════════════════════════════════════════════════════════════

    fn seed(&mut self, program: &Descriptions) -> EvalResult<()> {
        for (ordinal, (identifier, description)) in program.iter().enumerate() {
            let noun = description
                .root_noun()
                .ok_or_else(|| EvalError::UnknownRootNoun {
                    description: identifier.clone(),
                    noun: description.root_noun_identifier.clone(),
                })?;
            if !description.is_interpreted() {
                continue;
            }
            let raw = self
                .domain
                .create_value(&description.initial_variables, &noun.ast_id)?;
            let mut variables = description.initial_variables.clone();
            variables.insert(INDEX_VARIABLE.to_string(), Raw::Number(0.0));
            let progress = self.domain.compute_progress(&raw);
            let entry = QueueEntry::new(
                ordinal.to_string(),
                Value::new(raw, variables),
                description.seed(),
                vec![noun.transformation.clone()],
            );
            self.queue.push(entry, progress);
        }
        Ok(())
    }

    fn run_slice(&mut self) -> EvalResult<SliceReport<D::Payload>> {
        let program = self.program.clone().ok_or(EvalError::NotStarted)?;
        let started = Instant::now();
        let budget = self.config.compute_duration();
        let prev_progress = self.queue.current_progress();
        let mut steps = 0;

        while self.queue.has_work() {
            if steps > 0 {
                if started.elapsed() >= budget {
                    break;
                }
                if let (Some(start), Some(current)) = (prev_progress, self.queue.current_progress()) {
                    if self.domain.should_interrupt(start, current) {
                        break;
                    }
                }
            }
            if let Err(error) = self.advance(&program) {
                return Err(self.halt(error));
            }
            steps += 1;
        }

        let current_progress = self.queue.current_progress();
        let is_final = !self.queue.has_work();
        let payload = self
            .domain
            .serialize(&mut self.queue, prev_progress, current_progress);

        let wants_more = !is_final && current_progress.map_or(true, |p| p < self.requested);
        let resume = if wants_more {
            self.generation += 1;
            self.pending = Some(self.generation);
            Some(Resumption {
                generation: self.generation,
            })
        } else {
            self.pending = None;
            None
        };

        debug!(
            steps,
            prev = ?prev_progress,
            current = ?current_progress,
            in_flight = self.queue.len(),
            results = self.queue.results().len(),
            is_final,
            "slice complete"
        );
        if is_final {
            info!(
                results = self.queue.results().len(),
                progress = ?current_progress,
                "interpretation finished"
            );
        }

        Ok(SliceReport {
            snapshot: Snapshot {
                payload,
                prev_progress,
                current_progress,
                is_final,
                steps,
            },
            resume,
        })
    }

    /// Evaluate the next transformation of the highest-priority entry.
    fn advance(&mut self, program: &Descriptions) -> EvalResult<()> {
        let Some(mut entry) = self.queue.pop() else {
            return Ok(());
        };
        let Some(node) = entry.stack.pop() else {
            let progress = self.domain.compute_progress(entry.raw());
            self.queue.push(entry, progress);
            return Ok(());
        };

        trace!(entry = %entry.id, node = %node.ast_id, kind = node.type_name(), "evaluate");
        self.observer.on_before_transformation(&node, &entry.value);

        let step = Evaluator::new(
            program,
            &self.operations,
            &mut self.queue,
            &mut *self.observer,
            &entry.id,
            &entry.seed,
        )
        .step(&mut entry.value, &node)?;

        let entries = match step {
            Step::Continue { raw, push } => {
                if let Some(raw) = raw {
                    entry.value.raw = raw;
                }
                entry.prepend(push);
                vec![entry]
            }
            Step::Fork { raws, push } => {
                debug!(parent = %entry.id, children = raws.len(), "fission");
                raws.into_iter()
                    .enumerate()
                    .map(|(index, raw)| {
                        let mut child = entry.branch(index, raw);
                        child.prepend(push.clone());
                        child
                    })
                    .collect()
            }
            Step::Parallel(children) => {
                debug!(parent = %entry.id, children = children.len(), "fission");
                children
                    .into_iter()
                    .enumerate()
                    .map(|(index, transformation)| {
                        let mut child = entry.branch(index, entry.value.raw.clone());
                        child.prepend(vec![transformation]);
                        child
                    })
                    .collect()
            }
        };

        let values: Vec<&Value> = entries.iter().map(|e| &e.value).collect();
        self.observer.on_after_transformation(&node, &values);

        for entry in entries {
            let progress = self.domain.compute_progress(entry.raw());
            self.queue.push(entry, progress);
        }
        Ok(())
    }

    fn halt(&mut self, error: EvalError) -> EvalError {
        warn!(%error, "interpretation halted");
        self.halted = true;
        self.pending = None;
        error
    }
}
