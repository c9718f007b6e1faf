//! A host session: one interpreter plus the resumption it is holding.
//!
//! The host feeds [`ControlMessage`]s through [`Session::handle`] and calls
//! [`Session::poll`] whenever it is ready for the next slice. Dropping the
//! held resumption (via `cancel`) is the only way to stop a run early.

use crate::error::HostResult;
use crate::message::{ControlMessage, Emission};
use procgen_eval::{Domain, Interpreter, Resumption, SliceReport};
use serde::Serialize;
use tracing::debug;

pub struct Session<D: Domain> {
    interpreter: Interpreter<D>,
    pending: Option<Resumption>,
}

impl<D> Session<D>
where
    D: Domain,
    D::Payload: Serialize,
{
    pub fn new(interpreter: Interpreter<D>) -> Self {
        Self {
            interpreter,
            pending: None,
        }
    }

    /// `true` when no slice is waiting to run.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Apply a control message. `interprete` and `updateRequestedProgress`
    /// run a slice immediately and return its emission.
    pub fn handle(&mut self, message: ControlMessage) -> HostResult<Option<Emission>> {
        match message {
            ControlMessage::Interprete {
                descriptions,
                requested_progress,
            } => {
                let report = self.interpreter.begin(descriptions, requested_progress)?;
                self.accept(report).map(Some)
            }
            ControlMessage::UpdateRequestedProgress { requested_progress } => {
                self.pending = None;
                let report = self.interpreter.request_progress(requested_progress)?;
                self.accept(report).map(Some)
            }
            ControlMessage::Cancel => {
                self.pending = None;
                self.interpreter.cancel();
                Ok(None)
            }
        }
    }

    /// Run the pending slice, if any.
    pub fn poll(&mut self) -> HostResult<Option<Emission>> {
        let Some(token) = self.pending.take() else {
            return Ok(None);
        };
        let report = self.interpreter.resume(token)?;
        self.accept(report).map(Some)
    }

    /// Handle `message`, then poll until the session is idle.
    pub fn drain(&mut self, message: ControlMessage) -> HostResult<Vec<Emission>> {
        let mut emissions = Vec::new();
        let mut next = self.handle(message)?;
        while let Some(emission) = next {
            emissions.push(emission);
            next = self.poll()?;
        }
        Ok(emissions)
    }

    fn accept(&mut self, report: SliceReport<D::Payload>) -> HostResult<Emission> {
        let emission = Emission::from_snapshot(&report.snapshot)?;
        debug!(
            steps = report.snapshot.steps,
            is_final = emission.is_final,
            resumable = report.resume.is_some(),
            "emission"
        );
        self.pending = report.resume;
        Ok(emission)
    }
}
