//! Host error types.

use procgen_eval::EvalError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    /// The engine rejected a control message or halted the run.
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type HostResult<T> = Result<T, HostError>;
