//! Control messages in and emissions out.
//!
//! Both sides are JSON objects. Control messages are tagged by `type`:
//!
//! ```json
//! {"type": "interprete", "descriptions": {...}, "requestedProgress": 30}
//! {"type": "updateRequestedProgress", "requestedProgress": 60}
//! {"type": "cancel"}
//! ```

use crate::error::HostResult;
use procgen_eval::Snapshot;
use procgen_types::ast::Descriptions;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A request from the host to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    /// Start interpreting a program up to `requested_progress`.
    Interprete {
        descriptions: Descriptions,
        requested_progress: f64,
    },
    /// Move the target of the running interpretation.
    UpdateRequestedProgress { requested_progress: f64 },
    /// Stop after the current slice.
    Cancel,
}

impl ControlMessage {
    pub fn from_json(json: &str) -> HostResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One published slice result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Emission {
    pub result: serde_json::Value,
    pub is_final: bool,
}

impl Emission {
    pub fn from_snapshot<P: Serialize>(snapshot: &Snapshot<P>) -> HostResult<Self> {
        Ok(Self {
            result: serde_json::to_value(&snapshot.payload)?,
            is_final: snapshot.is_final,
        })
    }

    /// Hex SHA-256 of the compact JSON of `result`.
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.result.to_string().as_bytes()))
    }
}
