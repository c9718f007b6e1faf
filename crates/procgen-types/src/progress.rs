use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// How far a value has advanced, e.g. simulated seconds.
///
/// Totally ordered through [`f64::total_cmp`]; this order is the scheduling
/// priority (lowest first) and the basis of every interrupt decision.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(pub f64);

impl Progress {
    /// Progress of payloads that do not advance over time.
    pub const STATIC: Progress = Progress(-1.0);

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Progress {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Progress {}

impl PartialOrd for Progress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Progress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Progress {
    fn from(value: f64) -> Self {
        Progress(value)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
