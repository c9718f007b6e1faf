//! Per-entry value: the payload plus its variable environment.

use crate::Raw;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variable environment of one entry. Ordered so snapshots are stable.
pub type Variables = BTreeMap<String, Raw>;

/// Name of the branch-ordinal variable set at every fission point.
pub const INDEX_VARIABLE: &str = "index";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub raw: Raw,
    pub variables: Variables,
}

impl Value {
    pub fn new(raw: Raw, variables: Variables) -> Self {
        Self { raw, variables }
    }

    /// A copy of this value carrying `raw` and a fresh `index`.
    ///
    /// Used at every branch point: the variable map is copied, never shared.
    pub fn branch(&self, raw: Raw, index: usize) -> Self {
        let mut variables = self.variables.clone();
        variables.insert(INDEX_VARIABLE.to_string(), Raw::Number(index as f64));
        Self { raw, variables }
    }

    pub fn variable(&self, name: &str) -> Option<&Raw> {
        self.variables.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_copies_variables_and_sets_index() {
        let mut variables = Variables::new();
        variables.insert("speed".into(), Raw::Number(2.0));
        variables.insert(INDEX_VARIABLE.into(), Raw::Number(0.0));
        let parent = Value::new(Raw::from("parent"), variables);

        let child = parent.branch(Raw::from("child"), 3);
        assert_eq!(child.variable("index"), Some(&Raw::Number(3.0)));
        assert_eq!(child.variable("speed"), Some(&Raw::Number(2.0)));
        assert_eq!(parent.variable("index"), Some(&Raw::Number(0.0)));
        assert_eq!(parent.raw, Raw::from("parent"));
    }
}
