//! Transformation AST and the description graph that forms a program.
//!
//! Every node carries an `ast_id` used for external addressing and as the
//! provenance tag written into generated keyframes and pathway points.
//! Child nodes are shared through [`Arc`] so a subtree can sit on many entry
//! stacks at once without being copied.

use crate::{Raw, Variables};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ══════════════════════════════════════════════════════════════════════════════
// Transformations
// ══════════════════════════════════════════════════════════════════════════════

/// One node of the transformation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(rename = "astId")]
    pub ast_id: String,
    #[serde(flatten)]
    pub kind: TransformationKind,
}

/// The node variants understood by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransformationKind {
    /// Prepends all children onto the remaining stack, preserving order.
    Sequential { children: Vec<Arc<Transformation>> },
    /// Splits the entry: one new entry per child.
    Parallel { children: Vec<Arc<Transformation>> },
    /// Invokes a registered operation; children are parameter expressions.
    Operation {
        identifier: String,
        children: Vec<Arc<Transformation>>,
    },
    /// Invokes a registered operation with already-resolved parameters.
    PrecomputedOperation {
        identifier: String,
        parameters: Vec<Raw>,
    },
    /// A literal.
    Raw { value: Raw },
    /// Splices in the root transformation of another noun.
    NounReference {
        #[serde(rename = "descriptionIdentifier")]
        description_identifier: String,
        #[serde(rename = "nounIdentifier")]
        noun_identifier: String,
    },
    /// Identity.
    This,
    UnaryOperator {
        operator: UnaryOperator,
        child: Arc<Transformation>,
    },
    BinaryOperator {
        operator: BinaryOperator,
        left: Arc<Transformation>,
        right: Arc<Transformation>,
    },
    If {
        condition: Arc<Transformation>,
        #[serde(rename = "then")]
        then_branch: Arc<Transformation>,
        #[serde(rename = "else")]
        else_branch: Arc<Transformation>,
    },
    /// `children[0]` is the selector; `children[i + 1]` belongs to `cases[i]`.
    Switch {
        cases: Vec<Vec<Raw>>,
        children: Vec<Arc<Transformation>>,
    },
    GetVariable { identifier: String },
    SetVariable {
        identifier: String,
        value: Arc<Transformation>,
    },
    /// Weighted deterministic choice between `children`.
    StochasticSwitch {
        probabilities: Vec<f64>,
        children: Vec<Arc<Transformation>>,
    },
}

impl Transformation {
    /// Create a shared node.
    pub fn new(ast_id: impl Into<String>, kind: TransformationKind) -> Arc<Self> {
        Arc::new(Self {
            ast_id: ast_id.into(),
            kind,
        })
    }

    /// Short name of the node variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            TransformationKind::Sequential { .. } => "sequential",
            TransformationKind::Parallel { .. } => "parallel",
            TransformationKind::Operation { .. } => "operation",
            TransformationKind::PrecomputedOperation { .. } => "precomputedOperation",
            TransformationKind::Raw { .. } => "raw",
            TransformationKind::NounReference { .. } => "nounReference",
            TransformationKind::This => "this",
            TransformationKind::UnaryOperator { .. } => "unaryOperator",
            TransformationKind::BinaryOperator { .. } => "binaryOperator",
            TransformationKind::If { .. } => "if",
            TransformationKind::Switch { .. } => "switch",
            TransformationKind::GetVariable { .. } => "getVariable",
            TransformationKind::SetVariable { .. } => "setVariable",
            TransformationKind::StochasticSwitch { .. } => "stochasticSwitch",
        }
    }

    // ── Constructors ─────────────────────────────────────────────────────

    pub fn sequential(ast_id: impl Into<String>, children: Vec<Arc<Self>>) -> Arc<Self> {
        Self::new(ast_id, TransformationKind::Sequential { children })
    }

    pub fn parallel(ast_id: impl Into<String>, children: Vec<Arc<Self>>) -> Arc<Self> {
        Self::new(ast_id, TransformationKind::Parallel { children })
    }

    pub fn operation(
        ast_id: impl Into<String>,
        identifier: impl Into<String>,
        children: Vec<Arc<Self>>,
    ) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::Operation {
                identifier: identifier.into(),
                children,
            },
        )
    }

    /// Re-enqueue form of an operation: the parameters are already literals.
    pub fn precomputed(
        ast_id: impl Into<String>,
        identifier: impl Into<String>,
        parameters: Vec<Raw>,
    ) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::PrecomputedOperation {
                identifier: identifier.into(),
                parameters,
            },
        )
    }

    pub fn raw(ast_id: impl Into<String>, value: impl Into<Raw>) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::Raw {
                value: value.into(),
            },
        )
    }

    pub fn this(ast_id: impl Into<String>) -> Arc<Self> {
        Self::new(ast_id, TransformationKind::This)
    }

    pub fn noun_reference(
        ast_id: impl Into<String>,
        description_identifier: impl Into<String>,
        noun_identifier: impl Into<String>,
    ) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::NounReference {
                description_identifier: description_identifier.into(),
                noun_identifier: noun_identifier.into(),
            },
        )
    }

    pub fn get_variable(ast_id: impl Into<String>, identifier: impl Into<String>) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::GetVariable {
                identifier: identifier.into(),
            },
        )
    }

    pub fn set_variable(
        ast_id: impl Into<String>,
        identifier: impl Into<String>,
        value: Arc<Self>,
    ) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::SetVariable {
                identifier: identifier.into(),
                value,
            },
        )
    }

    pub fn unary(ast_id: impl Into<String>, operator: UnaryOperator, child: Arc<Self>) -> Arc<Self> {
        Self::new(ast_id, TransformationKind::UnaryOperator { operator, child })
    }

    pub fn binary(
        ast_id: impl Into<String>,
        operator: BinaryOperator,
        left: Arc<Self>,
        right: Arc<Self>,
    ) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::BinaryOperator {
                operator,
                left,
                right,
            },
        )
    }

    pub fn if_else(
        ast_id: impl Into<String>,
        condition: Arc<Self>,
        then_branch: Arc<Self>,
        else_branch: Arc<Self>,
    ) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::If {
                condition,
                then_branch,
                else_branch,
            },
        )
    }

    pub fn switch(
        ast_id: impl Into<String>,
        cases: Vec<Vec<Raw>>,
        children: Vec<Arc<Self>>,
    ) -> Arc<Self> {
        Self::new(ast_id, TransformationKind::Switch { cases, children })
    }

    pub fn stochastic_switch(
        ast_id: impl Into<String>,
        probabilities: Vec<f64>,
        children: Vec<Arc<Self>>,
    ) -> Arc<Self> {
        Self::new(
            ast_id,
            TransformationKind::StochasticSwitch {
                probabilities,
                children,
            },
        )
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    #[serde(rename = "-")]
    Negate,
    #[serde(rename = "!")]
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "%")]
    Modulo,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negate => write!(f, "-"),
            Self::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::And => "&&",
            Self::Or => "||",
        };
        f.write_str(symbol)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Descriptions
// ══════════════════════════════════════════════════════════════════════════════

/// A named rule holding one root transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Noun {
    #[serde(rename = "astId")]
    pub ast_id: String,
    pub transformation: Arc<Transformation>,
}

/// A program fragment: initial variables, named rules, and the root rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    #[serde(default)]
    pub initial_variables: Variables,
    pub nouns: IndexMap<String, Noun>,
    pub root_noun_identifier: String,
}

impl Description {
    /// The root noun, if the description declares it.
    pub fn root_noun(&self) -> Option<&Noun> {
        self.nouns.get(&self.root_noun_identifier)
    }

    /// `false` when the description opted out of execution via
    /// `interprete: false`.
    pub fn is_interpreted(&self) -> bool {
        !matches!(self.initial_variables.get("interprete"), Some(Raw::Bool(false)))
    }

    /// The seed string for entries rooted at this description.
    pub fn seed(&self) -> String {
        match self.initial_variables.get("seed") {
            None | Some(Raw::Nil) => "0".to_string(),
            Some(Raw::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// The whole program: description id → description, in declaration order.
///
/// Declaration order matters: root entry ids are the ordinal of each
/// description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptions(pub IndexMap<String, Description>);

impl Descriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a program from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, identifier: impl Into<String>, description: Description) {
        self.0.insert(identifier.into(), description);
    }

    pub fn get(&self, identifier: &str) -> Option<&Description> {
        self.0.get(identifier)
    }

    /// Resolve `(description, noun)` to the noun, if both exist.
    pub fn noun(&self, description_identifier: &str, noun_identifier: &str) -> Option<&Noun> {
        self.0
            .get(description_identifier)
            .and_then(|d| d.nouns.get(noun_identifier))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Description)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
