use thiserror::Error;

use super::functions::ComponentType;
use super::functions::RoofType;

/// Errors raised while evaluating a grammar.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GrammarError {
    #[error("rule for `{symbol}` has action probabilities summing to {sum}, expected a value in (0, 1]")]
    InvalidProbability { symbol: String, sum: f32 },
    #[error("action item has neither functions nor an output symbol")]
    EmptyActionItem,
    #[error("{what}: expected {expected} entries, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("repeat needs three axis flags with at least one enabled")]
    InvalidAxes,
    #[error("{component:?} index {index} is outside 1..={max}")]
    IndexOutOfRange {
        component: ComponentType,
        index: i32,
        max: usize,
    },
    #[error("{component:?} needs a three-dimensional shape")]
    FlatShape { component: ComponentType },
    #[error("symbol counts sum to {sum} but the split produced {parts} parts")]
    GroupCountMismatch { sum: usize, parts: usize },
    #[error("{0:?} roofs are not supported")]
    UnsupportedRoof(RoofType),
    #[error("condition expected a {expected} query result")]
    QueryTypeMismatch { expected: &'static str },
    #[error("condition needs a comparison value")]
    MissingComparisonValue,
    #[error("scope stack is empty")]
    EmptyScopeStack,
    #[error("derivation exceeded {0} shape evaluations")]
    EvaluationLimit(usize),
    #[error("repeat would spawn more than {0} tiles")]
    RepeatLimit(usize),
    #[error("rule set `{0}` has no axiom")]
    MissingAxiom(String),
    #[error("rule set `{0}` is not registered")]
    RuleSetNotFound(String),
}
