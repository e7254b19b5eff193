//! Shape grammar interpreter for procedural building generation.
//!
//! Shapes are rewritten breadth-first: each queued shape is matched against
//! the rule set, and the first matching rule runs one probabilistically
//! chosen action. Actions split, transform or replace the shape and emit
//! model parts for the final building.
//!
//! Reference: Mueller et al. 2006 - "Procedural Modeling of Buildings"

pub mod condition;
pub mod context;
pub mod error;
pub mod functions;
pub mod rule;
pub mod shape;
pub mod value;

pub use condition::{Condition, ConditionType, OcclusionFilter, ShapeQuery};
pub use context::{GenerationContext, ModelInstance};
pub use error::GrammarError;
pub use functions::RuleFunction;
pub use rule::{Rule, RuleAction, RuleActionItem, RulePriority, RuleSet};
pub use shape::{Axis, OcclusionResult, Scope, ScopeProperty, Shape, ShapeId, ShapeStatus};
pub use value::{Operator, Value};
