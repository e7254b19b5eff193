//! Rule guards: a query about the target shape compared against a value.

use serde::{Deserialize, Serialize};

use super::context::GenerationContext;
use super::error::GrammarError;
use super::shape::{OcclusionResult, Shape, ShapeStatus};
use super::value::Value;

/// Which history shapes an occlusion query tests against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OcclusionFilter {
    /// Every other shape.
    All,
    /// Every shape outside the target's own lineage.
    NoParent,
    /// Shapes still waiting to be evaluated.
    Active,
    /// Shapes with this symbol.
    Symbol(String),
}

impl From<String> for OcclusionFilter {
    fn from(s: String) -> Self {
        match s.as_str() {
            "all" => OcclusionFilter::All,
            "noparent" => OcclusionFilter::NoParent,
            "active" => OcclusionFilter::Active,
            _ => OcclusionFilter::Symbol(s),
        }
    }
}

impl From<OcclusionFilter> for String {
    fn from(filter: OcclusionFilter) -> Self {
        match filter {
            OcclusionFilter::All => "all".into(),
            OcclusionFilter::NoParent => "noparent".into(),
            OcclusionFilter::Active => "active".into(),
            OcclusionFilter::Symbol(s) => s,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum ShapeQuery {
    /// Flat, front-facing shape at depth zero.
    Visible,
    /// Occlusion code of the first overlapping shape, `None` (2) if no
    /// shape overlaps.
    Occlusion { filter: OcclusionFilter },
    /// Empty for the root shape of a derivation.
    Parent,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QueryValue {
    Number(f32),
    Bool(bool),
}

impl ShapeQuery {
    pub fn compute(&self, ctx: &GenerationContext, target: &Shape) -> Option<QueryValue> {
        match self {
            ShapeQuery::Visible => Some(QueryValue::Bool(target.is_visible())),
            ShapeQuery::Occlusion { filter } => Some(QueryValue::Number(occlusion(ctx, target, filter).code())),
            ShapeQuery::Parent => target.parent.map(|id| QueryValue::Number(id.0 as f32)),
        }
    }
}

/// First non-empty overlap between `target` and the filtered history.
pub fn occlusion(ctx: &GenerationContext, target: &Shape, filter: &OcclusionFilter) -> OcclusionResult {
    ctx.history()
        .iter()
        .filter(|other| other.id != target.id)
        .filter(|other| match filter {
            OcclusionFilter::All => true,
            OcclusionFilter::NoParent => other.id.map_or(true, |id| !ctx.is_lineage(target, id)),
            OcclusionFilter::Active => other.status == ShapeStatus::Active,
            OcclusionFilter::Symbol(symbol) => other.has_symbol(symbol),
        })
        .map(|other| other.occludes(target))
        .find(|result| *result != OcclusionResult::None)
        .unwrap_or(OcclusionResult::None)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    True,
    False,
    Empty,
    NotEmpty,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(flatten)]
    pub query: ShapeQuery,
    #[serde(rename = "type")]
    pub kind: ConditionType,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Condition {
    pub fn new(query: ShapeQuery, kind: ConditionType, value: Option<Value>) -> Self {
        Self { query, kind, value }
    }

    pub fn evaluate(&self, ctx: &mut GenerationContext, target: &Shape) -> Result<bool, GrammarError> {
        let result = self.query.compute(ctx, target);
        match self.kind {
            ConditionType::Empty => return Ok(result.is_none()),
            ConditionType::NotEmpty => return Ok(result.is_some()),
            ConditionType::True | ConditionType::False => {
                let Some(QueryValue::Bool(b)) = result else {
                    return Err(GrammarError::QueryTypeMismatch { expected: "boolean" });
                };
                return Ok(b == (self.kind == ConditionType::True));
            }
            _ => {}
        }

        let Some(QueryValue::Number(lhs)) = result else {
            return Err(GrammarError::QueryTypeMismatch { expected: "numeric" });
        };
        let rhs = self
            .value
            .as_ref()
            .ok_or(GrammarError::MissingComparisonValue)?
            .compute(ctx);

        Ok(match self.kind {
            ConditionType::Equal => lhs == rhs,
            ConditionType::NotEqual => lhs != rhs,
            ConditionType::GreaterThan => lhs > rhs,
            ConditionType::LessThan => lhs < rhs,
            ConditionType::GreaterThanOrEqual => lhs >= rhs,
            ConditionType::LessThanOrEqual => lhs <= rhs,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::grammar::shape::Scope;
    use bevy::math::Vec3;

    fn unit_box(symbol: &str) -> Shape {
        Shape::new(symbol, Scope::new(Vec3::ZERO, Vec3::ONE))
    }

    #[test]
    fn identical_boxes_fully_occlude_each_other() {
        let mut ctx = GenerationContext::new(0);
        let a = ctx.spawn(unit_box("A"));
        ctx.spawn(unit_box("B"));

        let target = ctx.shape(a).unwrap().clone();
        assert_eq!(occlusion(&ctx, &target, &OcclusionFilter::All), OcclusionResult::Full);
        assert_eq!(
            occlusion(&ctx, &target, &OcclusionFilter::Symbol("C".into())),
            OcclusionResult::None
        );
    }

    #[test]
    fn noparent_ignores_own_lineage() {
        let mut ctx = GenerationContext::new(0);
        let mass = ctx.spawn(unit_box("Mass"));
        let mut window = Shape::new("Window", Scope::new(Vec3::splat(0.25), Vec3::splat(0.5)));
        window.parent = Some(mass);
        let window_id = ctx.spawn(window);
        let target = ctx.shape(window_id).unwrap().clone();

        assert_eq!(occlusion(&ctx, &target, &OcclusionFilter::All), OcclusionResult::Full);
        assert_eq!(occlusion(&ctx, &target, &OcclusionFilter::NoParent), OcclusionResult::None);
    }

    #[test]
    fn conditions_compare_queries() {
        let mut ctx = GenerationContext::new(0);
        ctx.spawn(unit_box("A"));
        let target = unit_box("B");

        let occluded = Condition::new(
            ShapeQuery::Occlusion { filter: OcclusionFilter::All },
            ConditionType::Equal,
            Some(Value::occlusion(OcclusionResult::Full)),
        );
        assert_eq!(occluded.evaluate(&mut ctx, &target), Ok(true));

        let visible = Condition::new(ShapeQuery::Visible, ConditionType::False, None);
        assert_eq!(visible.evaluate(&mut ctx, &target), Ok(true));

        let root = Condition::new(ShapeQuery::Parent, ConditionType::Empty, None);
        assert_eq!(root.evaluate(&mut ctx, &target), Ok(true));

        let mismatched = Condition::new(ShapeQuery::Visible, ConditionType::LessThan, Some(Value::number(1.0)));
        assert_eq!(
            mismatched.evaluate(&mut ctx, &target),
            Err(GrammarError::QueryTypeMismatch { expected: "numeric" })
        );
    }

    #[test]
    fn parses_from_json() {
        let c: Condition = serde_json::from_str(
            r#"{"query":"occlusion","filter":"noparent","type":"equal","value":{"kind":"occlusion","result":"none"}}"#,
        )
        .unwrap();
        assert_eq!(c.query, ShapeQuery::Occlusion { filter: OcclusionFilter::NoParent });
        assert_eq!(c.kind, ConditionType::Equal);
    }
}
