//! Numeric expressions evaluated against the generation context.

use serde::{Deserialize, Serialize};

use super::context::GenerationContext;
use super::shape::{Axis, OcclusionResult, ScopeProperty};

/// An expression plus the relative flag. Relative values are interpreted by
/// the consuming function: a fraction of the remaining extent in splits, a
/// multiplier of the current value in scope transforms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Value {
    #[serde(flatten)]
    pub expr: Expr,
    #[serde(default)]
    pub relative: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Number {
        value: f32,
    },
    Operation {
        operator: Operator,
        lhs: Box<Value>,
        rhs: Box<Value>,
    },
    /// Uniform in `[min, max]`.
    Random {
        min: Box<Value>,
        max: Box<Value>,
    },
    /// Reads the scope of the shape under evaluation.
    Scope {
        property: ScopeProperty,
        axis: Axis,
    },
    /// Literal occlusion code, for comparing against occlusion queries.
    Occlusion {
        result: OcclusionResult,
    },
}

impl Value {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            relative: false,
        }
    }

    pub fn number(value: f32) -> Self {
        Self::new(Expr::Number { value })
    }

    /// Relative number.
    pub fn fraction(value: f32) -> Self {
        Self::number(value).relative()
    }

    pub fn random(min: f32, max: f32) -> Self {
        Self::new(Expr::Random {
            min: Box::new(Self::number(min)),
            max: Box::new(Self::number(max)),
        })
    }

    pub fn scope(property: ScopeProperty, axis: Axis) -> Self {
        Self::new(Expr::Scope { property, axis })
    }

    pub fn operation(operator: Operator, lhs: Value, rhs: Value) -> Self {
        Self::new(Expr::Operation {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn occlusion(result: OcclusionResult) -> Self {
        Self::new(Expr::Occlusion { result })
    }

    pub fn relative(mut self) -> Self {
        self.relative = true;
        self
    }

    pub fn compute(&self, ctx: &mut GenerationContext) -> f32 {
        match &self.expr {
            Expr::Number { value } => *value,
            Expr::Operation { operator, lhs, rhs } => {
                let a = lhs.compute(ctx);
                let b = rhs.compute(ctx);
                match operator {
                    Operator::Add => a + b,
                    Operator::Subtract => a - b,
                    Operator::Multiply => a * b,
                    Operator::Divide => a / b,
                    Operator::Power => a.powf(b),
                }
            }
            Expr::Random { min, max } => {
                let min = min.compute(ctx);
                let max = max.compute(ctx);
                ctx.random_range(min, max)
            }
            Expr::Scope { property, axis } => ctx.current_scope().get(*property, *axis),
            Expr::Occlusion { result } => result.code(),
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::grammar::shape::{Scope, Shape};
    use bevy::math::Vec3;

    #[test]
    fn operations_compose() {
        let mut ctx = GenerationContext::new(0);
        let v = Value::operation(
            Operator::Add,
            Value::number(2.0),
            Value::operation(Operator::Power, Value::number(3.0), Value::number(2.0)),
        );
        assert_eq!(v.compute(&mut ctx), 11.0);
        let d = Value::operation(Operator::Divide, Value::number(1.0), Value::number(4.0));
        assert_eq!(d.compute(&mut ctx), 0.25);
    }

    #[test]
    fn scope_values_read_current_shape() {
        let mut ctx = GenerationContext::new(0);
        ctx.spawn(Shape::new("Lot", Scope::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(10.0, 0.0, 8.0))));
        let _shape = ctx.next();
        assert_eq!(Value::scope(ScopeProperty::Size, Axis::Z).compute(&mut ctx), 8.0);
        assert_eq!(Value::scope(ScopeProperty::Position, Axis::Y).compute(&mut ctx), 2.0);
    }

    #[test]
    fn random_stays_in_range() {
        let mut ctx = GenerationContext::new(11);
        let v = Value::random(3.0, 6.0);
        for _ in 0..50 {
            let x = v.compute(&mut ctx);
            assert!((3.0..=6.0).contains(&x));
        }
    }

    #[test]
    fn random_over_division_by_zero_keeps_finite_bound() {
        let mut ctx = GenerationContext::new(11);
        let v = Value::new(Expr::Random {
            min: Box::new(Value::number(2.0)),
            max: Box::new(Value::operation(Operator::Divide, Value::number(1.0), Value::number(0.0))),
        });
        assert_eq!(v.compute(&mut ctx), 2.0);
    }

    #[test]
    fn parses_from_json() {
        let v: Value = serde_json::from_str(r#"{"kind":"number","value":0.5,"relative":true}"#).unwrap();
        assert_eq!(v, Value::fraction(0.5));
        let occ: Value = serde_json::from_str(r#"{"kind":"occlusion","result":"none"}"#).unwrap();
        assert_eq!(occ.compute(&mut GenerationContext::new(0)), 2.0);
    }
}
