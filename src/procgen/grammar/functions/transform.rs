//! In-place scope transforms.

use serde::{Deserialize, Serialize};

use super::ShapeOperator;
use crate::procgen::grammar::context::GenerationContext;
use crate::procgen::grammar::error::GrammarError;
use crate::procgen::grammar::shape::Shape;
use crate::procgen::grammar::value::Value;

fn check_xyz(what: &'static str, values: &[Value]) -> Result<(), GrammarError> {
    if values.len() != 3 {
        return Err(GrammarError::LengthMismatch {
            what,
            expected: 3,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Translate the scope. Relative values scale the current position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MoveScope {
    pub values: Vec<Value>,
}

impl ShapeOperator for MoveScope {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        check_xyz("move values", &self.values)?;
        let deltas: Vec<f32> = self.values.iter().map(|v| v.compute(ctx)).collect();
        for (axis, (value, delta)) in self.values.iter().zip(deltas).enumerate() {
            let position = &mut target.scope.position[axis];
            *position += if value.relative { delta * *position } else { delta };
        }
        ctx.sync_scope(target);
        Ok(())
    }
}

/// Resize the scope. Relative values scale the current size.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScaleScope {
    pub values: Vec<Value>,
}

impl ShapeOperator for ScaleScope {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        check_xyz("scale values", &self.values)?;
        let sizes: Vec<f32> = self.values.iter().map(|v| v.compute(ctx)).collect();
        for (axis, (value, size)) in self.values.iter().zip(sizes).enumerate() {
            let current = &mut target.scope.size[axis];
            *current = if value.relative { size * *current } else { size };
        }
        ctx.sync_scope(target);
        Ok(())
    }
}

/// Set the Euler rotation in degrees. Missing axes become zero; relative
/// values scale the current angle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RotateShape {
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
    #[serde(default)]
    pub z: Option<Value>,
}

impl ShapeOperator for RotateShape {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        for (axis, value) in [&self.x, &self.y, &self.z].into_iter().enumerate() {
            let current = target.rotation[axis];
            target.rotation[axis] = match value {
                Some(v) if v.relative => v.compute(ctx) * current,
                Some(v) => v.compute(ctx),
                None => 0.0,
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::grammar::shape::{Axis, Scope, ScopeProperty};
    use bevy::math::Vec3;

    fn lot() -> Shape {
        Shape::new("Lot", Scope::new(Vec3::new(2.0, 0.0, 4.0), Vec3::new(10.0, 0.0, 8.0)))
    }

    #[test]
    fn move_and_scale_mix_absolute_and_relative() {
        let mut ctx = GenerationContext::new(0);
        let mut shape = lot();

        MoveScope {
            values: vec![Value::number(1.0), Value::number(3.0), Value::fraction(0.5)],
        }
        .execute(&mut ctx, &mut shape)
        .unwrap();
        assert_eq!(shape.scope.position, Vec3::new(3.0, 3.0, 6.0));

        ScaleScope {
            values: vec![Value::fraction(1.0), Value::number(12.0), Value::fraction(0.5)],
        }
        .execute(&mut ctx, &mut shape)
        .unwrap();
        assert_eq!(shape.scope.size, Vec3::new(10.0, 12.0, 4.0));
    }

    #[test]
    fn scale_keeps_current_scope_in_step() {
        let mut ctx = GenerationContext::new(0);
        ctx.spawn(lot());
        let mut shape = ctx.next().unwrap();

        ScaleScope {
            values: vec![Value::fraction(1.0), Value::number(9.0), Value::fraction(1.0)],
        }
        .execute(&mut ctx, &mut shape)
        .unwrap();
        assert_eq!(Value::scope(ScopeProperty::Size, Axis::Y).compute(&mut ctx), 9.0);
    }

    #[test]
    fn rotate_resets_missing_axes() {
        let mut ctx = GenerationContext::new(0);
        let mut shape = lot();
        shape.rotation = Vec3::new(10.0, 20.0, 30.0);
        RotateShape {
            y: Some(Value::number(-90.0)),
            ..Default::default()
        }
        .execute(&mut ctx, &mut shape)
        .unwrap();
        assert_eq!(shape.rotation, Vec3::new(0.0, -90.0, 0.0));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let mut ctx = GenerationContext::new(0);
        let mut shape = lot();
        let result = MoveScope {
            values: vec![Value::number(1.0)],
        }
        .execute(&mut ctx, &mut shape);
        assert_eq!(
            result,
            Err(GrammarError::LengthMismatch {
                what: "move values",
                expected: 3,
                actual: 1
            })
        );
    }
}
