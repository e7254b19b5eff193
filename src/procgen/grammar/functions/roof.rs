use serde::{Deserialize, Serialize};

use super::ShapeOperator;
use crate::procgen::grammar::context::GenerationContext;
use crate::procgen::grammar::error::GrammarError;
use crate::procgen::grammar::shape::Shape;
use crate::procgen::grammar::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoofType {
    Gambrel,
    Cone,
    Gabled,
    Hipped,
    CrossGable,
    Mansard,
}

/// Spawn a roof volume over the target's footprint. The roof height follows
/// from the pitch `angle` (degrees) and the footprint depth.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Roof {
    #[serde(rename = "type")]
    pub kind: RoofType,
    pub angle: Value,
    pub output: String,
}

impl ShapeOperator for Roof {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        if self.kind != RoofType::Hipped {
            return Err(GrammarError::UnsupportedRoof(self.kind));
        }
        let angle = self.angle.compute(ctx);
        let mut scope = target.scope.detached();
        scope.size.y = scope.size.z * angle.to_radians().tan() / 2.0;
        ctx.spawn(target.child(self.output.clone(), scope, target.rotation));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::grammar::shape::Scope;
    use bevy::math::Vec3;

    #[test]
    fn hipped_roof_height_follows_pitch() {
        let mut ctx = GenerationContext::new(0);
        let mut mass = Shape::new("Mass", Scope::new(Vec3::new(0.0, 6.0, 0.0), Vec3::new(8.0, 6.0, 6.0)));
        let roof = Roof {
            kind: RoofType::Hipped,
            angle: Value::number(45.0),
            output: "Roof".into(),
        };
        roof.execute(&mut ctx, &mut mass).unwrap();

        let spawned = &ctx.history()[0];
        assert!(spawned.has_symbol("Roof"));
        assert!((spawned.scope.size.y - 3.0).abs() < 1e-4);
        assert_eq!(spawned.scope.position, mass.scope.position);
    }

    #[test]
    fn other_roofs_are_rejected() {
        let mut ctx = GenerationContext::new(0);
        let mut mass = Shape::new("Mass", Scope::new(Vec3::ZERO, Vec3::ONE));
        let roof = Roof {
            kind: RoofType::Gabled,
            angle: Value::number(30.0),
            output: "Roof".into(),
        };
        assert_eq!(
            roof.execute(&mut ctx, &mut mass),
            Err(GrammarError::UnsupportedRoof(RoofType::Gabled))
        );
        assert!(ctx.history().is_empty());
    }
}
