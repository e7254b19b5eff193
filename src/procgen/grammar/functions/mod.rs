//! Shape operations fired by rule actions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::context::GenerationContext;
use super::error::GrammarError;
use super::shape::{Scope, Shape};
use bevy::math::Vec3;

mod component;
mod roof;
mod spawn;
mod split;
mod transform;

pub use component::{ComponentSplit, ComponentType};
pub use roof::{Roof, RoofType};
pub use spawn::SpawnModel;
pub use split::{Repeat, Subdivide};
pub use transform::{MoveScope, RotateShape, ScaleScope};

/// An operation on the target shape. Operations may mutate the target in
/// place or spawn new shapes into the context.
pub trait ShapeOperator: fmt::Debug + Send + Sync {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "snake_case")]
pub enum RuleFunction {
    Component(ComponentSplit),
    Repeat(Repeat),
    Subdivide(Subdivide),
    MoveScope(MoveScope),
    ScaleScope(ScaleScope),
    RotateShape(RotateShape),
    /// Push the target's scope onto its save stack.
    SaveScope,
    /// Pop the target's scope from its save stack.
    RestoreScope,
    Roof(Roof),
    SpawnModel(SpawnModel),
    /// Operation supplied in code.
    #[serde(skip)]
    Custom(Arc<dyn ShapeOperator>),
}

impl RuleFunction {
    pub fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        match self {
            RuleFunction::Component(f) => f.execute(ctx, target),
            RuleFunction::Repeat(f) => f.execute(ctx, target),
            RuleFunction::Subdivide(f) => f.execute(ctx, target),
            RuleFunction::MoveScope(f) => f.execute(ctx, target),
            RuleFunction::ScaleScope(f) => f.execute(ctx, target),
            RuleFunction::RotateShape(f) => f.execute(ctx, target),
            RuleFunction::SaveScope => {
                target.scope.save();
                Ok(())
            }
            RuleFunction::RestoreScope => {
                target.scope.restore()?;
                ctx.sync_scope(target);
                Ok(())
            }
            RuleFunction::Roof(f) => f.execute(ctx, target),
            RuleFunction::SpawnModel(f) => f.execute(ctx, target),
            RuleFunction::Custom(f) => f.execute(ctx, target),
        }
    }
}

/// Scope and rotation of one piece produced by a split.
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub scope: Scope,
    pub rotation: Vec3,
}

/// Spawn one shape per symbol for every part.
pub(crate) fn spawn_parts(ctx: &mut GenerationContext, target: &Shape, parts: &[Part], symbols: &[String]) {
    for part in parts {
        for symbol in symbols {
            ctx.spawn(target.child(symbol.clone(), part.scope.clone(), part.rotation));
        }
    }
}
