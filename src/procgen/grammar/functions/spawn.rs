use serde::{Deserialize, Serialize};

use super::ShapeOperator;
use crate::procgen::grammar::context::GenerationContext;
use crate::procgen::grammar::error::GrammarError;
use crate::procgen::grammar::shape::Shape;

/// Place a named model at the target's scope and rotation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpawnModel {
    pub model: String,
}

impl SpawnModel {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl ShapeOperator for SpawnModel {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        ctx.spawn_model(&self.model, target);
        Ok(())
    }
}
