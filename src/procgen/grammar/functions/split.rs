//! Subdivide and repeat splits along the shape's local axes.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{spawn_parts, Part, ShapeOperator};
use crate::procgen::grammar::context::GenerationContext;
use crate::procgen::grammar::error::GrammarError;
use crate::procgen::grammar::rule::RuleActionItem;
use crate::procgen::grammar::shape::{Axis, Scope, Shape};
use crate::procgen::grammar::value::Value;

/// Upper bound on tiles one repeat may spawn.
pub const MAX_REPEAT_TILES: usize = 100_000;

/// Resolve slot sizes along an extent. Relative slots share what the
/// absolute slots leave over, in proportion to their values.
pub(crate) fn slot_sizes(slots: &[(f32, bool)], extent: f32) -> Vec<f32> {
    let absolute: f32 = slots.iter().filter(|(_, rel)| !rel).map(|(v, _)| v).sum();
    let relative: f32 = slots.iter().filter(|(_, rel)| *rel).map(|(v, _)| v).sum();
    let remaining = extent - absolute;

    slots
        .iter()
        .map(|&(value, rel)| match rel {
            false => value,
            true if relative == 0.0 => 0.0,
            true => value * remaining / relative,
        })
        .collect()
}

fn compute_slots(ctx: &mut GenerationContext, values: &[Value]) -> Vec<(f32, bool)> {
    values.iter().map(|v| (v.compute(ctx), v.relative)).collect()
}

/// Cut the scope into consecutive slots along one axis. Each slot runs its
/// action item on an unnamed carrier shape; empty slots are skipped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subdivide {
    pub axis: Axis,
    pub values: Vec<Value>,
    pub items: Vec<Option<RuleActionItem>>,
}

impl ShapeOperator for Subdivide {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        if self.values.len() != self.items.len() {
            return Err(GrammarError::LengthMismatch {
                what: "subdivide slots",
                expected: self.values.len(),
                actual: self.items.len(),
            });
        }

        let slots = compute_slots(ctx, &self.values);
        let extent = target.scope.size[self.axis.index()];
        let direction = target.orientation() * self.axis.unit();

        let mut offset = 0.0;
        for (size, item) in slot_sizes(&slots, extent).into_iter().zip(&self.items) {
            if let Some(item) = item {
                let mut scope = target.scope.detached();
                scope.position += direction * offset;
                scope.size[self.axis.index()] = size;
                let mut carrier = Shape::carrier(scope, target.rotation, target.lineage_parent());
                item.run(ctx, &mut carrier)?;
            }
            offset += size;
        }
        Ok(())
    }
}

/// Tile the scope with as many copies as fit along each enabled axis,
/// stretching tiles so they fill the extent exactly. Every tile spawns one
/// shape per symbol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Repeat {
    /// X, Y, Z flags.
    pub axes: Vec<bool>,
    /// Tile size for each enabled axis, in X, Y, Z order.
    pub values: Vec<Value>,
    pub symbols: Vec<String>,
}

impl Repeat {
    /// Tile counts and tile size per axis.
    fn tiling(&self, ctx: &mut GenerationContext, size: Vec3) -> Result<([usize; 3], Vec3), GrammarError> {
        if self.values.len() != self.symbols.len() {
            return Err(GrammarError::LengthMismatch {
                what: "repeat symbols",
                expected: self.values.len(),
                actual: self.symbols.len(),
            });
        }
        if self.axes.len() != 3 || !self.axes.iter().any(|a| *a) {
            return Err(GrammarError::InvalidAxes);
        }
        let enabled = self.axes.iter().filter(|a| **a).count();
        if enabled != self.values.len() {
            return Err(GrammarError::LengthMismatch {
                what: "repeat values",
                expected: enabled,
                actual: self.values.len(),
            });
        }

        let slots = compute_slots(ctx, &self.values);
        let mut counts = [1usize; 3];
        let mut tile = size;
        let mut slot = 0;
        for axis in Axis::ALL {
            if !self.axes[axis.index()] {
                continue;
            }
            let extent = size[axis.index()];
            let spacing = slot_sizes(&slots, extent)[slot];
            slot += 1;
            let count = if spacing > 0.0 {
                (extent / spacing).ceil().max(1.0)
            } else {
                1.0
            };
            if !count.is_finite() || count > MAX_REPEAT_TILES as f32 {
                return Err(GrammarError::RepeatLimit(MAX_REPEAT_TILES));
            }
            let count = count as usize;
            counts[axis.index()] = count;
            tile[axis.index()] = extent / count as f32;
        }
        let total = counts.iter().try_fold(1usize, |acc, c| acc.checked_mul(*c));
        if total.map_or(true, |t| t > MAX_REPEAT_TILES) {
            return Err(GrammarError::RepeatLimit(MAX_REPEAT_TILES));
        }
        Ok((counts, tile))
    }
}

impl ShapeOperator for Repeat {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        let (counts, tile) = self.tiling(ctx, target.scope.size)?;
        let orientation = target.orientation();

        let mut parts = Vec::with_capacity(counts.iter().product());
        for y in 0..counts[1] {
            for x in 0..counts[0] {
                for z in 0..counts[2] {
                    let local = Vec3::new(x as f32, y as f32, z as f32) * tile;
                    parts.push(Part {
                        scope: Scope::new(target.scope.position + orientation * local, tile),
                        rotation: target.rotation,
                    });
                }
            }
        }
        spawn_parts(ctx, target, &parts, &self.symbols);
        Ok(())
    }
}
