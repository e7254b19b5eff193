//! Shapes and their scopes.
//!
//! A scope is an oriented box: `position` is one corner and `size` the
//! extent along the shape's local axes. Local axes come from the shape's
//! Euler rotation (degrees, applied Z then X then Y). A shape with
//! `size.z == 0` is flat, such as a facade or a roof face.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::GrammarError;
use crate::procgen::geometry::approximately;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeProperty {
    Position,
    Size,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub position: Vec3,
    pub size: Vec3,
    #[serde(skip)]
    saved: Vec<(Vec3, Vec3)>,
}

impl Scope {
    pub fn new(position: Vec3, size: Vec3) -> Self {
        Self {
            position,
            size,
            saved: Vec::new(),
        }
    }

    pub fn get(&self, property: ScopeProperty, axis: Axis) -> f32 {
        match property {
            ScopeProperty::Position => self.position[axis.index()],
            ScopeProperty::Size => self.size[axis.index()],
        }
    }

    /// Push the current position and size.
    pub fn save(&mut self) {
        self.saved.push((self.position, self.size));
    }

    /// Pop the last saved position and size.
    pub fn restore(&mut self) -> Result<(), GrammarError> {
        let (position, size) = self.saved.pop().ok_or(GrammarError::EmptyScopeStack)?;
        self.position = position;
        self.size = size;
        Ok(())
    }

    pub fn saved_depth(&self) -> usize {
        self.saved.len()
    }

    /// Fresh copy of position and size without the save stack.
    pub fn detached(&self) -> Self {
        Self::new(self.position, self.size)
    }

    fn interval(&self, axis: Axis) -> (f32, f32) {
        let a = self.position[axis.index()];
        let b = a + self.size[axis.index()];
        (a.min(b), a.max(b))
    }
}

/// Index of a shape in the generation history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShapeStatus {
    /// Queued, not yet evaluated.
    #[default]
    Active,
    /// A rule fired on it.
    Evaluated,
    /// No rule matched; part of the final building.
    Terminal,
}

/// How much one shape's volume covers another's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcclusionResult {
    Full,
    Partial,
    None,
}

impl OcclusionResult {
    /// Numeric form used by grammar conditions.
    pub fn code(self) -> f32 {
        match self {
            OcclusionResult::Full => 0.0,
            OcclusionResult::Partial => 1.0,
            OcclusionResult::None => 2.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Grammar symbol; `None` marks a temporary carrier used by splits.
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub scope: Scope,
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(skip)]
    pub parent: Option<ShapeId>,
    #[serde(skip)]
    pub id: Option<ShapeId>,
    #[serde(skip)]
    pub status: ShapeStatus,
}

impl Shape {
    pub fn new(symbol: impl Into<String>, scope: Scope) -> Self {
        Self {
            symbol: Some(symbol.into()),
            scope,
            ..Default::default()
        }
    }

    /// Unnamed shape carrying a scope between split functions.
    pub fn carrier(scope: Scope, rotation: Vec3, parent: Option<ShapeId>) -> Self {
        Self {
            symbol: None,
            scope,
            rotation,
            parent,
            ..Default::default()
        }
    }

    /// New named shape with `scope` and `rotation` whose parent is this
    /// shape, or this shape's parent when this is a carrier.
    pub fn child(&self, symbol: impl Into<String>, scope: Scope, rotation: Vec3) -> Self {
        Self {
            symbol: Some(symbol.into()),
            scope,
            rotation,
            parent: self.lineage_parent(),
            ..Default::default()
        }
    }

    /// Parent recorded for shapes derived from this one. Carriers never
    /// enter the history, so they hand down their own parent.
    pub fn lineage_parent(&self) -> Option<ShapeId> {
        match self.symbol {
            Some(_) => self.id.or(self.parent),
            None => self.parent,
        }
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbol.as_deref() == Some(symbol)
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
            self.rotation.z.to_radians(),
        )
    }

    /// A flat shape at depth zero facing straight ahead.
    pub fn is_visible(&self) -> bool {
        let facing = (self.orientation() * Vec3::Z).normalize().dot(Vec3::Z);
        approximately(facing, 1.0) && self.scope.position.z == 0.0 && self.scope.size.z == 0.0
    }

    /// Occlusion of `target` by this shape's axis-aligned volume: `Full`
    /// when the target lies inside it on every axis.
    pub fn occludes(&self, target: &Shape) -> OcclusionResult {
        let mut contained = true;
        for axis in Axis::ALL {
            let (a1, a2) = self.scope.interval(axis);
            let (b1, b2) = target.scope.interval(axis);
            if a1 >= b2 || b1 >= a2 {
                return OcclusionResult::None;
            }
            contained &= a1 <= b1 && b2 <= a2;
        }
        if contained {
            OcclusionResult::Full
        } else {
            OcclusionResult::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(position: Vec3, size: Vec3) -> Shape {
        Shape::new("Box", Scope::new(position, size))
    }

    #[test]
    fn identical_volumes_fully_occlude() {
        let a = boxed(Vec3::ZERO, Vec3::splat(2.0));
        let b = boxed(Vec3::ZERO, Vec3::splat(2.0));
        assert_eq!(a.occludes(&b), OcclusionResult::Full);
        assert_eq!(b.occludes(&a), OcclusionResult::Full);
    }

    #[test]
    fn partial_and_disjoint_volumes() {
        let a = boxed(Vec3::ZERO, Vec3::splat(2.0));
        let shifted = boxed(Vec3::new(1.0, 0.0, 0.0), Vec3::splat(2.0));
        let touching = boxed(Vec3::new(2.0, 0.0, 0.0), Vec3::splat(2.0));
        assert_eq!(a.occludes(&shifted), OcclusionResult::Partial);
        assert_eq!(a.occludes(&touching), OcclusionResult::None);
        assert_eq!(OcclusionResult::None.code(), 2.0);
    }

    #[test]
    fn visibility_needs_flat_front_facing_shape() {
        let mut facade = boxed(Vec3::new(1.0, 0.0, 0.0), Vec3::new(4.0, 3.0, 0.0));
        assert!(facade.is_visible());
        facade.rotation = Vec3::new(0.0, -90.0, 0.0);
        assert!(!facade.is_visible());
        let solid = boxed(Vec3::ZERO, Vec3::ONE);
        assert!(!solid.is_visible());
    }

    #[test]
    fn scope_save_and_restore() {
        let mut scope = Scope::new(Vec3::ZERO, Vec3::ONE);
        scope.save();
        scope.position = Vec3::splat(5.0);
        scope.size = Vec3::splat(2.0);
        assert_eq!(scope.saved_depth(), 1);
        scope.restore().unwrap();
        assert_eq!(scope, Scope::new(Vec3::ZERO, Vec3::ONE));
        assert_eq!(scope.restore(), Err(GrammarError::EmptyScopeStack));
    }

    #[test]
    fn carriers_hand_down_their_parent() {
        let mut named = boxed(Vec3::ZERO, Vec3::ONE);
        named.id = Some(ShapeId(3));
        named.parent = Some(ShapeId(1));
        assert_eq!(named.lineage_parent(), Some(ShapeId(3)));

        let carrier = Shape::carrier(Scope::default(), Vec3::ZERO, Some(ShapeId(3)));
        let child = carrier.child("Window", Scope::default(), Vec3::ZERO);
        assert_eq!(child.parent, Some(ShapeId(3)));
    }
}
