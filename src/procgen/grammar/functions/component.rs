//! Component split: break a shape into its faces, edges or vertices.
//!
//! Faces are numbered 1..=6 (four sides from the front going clockwise
//! seen from above, then bottom, then top). Edges are numbered 1..=12 in
//! bottom, side, top triples per corner; vertices 1..=8 in bottom, top pairs.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{spawn_parts, Part, ShapeOperator};
use crate::procgen::grammar::context::GenerationContext;
use crate::procgen::grammar::error::GrammarError;
use crate::procgen::grammar::shape::{Scope, Shape};
use crate::procgen::grammar::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Faces,
    Edges,
    Vertices,
    Face,
    Edge,
    Vertex,
    SideFaces,
    SideFace,
    SideEdges,
    TopEdges,
    BottomEdges,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSplit {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    /// The index for single selections; per-symbol part counts otherwise.
    #[serde(default)]
    pub parameters: Vec<Value>,
    pub symbols: Vec<String>,
}

type Parts = SmallVec<[Part; 12]>;

/// Corner offsets around the footprint, as fractions of the size.
const FOOTPRINT: [Vec3; 4] = [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 0.0, 1.0), Vec3::Z];
/// Corner offsets around a flat shape.
const OUTLINE: [Vec3; 4] = [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y];

impl ComponentSplit {
    pub fn new(kind: ComponentType, parameters: Vec<Value>, symbols: Vec<String>) -> Self {
        Self {
            kind,
            parameters,
            symbols,
        }
    }

    fn single_index(&self, ctx: &mut GenerationContext, max: usize) -> Result<usize, GrammarError> {
        if self.parameters.len() != 1 {
            return Err(GrammarError::LengthMismatch {
                what: "component index parameters",
                expected: 1,
                actual: self.parameters.len(),
            });
        }
        let index = self.parameters[0].compute(ctx).round() as i32;
        if index < 1 || index as usize > max {
            return Err(GrammarError::IndexOutOfRange {
                component: self.kind,
                index,
                max,
            });
        }
        Ok(index as usize - 1)
    }

    fn require_solid(&self, shape: &Shape) -> Result<(), GrammarError> {
        if shape.scope.size.z == 0.0 {
            return Err(GrammarError::FlatShape { component: self.kind });
        }
        Ok(())
    }

    fn split(&self, ctx: &mut GenerationContext, target: &Shape) -> Result<Parts, GrammarError> {
        let flat = target.scope.size.z == 0.0;
        let parts = match self.kind {
            ComponentType::Faces => {
                self.require_solid(target)?;
                faces(target)
            }
            ComponentType::SideFaces => {
                self.require_solid(target)?;
                side_faces(target)
            }
            ComponentType::Face => {
                self.require_solid(target)?;
                let index = self.single_index(ctx, 6)?;
                faces(target).into_iter().skip(index).take(1).collect()
            }
            ComponentType::SideFace => {
                self.require_solid(target)?;
                let index = self.single_index(ctx, 4)?;
                side_faces(target).into_iter().skip(index).take(1).collect()
            }
            ComponentType::Edges if flat => outline_edges(target),
            ComponentType::Edges => edges(target),
            ComponentType::Edge => {
                let all = if flat { outline_edges(target) } else { edges(target) };
                let index = self.single_index(ctx, all.len())?;
                all.into_iter().skip(index).take(1).collect()
            }
            ComponentType::SideEdges | ComponentType::TopEdges | ComponentType::BottomEdges => {
                self.require_solid(target)?;
                let offset = match self.kind {
                    ComponentType::BottomEdges => 0,
                    ComponentType::SideEdges => 1,
                    _ => 2,
                };
                edges(target).into_iter().skip(offset).step_by(3).collect()
            }
            ComponentType::Vertices if flat => outline_vertices(target),
            ComponentType::Vertices => vertices(target),
            ComponentType::Vertex => {
                let all = if flat {
                    outline_vertices(target)
                } else {
                    vertices(target)
                };
                let index = self.single_index(ctx, all.len())?;
                all.into_iter().skip(index).take(1).collect()
            }
        };
        Ok(parts)
    }

    fn is_single_selection(&self) -> bool {
        matches!(
            self.kind,
            ComponentType::Face | ComponentType::SideFace | ComponentType::Edge | ComponentType::Vertex
        )
    }
}

impl ShapeOperator for ComponentSplit {
    fn execute(&self, ctx: &mut GenerationContext, target: &mut Shape) -> Result<(), GrammarError> {
        let parts = self.split(ctx, target)?;

        if self.is_single_selection() || self.parameters.is_empty() {
            spawn_parts(ctx, target, &parts, &self.symbols);
            return Ok(());
        }

        // Parameters give how many consecutive parts each symbol takes.
        if self.parameters.len() != self.symbols.len() {
            return Err(GrammarError::LengthMismatch {
                what: "component symbol counts",
                expected: self.symbols.len(),
                actual: self.parameters.len(),
            });
        }
        let counts: Vec<usize> = self
            .parameters
            .iter()
            .map(|p| p.compute(ctx).round().max(0.0) as usize)
            .collect();
        let sum: usize = counts.iter().sum();
        if sum != parts.len() {
            return Err(GrammarError::GroupCountMismatch {
                sum,
                parts: parts.len(),
            });
        }

        let mut parts = parts.into_iter();
        for (symbol, count) in self.symbols.iter().zip(counts) {
            for part in parts.by_ref().take(count) {
                ctx.spawn(target.child(symbol.clone(), part.scope, part.rotation));
            }
        }
        Ok(())
    }
}

fn part(position: Vec3, size: Vec3, rotation: Vec3) -> Part {
    Part {
        scope: Scope::new(position, size),
        rotation,
    }
}

fn side_faces(shape: &Shape) -> Parts {
    let s = shape.scope.size;
    (0..4)
        .map(|i| {
            let size = if i % 2 == 0 {
                Vec3::new(s.x, s.y, 0.0)
            } else {
                Vec3::new(s.z, s.y, 0.0)
            };
            part(
                shape.scope.position + FOOTPRINT[i] * s,
                size,
                shape.rotation + Vec3::new(0.0, -90.0 * i as f32, 0.0),
            )
        })
        .collect()
}

fn faces(shape: &Shape) -> Parts {
    let s = shape.scope.size;
    let p = shape.scope.position;
    let mut parts = side_faces(shape);
    parts.push(part(
        p + Vec3::Z * s,
        Vec3::new(s.x, s.z, 0.0),
        shape.rotation + Vec3::new(-90.0, 0.0, 0.0),
    ));
    parts.push(part(
        p + s,
        Vec3::new(s.x, s.z, 0.0),
        shape.rotation + Vec3::new(90.0, 180.0, 0.0),
    ));
    parts
}

fn edges(shape: &Shape) -> Parts {
    const TILT: [f32; 4] = [1.0, -1.0, -1.0, 1.0];
    let s = shape.scope.size;
    let p = shape.scope.position;
    let orientation = shape.orientation();
    let mut parts = Parts::new();

    for i in 0..4 {
        let turn = -90.0 * i as f32;
        let run = if i % 2 == 0 {
            Vec3::new(s.x, 0.0, 0.0)
        } else {
            Vec3::new(s.z, 0.0, 0.0)
        };
        let bottom = p + orientation * (FOOTPRINT[i] * s);
        let top = p + orientation * ((FOOTPRINT[i] + Vec3::Y) * s);
        let upright = if i % 2 == 0 {
            Vec3::new(0.0, turn, TILT[i] * -90.0)
        } else {
            Vec3::new(TILT[i] * -90.0, -turn, 0.0)
        };

        parts.push(part(bottom, run, shape.rotation + Vec3::new(0.0, turn, 0.0)));
        parts.push(part(bottom, Vec3::new(s.y, 0.0, 0.0), shape.rotation + upright));
        parts.push(part(top, run, shape.rotation + Vec3::new(0.0, turn, 0.0)));
    }
    parts
}

fn outline_edges(shape: &Shape) -> Parts {
    let s = shape.scope.size;
    let orientation = shape.orientation();
    (0..4)
        .map(|i| {
            let run = if i % 2 == 0 {
                Vec3::new(s.x, 0.0, 0.0)
            } else {
                Vec3::new(s.y, 0.0, 0.0)
            };
            part(
                shape.scope.position + orientation * (OUTLINE[i] * s),
                run,
                shape.rotation + Vec3::new(0.0, -90.0 * i as f32, 0.0),
            )
        })
        .collect()
}

fn vertices(shape: &Shape) -> Parts {
    let s = shape.scope.size;
    let p = shape.scope.position;
    let mut parts = Parts::new();
    for (i, corner) in FOOTPRINT.iter().enumerate() {
        let rotation = shape.rotation + Vec3::new(0.0, -90.0 * i as f32, 0.0);
        parts.push(part(p + *corner * s, Vec3::ZERO, rotation));
        parts.push(part(p + (*corner + Vec3::Y) * s, Vec3::ZERO, rotation));
    }
    parts
}

fn outline_vertices(shape: &Shape) -> Parts {
    let s = shape.scope.size;
    let orientation = shape.orientation();
    OUTLINE
        .iter()
        .map(|corner| {
            part(
                shape.scope.position + orientation * (*corner * s),
                Vec3::ZERO,
                shape.rotation,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid() -> Shape {
        Shape::new("Mass", Scope::new(Vec3::new(1.0, 0.0, 2.0), Vec3::new(4.0, 3.0, 2.0)))
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn corners(shape: &Shape) -> [Vec3; 4] {
        let q = shape.orientation();
        let s = shape.scope.size;
        let p = shape.scope.position;
        [
            p,
            p + q * Vec3::new(s.x, 0.0, 0.0),
            p + q * Vec3::new(s.x, s.y, 0.0),
            p + q * Vec3::new(0.0, s.y, 0.0),
        ]
    }

    #[test]
    fn faces_cover_the_box_surface() {
        let mut ctx = GenerationContext::new(0);
        let mut target = solid();
        let split = ComponentSplit::new(ComponentType::Faces, vec![], symbols(&["Face"]));
        split.execute(&mut ctx, &mut target).unwrap();

        let faces = ctx.history();
        assert_eq!(faces.len(), 6);
        let area: f32 = faces.iter().map(|f| f.scope.size.x * f.scope.size.y).sum();
        assert!((area - 2.0 * (4.0 * 3.0 + 3.0 * 2.0 + 4.0 * 2.0)).abs() < 1e-4);

        // Every face corner lies on the box boundary.
        let min = Vec3::new(1.0, 0.0, 2.0);
        let max = min + Vec3::new(4.0, 3.0, 2.0);
        for face in faces {
            for c in corners(face) {
                assert!(c.cmpge(min - 1e-4).all() && c.cmple(max + 1e-4).all(), "{c:?}");
                let on_boundary = (0..3).any(|a| (c[a] - min[a]).abs() < 1e-4 || (c[a] - max[a]).abs() < 1e-4);
                assert!(on_boundary);
            }
        }
        // Only the front face is visible from the default viewpoint.
        assert_eq!(faces.iter().filter(|f| f.rotation == Vec3::ZERO).count(), 1);
    }

    #[test]
    fn symbol_counts_assign_consecutive_faces() {
        let mut ctx = GenerationContext::new(0);
        let mut target = solid();
        let split = ComponentSplit::new(
            ComponentType::Faces,
            vec![Value::number(4.0), Value::number(1.0), Value::number(1.0)],
            symbols(&["Facade", "Floor", "Top"]),
        );
        split.execute(&mut ctx, &mut target).unwrap();

        let names: Vec<_> = ctx.history().iter().filter_map(|s| s.symbol.clone()).collect();
        assert_eq!(names, symbols(&["Facade", "Facade", "Facade", "Facade", "Floor", "Top"]));

        let bad = ComponentSplit::new(
            ComponentType::Faces,
            vec![Value::number(4.0), Value::number(1.0)],
            symbols(&["Facade", "Floor"]),
        );
        assert_eq!(
            bad.execute(&mut ctx, &mut target),
            Err(GrammarError::GroupCountMismatch { sum: 5, parts: 6 })
        );
    }

    #[test]
    fn single_selection_checks_index() {
        let mut ctx = GenerationContext::new(0);
        let mut target = solid();
        let top = ComponentSplit::new(ComponentType::Face, vec![Value::number(6.0)], symbols(&["Top"]));
        top.execute(&mut ctx, &mut target).unwrap();
        assert_eq!(ctx.history().len(), 1);
        assert_eq!(ctx.history()[0].scope.position, Vec3::new(5.0, 3.0, 4.0));

        let out_of_range = ComponentSplit::new(ComponentType::SideFace, vec![Value::number(5.0)], symbols(&["X"]));
        assert!(matches!(
            out_of_range.execute(&mut ctx, &mut target),
            Err(GrammarError::IndexOutOfRange { index: 5, max: 4, .. })
        ));
    }

    #[test]
    fn flat_shapes_have_no_faces() {
        let mut ctx = GenerationContext::new(0);
        let mut facade = Shape::new("Facade", Scope::new(Vec3::ZERO, Vec3::new(4.0, 3.0, 0.0)));
        let faces = ComponentSplit::new(ComponentType::Faces, vec![], symbols(&["F"]));
        assert_eq!(
            faces.execute(&mut ctx, &mut facade),
            Err(GrammarError::FlatShape { component: ComponentType::Faces })
        );

        let edges = ComponentSplit::new(ComponentType::Edges, vec![], symbols(&["E"]));
        edges.execute(&mut ctx, &mut facade).unwrap();
        assert_eq!(ctx.history().len(), 4);
        let vertices = ComponentSplit::new(ComponentType::Vertices, vec![], symbols(&["V"]));
        vertices.execute(&mut ctx, &mut facade).unwrap();
        assert_eq!(ctx.history().len(), 8);
    }

    #[test]
    fn edge_groups_select_every_third_edge() {
        let mut ctx = GenerationContext::new(0);
        let mut target = solid();
        ComponentSplit::new(ComponentType::Edges, vec![], symbols(&["E"]))
            .execute(&mut ctx, &mut target)
            .unwrap();
        assert_eq!(ctx.history().len(), 12);

        ctx.clear();
        ComponentSplit::new(ComponentType::SideEdges, vec![], symbols(&["Pillar"]))
            .execute(&mut ctx, &mut target)
            .unwrap();
        let pillars = ctx.history();
        assert_eq!(pillars.len(), 4);
        assert!(pillars.iter().all(|p| p.scope.size == Vec3::new(3.0, 0.0, 0.0)));

        ctx.clear();
        ComponentSplit::new(ComponentType::Vertices, vec![], symbols(&["V"]))
            .execute(&mut ctx, &mut target)
            .unwrap();
        assert_eq!(ctx.history().len(), 8);
        assert_eq!(ctx.history()[1].scope.position, Vec3::new(1.0, 3.0, 2.0));
    }
}
