//! Mutable state of one grammar derivation.

use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;

use super::shape::{Scope, Shape, ShapeId, ShapeStatus};

/// A placed model part, ready for upload as instance data.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ModelInstance {
    pub position: [f32; 3],
    /// Index into the model name table of the building.
    pub model: u32,
    pub size: [f32; 3],
    pub rotation: [f32; 3],
}

/// The shape history, the evaluation queue, and the model parts spawned so
/// far. Shapes are addressed by [`ShapeId`] and never removed during a run.
pub struct GenerationContext {
    shapes: Vec<Shape>,
    queue: VecDeque<ShapeId>,
    current: Option<ShapeId>,
    current_scope: Scope,
    rng: StdRng,
    model_names: Vec<String>,
    instances: Vec<ModelInstance>,
    evaluations: usize,
}

impl GenerationContext {
    pub fn new(seed: u64) -> Self {
        Self {
            shapes: Vec::new(),
            queue: VecDeque::new(),
            current: None,
            current_scope: Scope::default(),
            rng: StdRng::seed_from_u64(seed),
            model_names: Vec::new(),
            instances: Vec::new(),
            evaluations: 0,
        }
    }

    /// Forget every shape and model part. The random stream continues.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.queue.clear();
        self.current = None;
        self.current_scope = Scope::default();
        self.model_names.clear();
        self.instances.clear();
        self.evaluations = 0;
    }

    /// Record a shape in the history and queue it for evaluation.
    pub fn spawn(&mut self, mut shape: Shape) -> ShapeId {
        let id = ShapeId(self.shapes.len() as u32);
        shape.id = Some(id);
        shape.status = ShapeStatus::Active;
        trace!("spawn {:?} {:?}", id, shape.symbol);
        self.shapes.push(shape);
        self.queue.push_back(id);
        id
    }

    /// Take the next shape to evaluate and make it current.
    pub fn next(&mut self) -> Option<Shape> {
        let id = self.queue.pop_front()?;
        let shape = self.shapes.get(id.0 as usize)?.clone();
        self.current = Some(id);
        self.current_scope = shape.scope.clone();
        self.evaluations += 1;
        Some(shape)
    }

    /// Store the evaluated shape back into the history.
    pub fn finish(&mut self, mut shape: Shape, status: ShapeStatus) {
        shape.status = status;
        if let Some(slot) = shape.id.and_then(|id| self.shapes.get_mut(id.0 as usize)) {
            *slot = shape;
        }
        self.current = None;
    }

    /// Keep the scope seen by scope-reading values in step with the shape
    /// under evaluation.
    pub fn sync_scope(&mut self, shape: &Shape) {
        if shape.id.is_some() && shape.id == self.current {
            self.current_scope = shape.scope.clone();
        }
    }

    pub fn current_scope(&self) -> &Scope {
        &self.current_scope
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.0 as usize)
    }

    /// Every shape spawned in this run, in spawn order.
    pub fn history(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of shapes taken off the queue.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Whether `ancestor` is `shape` itself or one of its parents.
    pub fn is_lineage(&self, shape: &Shape, ancestor: ShapeId) -> bool {
        if shape.id == Some(ancestor) {
            return true;
        }
        let mut next = shape.parent;
        while let Some(id) = next {
            if id == ancestor {
                return true;
            }
            next = self.shape(id).and_then(|s| s.parent);
        }
        false
    }

    /// Uniform value in `[min, max]`, swapping reversed bounds. A single
    /// finite bound is returned as is; with none, zero.
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        match (min.is_finite(), max.is_finite()) {
            (true, true) => {}
            (true, false) => return min,
            (false, true) => return max,
            (false, false) => return 0.0,
        }
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if lo == hi {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform value in `[0, 1)`.
    pub fn random_unit(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Place a model part at a shape's scope.
    pub fn spawn_model(&mut self, name: &str, shape: &Shape) {
        let model = match self.model_names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.model_names.push(name.to_string());
                self.model_names.len() - 1
            }
        } as u32;
        self.instances.push(ModelInstance {
            position: shape.scope.position.to_array(),
            model,
            size: shape.scope.size.to_array(),
            rotation: shape.rotation.to_array(),
        });
    }

    pub fn instances(&self) -> &[ModelInstance] {
        &self.instances
    }

    pub fn model_names(&self) -> &[String] {
        &self.model_names
    }

    /// Move the model parts out, leaving the context empty of them.
    pub fn take_models(&mut self) -> (Vec<String>, Vec<ModelInstance>) {
        (
            std::mem::take(&mut self.model_names),
            std::mem::take(&mut self.instances),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_assigns_ids_in_order() {
        let mut ctx = GenerationContext::new(1);
        let a = ctx.spawn(Shape::new("A", Scope::default()));
        let b = ctx.spawn(Shape::new("B", Scope::default()));
        assert_eq!((a, b), (ShapeId(0), ShapeId(1)));
        assert_eq!(ctx.queue_len(), 2);

        let first = ctx.next().unwrap();
        assert!(first.has_symbol("A"));
        ctx.finish(first, ShapeStatus::Terminal);
        assert_eq!(ctx.shape(a).unwrap().status, ShapeStatus::Terminal);
        assert_eq!(ctx.evaluations(), 1);
    }

    #[test]
    fn lineage_walks_parents() {
        let mut ctx = GenerationContext::new(1);
        let root = ctx.spawn(Shape::new("Root", Scope::default()));
        let mut child = Shape::new("Child", Scope::default());
        child.parent = Some(root);
        let child_id = ctx.spawn(child);
        let mut grandchild = Shape::new("Leaf", Scope::default());
        grandchild.parent = Some(child_id);

        assert!(ctx.is_lineage(&grandchild, root));
        assert!(!ctx.is_lineage(ctx.shape(root).unwrap(), child_id));
    }

    #[test]
    fn random_range_tolerates_degenerate_bounds() {
        let mut ctx = GenerationContext::new(3);
        let v = ctx.random_range(5.0, 2.0);
        assert!((2.0..=5.0).contains(&v));
        assert_eq!(ctx.random_range(1.5, 1.5), 1.5);
        assert_eq!(ctx.random_range(2.0, f32::INFINITY), 2.0);
        assert_eq!(ctx.random_range(f32::NAN, 4.0), 4.0);
        assert_eq!(ctx.random_range(f32::NEG_INFINITY, f32::NAN), 0.0);
    }

    #[test]
    fn models_share_name_table() {
        let mut ctx = GenerationContext::new(1);
        let shape = Shape::new("W", Scope::new(Vec3::ONE, Vec3::splat(2.0)));
        ctx.spawn_model("window", &shape);
        ctx.spawn_model("wall", &shape);
        ctx.spawn_model("window", &shape);

        let (names, instances) = ctx.take_models();
        assert_eq!(names, vec!["window".to_string(), "wall".to_string()]);
        assert_eq!(instances.iter().map(|i| i.model).collect::<Vec<_>>(), vec![0, 1, 0]);
        assert!(ctx.instances().is_empty());
    }

    #[test]
    fn random_range_swaps_reversed_bounds() {
        let mut ctx = GenerationContext::new(4);
        for _ in 0..32 {
            let v = ctx.random_range(5.0, 2.0);
            assert!((2.0..=5.0).contains(&v));
        }
        assert_eq!(ctx.random_range(3.0, 3.0), 3.0);
    }
}
