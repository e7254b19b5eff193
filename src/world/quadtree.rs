//! Point quadtree for neighborhood queries over road-map items.

use bevy::prelude::*;

/// Anything that can be stored in a [`QuadTree`] by position.
pub trait QuadTreeObject: Clone + PartialEq {
    fn position(&self) -> Vec2;
}

const MAX_DEPTH: usize = 12;

#[derive(Clone, Debug)]
struct Node<T> {
    bounds: Rect,
    depth: usize,
    items: Vec<T>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: QuadTreeObject> Node<T> {
    fn new(bounds: Rect, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }

    fn child_for(&mut self, position: Vec2) -> Option<&mut Node<T>> {
        self.children
            .as_mut()?
            .iter_mut()
            .find(|child| contains_point(child.bounds, position))
    }

    fn insert(&mut self, item: T, capacity: usize) {
        let position = item.position();
        if let Some(child) = self.child_for(position) {
            child.insert(item, capacity);
            return;
        }

        self.items.push(item);
        if self.children.is_none() && self.items.len() > capacity && self.depth < MAX_DEPTH {
            self.subdivide(capacity);
        }
    }

    fn subdivide(&mut self, capacity: usize) {
        let min = self.bounds.min;
        let half = self.bounds.half_size();
        let depth = self.depth + 1;
        let quadrant = |x: f32, y: f32| {
            let origin = min + Vec2::new(x, y) * half;
            Node::new(Rect::from_corners(origin, origin + half), depth)
        };
        self.children = Some(Box::new([
            quadrant(0.0, 0.0),
            quadrant(1.0, 0.0),
            quadrant(0.0, 1.0),
            quadrant(1.0, 1.0),
        ]));

        // Items outside the node bounds stay here.
        for item in std::mem::take(&mut self.items) {
            let position = item.position();
            match self.child_for(position) {
                Some(child) => child.insert(item, capacity),
                None => self.items.push(item),
            }
        }
    }

    fn remove(&mut self, item: &T, position: Vec2) -> bool {
        if let Some(index) = self.items.iter().position(|i| i == item) {
            self.items.swap_remove(index);
            return true;
        }
        match self.child_for(position) {
            Some(child) => child.remove(item, position),
            None => false,
        }
    }

    // The root is always visited so out-of-bounds items stay reachable.
    fn collect(&self, area: Rect, out: &mut Vec<T>) {
        out.extend(self.items.iter().cloned());
        if let Some(children) = &self.children {
            for child in children.iter() {
                if overlaps(child.bounds, area) {
                    child.collect(area, out);
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.items.len()
            + self
                .children
                .as_ref()
                .map_or(0, |c| c.iter().map(Node::len).sum())
    }
}

/// Bucketed quadtree. Queries return every object stored in a bucket whose
/// rectangle intersects the query area, so callers filter by exact distance.
#[derive(Clone, Debug)]
pub struct QuadTree<T> {
    capacity: usize,
    root: Node<T>,
}

impl<T: QuadTreeObject> QuadTree<T> {
    pub fn new(capacity: usize, bounds: Rect) -> Self {
        Self {
            capacity: capacity.max(1),
            root: Node::new(bounds, 0),
        }
    }

    pub fn bounds(&self) -> Rect {
        self.root.bounds
    }

    pub fn insert(&mut self, item: T) {
        self.root.insert(item, self.capacity);
    }

    /// Remove an object, returning whether it was present.
    pub fn remove(&mut self, item: &T) -> bool {
        self.root.remove(item, item.position())
    }

    pub fn retrieve_objects_in_area(&self, area: Rect) -> Vec<T> {
        let mut out = Vec::new();
        self.root.collect(area, &mut out);
        out
    }

    pub fn clear(&mut self) {
        self.root = Node::new(self.root.bounds, 0);
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn contains_point(rect: Rect, p: Vec2) -> bool {
    p.x >= rect.min.x && p.x < rect.max.x && p.y >= rect.min.y && p.y < rect.max.y
}

fn overlaps(a: Rect, b: Rect) -> bool {
    a.min.x <= b.max.x && b.min.x <= a.max.x && a.min.y <= b.max.y && b.min.y <= a.max.y
}
