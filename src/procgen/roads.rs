//! Road network graph: crossroads joined by straight road segments.
//!
//! Uses petgraph's stable graph so road and crossroad handles survive the
//! removal of a road when it is split at a new crossroad.

use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;

use crate::world::quadtree::QuadTreeObject;

pub type CrossroadId = NodeIndex;
pub type RoadId = EdgeIndex;

pub struct RoadsPlugin;

impl Plugin for RoadsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RoadNetwork>();
    }
}

/// A junction point in the network.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crossroad {
    pub position: Vec2,
}

/// A straight segment between two crossroads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Road {
    pub start: CrossroadId,
    pub end: CrossroadId,
    pub highway: bool,
    /// Cached so spatial lookups do not need the endpoints.
    pub midpoint: Vec2,
}

/// Handle to something stored in the spatial index, keyed by its position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoadMapItem {
    Crossroad { id: CrossroadId, position: Vec2 },
    Road { id: RoadId, midpoint: Vec2 },
}

impl QuadTreeObject for RoadMapItem {
    fn position(&self) -> Vec2 {
        match *self {
            RoadMapItem::Crossroad { position, .. } => position,
            RoadMapItem::Road { midpoint, .. } => midpoint,
        }
    }
}

/// GPU-friendly line segment for drawing the network.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RoadStroke {
    pub start: [f32; 2],
    pub end: [f32; 2],
    /// Linear RGBA.
    pub color: [f32; 4],
    pub thickness: f32,
    /// 1 for highways, 0 for byways.
    pub highway: u32,
}

const HIGHWAY_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const BYWAY_COLOR: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

/// The road network resource.
#[derive(Resource, Clone, Debug, Default)]
pub struct RoadNetwork {
    graph: StableUnGraph<Crossroad, Road>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_crossroad(&mut self, position: Vec2) -> CrossroadId {
        self.graph.add_node(Crossroad { position })
    }

    /// Connect two crossroads. Both must exist.
    pub fn add_road(&mut self, start: CrossroadId, end: CrossroadId, highway: bool) -> RoadId {
        let midpoint = (self.graph[start].position + self.graph[end].position) * 0.5;
        self.graph.add_edge(
            start,
            end,
            Road {
                start,
                end,
                highway,
                midpoint,
            },
        )
    }

    pub fn remove_road(&mut self, id: RoadId) -> Option<Road> {
        self.graph.remove_edge(id)
    }

    pub fn crossroad(&self, id: CrossroadId) -> Option<&Crossroad> {
        self.graph.node_weight(id)
    }

    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.graph.edge_weight(id)
    }

    /// Start and end positions of a road.
    pub fn road_endpoints(&self, id: RoadId) -> Option<(Vec2, Vec2)> {
        let road = self.road(id)?;
        Some((self.graph[road.start].position, self.graph[road.end].position))
    }

    pub fn road_length(&self, id: RoadId) -> Option<f32> {
        self.road_endpoints(id).map(|(a, b)| a.distance(b))
    }

    /// Roads attached to a crossroad.
    pub fn roads_at(&self, id: CrossroadId) -> impl Iterator<Item = RoadId> + '_ {
        self.graph.edges(id).map(|e| e.id())
    }

    /// The road directly joining two crossroads, in either direction.
    pub fn find_road(&self, a: CrossroadId, b: CrossroadId) -> Option<RoadId> {
        self.graph.find_edge(a, b)
    }

    pub fn contains_crossroad(&self, id: CrossroadId) -> bool {
        self.graph.contains_node(id)
    }

    pub fn crossroads(&self) -> impl Iterator<Item = (CrossroadId, &Crossroad)> {
        self.graph.node_indices().map(move |i| (i, &self.graph[i]))
    }

    pub fn roads(&self) -> impl Iterator<Item = (RoadId, &Road)> {
        self.graph.edge_indices().map(move |i| (i, &self.graph[i]))
    }

    pub fn crossroad_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn road_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn highway_count(&self) -> usize {
        self.roads().filter(|(_, r)| r.highway).count()
    }

    pub fn clear(&mut self) {
        self.graph.clear();
    }

    /// Line segments for every road, thickened by class.
    pub fn strokes(&self, highway_thickness: f32, byway_thickness: f32) -> Vec<RoadStroke> {
        self.roads()
            .map(|(_, road)| {
                let start = self.graph[road.start].position;
                let end = self.graph[road.end].position;
                RoadStroke {
                    start: start.to_array(),
                    end: end.to_array(),
                    color: if road.highway { HIGHWAY_COLOR } else { BYWAY_COLOR },
                    thickness: if road.highway {
                        highway_thickness
                    } else {
                        byway_thickness
                    },
                    highway: road.highway as u32,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roads_are_visible_from_both_endpoints() {
        let mut network = RoadNetwork::new();
        let a = network.add_crossroad(Vec2::ZERO);
        let b = network.add_crossroad(Vec2::new(10.0, 0.0));
        let road = network.add_road(a, b, true);

        assert_eq!(network.roads_at(a).collect::<Vec<_>>(), vec![road]);
        assert_eq!(network.roads_at(b).collect::<Vec<_>>(), vec![road]);
        assert_eq!(network.find_road(b, a), Some(road));
        assert_eq!(network.road(road).map(|r| r.midpoint), Some(Vec2::new(5.0, 0.0)));
        assert_eq!(network.road_length(road), Some(10.0));
    }

    #[test]
    fn handles_survive_road_removal() {
        let mut network = RoadNetwork::new();
        let a = network.add_crossroad(Vec2::ZERO);
        let b = network.add_crossroad(Vec2::new(10.0, 0.0));
        let c = network.add_crossroad(Vec2::new(10.0, 10.0));
        let ab = network.add_road(a, b, false);
        let bc = network.add_road(b, c, false);

        assert!(network.remove_road(ab).is_some());
        assert_eq!(network.road_endpoints(bc), Some((Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0))));
        assert_eq!(network.roads_at(a).count(), 0);
        assert_eq!(network.road_count(), 1);
        assert_eq!(network.crossroad_count(), 3);
    }

    #[test]
    fn strokes_are_plain_bytes() {
        let mut network = RoadNetwork::new();
        let a = network.add_crossroad(Vec2::ZERO);
        let b = network.add_crossroad(Vec2::new(3.0, 4.0));
        network.add_road(a, b, true);

        let strokes = network.strokes(3.0, 1.0);
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].thickness, 3.0);
        assert_eq!(strokes[0].color, HIGHWAY_COLOR);
        let bytes: &[u8] = bytemuck::cast_slice(&strokes);
        assert_eq!(bytes.len(), std::mem::size_of::<RoadStroke>());
    }
}
