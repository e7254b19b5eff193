//! Road network growth from a city centre.
//!
//! An extended L-system grows the network one segment at a time:
//! 1. Road modules ask the local constraints to fit the proposed segment into
//!    the terrain and the existing network (shorten or turn away from water,
//!    snap to nearby crossroads, split crossed roads)
//! 2. Successful modules spawn a forward continuation steered by a
//!    [`RoadMapRule`] plus two perpendicular branches
//! 3. Branches wait out a delay before turning into road modules
//!
//! Modules are processed breadth-first, one generation per iteration.

use bevy::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use super::geometry::{intersect_line_segments, rotate_degrees, segments_overlap};
use super::road_rules::{RoadMapRule, RoadRuleKind};
use super::roads::{CrossroadId, RoadId, RoadMapItem, RoadNetwork};
use crate::world::quadtree::QuadTree;
use crate::world::terrain::{HeightMap, PopulationMap};
use crate::world::CityInputs;

/// Configuration for road growth.
#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadGenConfig {
    /// Length of a freshly proposed segment, in map cells.
    pub road_length: f32,
    /// Fraction of the length below which water avoidance stops shortening
    /// and starts turning instead.
    pub water_pruning_factor: f32,
    /// Largest turn, in degrees, tried when avoiding water.
    pub maximal_angle_to_fix: u32,
    /// Snap radius as a fraction of the segment length.
    pub neighborhood_factor: f32,
    /// Iterations a byway branch waits before growing.
    pub default_delay: i32,
    /// Chance a branch becomes a highway, scaled by local density.
    pub probability_to_branch_highway: f32,
    /// Density a highway end point must exceed.
    pub highway_pop_density_limit: f32,
    /// Density a byway end point must exceed.
    pub byway_pop_density_limit: f32,
    pub highway_thickness: f32,
    pub byway_thickness: f32,
    /// Number of breadth-first generations; 0 grows until the queue drains.
    pub iteration_limit: u32,
    /// Whether a segment that merged into the network keeps growing.
    pub continue_after_merge: bool,
    pub rule: RoadRuleKind,
    pub quadtree_capacity: usize,
    pub seed: u64,
}

impl Default for RoadGenConfig {
    fn default() -> Self {
        Self {
            road_length: 20.0,
            water_pruning_factor: 0.5,
            maximal_angle_to_fix: 30,
            neighborhood_factor: 0.5,
            default_delay: 3,
            probability_to_branch_highway: 0.3,
            highway_pop_density_limit: 0.25,
            byway_pop_density_limit: 0.1,
            highway_thickness: 3.0,
            byway_thickness: 1.0,
            iteration_limit: 30,
            continue_after_merge: true,
            rule: RoadRuleKind::Basic,
            quadtree_capacity: 4,
            seed: 42,
        }
    }
}

/// Proposed shape of the next segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoadAttributes {
    pub length: f32,
    /// Unit direction.
    pub direction: Vec2,
    pub highway: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleState {
    Unassigned,
    Succeed,
    Merged,
    Failed,
}

struct RoadModule {
    delay: i32,
    attributes: RoadAttributes,
    rule: Arc<dyn RoadMapRule>,
    start: CrossroadId,
    end: Option<CrossroadId>,
    state: ModuleState,
}

impl RoadModule {
    fn new(delay: i32, attributes: RoadAttributes, rule: Arc<dyn RoadMapRule>, start: CrossroadId) -> Self {
        Self {
            delay,
            attributes,
            rule,
            start,
            end: None,
            state: ModuleState::Unassigned,
        }
    }
}

struct BranchModule {
    delay: i32,
    attributes: RoadAttributes,
    rule: Arc<dyn RoadMapRule>,
    start: CrossroadId,
}

enum Module {
    Road(RoadModule),
    Branch(BranchModule),
}

/// Result of fitting one segment into the network.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalOutcome {
    pub state: ModuleState,
    pub end: Option<CrossroadId>,
    pub road: Option<RoadId>,
    /// The attributes actually built, after any water fix.
    pub attributes: RoadAttributes,
}

/// Counters reported after a growth run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GrowthStats {
    pub iterations: u32,
    pub roads_built: usize,
    pub merged: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Neighborhood {
    intersection: Option<(Vec2, RoadId, f32)>,
    road: Option<(RoadId, f32)>,
    crossroad: Option<(CrossroadId, f32)>,
}

enum EndPoint {
    New(Vec2),
    Split(Vec2, RoadId),
    Existing(CrossroadId),
}

/// Grows a [`RoadNetwork`] over a height map and population map.
pub struct RoadMapGenerator<'a> {
    heightmap: &'a HeightMap,
    population: &'a PopulationMap,
    config: RoadGenConfig,
    network: RoadNetwork,
    index: QuadTree<RoadMapItem>,
    queue: VecDeque<Module>,
    rng: StdRng,
    stats: GrowthStats,
}

impl<'a> RoadMapGenerator<'a> {
    /// `bounds` is the area the spatial index covers, usually the city rect.
    pub fn new(heightmap: &'a HeightMap, population: &'a PopulationMap, bounds: Rect, config: RoadGenConfig) -> Self {
        Self {
            heightmap,
            population,
            index: QuadTree::new(config.quadtree_capacity, bounds),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            network: RoadNetwork::new(),
            queue: VecDeque::new(),
            stats: GrowthStats::default(),
        }
    }

    pub fn config(&self) -> &RoadGenConfig {
        &self.config
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn into_network(self) -> RoadNetwork {
        self.network
    }

    pub fn spatial_index(&self) -> &QuadTree<RoadMapItem> {
        &self.index
    }

    /// Add a crossroad to the network and the spatial index.
    pub fn add_crossroad(&mut self, position: Vec2) -> CrossroadId {
        let id = self.network.add_crossroad(position);
        self.index.insert(RoadMapItem::Crossroad { id, position });
        id
    }

    /// Add a road to the network and the spatial index.
    pub fn add_road(&mut self, start: CrossroadId, end: CrossroadId, highway: bool) -> RoadId {
        let id = self.network.add_road(start, end, highway);
        if let Some(road) = self.network.road(id) {
            self.index.insert(RoadMapItem::Road {
                id,
                midpoint: road.midpoint,
            });
        }
        id
    }

    fn remove_road(&mut self, id: RoadId) {
        if let Some(road) = self.network.remove_road(id) {
            self.index.remove(&RoadMapItem::Road {
                id,
                midpoint: road.midpoint,
            });
        }
    }

    /// Grow a network from `city_centre`. The first highway heads along
    /// `initial_direction`, or a random direction when `None`.
    pub fn generate(&mut self, city_centre: Vec2, initial_direction: Option<Vec2>) -> GrowthStats {
        self.network.clear();
        self.index.clear();
        self.queue.clear();
        self.stats = GrowthStats::default();

        let centre = self.add_crossroad(city_centre);
        let direction = initial_direction
            .map(Vec2::normalize_or_zero)
            .filter(|d| *d != Vec2::ZERO)
            .unwrap_or_else(|| Vec2::from_angle(self.rng.gen_range(0.0..std::f32::consts::TAU)));

        let attributes = RoadAttributes {
            length: self.config.road_length,
            direction,
            highway: true,
        };
        self.queue
            .push_back(Module::Road(RoadModule::new(0, attributes, self.config.rule.build(), centre)));

        let limit = self.config.iteration_limit;
        while !self.queue.is_empty() && (limit == 0 || self.stats.iterations < limit) {
            // Only the modules present at the start of the iteration run now.
            let count = self.queue.len();
            for _ in 0..count {
                match self.queue.pop_front() {
                    Some(Module::Road(module)) => self.handle_road(module),
                    Some(Module::Branch(module)) => self.handle_branch(module),
                    None => break,
                }
            }
            self.stats.iterations += 1;
        }

        debug!(
            "Road growth stopped after {} iterations with {} modules pending",
            self.stats.iterations,
            self.queue.len()
        );
        self.queue.clear();
        self.stats
    }

    fn handle_road(&mut self, mut module: RoadModule) {
        if module.delay < 0 || module.state == ModuleState::Failed {
            return;
        }

        match module.state {
            ModuleState::Unassigned => {
                let outcome = self.local_constraints(module.attributes, module.start);
                module.state = outcome.state;
                module.end = outcome.end;
                match outcome.state {
                    ModuleState::Failed => self.stats.failed += 1,
                    state => {
                        self.stats.roads_built += 1;
                        if state == ModuleState::Merged {
                            self.stats.merged += 1;
                        }
                        self.queue.push_back(Module::Road(module));
                    }
                }
            }
            ModuleState::Merged if !self.config.continue_after_merge => {}
            ModuleState::Succeed | ModuleState::Merged => self.global_goals(module),
            ModuleState::Failed => {}
        }
    }

    fn handle_branch(&mut self, mut module: BranchModule) {
        if module.delay < 0 {
            return;
        }
        if module.delay > 0 {
            module.delay -= 1;
            self.queue.push_back(Module::Branch(module));
            return;
        }
        self.queue.push_back(Module::Road(RoadModule::new(
            0,
            module.attributes,
            module.rule,
            module.start,
        )));
    }

    fn position(&self, id: CrossroadId) -> Option<Vec2> {
        self.network.crossroad(id).map(|c| c.position)
    }

    fn density_at(&self, position: Vec2) -> f32 {
        self.population.value_at(position).unwrap_or(0.0)
    }

    /// Spawn the forward continuation from the end point and two
    /// perpendicular branches from the start point.
    fn global_goals(&mut self, module: RoadModule) {
        let (Some(end), Some(start_position)) = (module.end, self.position(module.start)) else {
            return;
        };
        let Some(end_position) = self.position(end) else {
            return;
        };

        let forward = if module.attributes.highway {
            module
                .rule
                .generate_highway(module.attributes, end_position, self.population)
        } else {
            module
                .rule
                .generate_byway(module.attributes, end_position, self.population)
        };
        self.queue
            .push_back(Module::Road(RoadModule::new(0, forward, module.rule.clone(), end)));

        let branch_chance = self.config.probability_to_branch_highway * self.density_at(start_position);
        for angle in [90.0, -90.0] {
            let highway = self.rng.gen::<f32>() < branch_chance;
            let attributes = RoadAttributes {
                length: module.attributes.length,
                direction: rotate_degrees(module.attributes.direction, angle),
                highway,
            };
            self.queue.push_back(Module::Branch(BranchModule {
                delay: if highway { 0 } else { self.config.default_delay },
                attributes,
                rule: module.rule.clone(),
                start: module.start,
            }));
        }
    }

    /// Fit a proposed segment starting at `start` into the terrain and the
    /// network, and commit it when it fits.
    pub fn local_constraints(&mut self, attributes: RoadAttributes, start: CrossroadId) -> LocalOutcome {
        let failed = LocalOutcome {
            state: ModuleState::Failed,
            end: None,
            road: None,
            attributes,
        };
        let Some(start_position) = self.position(start) else {
            return failed;
        };

        let mut attributes = attributes;
        let mut ending = start_position + attributes.direction * attributes.length;
        if !self.is_position_valid(start_position, ending, attributes.highway) {
            match self.fix_position(attributes, start_position) {
                Some((fixed, end)) => {
                    attributes = fixed;
                    ending = end;
                }
                None => {
                    trace!("No valid end point for segment from {start_position}");
                    return failed;
                }
            }
        }
        let failed = LocalOutcome { attributes, ..failed };

        let radius = (attributes.length * self.config.neighborhood_factor).round();
        let near = self.scan_neighborhood(start, start_position, ending, radius, attributes.length);

        let end_point = match (near.intersection, near.road, near.crossroad) {
            (Some((point, road, _)), _, _) => EndPoint::Split(point, road),
            (None, None, None) => EndPoint::New(ending),
            (None, Some((road, _)), None) => match self.line_hit(start_position, ending, road) {
                Some(point) if point.distance(ending) <= radius => EndPoint::Split(point, road),
                _ => EndPoint::New(ending),
            },
            (None, None, Some((crossroad, _))) => EndPoint::Existing(crossroad),
            (None, Some((road, road_distance)), Some((crossroad, crossroad_distance))) => {
                match self.line_hit(start_position, ending, road) {
                    Some(point)
                        if point != ending
                            && road_distance < crossroad_distance
                            && point.distance(ending) <= radius =>
                    {
                        EndPoint::Split(point, road)
                    }
                    _ => EndPoint::Existing(crossroad),
                }
            }
        };

        let (end, merged) = match end_point {
            EndPoint::New(position) => (self.add_crossroad(position), false),
            EndPoint::Split(position, road) => match self.intersect_roads(position, road, radius / 2.0) {
                Some(end) => (end, true),
                None => {
                    trace!("Rejected split of {road:?} at {position}");
                    return failed;
                }
            },
            EndPoint::Existing(crossroad) => {
                if self.check_road_overlap(start, crossroad) {
                    trace!("Rejected merge of {start:?} into {crossroad:?}: overlaps an existing road");
                    return failed;
                }
                (crossroad, true)
            }
        };

        let road = self.add_road(start, end, attributes.highway);
        LocalOutcome {
            state: if merged {
                ModuleState::Merged
            } else {
                ModuleState::Succeed
            },
            end: Some(end),
            road: Some(road),
            attributes,
        }
    }

    fn scan_neighborhood(&self, start: CrossroadId, start_position: Vec2, ending: Vec2, radius: f32, reach: f32) -> Neighborhood {
        let area = Rect::from_center_half_size(ending, Vec2::splat(reach));
        let mut near = Neighborhood::default();

        for item in self.index.retrieve_objects_in_area(area) {
            match item {
                RoadMapItem::Crossroad { id, position } => {
                    if id == start {
                        continue;
                    }
                    let distance = ending.distance(position);
                    if distance <= radius && near.crossroad.map_or(true, |(_, d)| distance < d) {
                        near.crossroad = Some((id, distance));
                    }
                }
                RoadMapItem::Road { id, midpoint } => {
                    let Some((a, b)) = self.network.road_endpoints(id) else {
                        continue;
                    };
                    match intersect_line_segments(start_position, ending, a, b).segments {
                        Some(point) if point != start_position && point != ending => {
                            let distance = start_position.distance(point);
                            if near.intersection.map_or(true, |(_, _, d)| distance < d) {
                                near.intersection = Some((point, id, distance));
                            }
                        }
                        _ => {
                            let distance = ending.distance(midpoint);
                            if distance <= radius && near.road.map_or(true, |(_, d)| distance < d) {
                                near.road = Some((id, distance));
                            }
                        }
                    }
                }
            }
        }
        near
    }

    /// Where the extension of `start..ending` meets `road`, if ahead of the
    /// start.
    fn line_hit(&self, start: Vec2, ending: Vec2, road: RoadId) -> Option<Vec2> {
        let (a, b) = self.network.road_endpoints(road)?;
        intersect_line_segments(start, ending, a, b)
            .lines
            .filter(|point| (*point - start).dot(ending - start) > 0.0)
    }

    /// Whether joining `start` to the existing `end` crossroad would lie on
    /// top of a road already there.
    pub fn check_road_overlap(&self, start: CrossroadId, end: CrossroadId) -> bool {
        let (Some(start_position), Some(end_position)) = (self.position(start), self.position(end)) else {
            return true;
        };
        if start_position == end_position || self.network.find_road(start, end).is_some() {
            return true;
        }
        self.network.roads_at(end).any(|road| {
            self.network
                .road_endpoints(road)
                .is_some_and(|(a, b)| segments_overlap(start_position, end_position, a, b))
        })
    }

    /// Split `road` at `position` with a new crossroad. Fails when the point
    /// is an endpoint or either section would be no longer than
    /// `minimum_length`.
    pub fn intersect_roads(&mut self, position: Vec2, road: RoadId, minimum_length: f32) -> Option<CrossroadId> {
        let (a, b) = self.network.road_endpoints(road)?;
        if position == a || position == b {
            return None;
        }
        if a.distance(position) <= minimum_length || position.distance(b) <= minimum_length {
            return None;
        }

        let existing = *self.network.road(road)?;
        self.remove_road(road);
        let crossroad = self.add_crossroad(position);
        self.add_road(existing.start, crossroad, existing.highway);
        self.add_road(crossroad, existing.end, existing.highway);
        Some(crossroad)
    }

    /// An end point is valid when it lies on land inside the map, its density
    /// exceeds the limit for the road class, and the segment from `start`
    /// never crosses water.
    pub fn is_position_valid(&self, start: Vec2, end: Vec2, highway: bool) -> bool {
        let end = end.round();
        match self.heightmap.value_at(end) {
            Some(height) if height != 0.0 => {}
            _ => return false,
        }

        let limit = if highway {
            self.config.highway_pop_density_limit
        } else {
            self.config.byway_pop_density_limit
        };
        match self.population.value_at(end) {
            Some(density) if density > limit => {}
            _ => return false,
        }

        if start == end {
            return false;
        }

        let direction = (end - start).normalize();
        let steps = start.distance(end).round() as u32;
        (0..steps).all(|i| !self.heightmap.is_water(start + direction * i as f32))
    }

    /// Shorten the segment one cell at a time down to the pruning limit, then
    /// try turning it by growing angles on alternating sides.
    pub fn fix_position(&self, attributes: RoadAttributes, start: Vec2) -> Option<(RoadAttributes, Vec2)> {
        let pruning_limit = (attributes.length * self.config.water_pruning_factor).round();
        let mut length = attributes.length;

        while length > pruning_limit {
            let end = start + attributes.direction * length;
            if self.is_position_valid(start, end, attributes.highway) {
                return Some((RoadAttributes { length, ..attributes }, end));
            }
            length -= 1.0;
        }
        if length <= 0.0 {
            return None;
        }

        for angle in 1..=self.config.maximal_angle_to_fix {
            for side in [1.0, -1.0] {
                let direction = rotate_degrees(attributes.direction, angle as f32 * side);
                let end = start + direction * length;
                if self.is_position_valid(start, end, attributes.highway) {
                    let fixed = RoadAttributes {
                        length,
                        direction,
                        ..attributes
                    };
                    return Some((fixed, end));
                }
            }
        }
        None
    }
}

/// Event to trigger road generation.
#[derive(Event, Default)]
pub struct GenerateRoadsEvent {
    pub initial_direction: Option<Vec2>,
}

/// Marker that roads have been generated.
#[derive(Resource, Default)]
pub struct RoadsGenerated(pub bool);

pub struct RoadGeneratorPlugin;

impl Plugin for RoadGeneratorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RoadGenConfig>()
            .init_resource::<RoadsGenerated>()
            .add_event::<GenerateRoadsEvent>()
            .add_systems(Update, generate_roads_on_event);
    }
}

fn generate_roads_on_event(
    mut events: EventReader<GenerateRoadsEvent>,
    inputs: Option<Res<CityInputs>>,
    config: Res<RoadGenConfig>,
    mut network: ResMut<RoadNetwork>,
    mut generated: ResMut<RoadsGenerated>,
) {
    for event in events.read() {
        let Some(inputs) = inputs.as_deref() else {
            warn!("Road generation requested before city inputs were loaded");
            continue;
        };
        info!("Generating road network...");

        let mut generator = RoadMapGenerator::new(
            &inputs.heightmap,
            &inputs.population,
            inputs.city_bounds(),
            config.clone(),
        );
        let stats = generator.generate(inputs.city_centre, event.initial_direction);
        *network = generator.into_network();
        generated.0 = true;

        info!(
            "Road generation complete: {} crossroads, {} roads ({} highways) after {} iterations, {} merged, {} failed",
            network.crossroad_count(),
            network.road_count(),
            network.highway_count(),
            stats.iterations,
            stats.merged,
            stats.failed
        );
    }
}
