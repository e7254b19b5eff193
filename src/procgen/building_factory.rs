//! Building placement along the road network.
//!
//! Lots are laid out on both sides of every road at a fixed spacing. The
//! local population density, boosted at random (more so along highways),
//! picks the densest rule set that still fits; lots that would overrun the
//! road, touch water or collide with an obstacle fall through to the next
//! smaller rule set. Generated models are cached per rule set so large
//! cities reuse a bounded number of unique buildings.

use std::sync::Arc;

use bevy::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::procgen::building_generator::{BuildingGenerator, BuildingModel};
use crate::procgen::geometry::{rotate_degrees, Footprint};
use crate::procgen::grammar::GrammarError;
use crate::procgen::road_generator::RoadsGenerated;
use crate::procgen::roads::{RoadId, RoadNetwork};
use crate::procgen::rulesets;
use crate::world::quadtree::{QuadTree, QuadTreeObject};
use crate::world::terrain::{HeightMap, PopulationMap};
use crate::world::CityInputs;

pub struct BuildingFactoryPlugin;

impl Plugin for BuildingFactoryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BuildingFactoryConfig>()
            .init_resource::<BuildingLibrary>()
            .init_resource::<PlacedBuildings>()
            .add_systems(Update, place_buildings.run_if(should_place_buildings));
    }
}

/// A rule set and the lot it is generated on, in metres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LotSpec {
    pub rule_set: String,
    pub lot: Vec2,
}

impl LotSpec {
    pub fn new(rule_set: &str, lot: Vec2) -> Self {
        Self {
            rule_set: rule_set.to_string(),
            lot,
        }
    }
}

#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingFactoryConfig {
    /// Candidate rule sets, densest first.
    pub models: Vec<LotSpec>,
    /// Density band widths from the top: model `i` is picked for densities
    /// in `(1 - thresholds[i], 1 - thresholds[i - 1]]`, the last model below.
    pub density_thresholds: Vec<f32>,
    /// Gap between lots along a road, in map cells.
    pub building_spacing: f32,
    /// Lower bound of the random density boost along highways.
    pub highway_advantage: f32,
    /// Upper bound of the random density boost.
    pub max_increase: f32,
    /// Distance from the road centre line to the lot, in map cells.
    pub highway_clearance: f32,
    pub byway_clearance: f32,
    /// Unique models generated per rule set before cached ones are reused.
    pub cache_size: usize,
    /// Map cells per metre.
    pub models_scaling_factor: f32,
    pub quadtree_capacity: usize,
    pub seed: u64,
}

impl Default for BuildingFactoryConfig {
    fn default() -> Self {
        Self {
            models: vec![
                LotSpec::new(rulesets::OFFICE_TOWER, Vec2::new(16.0, 16.0)),
                LotSpec::new(rulesets::APARTMENT_BLOCK, Vec2::new(14.0, 12.0)),
                LotSpec::new(rulesets::RESIDENTIAL_HOUSE, Vec2::new(10.0, 8.0)),
            ],
            density_thresholds: vec![0.25, 0.55],
            building_spacing: 1.0,
            highway_advantage: 0.8,
            max_increase: 1.4,
            highway_clearance: 2.0,
            byway_clearance: 1.0,
            cache_size: 4,
            models_scaling_factor: 0.25,
            quadtree_capacity: 8,
            seed: 7,
        }
    }
}

impl BuildingFactoryConfig {
    /// Index of the first model to try for `density`.
    pub fn model_index(&self, density: f32) -> usize {
        let mut max_value = f32::INFINITY;
        for (i, threshold) in self.density_thresholds.iter().enumerate() {
            let min_value = 1.0 - threshold;
            if density > min_value && density <= max_value {
                return i;
            }
            max_value = min_value;
        }
        self.density_thresholds.len()
    }
}

/// Spatial test deciding whether a lot may be built on.
pub trait ObstacleQuery {
    /// Whether `footprint` collides with anything other than the road it
    /// faces.
    fn is_blocked(&self, footprint: &Footprint, host: RoadId) -> bool;

    /// Record a placed lot so later lots avoid it.
    fn reserve(&mut self, footprint: Footprint);
}

#[derive(Clone, Debug, PartialEq)]
enum Obstacle {
    Road { id: RoadId, start: Vec2, end: Vec2 },
    Lot { index: usize, centre: Vec2 },
}

impl QuadTreeObject for Obstacle {
    fn position(&self) -> Vec2 {
        match self {
            Obstacle::Road { start, end, .. } => (*start + *end) / 2.0,
            Obstacle::Lot { centre, .. } => *centre,
        }
    }
}

/// Obstacles indexed by a quadtree: road segments by midpoint and placed
/// lots by centre.
pub struct LotObstacles {
    index: QuadTree<Obstacle>,
    lots: Vec<Footprint>,
    /// Largest distance from an indexed point to the geometry it stands
    /// for. Queries are widened by this much.
    reach: f32,
}

impl LotObstacles {
    pub fn new(network: &RoadNetwork, bounds: Rect, capacity: usize) -> Self {
        let mut index = QuadTree::new(capacity, bounds);
        let mut reach: f32 = 0.0;
        for (id, _) in network.roads() {
            if let Some((start, end)) = network.road_endpoints(id) {
                reach = reach.max(start.distance(end) / 2.0);
                index.insert(Obstacle::Road { id, start, end });
            }
        }
        Self {
            index,
            lots: Vec::new(),
            reach,
        }
    }

    pub fn lots(&self) -> &[Footprint] {
        &self.lots
    }
}

impl ObstacleQuery for LotObstacles {
    fn is_blocked(&self, footprint: &Footprint, host: RoadId) -> bool {
        let area = footprint.bounds().inflate(self.reach);
        self.index
            .retrieve_objects_in_area(area)
            .iter()
            .any(|obstacle| match obstacle {
                Obstacle::Road { id, start, end } => *id != host && footprint.intersects_segment(*start, *end),
                Obstacle::Lot { index, .. } => self.lots.get(*index).is_some_and(|lot| footprint.overlaps(lot)),
            })
    }

    fn reserve(&mut self, footprint: Footprint) {
        let centre = footprint.centre();
        let radius = footprint.corners.iter().map(|c| c.distance(centre)).fold(0.0, f32::max);
        self.reach = self.reach.max(radius);
        self.index.insert(Obstacle::Lot {
            index: self.lots.len(),
            centre,
        });
        self.lots.push(footprint);
    }
}

/// One building standing on the map.
#[derive(Clone, Debug)]
pub struct PlacedBuilding {
    pub rule_set: String,
    /// Lot corner on the road side, in map cells.
    pub origin: Vec2,
    pub footprint: Footprint,
    /// Heading of the lot front in radians, measured from the map X axis.
    pub heading: f32,
    /// Map cells per model metre.
    pub scale: f32,
    pub road: RoadId,
    pub model: Arc<BuildingModel>,
}

/// Buildings placed by the plugin.
#[derive(Resource, Default)]
pub struct PlacedBuildings {
    pub buildings: Vec<PlacedBuilding>,
    pub generated: bool,
}

/// Rule sets available to placement.
#[derive(Resource)]
pub struct BuildingLibrary {
    pub generator: BuildingGenerator,
}

impl Default for BuildingLibrary {
    fn default() -> Self {
        Self {
            generator: BuildingGenerator::with_builtin(BuildingFactoryConfig::default().seed),
        }
    }
}

/// Places buildings for one road network.
pub struct BuildingFactory<'a> {
    heightmap: &'a HeightMap,
    population: &'a PopulationMap,
    config: BuildingFactoryConfig,
    rng: StdRng,
    cache: Vec<Vec<Arc<BuildingModel>>>,
}

impl<'a> BuildingFactory<'a> {
    pub fn new(heightmap: &'a HeightMap, population: &'a PopulationMap, config: BuildingFactoryConfig) -> Self {
        Self {
            heightmap,
            population,
            rng: StdRng::seed_from_u64(config.seed),
            cache: vec![Vec::new(); config.models.len()],
            config,
        }
    }

    pub fn config(&self) -> &BuildingFactoryConfig {
        &self.config
    }

    /// Unique models generated so far per entry of `config.models`.
    pub fn cached_models(&self) -> Vec<usize> {
        self.cache.iter().map(Vec::len).collect()
    }

    fn model(&mut self, index: usize, generator: &mut BuildingGenerator) -> Result<Arc<BuildingModel>, GrammarError> {
        let cached = &self.cache[index];
        if cached.len() >= self.config.cache_size.max(1) {
            let pick = self.rng.gen_range(0..cached.len());
            return Ok(Arc::clone(&cached[pick]));
        }
        let spec = &self.config.models[index];
        let model = Arc::new(generator.generate(&spec.rule_set, spec.lot)?);
        self.cache[index].push(Arc::clone(&model));
        Ok(model)
    }

    fn density_boost(&mut self, highway: bool) -> f32 {
        let low = if highway {
            self.config.highway_advantage.min(self.config.max_increase)
        } else {
            0.0
        };
        if low >= self.config.max_increase {
            return low;
        }
        self.rng.gen_range(low..self.config.max_increase)
    }

    fn on_water(&self, footprint: &Footprint) -> bool {
        footprint.corners.iter().any(|c| self.heightmap.is_water(*c))
    }

    /// Walk both sides of every road and place a building wherever one fits.
    pub fn place<O: ObstacleQuery>(
        &mut self,
        network: &RoadNetwork,
        obstacles: &mut O,
        generator: &mut BuildingGenerator,
    ) -> Result<Vec<PlacedBuilding>, GrammarError> {
        let mut placed = Vec::new();
        if self.config.models.is_empty() {
            return Ok(placed);
        }
        let road_ids: Vec<(RoadId, bool)> = network.roads().map(|(id, road)| (id, road.highway)).collect();

        for (road_id, highway) in road_ids {
            let Some((a, b)) = network.road_endpoints(road_id) else {
                continue;
            };
            let clearance = if highway {
                self.config.highway_clearance
            } else {
                self.config.byway_clearance
            };

            for (from, to) in [(a, b), (b, a)] {
                let length = from.distance(to);
                if length <= 0.0 {
                    continue;
                }
                let along = (to - from) / length;
                let side = rotate_degrees(along, 90.0);

                let mut distance = self.config.building_spacing;
                while distance < length {
                    let origin = from + along * distance + side * clearance;
                    let density = self.population.value_at(origin).unwrap_or(0.0) * self.density_boost(highway);

                    let mut advance = self.config.building_spacing;
                    let mut chosen = None;
                    for index in self.config.model_index(density)..self.config.models.len() {
                        let lot = self.config.models[index].lot * self.config.models_scaling_factor;
                        advance = lot.x;
                        if distance + lot.x > length {
                            continue;
                        }
                        let footprint = Footprint::new(origin, along, side, lot);
                        if self.on_water(&footprint) || obstacles.is_blocked(&footprint, road_id) {
                            continue;
                        }
                        chosen = Some((index, footprint));
                        break;
                    }

                    if let Some((index, footprint)) = chosen {
                        let model = self.model(index, generator)?;
                        obstacles.reserve(footprint);
                        placed.push(PlacedBuilding {
                            rule_set: self.config.models[index].rule_set.clone(),
                            origin,
                            footprint,
                            heading: along.y.atan2(along.x),
                            scale: self.config.models_scaling_factor,
                            road: road_id,
                            model,
                        });
                    }
                    distance += advance + self.config.building_spacing;
                }
            }
        }
        Ok(placed)
    }
}

fn should_place_buildings(roads: Res<RoadsGenerated>, placed: Res<PlacedBuildings>) -> bool {
    roads.0 && !placed.generated
}

fn place_buildings(
    inputs: Option<Res<CityInputs>>,
    network: Res<RoadNetwork>,
    config: Res<BuildingFactoryConfig>,
    mut library: ResMut<BuildingLibrary>,
    mut placed: ResMut<PlacedBuildings>,
) {
    placed.generated = true;
    let Some(inputs) = inputs.as_deref() else {
        warn!("Building placement requested before city inputs were loaded");
        return;
    };
    info!("Placing buildings along {} roads", network.road_count());

    let mut obstacles = LotObstacles::new(&network, inputs.city_bounds(), config.quadtree_capacity);
    let mut factory = BuildingFactory::new(&inputs.heightmap, &inputs.population, config.clone());
    match factory.place(&network, &mut obstacles, &mut library.generator) {
        Ok(buildings) => {
            for (spec, count) in config.models.iter().zip(factory.cached_models()) {
                info!("Rule set `{}`: {} unique models", spec.rule_set, count);
            }
            info!("Placed {} buildings", buildings.len());
            placed.buildings = buildings;
        }
        Err(err) => error!("Building placement failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(size: usize, density: f32) -> (HeightMap, PopulationMap) {
        (HeightMap::filled(size, size, 1.0), PopulationMap::filled(size, size, density))
    }

    fn straight_road(length: f32) -> RoadNetwork {
        let mut network = RoadNetwork::new();
        let a = network.add_crossroad(Vec2::new(4.0, 32.0));
        let b = network.add_crossroad(Vec2::new(4.0 + length, 32.0));
        network.add_road(a, b, false);
        network
    }

    fn bounds() -> Rect {
        Rect::from_corners(Vec2::ZERO, Vec2::splat(64.0))
    }

    #[test]
    fn thresholds_select_densest_first() {
        let config = BuildingFactoryConfig::default();
        assert_eq!(config.model_index(0.9), 0);
        assert_eq!(config.model_index(0.6), 1);
        assert_eq!(config.model_index(0.2), 2);
        assert_eq!(config.model_index(0.0), 2);
        assert_eq!(config.model_index(3.0), 0);
    }

    #[test]
    fn lots_line_both_sides_without_overlap() {
        let (heightmap, population) = flat(64, 0.1);
        let network = straight_road(40.0);
        let mut obstacles = LotObstacles::new(&network, bounds(), 4);
        let mut generator = BuildingGenerator::with_builtin(1);
        let mut factory = BuildingFactory::new(&heightmap, &population, BuildingFactoryConfig::default());

        let placed = factory.place(&network, &mut obstacles, &mut generator).unwrap();
        assert!(placed.len() >= 4);
        assert!(placed.iter().any(|b| b.footprint.centre().y > 32.0));
        assert!(placed.iter().any(|b| b.footprint.centre().y < 32.0));
        for (i, a) in placed.iter().enumerate() {
            for b in &placed[i + 1..] {
                assert!(!a.footprint.overlaps(&b.footprint));
            }
        }
        assert_eq!(obstacles.lots().len(), placed.len());
    }

    #[test]
    fn no_lot_touches_water() {
        let heightmap = HeightMap::from_fn(64, 64, |_, y| if y > 33 { 0.0 } else { 1.0 });
        let population = PopulationMap::filled(64, 64, 0.1);
        let network = straight_road(40.0);
        let mut obstacles = LotObstacles::new(&network, bounds(), 4);
        let mut generator = BuildingGenerator::with_builtin(1);
        let mut factory = BuildingFactory::new(&heightmap, &population, BuildingFactoryConfig::default());

        let placed = factory.place(&network, &mut obstacles, &mut generator).unwrap();
        assert!(!placed.is_empty());
        assert!(placed
            .iter()
            .all(|b| b.footprint.corners.iter().all(|c| !heightmap.is_water(*c))));
    }

    #[test]
    fn crossing_roads_block_lots() {
        let (heightmap, population) = flat(64, 0.1);
        let mut network = straight_road(40.0);
        let top = network.add_crossroad(Vec2::new(20.0, 50.0));
        let bottom = network.add_crossroad(Vec2::new(20.0, 14.0));
        network.add_road(top, bottom, false);

        let mut obstacles = LotObstacles::new(&network, bounds(), 4);
        let mut generator = BuildingGenerator::with_builtin(1);
        let mut factory = BuildingFactory::new(&heightmap, &population, BuildingFactoryConfig::default());
        let placed = factory.place(&network, &mut obstacles, &mut generator).unwrap();

        for building in &placed {
            for (id, _) in network.roads() {
                if id == building.road {
                    continue;
                }
                let (a, b) = network.road_endpoints(id).unwrap();
                assert!(!building.footprint.intersects_segment(a, b));
            }
        }
    }

    #[test]
    fn cache_bounds_unique_models() {
        let (heightmap, population) = flat(128, 0.1);
        let mut network = RoadNetwork::new();
        let a = network.add_crossroad(Vec2::new(4.0, 64.0));
        let b = network.add_crossroad(Vec2::new(124.0, 64.0));
        network.add_road(a, b, false);

        let config = BuildingFactoryConfig {
            cache_size: 2,
            ..Default::default()
        };
        let mut obstacles = LotObstacles::new(&network, Rect::from_corners(Vec2::ZERO, Vec2::splat(128.0)), 4);
        let mut generator = BuildingGenerator::with_builtin(1);
        let mut factory = BuildingFactory::new(&heightmap, &population, config);
        let placed = factory.place(&network, &mut obstacles, &mut generator).unwrap();

        assert!(placed.len() > 6);
        assert!(factory.cached_models().iter().all(|n| *n <= 2));
    }

    #[test]
    fn short_roads_get_no_buildings() {
        let (heightmap, population) = flat(64, 0.9);
        let network = straight_road(1.5);
        let mut obstacles = LotObstacles::new(&network, bounds(), 4);
        let mut generator = BuildingGenerator::with_builtin(1);
        let mut factory = BuildingFactory::new(&heightmap, &population, BuildingFactoryConfig::default());
        assert!(factory.place(&network, &mut obstacles, &mut generator).unwrap().is_empty());
    }
}
