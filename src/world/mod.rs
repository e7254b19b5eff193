//! World inputs: terrain, population density, spatial partitioning.

use bevy::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

pub mod quadtree;
pub mod terrain;

use terrain::{find_city_centre, HeightMap, PopulationMap};

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WorldConfig>();
    }
}

/// Global world configuration.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Map size in cells.
    pub size: UVec2,
    /// Radius of the populated area around the city centre.
    pub city_radius: f32,
    pub seed: u32,
    /// Terrain noise frequency across the whole map.
    pub noise_scale: f64,
    pub octaves: u32,
    /// Applied to the normalized height; larger values flatten lowlands.
    pub height_exponent: f32,
    /// Fraction of the height range flooded with water.
    pub water_level: f32,
    /// Neighborhood radius checked around a city centre candidate, in cells.
    pub centre_radius: usize,
    pub centre_slope_threshold: f32,
    pub centre_water_ratio: f32,
    /// Fraction of the map, around its middle, where centres are searched.
    pub centre_search_area: f32,
    pub centre_attempts: usize,
    pub population_noise_scale: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            size: UVec2::new(256, 256),
            city_radius: 100.0,
            seed: 42,
            noise_scale: 3.0,
            octaves: 5,
            height_exponent: 1.2,
            water_level: 0.3,
            centre_radius: 8,
            centre_slope_threshold: 0.2,
            centre_water_ratio: 0.1,
            centre_search_area: 0.5,
            centre_attempts: 500,
            population_noise_scale: 0.05,
        }
    }
}

/// Read-only maps the generators sample from.
#[derive(Resource, Clone, Debug)]
pub struct CityInputs {
    pub heightmap: HeightMap,
    pub population: PopulationMap,
    pub city_centre: Vec2,
    pub city_radius: f32,
}

impl CityInputs {
    /// Generate terrain, pick a city centre and spread population around it.
    /// `None` when no acceptable centre was found.
    pub fn generate(config: &WorldConfig) -> Option<Self> {
        let width = config.size.x as usize;
        let height = config.size.y as usize;
        let heightmap = HeightMap::generate(
            width,
            height,
            config.seed,
            config.noise_scale,
            config.octaves,
            config.height_exponent,
            config.water_level,
        );

        let mut rng = StdRng::seed_from_u64(config.seed as u64);
        let city_centre = find_city_centre(
            &heightmap,
            config.centre_radius,
            config.centre_slope_threshold,
            config.centre_water_ratio,
            config.centre_search_area,
            &mut rng,
            config.centre_attempts,
        )?;
        debug!("City centre at {city_centre}");

        let population = PopulationMap::around_centre(
            &heightmap,
            city_centre,
            config.city_radius,
            config.seed,
            config.population_noise_scale,
        );
        Some(Self {
            heightmap,
            population,
            city_centre,
            city_radius: config.city_radius,
        })
    }

    /// Bounding rectangle of the populated area.
    pub fn city_bounds(&self) -> Rect {
        Rect::from_center_half_size(self.city_centre, Vec2::splat(self.city_radius))
    }
}
