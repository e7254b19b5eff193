//! Direction rules steering the forward growth of roads.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::geometry::rotate_degrees;
use super::road_generator::RoadAttributes;
use crate::world::terrain::PopulationMap;

/// Picks the direction a road keeps growing in.
pub trait RoadMapRule: Send + Sync {
    fn generate_highway(&self, attributes: RoadAttributes, start: Vec2, population: &PopulationMap) -> RoadAttributes;

    fn generate_byway(&self, attributes: RoadAttributes, start: Vec2, population: &PopulationMap) -> RoadAttributes;
}

/// Rule kinds selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadRuleKind {
    /// Follow the population gradient.
    #[default]
    Basic,
    /// Keep straight, producing a rectilinear grid.
    Grid,
}

impl RoadRuleKind {
    pub fn build(self) -> Arc<dyn RoadMapRule> {
        match self {
            RoadRuleKind::Basic => Arc::new(BasicRule::default()),
            RoadRuleKind::Grid => Arc::new(GridRule::default()),
        }
    }
}

/// Casts `scan_rays` rays spread over `scan_angle` degrees around the current
/// direction and turns toward the one crossing the most population, weighting
/// nearby cells higher. Keeps the current direction when every ray is empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BasicRule {
    pub scan_rays: u32,
    pub scan_angle: f32,
}

impl Default for BasicRule {
    fn default() -> Self {
        Self {
            scan_rays: 5,
            scan_angle: 20.0,
        }
    }
}

impl BasicRule {
    fn steer(&self, mut attributes: RoadAttributes, start: Vec2, population: &PopulationMap) -> RoadAttributes {
        if self.scan_rays == 0 || self.scan_angle <= 0.0 {
            return attributes;
        }

        let step = self.scan_angle / self.scan_rays as f32;
        let mut best_direction = attributes.direction;
        let mut best_weight = 0.0;

        for ray in 0..self.scan_rays {
            let angle = -self.scan_angle / 2.0 + step * ray as f32;
            let direction = rotate_degrees(attributes.direction, angle);
            let weight = ray_weight(start, direction, attributes.length, population);
            if weight > best_weight {
                best_weight = weight;
                best_direction = direction;
            }
        }

        attributes.direction = best_direction;
        attributes
    }
}

/// Population along a ray, linearly discounted with distance. Sampling stops
/// at the map edge.
fn ray_weight(start: Vec2, direction: Vec2, length: f32, population: &PopulationMap) -> f32 {
    let steps = length.max(0.0) as u32;
    let mut weight = 0.0;
    for j in 0..steps {
        let Some(density) = population.value_at(start + direction * j as f32) else {
            break;
        };
        weight += density * (1.0 - j as f32 / length);
    }
    weight
}

impl RoadMapRule for BasicRule {
    fn generate_highway(&self, attributes: RoadAttributes, start: Vec2, population: &PopulationMap) -> RoadAttributes {
        self.steer(attributes, start, population)
    }

    fn generate_byway(&self, attributes: RoadAttributes, start: Vec2, population: &PopulationMap) -> RoadAttributes {
        self.steer(attributes, start, population)
    }
}

/// Never turns. Combined with the perpendicular branches this grows a
/// Manhattan-style grid.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridRule;

impl RoadMapRule for GridRule {
    fn generate_highway(&self, attributes: RoadAttributes, _start: Vec2, _population: &PopulationMap) -> RoadAttributes {
        attributes
    }

    fn generate_byway(&self, attributes: RoadAttributes, _start: Vec2, _population: &PopulationMap) -> RoadAttributes {
        attributes
    }
}
