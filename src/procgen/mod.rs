//! Procedural generation systems.
//!
//! - Agent-grown road networks
//! - Shape grammars for buildings
//! - Building placement along roads

use bevy::prelude::*;

pub mod building_factory;
pub mod building_generator;
pub mod geometry;
pub mod grammar;
pub mod road_generator;
pub mod road_rules;
pub mod roads;
pub mod rulesets;

pub struct ProcgenPlugin;

impl Plugin for ProcgenPlugin {
    fn build(&self, app: &mut App) {
        // Roads must exist before buildings can line them
        app.add_plugins(roads::RoadsPlugin)
            .add_plugins(road_generator::RoadGeneratorPlugin)
            .add_plugins(building_factory::BuildingFactoryPlugin);
    }
}
