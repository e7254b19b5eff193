//! Headless city generator.
//!
//! Usage: procity [OPTIONS]
//!
//! Options:
//!   --config <PATH>     City configuration JSON (default: built-in settings)
//!   --seed <SEED>       Seed for terrain, roads and buildings
//!   --size <CELLS>      Square map size in cells
//!   --iterations <N>    Road growth iterations, 0 for unbounded

use std::str::FromStr;

use bevy::log::LogPlugin;
use bevy::prelude::*;

use procity::config::CityConfig;
use procity::procgen::building_factory::{BuildingLibrary, PlacedBuildings};
use procity::procgen::building_generator::BuildingGenerator;
use procity::procgen::road_generator::GenerateRoadsEvent;
use procity::procgen::roads::RoadNetwork;
use procity::procgen::ProcgenPlugin;
use procity::world::{CityInputs, WorldPlugin};

fn main() -> AppExit {
    let args: Vec<String> = std::env::args().collect();

    let mut config = match parse_arg::<String>(&args, "--config") {
        Some(path) => match CityConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                return AppExit::error();
            }
        },
        None => CityConfig::default(),
    };
    if let Some(seed) = parse_arg::<u64>(&args, "--seed") {
        config.reseed(seed);
    }
    if let Some(size) = parse_arg::<u32>(&args, "--size") {
        config.world.size = UVec2::splat(size);
    }
    if let Some(iterations) = parse_arg::<u32>(&args, "--iterations") {
        config.roads.iteration_limit = iterations;
    }

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .add_plugins(LogPlugin::default())
        .add_plugins(WorldPlugin)
        .add_plugins(ProcgenPlugin);

    let mut generator = BuildingGenerator::with_builtin(config.buildings.seed);
    match config.load_rule_sets() {
        Ok(rule_sets) => {
            for rule_set in rule_sets {
                info!("Loaded rule set `{}`", rule_set.name);
                generator.register(rule_set);
            }
        }
        Err(err) => {
            error!("{err}");
            return AppExit::error();
        }
    }

    info!(
        "Generating terrain: {}x{} cells, seed {}",
        config.world.size.x, config.world.size.y, config.world.seed
    );
    let Some(inputs) = CityInputs::generate(&config.world) else {
        error!("No suitable city centre found; try another seed");
        return AppExit::error();
    };
    info!("City centre at {}", inputs.city_centre);

    app.insert_resource(config.world.clone())
        .insert_resource(config.roads.clone())
        .insert_resource(config.buildings.clone())
        .insert_resource(BuildingLibrary { generator })
        .insert_resource(inputs)
        .add_systems(Startup, request_roads)
        .add_systems(Update, report_and_exit);

    app.run()
}

fn request_roads(mut events: EventWriter<GenerateRoadsEvent>) {
    events.send(GenerateRoadsEvent::default());
}

fn report_and_exit(network: Res<RoadNetwork>, placed: Res<PlacedBuildings>, mut exit: EventWriter<AppExit>) {
    if !placed.generated {
        return;
    }

    let parts: usize = placed.buildings.iter().map(|b| b.model.parts.len()).sum();
    info!(
        "City complete: {} crossroads, {} roads ({} highways), {} buildings, {} model parts",
        network.crossroad_count(),
        network.road_count(),
        network.highway_count(),
        placed.buildings.len(),
        parts
    );
    exit.send(AppExit::Success);
}

fn parse_arg<T: FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}
