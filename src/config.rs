//! City configuration loaded from JSON.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::procgen::building_factory::BuildingFactoryConfig;
use crate::procgen::grammar::RuleSet;
use crate::procgen::road_generator::RoadGenConfig;
use crate::world::WorldConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Everything needed to grow one city. Missing sections fall back to their
/// defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    pub world: WorldConfig,
    pub roads: RoadGenConfig,
    pub buildings: BuildingFactoryConfig,
    /// Extra rule set files, relative to the config file.
    pub rule_sets: Vec<PathBuf>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl CityConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config: Self = serde_json::from_str(&read(path)?)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parse every file listed in `rule_sets`.
    pub fn load_rule_sets(&self) -> Result<Vec<RuleSet>, ConfigError> {
        self.rule_sets
            .iter()
            .map(|file| {
                let path = match &self.base_dir {
                    Some(dir) if file.is_relative() => dir.join(file),
                    _ => file.clone(),
                };
                RuleSet::from_json(&read(&path)?)
            })
            .collect()
    }

    /// Use one seed for every generator.
    pub fn reseed(&mut self, seed: u64) {
        self.world.seed = seed as u32;
        self.roads.seed = seed;
        self.buildings.seed = seed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: CityConfig = serde_json::from_str(
            r#"{ "roads": { "road_length": 12.0, "rule": "grid" }, "world": { "city_radius": 60.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.roads.road_length, 12.0);
        assert_eq!(config.roads.default_delay, RoadGenConfig::default().default_delay);
        assert_eq!(config.world.city_radius, 60.0);
        assert_eq!(config.buildings.models.len(), 3);
        assert!(config.rule_sets.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = CityConfig::load("/nonexistent/city.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("city.json")));
    }

    #[test]
    fn reseed_reaches_every_generator() {
        let mut config = CityConfig::default();
        config.reseed(99);
        assert_eq!((config.world.seed, config.roads.seed, config.buildings.seed), (99, 99, 99));
    }
}
