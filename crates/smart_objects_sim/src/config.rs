//! Configuration management for the smart object simulation.
//!
//! This module handles loading and validation of the TOML configuration:
//! simulation pacing, the subsystem settings, logging and the world
//! description (definitions plus placements grouped into collections).

use serde::{Deserialize, Serialize};
use smart_objects::{
    BehaviorDefinition, Box3, EntranceAnnotation, Rotator, SlotAnnotation, SlotDefinition, SmartObjectDefinition,
    SubsystemConfig, Tag, TagContainer, Vec3,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}
fn default_tick_count() -> u64 { 600 }
fn default_agent_count() -> usize { 16 }
fn default_occupy_ticks() -> u64 { 40 }
fn default_spawn_extent() -> f64 { 1500.0 }

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Simulation pacing and population
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Smart object runtime configuration
    #[serde(default)]
    pub subsystem: SubsystemConfig,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Definitions, placements and static obstacles
    #[serde(default)]
    pub world: WorldSettings,
}

/// Simulation pacing and population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Tick interval in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Ticks to run before shutting down; 0 runs until interrupted
    #[serde(default = "default_tick_count")]
    pub tick_count: u64,
    #[serde(default = "default_agent_count")]
    pub agent_count: usize,
    /// How long an agent uses a slot once it occupies it
    #[serde(default = "default_occupy_ticks")]
    pub occupy_ticks: u64,
    /// Agents spawn uniformly inside this half-size around the origin
    #[serde(default = "default_spawn_extent")]
    pub spawn_extent: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            tick_count: default_tick_count(),
            agent_count: default_agent_count(),
            occupy_ticks: default_occupy_ticks(),
            spawn_extent: default_spawn_extent(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_path: None,
        }
    }
}

/// World description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Height of the flat ground agents walk on
    #[serde(default)]
    pub ground_height: f64,
    #[serde(default)]
    pub definitions: Vec<SmartObjectDefinition>,
    #[serde(default)]
    pub collections: Vec<CollectionSettings>,
    /// Boxes that block entrance locations
    #[serde(default)]
    pub obstacles: Vec<Box3>,
}

/// A named group of placements registered as one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub name: String,
    #[serde(default)]
    pub placements: Vec<PlacementSettings>,
}

/// One smart object instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSettings {
    /// Name of a definition in `world.definitions`
    pub definition: String,
    pub location: Vec3,
    /// Rotation around the up axis in degrees
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub tags: TagContainer,
}

fn entrance_at(offset: Vec3, yaw: f64) -> SlotAnnotation {
    SlotAnnotation::Entrance(EntranceAnnotation {
        offset,
        rotation: Rotator::from_yaw(yaw),
        ..EntranceAnnotation::default()
    })
}

fn bench_definition() -> SmartObjectDefinition {
    let seats = [-60.0, 60.0].map(|x| {
        let mut seat = SlotDefinition::at(Vec3::new(x, 0.0, 0.0));
        seat.activity_tags.add(Tag::new("Activity.Sit"));
        seat.annotations.push(entrance_at(Vec3::new(0.0, 80.0, 0.0), 270.0));
        seat
    });
    let mut bench = SmartObjectDefinition::new("Bench", seats.to_vec());
    bench.activity_tags.add(Tag::new("Furniture.Bench"));
    bench.default_behavior_definitions.push(BehaviorDefinition::new("Sit"));
    bench
}

fn kiosk_definition() -> SmartObjectDefinition {
    let mut counter = SlotDefinition::at(Vec3::ZERO);
    counter.activity_tags.add(Tag::new("Activity.Use"));
    counter.annotations.push(entrance_at(Vec3::new(90.0, 0.0, 0.0), 180.0));
    counter
        .behavior_definitions
        .push(BehaviorDefinition::new("Use").with_name("order"));
    SmartObjectDefinition::new("Kiosk", vec![counter])
}

impl Default for WorldSettings {
    fn default() -> Self {
        let benches = (0..4)
            .map(|i| PlacementSettings {
                definition: "Bench".to_string(),
                location: Vec3::new(-900.0 + i as f64 * 600.0, -400.0, 0.0),
                yaw: 0.0,
                tags: TagContainer::new(),
            })
            .collect();
        let kiosks = (0..2)
            .map(|i| PlacementSettings {
                definition: "Kiosk".to_string(),
                location: Vec3::new(-300.0 + i as f64 * 600.0, 500.0, 0.0),
                yaw: 90.0,
                tags: TagContainer::new(),
            })
            .collect();

        Self {
            ground_height: 0.0,
            definitions: vec![bench_definition(), kiosk_definition()],
            collections: vec![
                CollectionSettings {
                    name: "Plaza".to_string(),
                    placements: benches,
                },
                CollectionSettings {
                    name: "Market".to_string(),
                    placements: kiosks,
                },
            ],
            obstacles: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration settings.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error message describing
    /// the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        if self.simulation.tick_interval_ms == 0 {
            return Err("simulation.tick_interval_ms must be greater than 0".to_string());
        }
        if self.simulation.occupy_ticks == 0 {
            return Err("simulation.occupy_ticks must be greater than 0".to_string());
        }
        if !(self.simulation.spawn_extent.is_finite() && self.simulation.spawn_extent >= 0.0) {
            return Err("simulation.spawn_extent must be a non-negative number".to_string());
        }
        if self.subsystem.search.repoll_interval_ms == 0 {
            return Err("subsystem.search.repoll_interval_ms must be greater than 0".to_string());
        }

        self.subsystem.validate().map_err(|e| e.to_string())?;

        let mut names = HashSet::new();
        for definition in &self.world.definitions {
            if !names.insert(definition.name.as_str()) {
                return Err(format!("Duplicate definition name: {}", definition.name));
            }
            definition
                .validate()
                .map_err(|e| format!("Definition '{}': {e}", definition.name))?;
        }

        for collection in &self.world.collections {
            for placement in &collection.placements {
                if !names.contains(placement.definition.as_str()) {
                    return Err(format!(
                        "Collection '{}' places unknown definition '{}'",
                        collection.name, placement.definition
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_objects::SpatialPartitionKind;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.simulation.tick_interval_ms, 50);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.logging.file_path.is_none());
        assert_eq!(config.world.definitions.len(), 2);
        assert_eq!(config.world.collections.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_writes_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("smart_objects.toml");

        let created = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.world.definitions.len(), created.world.definitions.len());
        assert_eq!(reloaded.world.collections[0].placements.len(), 4);
        assert_eq!(
            reloaded.world.definitions[0].default_behavior_definitions[0].class,
            "Sit"
        );
        assert_eq!(reloaded.world.definitions[0].slots[0].entrances().count(), 1);
        assert!(reloaded.validate().is_ok());
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[simulation]
agent_count = 3

[subsystem.spatial]
kind = "RTree"

[logging]
level = "debug"
json_format = true

[world]
definitions = []
collections = []
"#;
        tokio::fs::write(file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.simulation.agent_count, 3);
        assert_eq!(config.simulation.tick_interval_ms, 50);
        assert_eq!(config.subsystem.spatial.kind, SpatialPartitionKind::RTree);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(config.world.definitions.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.simulation.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.world.collections[0].placements[0].definition = "Fountain".to_string();
        let error = config.validate().unwrap_err();
        assert!(error.contains("Fountain"));

        let mut config = AppConfig::default();
        config.world.definitions[1].slots.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.subsystem.search.max_candidates = 9;
        assert!(config.validate().is_err());
    }
}
