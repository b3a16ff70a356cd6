//! # Smart Object Simulation - Main Entry Point
//!
//! Headless host for the smart object runtime. It builds a world of benches
//! and kiosks from configuration, spawns agents that search, claim, occupy
//! and release slots, and reports what happened.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! smart_objects_sim
//!
//! # Specify custom configuration
//! smart_objects_sim --config plaza.toml
//!
//! # Override specific settings
//! smart_objects_sim --agents 64 --ticks 0 --log-level debug
//!
//! # JSON logging
//! smart_objects_sim --json-logs
//! ```
//!
//! ## Configuration
//!
//! The simulation loads configuration from a TOML file (default: `smart_objects.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The simulation stops early and cleans up the runtime on:
//! - SIGINT (Ctrl+C)
//! - SIGTERM (Unix systems)

use tracing::{error, info};

mod agent;
mod app;
mod cli;
mod config;
mod error;
mod logging;
mod navigation;
mod signals;
mod world;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Main entry point for the simulation.
///
/// Handles the complete application lifecycle including:
/// 1. Command-line argument parsing
/// 2. Configuration loading and logging initialization
/// 3. Application creation and execution
/// 4. Error handling and cleanup
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => match app.run().await {
            Ok(report) => info!(
                "🏁 {} uses completed over {} ticks",
                report.completed_uses, report.ticks
            ),
            Err(e) => {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use agent::{Agent, AgentPhase, SimulationReport};
pub use config::{CollectionSettings, LoggingSettings, PlacementSettings, SimulationSettings, WorldSettings};
pub use error::SimError;
pub use navigation::FlatGroundNavigation;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_a_world() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let collections = world::build_collections(&config.world).unwrap();
        let placements: usize = collections.iter().map(|c| c.container.len()).sum();
        assert_eq!(placements, 6);
    }

    #[tokio::test]
    async fn test_default_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let toml_content = toml::to_string_pretty(&config).expect("Failed to serialize default config to TOML");
        let parsed: AppConfig = toml::from_str(&toml_content).expect("Failed to parse default config");
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.world.definitions[0].name, config.world.definitions[0].name);
        assert_eq!(parsed.simulation.agent_count, config.simulation.agent_count);
    }
}
