//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that builds the world,
//! drives the agents tick by tick and shuts the runtime down cleanly.

use crate::agent::{Agent, SimulationReport, TickContext};
use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::error::SimError;
use crate::logging::display_banner;
use crate::navigation::FlatGroundNavigation;
use crate::signals::wait_for_shutdown_signal;
use crate::world::build_collections;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smart_objects::{
    CandidateSearchQueue, CollectionRegistrationResult, SmartObjectEvent, SmartObjectSubsystem, Tag, TagQuery,
    Vec3,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Statistics are logged every this many ticks.
const STATS_INTERVAL_TICKS: u64 = 200;

/// Main application struct.
///
/// The `Application` owns the smart object runtime, the shared candidate
/// search queue and the simulated agents. [`Application::run`] drives them
/// on a fixed tick until the tick budget is spent or a shutdown signal
/// arrives.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    subsystem: Arc<SmartObjectSubsystem>,
    queue: CandidateSearchQueue,
    navigation: FlatGroundNavigation,
    agents: Vec<Agent>,
    rng: StdRng,
    report: SimulationReport,
    /// Incremented by a global subscriber for every subsystem event
    events_seen: Arc<AtomicU64>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Build the world and spawn the agents
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(agents) = args.agents {
            config.simulation.agent_count = agents;
        }
        if let Some(ticks) = args.ticks {
            config.simulation.tick_count = ticks;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        } else {
            info!("✅ Configuration loaded and validated successfully");
        }

        display_banner();

        Ok(Self::from_config(config)?)
    }

    /// Builds the runtime from an already validated configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, SimError> {
        let subsystem = Arc::new(SmartObjectSubsystem::new(config.subsystem.clone()));

        for collection in build_collections(&config.world)? {
            let name = collection.name.clone();
            match subsystem.register_collection(collection) {
                CollectionRegistrationResult::Succeeded => debug!("Registered collection '{}'", name),
                _ => return Err(SimError::CollectionRejected(name)),
            }
        }

        subsystem.initialize_runtime();
        if !subsystem.is_runtime_initialized() {
            return Err(SimError::RuntimeDisabled);
        }

        let events_seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&events_seen);
        subsystem.subscribe_all(Arc::new(move |_event: &SmartObjectEvent| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        let mut rng = StdRng::from_entropy();
        let extent = config.simulation.spawn_extent;
        let ground = config.world.ground_height;
        let agents = (0..config.simulation.agent_count)
            .map(|i| {
                let location = Vec3::new(rng.gen_range(-extent..=extent), rng.gen_range(-extent..=extent), ground);
                let activity = if i % 2 == 0 { "Activity.Sit" } else { "Activity.Use" };
                Agent::new(location, TagQuery::any([Tag::new(activity)]))
            })
            .collect();

        Ok(Self {
            queue: CandidateSearchQueue::new(config.subsystem.search.clone()),
            navigation: FlatGroundNavigation::new(ground, config.world.obstacles.clone()),
            config,
            subsystem,
            agents,
            rng,
            report: SimulationReport::default(),
            events_seen,
        })
    }

    /// Shared handle to the runtime, usable after `run` consumes the application.
    pub fn subsystem(&self) -> Arc<SmartObjectSubsystem> {
        Arc::clone(&self.subsystem)
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Runs the simulation until the tick budget is spent or a shutdown
    /// signal arrives, then tears the runtime down.
    pub async fn run(mut self) -> Result<SimulationReport, Box<dyn std::error::Error>> {
        info!("🌟 Starting smart object simulation");
        self.log_configuration_summary();

        let tick_interval = Duration::from_millis(self.config.simulation.tick_interval_ms);
        let tick_count = self.config.simulation.tick_count;
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);
        let mut shutdown_active = true;

        if tick_count == 0 {
            info!("🛑 Press Ctrl+C to stop the simulation");
        }

        loop {
            if tick_count != 0 && self.report.ticks >= tick_count {
                info!("⏱️ Tick budget of {} reached", tick_count);
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    self.tick(tick_interval);
                    if self.report.ticks % STATS_INTERVAL_TICKS == 0 {
                        self.log_statistics();
                    }
                }
                result = &mut shutdown, if shutdown_active => match result {
                    Ok(()) => {
                        info!("🛑 Shutdown signal received, stopping simulation...");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to install signal handlers, running without them: {e}");
                        shutdown_active = false;
                    }
                },
            }
        }

        self.subsystem.cleanup_runtime();
        self.report.events_seen = self.events_seen.load(Ordering::Relaxed);
        self.log_final_statistics();
        info!("✅ Smart object simulation shutdown complete");

        Ok(self.report)
    }

    /// Processes pending searches, then steps every agent once.
    fn tick(&mut self, tick_interval: Duration) {
        let processed = self.queue.process_pending(&self.subsystem);
        if processed > 0 {
            trace!("Tick {}: resolved {:?}", self.report.ticks, self.queue.take_completed());
        }

        let mut ctx = TickContext {
            tick: self.report.ticks,
            tick_interval,
            occupy_ticks: self.config.simulation.occupy_ticks,
            subsystem: &self.subsystem,
            queue: &mut self.queue,
            navigation: &self.navigation,
            rng: &mut self.rng,
            report: &mut self.report,
        };
        for agent in self.agents.iter_mut() {
            agent.step(&mut ctx);
        }

        self.report.ticks += 1;
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        let simulation = &self.config.simulation;
        info!("📋 Configuration Summary:");
        info!("  ⏱️ Tick interval: {}ms", simulation.tick_interval_ms);
        match simulation.tick_count {
            0 => info!("  🔁 Ticks: until interrupted"),
            n => info!("  🔁 Ticks: {}", n),
        }
        info!("  👥 Agents: {}", self.agents.len());
        info!("  🪑 Smart objects: {}", self.subsystem.object_count());
        info!("  🗺️ Spatial partition: {:?}", self.config.subsystem.spatial.kind);
        info!(
            "  🔎 Search: {} candidates, re-poll {}ms ±{:.0}%",
            self.config.subsystem.search.max_candidates,
            self.config.subsystem.search.repoll_interval_ms,
            self.config.subsystem.search.repoll_jitter * 100.0
        );
    }

    fn log_statistics(&self) {
        let stats = self.subsystem.stats();
        info!(
            "📊 Tick {} - {} claims | {} occupied | {} released | {} searches pending",
            self.report.ticks,
            stats.claims_granted,
            stats.occupations,
            stats.releases,
            self.queue.pending_count()
        );
    }

    /// Logs final statistics during shutdown.
    fn log_final_statistics(&self) {
        let stats = self.subsystem.stats();
        info!("📊 Final Statistics:");
        info!("  - Ticks simulated: {}", self.report.ticks);
        info!("  - Searches submitted: {}", self.report.searches_submitted);
        info!("  - Slot uses completed: {}", self.report.completed_uses);
        info!("  - Claim conflicts: {}", self.report.claim_conflicts);
        info!("  - Entrance failures: {}", self.report.entrance_failures);
        info!("  - Claims rejected by runtime: {}", stats.claims_rejected);
        info!("  - Aborted releases: {}", stats.aborted_releases);
        info!("  - Events observed: {}", self.report.events_seen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn quick_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.simulation.tick_interval_ms = 1;
        config.simulation.tick_count = 200;
        config.simulation.agent_count = 4;
        config.simulation.occupy_ticks = 3;
        config.simulation.spawn_extent = 200.0;
        config.subsystem.search.repoll_interval_ms = 2;
        config
    }

    #[tokio::test]
    async fn simulation_uses_slots_and_cleans_up() {
        let app = Application::from_config(quick_config()).unwrap();
        let subsystem = app.subsystem();
        assert_eq!(subsystem.object_count(), 6);
        assert_eq!(app.agents().len(), 4);

        let report = app.run().await.unwrap();
        assert_eq!(report.ticks, 200);
        assert!(report.searches_submitted > 0);
        assert!(report.occupations > 0);
        assert!(report.completed_uses > 0);
        assert!(report.events_seen > 0);
        assert_eq!(subsystem.object_count(), 0);
        assert!(!subsystem.is_runtime_initialized());
    }

    #[test]
    fn disabled_runtime_is_an_error() {
        let mut config = quick_config();
        config.subsystem.disable_runtime = true;
        assert!(matches!(
            Application::from_config(config),
            Err(SimError::RuntimeDisabled)
        ));
    }

    #[tokio::test]
    async fn cli_overrides_apply_on_top_of_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        let args = CliArgs::try_parse_from([
            "smart_objects_sim",
            "--config",
            path.to_str().unwrap(),
            "--agents",
            "7",
        ])
        .unwrap();

        let app = Application::new(args).await.unwrap();
        assert!(path.exists());
        assert_eq!(app.agents().len(), 7);
        assert_eq!(app.config.simulation.tick_count, 600);
    }
}
