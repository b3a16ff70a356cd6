/// Statistics tracking for the smart object subsystem
use super::core::SmartObjectSubsystem;
use crate::events::EventBusStats;
use crate::spatial::SpatialIndexStats;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by subsystem operations.
#[derive(Debug, Default)]
pub(super) struct StatsCounters {
    pub claims_granted: AtomicU64,
    pub claims_rejected: AtomicU64,
    pub claims_overridden: AtomicU64,
    pub occupations: AtomicU64,
    pub releases: AtomicU64,
    pub aborted_releases: AtomicU64,
    pub queries: AtomicU64,
    pub objects_created: AtomicU64,
    pub objects_destroyed: AtomicU64,
}

impl StatsCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of the subsystem state for monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubsystemStats {
    /// Live runtime objects
    pub objects: usize,
    /// Registered components, pending ones excluded
    pub components: usize,
    /// Components waiting for runtime initialization
    pub pending_components: usize,
    pub collections: usize,
    pub runtime_initialized: bool,
    pub claims_granted: u64,
    pub claims_rejected: u64,
    /// Claims that took a slot over from a lower priority claimant
    pub claims_overridden: u64,
    pub occupations: u64,
    pub releases: u64,
    /// Releases forced by destruction or claim override
    pub aborted_releases: u64,
    pub queries: u64,
    pub objects_created: u64,
    pub objects_destroyed: u64,
    pub spatial: SpatialIndexStats,
    pub events: EventBusStats,
}

impl SmartObjectSubsystem {
    /// Gets the current subsystem statistics
    pub fn stats(&self) -> SubsystemStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        SubsystemStats {
            objects: self.objects.read().len(),
            components: self.components.read().len(),
            pending_components: self.pending_components.lock().len(),
            collections: self.collections.read().len(),
            runtime_initialized: self.is_runtime_initialized(),
            claims_granted: load(&self.stats.claims_granted),
            claims_rejected: load(&self.stats.claims_rejected),
            claims_overridden: load(&self.stats.claims_overridden),
            occupations: load(&self.stats.occupations),
            releases: load(&self.stats.releases),
            aborted_releases: load(&self.stats.aborted_releases),
            queries: load(&self.stats.queries),
            objects_created: load(&self.stats.objects_created),
            objects_destroyed: load(&self.stats.objects_destroyed),
            spatial: self.spatial.lock().stats(),
            events: self.events.stats(),
        }
    }
}
