//! Subsystem configuration.
//!
//! Every section deserializes with defaults so a host can embed
//! [`SubsystemConfig`] in its own TOML file and only override what it needs.

use crate::definition::UserCapsuleParams;
use crate::error::SmartObjectError;
use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// Upper bound on candidates returned by one search request.
pub const MAX_CANDIDATE_SLOTS: usize = 4;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubsystemConfig {
    /// When set, `initialize_runtime` is a logged no-op
    #[serde(default)]
    pub disable_runtime: bool,
    /// Spatial index selection and tuning
    #[serde(default)]
    pub spatial: SpatialConfig,
    /// Batched candidate search
    #[serde(default)]
    pub search: SearchConfig,
    /// Entrance validation defaults
    #[serde(default)]
    pub entrance: EntranceConfig,
}

impl SubsystemConfig {
    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), SmartObjectError> {
        self.spatial.validate()?;
        self.search.validate()?;
        self.entrance.validate()
    }
}

/// Which spatial partition implementation to build at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpatialPartitionKind {
    #[default]
    HashGrid,
    RTree,
}

/// Spatial index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialConfig {
    #[serde(default)]
    pub kind: SpatialPartitionKind,
    /// Cell size of the finest grid level
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    /// Number of grid levels
    #[serde(default = "default_grid_levels")]
    pub levels: usize,
    /// Size ratio between consecutive levels
    #[serde(default = "default_level_ratio")]
    pub level_ratio: usize,
}

fn default_cell_size() -> f64 { 500.0 }
fn default_grid_levels() -> usize { 5 }
fn default_level_ratio() -> usize { 4 }

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            kind: SpatialPartitionKind::default(),
            cell_size: default_cell_size(),
            levels: default_grid_levels(),
            level_ratio: default_level_ratio(),
        }
    }
}

impl SpatialConfig {
    fn validate(&self) -> Result<(), SmartObjectError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(SmartObjectError::Config(format!(
                "spatial.cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if self.levels == 0 || self.levels > 16 {
            return Err(SmartObjectError::Config(format!(
                "spatial.levels must be between 1 and 16, got {}",
                self.levels
            )));
        }
        if self.level_ratio < 2 {
            return Err(SmartObjectError::Config(format!(
                "spatial.level_ratio must be at least 2, got {}",
                self.level_ratio
            )));
        }
        Ok(())
    }
}

/// Candidate search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Candidates kept per request (at most 4)
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Base delay before a requester polls again (in milliseconds)
    #[serde(default = "default_repoll_interval_ms")]
    pub repoll_interval_ms: u64,
    /// Fraction of the base delay applied as random jitter in both directions
    #[serde(default = "default_repoll_jitter")]
    pub repoll_jitter: f64,
    /// Requests resolved per `process_pending` call
    #[serde(default = "default_max_requests_per_batch")]
    pub max_requests_per_batch: usize,
    /// Half-size of the search box around the requester
    #[serde(default = "default_search_extents")]
    pub search_extents: Vec3,
}

fn default_max_candidates() -> usize { MAX_CANDIDATE_SLOTS }
fn default_repoll_interval_ms() -> u64 { 500 }
fn default_repoll_jitter() -> f64 { 0.1 }
fn default_max_requests_per_batch() -> usize { 64 }
fn default_search_extents() -> Vec3 { Vec3::new(2000.0, 2000.0, 500.0) }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            repoll_interval_ms: default_repoll_interval_ms(),
            repoll_jitter: default_repoll_jitter(),
            max_requests_per_batch: default_max_requests_per_batch(),
            search_extents: default_search_extents(),
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<(), SmartObjectError> {
        if self.max_candidates == 0 || self.max_candidates > MAX_CANDIDATE_SLOTS {
            return Err(SmartObjectError::Config(format!(
                "search.max_candidates must be between 1 and {}, got {}",
                MAX_CANDIDATE_SLOTS, self.max_candidates
            )));
        }
        if !(0.0..1.0).contains(&self.repoll_jitter) {
            return Err(SmartObjectError::Config(format!(
                "search.repoll_jitter must be in [0, 1), got {}",
                self.repoll_jitter
            )));
        }
        if self.max_requests_per_batch == 0 {
            return Err(SmartObjectError::Config(
                "search.max_requests_per_batch must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Entrance validation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntranceConfig {
    /// Box half-size around each candidate for projection and ground trace
    #[serde(default = "default_navigation_extents")]
    pub navigation_search_extents: Vec3,
    /// Capsule used for overlap checks when the request does not supply one
    #[serde(default)]
    pub default_user_capsule: UserCapsuleParams,
}

fn default_navigation_extents() -> Vec3 { Vec3::new(5.0, 5.0, 40.0) }

impl Default for EntranceConfig {
    fn default() -> Self {
        Self {
            navigation_search_extents: default_navigation_extents(),
            default_user_capsule: UserCapsuleParams::default(),
        }
    }
}

impl EntranceConfig {
    fn validate(&self) -> Result<(), SmartObjectError> {
        let capsule = &self.default_user_capsule;
        if capsule.radius <= 0.0 || capsule.height < capsule.radius * 2.0 {
            return Err(SmartObjectError::Config(format!(
                "entrance.default_user_capsule is degenerate (radius {}, height {})",
                capsule.radius, capsule.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SubsystemConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.max_candidates, MAX_CANDIDATE_SLOTS);
        assert_eq!(config.spatial.kind, SpatialPartitionKind::HashGrid);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SubsystemConfig =
            serde_json::from_str(r#"{"spatial": {"kind": "RTree"}, "search": {"repoll_interval_ms": 250}}"#)
                .unwrap();
        assert_eq!(config.spatial.kind, SpatialPartitionKind::RTree);
        assert_eq!(config.spatial.cell_size, 500.0);
        assert_eq!(config.search.repoll_interval_ms, 250);
        assert_eq!(config.search.max_requests_per_batch, 64);
        assert!(!config.disable_runtime);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = SubsystemConfig::default();
        config.search.max_candidates = 5;
        assert!(config.validate().is_err());

        let mut config = SubsystemConfig::default();
        config.spatial.level_ratio = 1;
        assert!(config.validate().is_err());

        let mut config = SubsystemConfig::default();
        config.search.repoll_jitter = 1.5;
        assert!(config.validate().is_err());
    }
}
