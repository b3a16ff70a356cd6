//! # Spatial Partitioning
//!
//! Range queries over object bounds. The subsystem picks one
//! implementation at runtime initialization, from
//! [`SpatialConfig::kind`](crate::config::SpatialConfig), and uses it
//! through the [`SpatialPartition`] trait.
//!
//! ## Implementations
//!
//! - [`HashGridPartition`] - Hierarchical 2D hash grid; objects are stored on
//!   the finest level whose cells are at least as large as the object
//! - [`RTreePartition`] - R*-tree over 3D bounding boxes backed by `rstar`
//!
//! ## Contract
//!
//! Every [`SpatialPartition::add`] returns a [`SpatialEntryToken`] that must
//! be handed back to exactly one [`SpatialPartition::remove`]. Queries return
//! each intersecting handle once, in no particular order.

mod grid;
mod rtree;

pub use grid::HashGridPartition;
pub use rtree::RTreePartition;

use crate::config::{SpatialConfig, SpatialPartitionKind};
use crate::math::Box3;
use crate::types::ObjectHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque record of where an entry was inserted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntryToken {
    pub(crate) bounds: Box3,
}

/// Counters exposed by every partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpatialIndexStats {
    pub objects: usize,
    pub total_insertions: u64,
    pub total_removals: u64,
    pub total_queries: u64,
    pub last_query_result_count: usize,
    /// Occupied cells for grids, 0 for trees
    pub occupied_cells: usize,
}

/// Spatial index mapping bounding boxes to object handles.
pub trait SpatialPartition: Send + Sync + fmt::Debug {
    /// Informs the partition of the expected world extent.
    fn set_bounds(&mut self, bounds: Box3);

    fn add(&mut self, handle: ObjectHandle, bounds: Box3) -> SpatialEntryToken;

    fn remove(&mut self, handle: ObjectHandle, token: SpatialEntryToken);

    /// Appends every handle whose bounds intersect `query` to `out`.
    fn find(&mut self, query: &Box3, out: &mut Vec<ObjectHandle>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> SpatialIndexStats;
}

/// Builds the partition selected by `config`, sized for `bounds`.
pub fn create_partition(config: &SpatialConfig, bounds: Box3) -> Box<dyn SpatialPartition> {
    let mut partition: Box<dyn SpatialPartition> = match config.kind {
        SpatialPartitionKind::HashGrid => Box::new(HashGridPartition::new(
            config.cell_size,
            config.levels,
            config.level_ratio,
        )),
        SpatialPartitionKind::RTree => Box::new(RTreePartition::new()),
    };
    partition.set_bounds(bounds);
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn boxed(x: f64, y: f64, half: f64) -> Box3 {
        Box3::from_center_extent(Vec3::new(x, y, 0.0), Vec3::splat(half))
    }

    fn exercise(partition: &mut dyn SpatialPartition) {
        let near = ObjectHandle::dynamic();
        let far = ObjectHandle::dynamic();
        let huge = ObjectHandle::dynamic();

        let near_token = partition.add(near, boxed(10.0, 10.0, 20.0));
        partition.add(far, boxed(9000.0, -4000.0, 20.0));
        partition.add(huge, boxed(0.0, 0.0, 50_000.0));
        assert_eq!(partition.len(), 3);

        let mut found = Vec::new();
        partition.find(&boxed(0.0, 0.0, 50.0), &mut found);
        assert!(found.contains(&near));
        assert!(found.contains(&huge));
        assert!(!found.contains(&far));
        assert_eq!(found.len(), 2, "no duplicates expected: {found:?}");

        found.clear();
        partition.find(&boxed(9000.0, -4000.0, 1.0), &mut found);
        assert!(found.contains(&far));

        partition.remove(near, near_token);
        found.clear();
        partition.find(&boxed(0.0, 0.0, 50.0), &mut found);
        assert!(!found.contains(&near));
        assert_eq!(partition.len(), 2);

        let moved = partition.add(near, boxed(-5000.0, 0.0, 10.0));
        found.clear();
        partition.find(&boxed(-5000.0, 0.0, 1.0), &mut found);
        assert!(found.contains(&near));
        partition.remove(near, moved);
        assert_eq!(partition.stats().objects, 2);
    }

    #[test]
    fn both_partitions_satisfy_the_contract() {
        let config = SpatialConfig::default();
        let bounds = boxed(0.0, 0.0, 10_000.0);
        exercise(create_partition(&config, bounds).as_mut());

        let config = SpatialConfig {
            kind: SpatialPartitionKind::RTree,
            ..SpatialConfig::default()
        };
        exercise(create_partition(&config, bounds).as_mut());
    }

    #[test]
    fn queries_never_miss_intersecting_entries() {
        let config = SpatialConfig { cell_size: 100.0, ..SpatialConfig::default() };
        let mut grid = create_partition(&config, Box3::empty());
        let mut tree = create_partition(&SpatialConfig { kind: SpatialPartitionKind::RTree, ..config }, Box3::empty());

        let mut entries = Vec::new();
        for i in 0..40 {
            let handle = ObjectHandle::dynamic();
            let bounds = boxed(i as f64 * 137.0 - 2500.0, (i % 7) as f64 * 311.0 - 1000.0, 5.0 + (i % 5) as f64 * 90.0);
            grid.add(handle, bounds);
            tree.add(handle, bounds);
            entries.push((handle, bounds));
        }

        let query = boxed(-300.0, 200.0, 700.0);
        let expected: Vec<_> = entries.iter().filter(|(_, b)| b.intersects(&query)).map(|(h, _)| *h).collect();

        for partition in [&mut grid, &mut tree] {
            let mut found = Vec::new();
            partition.find(&query, &mut found);
            for handle in &expected {
                assert!(found.contains(handle));
            }
            assert_eq!(found.len(), expected.len());
        }
    }
}
