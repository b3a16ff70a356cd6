//! R*-tree based spatial indexing
//!
//! Stores each object's world bounds as an `rstar` AABB. Range queries are
//! envelope intersection queries against the query box.

use super::{SpatialEntryToken, SpatialIndexStats, SpatialPartition};
use crate::math::Box3;
use crate::types::ObjectHandle;
use rstar::{RTree, RTreeObject, AABB};

/// Entry stored inside the R-tree.
#[derive(Debug, Clone)]
struct TreeEntry {
    handle: ObjectHandle,
    bounds: Box3,
}

impl TreeEntry {
    fn new(handle: ObjectHandle, bounds: Box3) -> Self {
        Self { handle, bounds }
    }
}

impl PartialEq for TreeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for TreeEntry {}

impl RTreeObject for TreeEntry {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bounds.min.to_array(), self.bounds.max.to_array())
    }
}

/// R*-tree over object bounds.
#[derive(Debug)]
pub struct RTreePartition {
    /// World bounds (used for stats)
    bounds: Box3,
    tree: RTree<TreeEntry>,
    stats: SpatialIndexStats,
}

impl Default for RTreePartition {
    fn default() -> Self {
        Self::new()
    }
}

impl RTreePartition {
    pub fn new() -> Self {
        Self {
            bounds: Box3::empty(),
            tree: RTree::new(),
            stats: SpatialIndexStats::default(),
        }
    }

    pub fn world_bounds(&self) -> Box3 {
        self.bounds
    }

    /// Rebuilds the tree for better balance
    pub fn rebuild(&mut self) {
        let entries: Vec<_> = self.tree.iter().cloned().collect();
        self.tree = RTree::bulk_load(entries);
    }
}

impl SpatialPartition for RTreePartition {
    fn set_bounds(&mut self, bounds: Box3) {
        self.bounds = bounds;
    }

    fn add(&mut self, handle: ObjectHandle, bounds: Box3) -> SpatialEntryToken {
        self.tree.insert(TreeEntry::new(handle, bounds));
        self.stats.total_insertions += 1;
        SpatialEntryToken { bounds }
    }

    fn remove(&mut self, handle: ObjectHandle, token: SpatialEntryToken) {
        if self.tree.remove(&TreeEntry::new(handle, token.bounds)).is_some() {
            self.stats.total_removals += 1;
        }
    }

    fn find(&mut self, query: &Box3, out: &mut Vec<ObjectHandle>) {
        let start = out.len();
        if query.is_valid() {
            let envelope = AABB::from_corners(query.min.to_array(), query.max.to_array());
            out.extend(
                self.tree
                    .locate_in_envelope_intersecting(&envelope)
                    .map(|entry| entry.handle),
            );
        }

        self.stats.total_queries += 1;
        self.stats.last_query_result_count = out.len() - start;
    }

    fn len(&self) -> usize {
        self.tree.size()
    }

    fn stats(&self) -> SpatialIndexStats {
        SpatialIndexStats {
            objects: self.tree.size(),
            ..self.stats.clone()
        }
    }
}
