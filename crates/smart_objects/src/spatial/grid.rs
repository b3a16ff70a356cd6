//! Hierarchical 2D hash grid.

use super::{SpatialEntryToken, SpatialIndexStats, SpatialPartition};
use crate::math::Box3;
use crate::types::ObjectHandle;
use std::collections::{HashMap, HashSet};

/// Entries covering more top-level cells than this go to a linear list.
const MAX_CELLS_PER_ENTRY: i64 = 16;

type CellKey = (u8, i64, i64);

#[derive(Debug, Clone, Copy)]
struct GridItem {
    handle: ObjectHandle,
    bounds: Box3,
}

#[derive(Debug, Clone, Copy)]
struct CellRange {
    min_x: i64,
    min_y: i64,
    max_x: i64,
    max_y: i64,
}

impl CellRange {
    fn cell_count(&self) -> i64 {
        let width = self.max_x.saturating_sub(self.min_x).saturating_add(1);
        let height = self.max_y.saturating_sub(self.min_y).saturating_add(1);
        width.saturating_mul(height)
    }
}

/// Hash grid with several levels of increasing cell size.
///
/// An entry lives on the finest level whose cell size is at least the
/// entry's horizontal size, in every cell its bounds overlap there. Entries
/// too large for the top level are kept in a separate list that every query
/// scans.
#[derive(Debug)]
pub struct HashGridPartition {
    cell_size: f64,
    levels: usize,
    level_ratio: usize,
    cells: HashMap<CellKey, Vec<GridItem>>,
    occupied_per_level: Vec<usize>,
    oversized: Vec<GridItem>,
    count: usize,
    bounds: Box3,
    stats: SpatialIndexStats,
}

impl HashGridPartition {
    pub fn new(cell_size: f64, levels: usize, level_ratio: usize) -> Self {
        let levels = levels.clamp(1, u8::MAX as usize);
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 1.0 },
            levels,
            level_ratio: level_ratio.max(2),
            cells: HashMap::new(),
            occupied_per_level: vec![0; levels],
            oversized: Vec::new(),
            count: 0,
            bounds: Box3::empty(),
            stats: SpatialIndexStats::default(),
        }
    }

    /// Bounds passed to [`SpatialPartition::set_bounds`].
    pub fn world_bounds(&self) -> Box3 {
        self.bounds
    }

    fn level_cell_size(&self, level: usize) -> f64 {
        self.cell_size * (self.level_ratio as f64).powi(level as i32)
    }

    fn level_for(&self, bounds: &Box3) -> usize {
        let size = bounds.size();
        let largest = size.x.max(size.y);
        (0..self.levels)
            .find(|&level| largest <= self.level_cell_size(level))
            .unwrap_or(self.levels - 1)
    }

    fn cell_range(&self, level: usize, bounds: &Box3) -> CellRange {
        let size = self.level_cell_size(level);
        CellRange {
            min_x: (bounds.min.x / size).floor() as i64,
            min_y: (bounds.min.y / size).floor() as i64,
            max_x: (bounds.max.x / size).floor() as i64,
            max_y: (bounds.max.y / size).floor() as i64,
        }
    }

    /// Where an entry with `bounds` is stored: a level and cell range, or
    /// `None` for the oversized list.
    fn placement(&self, bounds: &Box3) -> Option<(usize, CellRange)> {
        if !bounds.is_valid() || !bounds.is_finite() {
            return None;
        }
        let level = self.level_for(bounds);
        let range = self.cell_range(level, bounds);
        if range.cell_count() > MAX_CELLS_PER_ENTRY {
            None
        } else {
            Some((level, range))
        }
    }
}

impl SpatialPartition for HashGridPartition {
    fn set_bounds(&mut self, bounds: Box3) {
        self.bounds = bounds;
    }

    fn add(&mut self, handle: ObjectHandle, bounds: Box3) -> SpatialEntryToken {
        let item = GridItem { handle, bounds };
        match self.placement(&bounds) {
            Some((level, range)) => {
                for x in range.min_x..=range.max_x {
                    for y in range.min_y..=range.max_y {
                        let cell = self.cells.entry((level as u8, x, y)).or_default();
                        if cell.is_empty() {
                            self.occupied_per_level[level] += 1;
                        }
                        cell.push(item);
                    }
                }
            }
            None => self.oversized.push(item),
        }

        self.count += 1;
        self.stats.total_insertions += 1;
        SpatialEntryToken { bounds }
    }

    fn remove(&mut self, handle: ObjectHandle, token: SpatialEntryToken) {
        let mut removed = false;
        match self.placement(&token.bounds) {
            Some((level, range)) => {
                for x in range.min_x..=range.max_x {
                    for y in range.min_y..=range.max_y {
                        let key = (level as u8, x, y);
                        if let Some(cell) = self.cells.get_mut(&key) {
                            let before = cell.len();
                            cell.retain(|item| item.handle != handle);
                            removed |= cell.len() != before;
                            if cell.is_empty() {
                                self.cells.remove(&key);
                                self.occupied_per_level[level] -= 1;
                            }
                        }
                    }
                }
            }
            None => {
                let before = self.oversized.len();
                self.oversized.retain(|item| item.handle != handle);
                removed = self.oversized.len() != before;
            }
        }

        if removed {
            self.count -= 1;
            self.stats.total_removals += 1;
        }
    }

    fn find(&mut self, query: &Box3, out: &mut Vec<ObjectHandle>) {
        let mut seen = HashSet::new();
        let start = out.len();

        if query.is_valid() {
            for level in 0..self.levels {
                if self.occupied_per_level[level] == 0 {
                    continue;
                }

                let range = self.cell_range(level, query);
                if range.cell_count() <= self.occupied_per_level[level] as i64 {
                    for x in range.min_x..=range.max_x {
                        for y in range.min_y..=range.max_y {
                            if let Some(cell) = self.cells.get(&(level as u8, x, y)) {
                                for item in cell {
                                    if item.bounds.intersects(query) && seen.insert(item.handle) {
                                        out.push(item.handle);
                                    }
                                }
                            }
                        }
                    }
                } else {
                    for ((cell_level, _, _), cell) in &self.cells {
                        if *cell_level as usize != level {
                            continue;
                        }
                        for item in cell {
                            if item.bounds.intersects(query) && seen.insert(item.handle) {
                                out.push(item.handle);
                            }
                        }
                    }
                }
            }

            for item in &self.oversized {
                if item.bounds.intersects(query) && seen.insert(item.handle) {
                    out.push(item.handle);
                }
            }
        }

        self.stats.total_queries += 1;
        self.stats.last_query_result_count = out.len() - start;
    }

    fn len(&self) -> usize {
        self.count
    }

    fn stats(&self) -> SpatialIndexStats {
        SpatialIndexStats {
            objects: self.count,
            occupied_cells: self.cells.len(),
            ..self.stats.clone()
        }
    }
}
