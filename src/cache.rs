//! Memoized routes keyed by (start, goal).
//!
//! Invalidation is deliberately coarse: any walkability change drops the
//! whole map. Obstruction events are rare next to route queries, so the
//! occasional recomputation is cheaper than tracking which entries a
//! mutation touched. Two independent guards keep entries honest even when
//! no explicit invalidation was delivered: a grid-revision check that clears
//! the map wholesale, and a per-node walkability re-validation of every hit.

use fxhash::FxHashMap;
use grid_util::point::Point;
use log::debug;

use crate::grid::NavGrid;

/// Route memo over a [NavGrid]. Holds node ids only, never node state, so
/// entries can be dropped and rebuilt at will.
#[derive(Clone, Debug, Default)]
pub struct PathCache {
    entries: FxHashMap<(Point, Point), Vec<Point>>,
    revision: u64,
}

impl PathCache {
    pub fn new() -> PathCache {
        PathCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Raw view of a cached route, without re-validation.
    pub fn cached(&self, start: Point, goal: Point) -> Option<&[Point]> {
        self.entries.get(&(start, goal)).map(Vec::as_slice)
    }

    /// Stores a fresh route for the pair, replacing any previous entry.
    /// Also the entry point for externally authored routes.
    pub fn commit(&mut self, grid: &NavGrid, start: Point, goal: Point, path: Vec<Point>) {
        self.reconcile(grid);
        let _ = self.entries.insert((start, goal), path);
    }

    /// Returns the cached route for the pair after re-validating that every
    /// node on it is still walkable; recomputes and overwrites on a miss or
    /// a rotten hit. [None] means no route currently exists.
    pub fn get_or_compute(
        &mut self,
        grid: &NavGrid,
        start: Point,
        goal: Point,
    ) -> Option<Vec<Point>> {
        self.reconcile(grid);
        match self.entries.get(&(start, goal)) {
            Some(path) if Self::path_valid(grid, path) => return Some(path.clone()),
            Some(_) => debug!("cached route {} -> {} rotted, recomputing", start, goal),
            None => {}
        }
        let fresh = grid.find_path(start, goal)?;
        let _ = self.entries.insert((start, goal), fresh.clone());
        Some(fresh)
    }

    /// Clears the map when the grid's walkability revision moved since the
    /// entries were stored. Catches mutations that skipped the explicit
    /// invalidation path.
    fn reconcile(&mut self, grid: &NavGrid) {
        if self.revision != grid.revision() {
            if !self.entries.is_empty() {
                debug!(
                    "walkability revision moved, dropping {} cached routes",
                    self.entries.len()
                );
                self.entries.clear();
            }
            self.revision = grid.revision();
        }
    }

    fn path_valid(grid: &NavGrid, path: &[Point]) -> bool {
        !path.is_empty() && path.iter().all(|node| grid.is_walkable(*node))
    }
}
