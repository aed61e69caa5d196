//! # defense_pathfinding
//!
//! A grid-based pathfinding and dynamic-connectivity engine for tower-defense
//! style simulations. Maintains a dense graph of walkable cells, computes
//! shortest routes between spawn and exit sets with
//! [A*](https://en.wikipedia.org/wiki/A*_search_algorithm) (uniform step
//! cost, Manhattan heuristic with a straightness tie-break), memoizes routes
//! in a whole-cache-invalidated [PathCache], and guarantees through the
//! connectivity gate that no committed obstruction can ever disconnect a
//! spawn from every exit. Pre-computes
//! [connected components](https://en.wikipedia.org/wiki/Component_(graph_theory))
//! to avoid flood-filling behaviour if no path exists. In-flight agents
//! whose route is invalidated rejoin from their current position via
//! [AgentPathCursor] instead of freezing mid-field.
//!
//! Everything hangs off an explicit [PathfindingContext] handle constructed
//! once per level and passed down to spawners, movement drivers and the
//! build system; there is no ambient global state. The intended call
//! sequence is: build the grid from tile data, register spawn and exit
//! cells, then [precompute_all_paths](PathfindingContext::precompute_all_paths)
//! — route queries made earlier simply miss the cache.
//!
//! The crate is single-threaded by design; every operation runs to
//! completion synchronously. A multi-threaded host must serialize all
//! mutation behind a single writer and let running searches complete before
//! applying a conflicting write.

mod astar;
pub mod cache;
pub mod coordinator;
pub mod cursor;
mod engine;
pub mod grid;
pub mod validator;

use grid_util::point::Point;
use log::debug;

pub use crate::cache::PathCache;
pub use crate::coordinator::{FollowerId, ReroutingCoordinator};
pub use crate::cursor::{AgentPathCursor, CursorState, SyncStatus};
pub use crate::grid::{NavGrid, TileClass, WorldPos};
pub use crate::validator::PlacementError;

/// Integer cost of one cardinal step. Costs are scaled so the heuristic
/// tie-break fits below a single cost unit.
pub const STEP_COST: i32 = 1000;

/// Weight of the `|dx - dy|` straightness tie-break in the heuristic:
/// 1/1000 of a step, keeping the heuristic admissible for routes shorter
/// than [STEP_COST] cells.
pub const TIE_BREAK: i32 = 1;

/// Default cell radius of a cursor's bounded rejoin scan.
pub const REJOIN_SEARCH_RADIUS: i32 = 5;

/// Bundles the grid, the route cache, the spawn/exit registries and the
/// rerouting coordinator behind one handle. All obstruction commits go
/// through this type so the connectivity gate cannot be bypassed by
/// accident.
#[derive(Clone, Debug)]
pub struct PathfindingContext {
    pub grid: NavGrid,
    pub(crate) cache: PathCache,
    pub(crate) spawns: Vec<Point>,
    pub(crate) exits: Vec<Point>,
    pub(crate) coordinator: ReroutingCoordinator,
}

impl PathfindingContext {
    pub fn new(grid: NavGrid) -> PathfindingContext {
        PathfindingContext {
            grid,
            cache: PathCache::new(),
            spawns: Vec::new(),
            exits: Vec::new(),
            coordinator: ReroutingCoordinator::new(),
        }
    }

    /// Registers an enemy entry cell. Duplicates are ignored.
    pub fn register_spawn(&mut self, cell: Point) -> Result<(), PlacementError> {
        if self.grid.cell_index(cell).is_none() {
            return Err(PlacementError::OutOfBounds(cell));
        }
        if !self.spawns.contains(&cell) {
            self.spawns.push(cell);
        }
        Ok(())
    }

    /// Registers an enemy goal cell. Duplicates are ignored.
    pub fn register_exit(&mut self, cell: Point) -> Result<(), PlacementError> {
        if self.grid.cell_index(cell).is_none() {
            return Err(PlacementError::OutOfBounds(cell));
        }
        if !self.exits.contains(&cell) {
            self.exits.push(cell);
        }
        Ok(())
    }

    /// Registers every [TileClass::Spawn] and [TileClass::Exit] cell of the
    /// grid. Returns how many of each were found.
    pub fn register_from_tiles(&mut self) -> (usize, usize) {
        let mut spawns = 0;
        let mut exits = 0;
        for y in 0..self.grid.height() as i32 {
            for x in 0..self.grid.width() as i32 {
                let cell = Point::new(x, y);
                match self.grid.tile_class(cell) {
                    Some(TileClass::Spawn) => {
                        let _ = self.register_spawn(cell);
                        spawns += 1;
                    }
                    Some(TileClass::Exit) => {
                        let _ = self.register_exit(cell);
                        exits += 1;
                    }
                    _ => {}
                }
            }
        }
        debug!("registered {} spawn and {} exit cells from tiles", spawns, exits);
        (spawns, exits)
    }

    pub fn spawns(&self) -> &[Point] {
        &self.spawns
    }

    pub fn exits(&self) -> &[Point] {
        &self.exits
    }

    /// Eagerly computes and caches a route for every (spawn, exit) pair so
    /// subsequent lookups are pure cache hits. Call once the grid and both
    /// registries are fully populated. Returns (cached, unroutable) counts.
    pub fn precompute_all_paths(&mut self) -> (usize, usize) {
        coordinator::precompute_routes(&mut self.grid, &mut self.cache, &self.spawns, &self.exits)
    }

    /// Uncached shortest-route query; see [NavGrid::find_path].
    pub fn find_path(&self, start: Point, goal: Point) -> Option<Vec<Point>> {
        self.grid.find_path(start, goal)
    }

    /// Cheapest route from `start` to any registered exit, with the chosen
    /// exit.
    pub fn route_to_any_exit(&self, start: Point) -> Option<(Point, Vec<Point>)> {
        self.grid.find_path_to_any(start, &self.exits)
    }

    /// Cached route lookup; validates and recomputes as needed. See
    /// [PathCache::get_or_compute].
    pub fn get_or_compute(&mut self, start: Point, goal: Point) -> Option<Vec<Point>> {
        self.cache.get_or_compute(&self.grid, start, goal)
    }

    /// Stores an externally authored route for a pair, e.g. a hand-placed
    /// scenic route from the level data.
    pub fn commit_custom_path(&mut self, start: Point, goal: Point, path: Vec<Point>) {
        self.cache.commit(&self.grid, start, goal, path);
    }

    /// Raw view of a cached route, without re-validation.
    pub fn cached_route(&self, start: Point, goal: Point) -> Option<&[Point]> {
        self.cache.cached(start, goal)
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    /// Registers a path follower; the coordinator will flag it after every
    /// committed mutation. Usually called through
    /// [AgentPathCursor::register].
    pub fn register_follower(&mut self) -> FollowerId {
        self.coordinator.register()
    }

    pub fn unregister_follower(&mut self, id: FollowerId) {
        self.coordinator.unregister(id);
    }

    /// Consumes the pending update signal for a follower.
    pub fn take_update_signal(&mut self, id: FollowerId) -> bool {
        self.coordinator.take_update_signal(id)
    }

    pub fn follower_count(&self) -> usize {
        self.coordinator.follower_count()
    }
}
