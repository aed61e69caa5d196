//! Connectivity validation gating every obstruction commit.
//!
//! The exit-reachability invariant — every registered spawn keeps a route
//! to at least one registered exit — is upheld exclusively here, never
//! assumed elsewhere. A candidate obstruction is blocked speculatively,
//! every (spawn, exit) pair is re-searched, and the flag is restored before
//! anything observable happens; only a candidate that keeps all pairs
//! routable commits. Rejection therefore leaves walkability, occupancy,
//! cache contents and registries untouched, and runs before any currency is
//! spent or object placed.

use grid_util::point::Point;
use log::{debug, info};
use thiserror::Error;

use crate::grid::NavGrid;
use crate::PathfindingContext;

/// Rejection reasons for obstruction placement and removal. All variants
/// are recoverable at the call site; none aborts the simulation.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    /// Coordinate outside the grid; placement previews probe these
    /// constantly, so it is an ordinary rejection, not a panic.
    #[error("cell {0} lies outside the grid")]
    OutOfBounds(Point),
    /// The cell's tile classification does not accept obstructions.
    #[error("cell {0} does not accept obstructions")]
    NotBuildable(Point),
    /// An obstruction already occupies the cell.
    #[error("cell {0} is already occupied")]
    Occupied(Point),
    /// No obstruction to remove at the cell.
    #[error("cell {0} has no obstruction to remove")]
    NotOccupied(Point),
    /// Committing would sever a spawn-to-exit route.
    #[error("an obstruction at {0} would sever a spawn-to-exit route")]
    WouldBlockPath(Point),
}

/// Re-tests full spawn x exit reachability with `cell` speculatively
/// blocked. Empty registries degrade to "always passable".
fn severs_any_route(grid: &mut NavGrid, spawns: &[Point], exits: &[Point], cell: Point) -> bool {
    if spawns.is_empty() || exits.is_empty() {
        return false;
    }
    if !grid.is_walkable(cell) {
        // Blocking a cell no agent can traverse changes nothing.
        return false;
    }
    grid.with_cell_blocked(cell, |probe| {
        for &spawn in spawns {
            for &exit in exits {
                if probe.find_path(spawn, exit).is_none() {
                    debug!("blocking {} severs route {} -> {}", cell, spawn, exit);
                    return true;
                }
            }
        }
        false
    })
}

impl PathfindingContext {
    /// Whether committing an obstruction at `cell` would sever any
    /// (spawn, exit) route. Purely speculative; the grid is unchanged on
    /// return.
    pub fn would_disconnect(&mut self, cell: Point) -> bool {
        severs_any_route(&mut self.grid, &self.spawns, &self.exits, cell)
    }

    /// Commits an obstruction (tower footprint) at `cell` after the
    /// connectivity gate passes. On success the cell is occupied and
    /// unwalkable, and the route cache is rebuilt before followers are
    /// signalled. On rejection nothing observable changes.
    pub fn try_commit_obstruction(&mut self, cell: Point) -> Result<(), PlacementError> {
        let class = self
            .grid
            .tile_class(cell)
            .ok_or(PlacementError::OutOfBounds(cell))?;
        if !class.buildable() {
            return Err(PlacementError::NotBuildable(cell));
        }
        if self.grid.is_occupied(cell) {
            return Err(PlacementError::Occupied(cell));
        }
        let was_walkable = self.grid.is_walkable(cell);
        if was_walkable && severs_any_route(&mut self.grid, &self.spawns, &self.exits, cell) {
            return Err(PlacementError::WouldBlockPath(cell));
        }

        self.grid.set_occupied(cell, true);
        self.grid.set_walkable(cell, false);
        info!("obstruction committed at {}", cell);
        if was_walkable {
            self.coordinator
                .rebuild(&mut self.grid, &mut self.cache, &self.spawns, &self.exits);
        }
        Ok(())
    }

    /// Removes a committed obstruction and restores the cell's walkability
    /// per its tile classification. Freeing a cell can only reconnect the
    /// graph, so no gate applies.
    pub fn remove_obstruction(&mut self, cell: Point) -> Result<(), PlacementError> {
        let class = self
            .grid
            .tile_class(cell)
            .ok_or(PlacementError::OutOfBounds(cell))?;
        if !self.grid.is_occupied(cell) {
            return Err(PlacementError::NotOccupied(cell));
        }
        self.grid.set_occupied(cell, false);
        info!("obstruction removed at {}", cell);
        if class.walkable() {
            self.grid.set_walkable(cell, true);
            self.coordinator
                .rebuild(&mut self.grid, &mut self.cache, &self.spawns, &self.exits);
        }
        Ok(())
    }

    /// Blocks a cell regardless of its tile classification (scripted walls,
    /// timed obstacles). Passes the same connectivity gate as tower
    /// placement. Blocking an already-unwalkable cell is a no-op.
    pub fn block_cell(&mut self, cell: Point) -> Result<(), PlacementError> {
        if self.grid.cell_index(cell).is_none() {
            return Err(PlacementError::OutOfBounds(cell));
        }
        if !self.grid.is_walkable(cell) {
            debug!("cell {} is already unwalkable", cell);
            return Ok(());
        }
        if severs_any_route(&mut self.grid, &self.spawns, &self.exits, cell) {
            return Err(PlacementError::WouldBlockPath(cell));
        }
        self.grid.set_walkable(cell, false);
        info!("cell {} blocked", cell);
        self.coordinator
            .rebuild(&mut self.grid, &mut self.cache, &self.spawns, &self.exits);
        Ok(())
    }

    /// Releases a cell blocked by [block_cell](Self::block_cell). The cell
    /// becomes walkable again only if its classification allows it and no
    /// obstruction occupies it.
    pub fn unblock_cell(&mut self, cell: Point) -> Result<(), PlacementError> {
        let class = self
            .grid
            .tile_class(cell)
            .ok_or(PlacementError::OutOfBounds(cell))?;
        if self.grid.is_walkable(cell) {
            debug!("cell {} is already walkable", cell);
            return Ok(());
        }
        if !class.walkable() || self.grid.is_occupied(cell) {
            debug!("cell {} stays unwalkable under class {:?}", cell, class);
            return Ok(());
        }
        self.grid.set_walkable(cell, true);
        info!("cell {} unblocked", cell);
        self.coordinator
            .rebuild(&mut self.grid, &mut self.cache, &self.spawns, &self.exits);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileClass;

    fn context_5x5() -> PathfindingContext {
        let mut grid = NavGrid::build(5, 5, 1.0);
        grid.generate_components();
        let mut ctx = PathfindingContext::new(grid);
        ctx.register_spawn(Point::new(0, 0)).unwrap();
        ctx.register_exit(Point::new(4, 4)).unwrap();
        let _ = ctx.precompute_all_paths();
        ctx
    }

    fn walkability_snapshot(grid: &NavGrid) -> Vec<bool> {
        (0..grid.height() as i32)
            .flat_map(|y| (0..grid.width() as i32).map(move |x| grid.is_walkable(Point::new(x, y))))
            .collect()
    }

    #[test]
    fn commit_off_route_succeeds() {
        let mut ctx = context_5x5();
        assert!(!ctx.would_disconnect(Point::new(2, 2)));
        ctx.try_commit_obstruction(Point::new(2, 2)).unwrap();
        assert!(!ctx.grid.is_walkable(Point::new(2, 2)));
        assert!(ctx.grid.is_occupied(Point::new(2, 2)));
        // Rebuild kept the route cache warm.
        assert_eq!(ctx.cache().len(), 1);
    }

    /// Enclosing the spawn entirely: the second commit must be rejected and
    /// the attempt must leave no trace.
    #[test]
    fn enclosing_spawn_is_rejected_without_side_effects() {
        let mut ctx = context_5x5();
        ctx.try_commit_obstruction(Point::new(1, 0)).unwrap();

        let walkability = walkability_snapshot(&ctx.grid);
        let revision = ctx.grid.revision();
        let cached = ctx
            .cached_route(Point::new(0, 0), Point::new(4, 4))
            .map(<[Point]>::to_vec);

        let rejected = ctx.try_commit_obstruction(Point::new(0, 1));
        assert_eq!(rejected, Err(PlacementError::WouldBlockPath(Point::new(0, 1))));

        assert_eq!(walkability_snapshot(&ctx.grid), walkability);
        assert_eq!(ctx.grid.revision(), revision);
        assert!(!ctx.grid.is_occupied(Point::new(0, 1)));
        assert_eq!(
            ctx.cached_route(Point::new(0, 0), Point::new(4, 4))
                .map(<[Point]>::to_vec),
            cached
        );
        assert_eq!(ctx.spawns(), &[Point::new(0, 0)]);
        assert_eq!(ctx.exits(), &[Point::new(4, 4)]);
    }

    #[test]
    fn placement_checks_run_in_order() {
        let mut ctx = context_5x5();
        assert_eq!(
            ctx.try_commit_obstruction(Point::new(9, 9)),
            Err(PlacementError::OutOfBounds(Point::new(9, 9)))
        );

        ctx.grid
            .apply_tile_classification(Point::new(3, 3), TileClass::Path);
        assert_eq!(
            ctx.try_commit_obstruction(Point::new(3, 3)),
            Err(PlacementError::NotBuildable(Point::new(3, 3)))
        );

        ctx.try_commit_obstruction(Point::new(2, 2)).unwrap();
        assert_eq!(
            ctx.try_commit_obstruction(Point::new(2, 2)),
            Err(PlacementError::Occupied(Point::new(2, 2)))
        );
    }

    /// A tower on a buildable-only spot never touches walkability, so the
    /// gate is skipped and no rebuild happens.
    #[test]
    fn buildable_class_commit_skips_gate_and_rebuild() {
        let mut ctx = context_5x5();
        ctx.grid
            .apply_tile_classification(Point::new(1, 1), TileClass::Buildable);
        ctx.grid.generate_components();
        let revision = ctx.grid.revision();

        ctx.try_commit_obstruction(Point::new(1, 1)).unwrap();
        assert!(ctx.grid.is_occupied(Point::new(1, 1)));
        assert_eq!(ctx.grid.revision(), revision);
    }

    #[test]
    fn removal_restores_walkability_and_rejects_empty_cells() {
        let mut ctx = context_5x5();
        ctx.try_commit_obstruction(Point::new(2, 2)).unwrap();
        ctx.remove_obstruction(Point::new(2, 2)).unwrap();
        assert!(ctx.grid.is_walkable(Point::new(2, 2)));
        assert!(!ctx.grid.is_occupied(Point::new(2, 2)));
        assert_eq!(
            ctx.remove_obstruction(Point::new(2, 2)),
            Err(PlacementError::NotOccupied(Point::new(2, 2)))
        );
    }

    #[test]
    fn hybrid_cells_toggle_with_occupancy() {
        let mut ctx = context_5x5();
        ctx.grid
            .apply_tile_classification(Point::new(2, 2), TileClass::Hybrid);
        ctx.grid.generate_components();
        assert!(ctx.grid.is_walkable(Point::new(2, 2)));
        ctx.try_commit_obstruction(Point::new(2, 2)).unwrap();
        assert!(!ctx.grid.is_walkable(Point::new(2, 2)));
        ctx.remove_obstruction(Point::new(2, 2)).unwrap();
        assert!(ctx.grid.is_walkable(Point::new(2, 2)));
    }

    /// With no registered spawns or exits every connectivity question
    /// degrades to "passable".
    #[test]
    fn empty_registries_always_pass() {
        let mut grid = NavGrid::build(3, 3, 1.0);
        grid.generate_components();
        let mut ctx = PathfindingContext::new(grid);
        assert!(!ctx.would_disconnect(Point::new(1, 1)));
        ctx.try_commit_obstruction(Point::new(1, 1)).unwrap();
    }

    #[test]
    fn blocked_cells_pass_the_same_gate() {
        let mut ctx = context_5x5();
        ctx.block_cell(Point::new(1, 0)).unwrap();
        assert_eq!(
            ctx.block_cell(Point::new(0, 1)),
            Err(PlacementError::WouldBlockPath(Point::new(0, 1)))
        );
        ctx.unblock_cell(Point::new(1, 0)).unwrap();
        assert!(ctx.grid.is_walkable(Point::new(1, 0)));
    }

    #[test]
    fn unblock_respects_classification_and_occupancy() {
        let mut ctx = context_5x5();
        ctx.grid
            .apply_tile_classification(Point::new(3, 0), TileClass::Blocked);
        ctx.grid.generate_components();
        ctx.unblock_cell(Point::new(3, 0)).unwrap();
        assert!(!ctx.grid.is_walkable(Point::new(3, 0)));
    }
}
