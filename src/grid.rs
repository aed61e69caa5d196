//! Dense cell arena backing the pathfinding graph.
//!
//! [NavGrid] stores walkability as a [BoolGrid] (`true` = blocked), the
//! per-cell [TileClass] consumed from the tile source and a one-bit
//! occupancy grid orthogonal to classification. Connected components over
//! walkable cells are kept in a [UnionFind] structure: blocking a cell only
//! marks them dirty (lazy regeneration), freeing a cell unions eagerly, so a
//! stale structure always over-approximates connectivity and stays safe to
//! use as a reachability early-out.

use std::cmp::Ordering;
use std::fmt;

use grid_util::grid::{BoolGrid, Grid};
use grid_util::point::Point;
use log::debug;
use petgraph::unionfind::UnionFind;
use smallvec::SmallVec;

/// Per-cell classification consumed from the external tile source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileClass {
    /// Open ground: traversable and buildable.
    #[default]
    Empty,
    /// Carved enemy path: traversable, never buildable.
    Path,
    /// Wall or scenery: neither traversable nor buildable.
    Blocked,
    /// Tower spot: buildable only, never traversable.
    Buildable,
    /// Enemy entry cell: traversable, never buildable.
    Spawn,
    /// Enemy goal cell: traversable, never buildable.
    Exit,
    /// Traversable until an obstruction occupies it.
    Hybrid,
}

impl TileClass {
    /// Whether an agent may traverse a cell of this class when unoccupied.
    pub fn walkable(self) -> bool {
        matches!(
            self,
            TileClass::Empty
                | TileClass::Path
                | TileClass::Spawn
                | TileClass::Exit
                | TileClass::Hybrid
        )
    }

    /// Whether an obstruction may be committed on a cell of this class.
    pub fn buildable(self) -> bool {
        matches!(
            self,
            TileClass::Empty | TileClass::Buildable | TileClass::Hybrid
        )
    }
}

/// Continuous position in world units, as reported by movement drivers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
}

impl WorldPos {
    pub fn new(x: f32, y: f32) -> WorldPos {
        WorldPos { x, y }
    }

    fn distance_squared(&self, other: &WorldPos) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// [NavGrid] owns all node storage: walkability flags, tile classes,
/// occupancy bits and the connected-component structure. Topology is fixed
/// at construction; only walkability and occupancy change afterwards.
///
/// Every effective walkability change bumps `revision`, which the path
/// cache compares against to discard entries even when no explicit
/// invalidation was delivered.
#[derive(Clone, Debug)]
pub struct NavGrid {
    pub blocked: BoolGrid,
    pub components: UnionFind<usize>,
    pub components_dirty: bool,
    classes: Vec<TileClass>,
    occupied: BoolGrid,
    cell_size: f32,
    revision: u64,
}

impl NavGrid {
    /// Allocates a `width` x `height` grid of [TileClass::Empty] cells, all
    /// walkable. `cell_size` is the world-unit edge length of one cell.
    pub fn build(width: usize, height: usize, cell_size: f32) -> NavGrid {
        debug_assert!(cell_size > 0.0);
        NavGrid {
            blocked: BoolGrid::new(width, height, false),
            components: UnionFind::new(width * height),
            components_dirty: false,
            classes: vec![TileClass::Empty; width * height],
            occupied: BoolGrid::new(width, height, false),
            cell_size,
            revision: 0,
        }
    }

    /// Builds a grid from a row-major tile classification, the shape the
    /// external map source delivers. `tiles` must hold `width * height`
    /// entries; missing entries default to [TileClass::Empty].
    pub fn from_tiles(width: usize, height: usize, cell_size: f32, tiles: &[TileClass]) -> NavGrid {
        let mut grid = NavGrid::build(width, height, cell_size);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                if let Some(&class) = tiles.get(y as usize * width + x as usize) {
                    grid.apply_tile_classification(Point::new(x, y), class);
                }
            }
        }
        grid.generate_components();
        grid
    }

    pub fn width(&self) -> usize {
        self.blocked.width
    }

    pub fn height(&self) -> usize {
        self.blocked.height
    }

    /// World-unit edge length of one cell.
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Monotone counter of effective walkability changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && self.blocked.index_in_bounds(x as usize, y as usize)
    }

    /// Packed row-major arena index of a cell, [None] out of bounds.
    pub fn cell_index(&self, p: Point) -> Option<usize> {
        if self.in_bounds(p.x, p.y) {
            Some(self.blocked.get_ix(p.x as usize, p.y as usize))
        } else {
            None
        }
    }

    /// Classification of a cell, [None] out of bounds.
    pub fn tile_class(&self, p: Point) -> Option<TileClass> {
        self.cell_index(p).map(|ix| self.classes[ix])
    }

    /// Whether an agent may traverse the cell. Out-of-bounds cells are
    /// never walkable; placement previews probe those constantly.
    pub fn is_walkable(&self, p: Point) -> bool {
        self.in_bounds(p.x, p.y) && !self.blocked.get_point(p)
    }

    /// Whether an obstruction currently occupies the cell.
    pub fn is_occupied(&self, p: Point) -> bool {
        self.in_bounds(p.x, p.y) && self.occupied.get_point(p)
    }

    pub(crate) fn set_occupied(&mut self, p: Point, value: bool) {
        if self.in_bounds(p.x, p.y) {
            self.occupied.set_point(p, value);
        }
    }

    /// Applies an external tile classification to a cell and re-derives its
    /// walkability (occupancy respected). Out-of-bounds coordinates are
    /// ignored.
    pub fn apply_tile_classification(&mut self, p: Point, class: TileClass) {
        let Some(ix) = self.cell_index(p) else {
            debug!("tile classification for out-of-bounds cell {} dropped", p);
            return;
        };
        self.classes[ix] = class;
        self.set_walkable(p, class.walkable() && !self.occupied.get_point(p));
    }

    /// Low-level walkability toggle. Joins newly connected components and
    /// flags the structure as dirty if components are (potentially) broken
    /// apart. Bumps the revision on any effective change.
    ///
    /// This bypasses the connectivity gate; obstruction commits go through
    /// the context so the exit-reachability invariant stays enforced.
    pub fn set_walkable(&mut self, p: Point, walkable: bool) {
        if !self.in_bounds(p.x, p.y) {
            return;
        }
        let blocked = !walkable;
        if self.blocked.get_point(p) == blocked {
            return;
        }
        if blocked {
            self.components_dirty = true;
        } else {
            let p_ix = self.blocked.get_ix(p.x as usize, p.y as usize);
            for n in self.walkable_neighbours(p) {
                self.components
                    .union(p_ix, self.blocked.get_ix(n.x as usize, n.y as usize));
            }
        }
        self.blocked.set_point(p, blocked);
        self.revision += 1;
    }

    /// The 4-directional neighbourhood clipped to grid bounds. Adjacency is
    /// purely geometric, so it is symmetric and immutable by construction.
    pub fn neighbours(&self, p: Point) -> SmallVec<[Point; 4]> {
        [
            Point::new(p.x, p.y + 1),
            Point::new(p.x + 1, p.y),
            Point::new(p.x, p.y - 1),
            Point::new(p.x - 1, p.y),
        ]
        .into_iter()
        .filter(|n| self.in_bounds(n.x, n.y))
        .collect()
    }

    /// The walkable subset of [neighbours](Self::neighbours).
    pub fn walkable_neighbours(&self, p: Point) -> SmallVec<[Point; 4]> {
        [
            Point::new(p.x, p.y + 1),
            Point::new(p.x + 1, p.y),
            Point::new(p.x, p.y - 1),
            Point::new(p.x - 1, p.y),
        ]
        .into_iter()
        .filter(|n| self.is_walkable(*n))
        .collect()
    }

    /// Cell containing a world position.
    pub fn world_to_grid(&self, pos: WorldPos) -> Point {
        Point::new(
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    /// World position of a cell's centre.
    pub fn grid_to_world(&self, p: Point) -> WorldPos {
        WorldPos::new(
            (p.x as f32 + 0.5) * self.cell_size,
            (p.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Nearest walkable cell to a continuous position, by increasing cost:
    /// the cell directly under the position, then a bounded window of
    /// `radius` cells around it, then a full scan of the grid. Distance is
    /// measured to cell centres; equally near candidates resolve to the
    /// lowest `(y, x)` coordinate.
    pub fn nearest_walkable(&self, pos: WorldPos, radius: i32) -> Option<Point> {
        let centre = self.world_to_grid(pos);
        if self.is_walkable(centre) {
            return Some(centre);
        }

        let window = (centre.y - radius..=centre.y + radius).flat_map(|y| {
            (centre.x - radius..=centre.x + radius).map(move |x| Point::new(x, y))
        });
        if let Some(found) = self.nearest_walkable_of(pos, window) {
            return Some(found);
        }

        debug!("no walkable cell within {} cells of {}, scanning grid", radius, centre);
        let all = (0..self.height() as i32)
            .flat_map(|y| (0..self.width() as i32).map(move |x| Point::new(x, y)));
        self.nearest_walkable_of(pos, all)
    }

    fn nearest_walkable_of(
        &self,
        pos: WorldPos,
        candidates: impl Iterator<Item = Point>,
    ) -> Option<Point> {
        candidates
            .filter(|p| self.is_walkable(*p))
            .min_by(|a, b| self.compare_distance(pos, *a, *b))
    }

    fn compare_distance(&self, pos: WorldPos, a: Point, b: Point) -> Ordering {
        let da = pos.distance_squared(&self.grid_to_world(a));
        let db = pos.distance_squared(&self.grid_to_world(b));
        da.total_cmp(&db)
            .then_with(|| (a.y, a.x).cmp(&(b.y, b.x)))
    }

    /// Runs `f` with the cell speculatively blocked, then restores the
    /// original flag. The raw toggle touches neither the revision counter
    /// nor the component structure: blocking can only over-approximate
    /// components, and the searches run under `f` treat them as an
    /// early-out, never as ground truth.
    pub(crate) fn with_cell_blocked<R>(&mut self, p: Point, f: impl FnOnce(&NavGrid) -> R) -> R {
        let original = self.blocked.get_point(p);
        self.blocked.set_point(p, true);
        let result = f(self);
        self.blocked.set_point(p, original);
        result
    }

    /// Checks if start and goal are on different components. Out-of-bounds
    /// endpoints are always unreachable.
    pub fn unreachable(&self, start: &Point, goal: &Point) -> bool {
        if self.in_bounds(start.x, start.y) && self.in_bounds(goal.x, goal.y) {
            let start_ix = self.blocked.get_ix(start.x as usize, start.y as usize);
            let goal_ix = self.blocked.get_ix(goal.x as usize, goal.y as usize);
            !self.components.equiv(start_ix, goal_ix)
        } else {
            true
        }
    }

    /// Checks if no goal in the set shares a component with start.
    pub fn all_unreachable(&self, start: &Point, goals: &[Point]) -> bool {
        goals.iter().all(|goal| self.unreachable(start, goal))
    }

    /// Regenerates the components if they are marked as dirty.
    pub fn update(&mut self) {
        if self.components_dirty {
            self.generate_components();
        }
    }

    /// Generates a new [UnionFind] structure and links up walkable grid
    /// neighbours to the same components.
    pub fn generate_components(&mut self) {
        let w = self.width();
        let h = self.height();
        self.components = UnionFind::new(w * h);
        self.components_dirty = false;
        for x in 0..w as i32 {
            for y in 0..h as i32 {
                let point = Point::new(x, y);
                if !self.is_walkable(point) {
                    continue;
                }
                let parent_ix = self.blocked.get_ix(x as usize, y as usize);
                let linked = [Point::new(point.x, point.y + 1), Point::new(point.x + 1, point.y)]
                    .into_iter()
                    .filter(|p| self.is_walkable(*p))
                    .collect::<SmallVec<[Point; 2]>>();
                for p in linked {
                    let ix = self.blocked.get_ix(p.x as usize, p.y as usize);
                    self.components.union(parent_ix, ix);
                }
            }
        }
    }
}

impl fmt::Display for NavGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Grid:")?;
        for y in 0..self.height() {
            let values = (0..self.width())
                .map(|x| self.blocked.get(x, y) as i32)
                .collect::<Vec<i32>>();
            writeln!(f, "{:?}", values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_classes_derive_walkability() {
        let mut grid = NavGrid::build(3, 3, 1.0);
        grid.apply_tile_classification(Point::new(0, 0), TileClass::Blocked);
        grid.apply_tile_classification(Point::new(1, 0), TileClass::Buildable);
        grid.apply_tile_classification(Point::new(2, 0), TileClass::Hybrid);
        grid.apply_tile_classification(Point::new(0, 1), TileClass::Path);
        assert!(!grid.is_walkable(Point::new(0, 0)));
        assert!(!grid.is_walkable(Point::new(1, 0)));
        assert!(grid.is_walkable(Point::new(2, 0)));
        assert!(grid.is_walkable(Point::new(0, 1)));
    }

    #[test]
    fn occupied_hybrid_is_unwalkable() {
        let mut grid = NavGrid::build(2, 1, 1.0);
        let cell = Point::new(0, 0);
        grid.set_occupied(cell, true);
        grid.apply_tile_classification(cell, TileClass::Hybrid);
        assert!(!grid.is_walkable(cell));
        grid.set_occupied(cell, false);
        grid.apply_tile_classification(cell, TileClass::Hybrid);
        assert!(grid.is_walkable(cell));
    }

    #[test]
    fn out_of_bounds_queries_fail_silently() {
        let grid = NavGrid::build(2, 2, 1.0);
        let outside = Point::new(5, -1);
        assert!(!grid.is_walkable(outside));
        assert!(grid.tile_class(outside).is_none());
        assert!(grid.cell_index(outside).is_none());
        assert!(grid.unreachable(&Point::new(0, 0), &outside));
    }

    #[test]
    fn revision_bumps_only_on_effective_change() {
        let mut grid = NavGrid::build(2, 2, 1.0);
        let cell = Point::new(1, 1);
        let before = grid.revision();
        grid.set_walkable(cell, true);
        assert_eq!(grid.revision(), before);
        grid.set_walkable(cell, false);
        assert_eq!(grid.revision(), before + 1);
        grid.set_walkable(cell, false);
        assert_eq!(grid.revision(), before + 1);
    }

    /// Tests whether points are correctly mapped to different connected
    /// components.
    #[test]
    fn component_generation_splits_on_walls() {
        // Corresponds to the following 3x2 grid:
        //  ___
        // | # |
        // | # |
        //  ---
        let mut grid = NavGrid::build(3, 2, 1.0);
        grid.apply_tile_classification(Point::new(1, 0), TileClass::Blocked);
        grid.apply_tile_classification(Point::new(1, 1), TileClass::Blocked);
        grid.generate_components();
        assert!(grid.unreachable(&Point::new(0, 0), &Point::new(2, 0)));
        assert!(!grid.unreachable(&Point::new(0, 0), &Point::new(0, 1)));
    }

    #[test]
    fn freeing_a_cell_reconnects_components_eagerly() {
        let mut grid = NavGrid::build(3, 1, 1.0);
        grid.apply_tile_classification(Point::new(1, 0), TileClass::Blocked);
        grid.generate_components();
        assert!(grid.unreachable(&Point::new(0, 0), &Point::new(2, 0)));
        grid.set_walkable(Point::new(1, 0), true);
        assert!(!grid.unreachable(&Point::new(0, 0), &Point::new(2, 0)));
    }

    #[test]
    fn world_mapping_round_trips_cell_centres() {
        let grid = NavGrid::build(4, 4, 2.0);
        let cell = Point::new(2, 1);
        let centre = grid.grid_to_world(cell);
        assert_eq!(centre, WorldPos::new(5.0, 3.0));
        assert_eq!(grid.world_to_grid(centre), cell);
    }

    #[test]
    fn nearest_walkable_prefers_direct_cell() {
        let grid = NavGrid::build(3, 3, 1.0);
        let found = grid.nearest_walkable(WorldPos::new(1.5, 1.5), 2);
        assert_eq!(found, Some(Point::new(1, 1)));
    }

    #[test]
    fn nearest_walkable_ties_resolve_to_lowest_coordinate() {
        let mut grid = NavGrid::build(3, 3, 1.0);
        // Block the centre; (1, 0) and (0, 1) tie for distance from it.
        grid.apply_tile_classification(Point::new(1, 1), TileClass::Blocked);
        let found = grid.nearest_walkable(WorldPos::new(1.5, 1.5), 1);
        assert_eq!(found, Some(Point::new(1, 0)));
    }

    #[test]
    fn nearest_walkable_falls_back_to_full_scan() {
        let mut grid = NavGrid::build(5, 1, 1.0);
        for x in 0..4 {
            grid.apply_tile_classification(Point::new(x, 0), TileClass::Blocked);
        }
        // Radius 1 around the leftmost cell misses (4, 0); the full scan
        // must still find it.
        let found = grid.nearest_walkable(WorldPos::new(0.5, 0.5), 1);
        assert_eq!(found, Some(Point::new(4, 0)));
    }

    #[test]
    fn speculative_block_restores_flag_and_revision() {
        let mut grid = NavGrid::build(2, 2, 1.0);
        let cell = Point::new(0, 0);
        let revision = grid.revision();
        let seen_blocked = grid.with_cell_blocked(cell, |g| !g.is_walkable(cell));
        assert!(seen_blocked);
        assert!(grid.is_walkable(cell));
        assert_eq!(grid.revision(), revision);
    }
}
