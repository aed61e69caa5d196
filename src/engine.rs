//! Route queries over a [NavGrid].
//!
//! Searches use a uniform cost of [STEP_COST] per cardinal step and a
//! Manhattan-distance heuristic with a small cross-product tie-break that
//! biases exploration toward straighter routes. The tie-break term stays
//! below one step cost for any route shorter than `STEP_COST / TIE_BREAK`
//! cells, which keeps the heuristic admissible on every grid this crate
//! targets.

use grid_util::point::Point;
use log::debug;
use smallvec::SmallVec;

use crate::astar::astar;
use crate::grid::NavGrid;
use crate::{STEP_COST, TIE_BREAK};

fn heuristic(p: &Point, goal: &Point) -> i32 {
    let dx = (p.x - goal.x).abs();
    let dy = (p.y - goal.y).abs();
    (dx + dy) * STEP_COST + (dx - dy).abs() * TIE_BREAK
}

impl NavGrid {
    fn successors(&self, node: &Point) -> SmallVec<[(Point, i32); 4]> {
        self.walkable_neighbours(*node)
            .into_iter()
            .map(|p| (p, STEP_COST))
            .collect()
    }

    /// Computes a shortest route from start to goal, both inclusive.
    /// Returns [None] when either endpoint is out of bounds or unwalkable,
    /// or when the open set empties without reaching the goal — absence of
    /// a route is a normal outcome, relied on by speculative validation.
    ///
    /// All search scratch state is local to the call, so no invocation can
    /// observe cost data left behind by an earlier one.
    pub fn find_path(&self, start: Point, goal: Point) -> Option<Vec<Point>> {
        if !self.is_walkable(start) || !self.is_walkable(goal) {
            return None;
        }
        // Components over-approximate connectivity, so this only ever
        // skips searches that cannot succeed.
        if self.unreachable(&start, &goal) {
            debug!("{} is on a different component than {}", goal, start);
            return None;
        }
        astar(
            &start,
            |node| self.successors(node),
            |point| heuristic(point, &goal),
            |point| *point == goal,
        )
        .map(|(v, _c)| v)
    }

    /// Computes a shortest route from start to whichever goal in the set is
    /// cheapest to reach, using the minimum over per-goal heuristics.
    /// Returns the selected goal alongside the route.
    pub fn find_path_to_any(&self, start: Point, goals: &[Point]) -> Option<(Point, Vec<Point>)> {
        if !self.is_walkable(start) {
            return None;
        }
        let open: SmallVec<[Point; 4]> = goals
            .iter()
            .copied()
            .filter(|g| self.is_walkable(*g))
            .collect();
        if open.is_empty() {
            return None;
        }
        if self.all_unreachable(&start, &open) {
            debug!("no goal shares a component with {}", start);
            return None;
        }
        astar(
            &start,
            |node| self.successors(node),
            |point| {
                open.iter()
                    .map(|g| heuristic(point, g))
                    .min()
                    .unwrap_or(0)
            },
            |point| open.contains(point),
        )
        .map(|(v, _c)| (*v.last().unwrap(), v))
    }
}
