//! Per-agent path progress and mid-field recovery.
//!
//! An [AgentPathCursor] owns an agent's active route (node ids only) and an
//! index into it; the movement driver advances the index as nodes are
//! reached and calls [sync](AgentPathCursor::sync) once per tick. When the
//! route is invalidated — either proactively by a coordinator signal or
//! reactively by noticing a blocked node ahead — the cursor rejoins from
//! the agent's continuous position instead of freezing it mid-field: it
//! finds the nearest walkable cell, routes from there to the cheapest
//! reachable exit and splices the result in as the new active route.

use grid_util::point::Point;
use log::{debug, info, warn};

use crate::coordinator::FollowerId;
use crate::grid::WorldPos;
use crate::{PathfindingContext, REJOIN_SEARCH_RADIUS};

/// Lifecycle states of a path follower.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorState {
    /// No route assigned yet.
    Idle,
    /// Advancing node-by-node toward the current target.
    Following,
    /// A node on the active route became unwalkable.
    Blocked,
    /// Searching for a walkable cell and a fresh route.
    Rejoining,
    /// The route index exhausted the path. Terminal.
    Arrived,
    /// Every rejoin fallback failed. Terminal for this agent; the driver
    /// falls back to a restart from the agent's spawn point.
    Stranded,
    /// The agent left the field. Terminal.
    Despawned,
}

/// Outcome of one [sync](AgentPathCursor::sync) call, for the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing to do; keep moving toward the current target.
    OnCourse,
    /// A fresh route was spliced in; re-read the current target.
    Rerouted,
    /// No route assigned.
    Idle,
    /// Path exhausted.
    Arrived,
    /// Rejoin failed entirely; restart this agent from its spawn.
    Stranded,
    /// The cursor was despawned.
    Despawned,
}

/// Route cursor for one agent. Mutated only by the owning driver and, via
/// the update signal, by the rerouting coordinator.
#[derive(Clone, Debug)]
pub struct AgentPathCursor {
    id: FollowerId,
    path: Vec<Point>,
    index: usize,
    state: CursorState,
    rejoin_radius: i32,
}

impl AgentPathCursor {
    /// Registers a new follower with the context and returns its cursor.
    pub fn register(ctx: &mut PathfindingContext) -> AgentPathCursor {
        AgentPathCursor {
            id: ctx.register_follower(),
            path: Vec::new(),
            index: 0,
            state: CursorState::Idle,
            rejoin_radius: REJOIN_SEARCH_RADIUS,
        }
    }

    /// Overrides the cell radius of the bounded rejoin scan.
    pub fn with_rejoin_radius(mut self, radius: i32) -> AgentPathCursor {
        self.rejoin_radius = radius;
        self
    }

    pub fn id(&self) -> FollowerId {
        self.id
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn path(&self) -> &[Point] {
        &self.path
    }

    /// Node the agent is currently moving toward.
    pub fn current_target(&self) -> Option<Point> {
        self.path.get(self.index).copied()
    }

    /// Nodes already passed on the active route.
    pub fn nodes_passed(&self) -> usize {
        self.index
    }

    /// Fraction of the active route already covered, in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.path.is_empty() {
            return 0.0;
        }
        self.index as f32 / self.path.len() as f32
    }

    /// Assigns a fresh route, replacing any active one wholesale. Permitted
    /// from every state except [CursorState::Despawned]; in particular a
    /// stranded agent is restarted this way. Empty routes are refused.
    pub fn assign_path(&mut self, path: Vec<Point>) -> bool {
        if self.state == CursorState::Despawned {
            return false;
        }
        if path.is_empty() {
            warn!("refusing empty route assignment");
            return false;
        }
        debug!("following route of {} nodes", path.len());
        self.path = path;
        self.index = 0;
        self.state = CursorState::Following;
        true
    }

    /// Driver callback: the current target node was reached. Returns the
    /// next target, or [None] once the route is exhausted and the cursor
    /// is [CursorState::Arrived].
    pub fn advance(&mut self) -> Option<Point> {
        if self.state != CursorState::Following {
            return None;
        }
        self.index += 1;
        match self.current_target() {
            Some(next) => Some(next),
            None => {
                debug!("reached end of route");
                self.state = CursorState::Arrived;
                None
            }
        }
    }

    /// Per-tick resync. Consumes a pending coordinator signal and checks
    /// the nodes immediately ahead; on either trigger the cursor runs the
    /// blocked -> rejoining -> following transition within this call.
    /// `position` is the agent's continuous world position.
    pub fn sync(&mut self, ctx: &mut PathfindingContext, position: WorldPos) -> SyncStatus {
        match self.state {
            CursorState::Despawned => return SyncStatus::Despawned,
            CursorState::Arrived => return SyncStatus::Arrived,
            CursorState::Stranded => return SyncStatus::Stranded,
            CursorState::Idle => {
                // Nothing to resync, but the signal must not linger.
                let _ = ctx.take_update_signal(self.id);
                return SyncStatus::Idle;
            }
            CursorState::Following | CursorState::Blocked | CursorState::Rejoining => {}
        }

        let signalled = ctx.take_update_signal(self.id);
        if !signalled && !self.route_blocked_ahead(ctx) {
            return SyncStatus::OnCourse;
        }

        if signalled {
            debug!("route update signalled, rejoining from current position");
        } else {
            warn!("node ahead became unwalkable mid-transit, rejoining");
        }
        self.state = CursorState::Blocked;
        self.rejoin(ctx, position)
    }

    /// Marks the agent as having left the field and releases its
    /// registration.
    pub fn despawn(&mut self, ctx: &mut PathfindingContext) {
        ctx.unregister_follower(self.id);
        self.path.clear();
        self.index = 0;
        self.state = CursorState::Despawned;
    }

    /// Whether the current or next node on the route became unwalkable.
    fn route_blocked_ahead(&self, ctx: &PathfindingContext) -> bool {
        self.path[self.index..]
            .iter()
            .take(2)
            .any(|node| !ctx.grid.is_walkable(*node))
    }

    fn rejoin(&mut self, ctx: &mut PathfindingContext, position: WorldPos) -> SyncStatus {
        self.state = CursorState::Rejoining;

        let Some(nearest) = ctx.grid.nearest_walkable(position, self.rejoin_radius) else {
            warn!("no walkable cell near ({}, {})", position.x, position.y);
            self.state = CursorState::Stranded;
            return SyncStatus::Stranded;
        };
        let Some((exit, path)) = ctx.grid.find_path_to_any(nearest, ctx.exits()) else {
            warn!("no route from rejoin cell {} to any exit", nearest);
            self.state = CursorState::Stranded;
            return SyncStatus::Stranded;
        };

        info!(
            "rejoined at {} with {} nodes to exit {}",
            nearest,
            path.len(),
            exit
        );
        self.path = path;
        self.index = 0;
        self.state = CursorState::Following;
        SyncStatus::Rerouted
    }
}
