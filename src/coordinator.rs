//! Rerouting fan-out after committed graph mutations.
//!
//! The coordinator owns the follower registry and the eager cache rebuild.
//! Delivery is by per-follower flags that agents poll on their own tick:
//! the rebuild completes in full before any flag is raised, so no agent can
//! ever read a half-rebuilt cache, and no ordering is promised between
//! agents — each re-derives its own route independently.

use fxhash::FxHashMap;
use grid_util::point::Point;
use log::{info, warn};

use crate::cache::PathCache;
use crate::grid::NavGrid;

/// Handle identifying a registered path follower. Registration is
/// agent-initiated: register on spawn, unregister on despawn, so the
/// registry never holds stale references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FollowerId(u64);

#[derive(Clone, Debug, Default)]
pub struct ReroutingCoordinator {
    followers: FxHashMap<FollowerId, bool>,
    next_id: u64,
}

impl ReroutingCoordinator {
    pub fn new() -> ReroutingCoordinator {
        ReroutingCoordinator::default()
    }

    pub fn register(&mut self) -> FollowerId {
        let id = FollowerId(self.next_id);
        self.next_id += 1;
        let _ = self.followers.insert(id, false);
        id
    }

    pub fn unregister(&mut self, id: FollowerId) {
        let _ = self.followers.remove(&id);
    }

    /// Consumes the pending update signal for a follower. Unregistered ids
    /// read as unsignalled.
    pub fn take_update_signal(&mut self, id: FollowerId) -> bool {
        match self.followers.get_mut(&id) {
            Some(pending) => std::mem::take(pending),
            None => false,
        }
    }

    pub fn follower_count(&self) -> usize {
        self.followers.len()
    }

    pub fn pending_count(&self) -> usize {
        self.followers.values().filter(|pending| **pending).count()
    }

    /// Rebuilds the route cache after a committed mutation, then signals
    /// every registered follower to resync.
    pub fn rebuild(
        &mut self,
        grid: &mut NavGrid,
        cache: &mut PathCache,
        spawns: &[Point],
        exits: &[Point],
    ) {
        cache.invalidate_all();
        let (success, failed) = precompute_routes(grid, cache, spawns, exits);
        info!(
            "route rebuild complete: {} cached, {} unroutable, signalling {} followers",
            success,
            failed,
            self.followers.len()
        );
        for pending in self.followers.values_mut() {
            *pending = true;
        }
    }
}

/// Computes and caches a route for every (spawn, exit) pair so the next
/// lookup is a pure cache hit. Returns (cached, unroutable) counts.
pub(crate) fn precompute_routes(
    grid: &mut NavGrid,
    cache: &mut PathCache,
    spawns: &[Point],
    exits: &[Point],
) -> (usize, usize) {
    grid.update();
    if spawns.is_empty() || exits.is_empty() {
        warn!("no spawn or exit cells registered, nothing to precompute");
        return (0, 0);
    }
    let mut success = 0;
    let mut failed = 0;
    for &spawn in spawns {
        for &exit in exits {
            match grid.find_path(spawn, exit) {
                Some(path) => {
                    cache.commit(grid, spawn, exit, path);
                    success += 1;
                }
                None => {
                    warn!("no route from spawn {} to exit {}", spawn, exit);
                    failed += 1;
                }
            }
        }
    }
    (success, failed)
}
