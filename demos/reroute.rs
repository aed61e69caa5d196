use defense_pathfinding::{
    AgentPathCursor, NavGrid, PathfindingContext, PlacementError, SyncStatus,
};
use grid_util::point::Point;

// An agent follows the precomputed spawn-exit route while towers land on
// the field. The first tower invalidates the agent's route mid-transit and
// its cursor rejoins from the agent's current position; a tower that would
// wall the spawn off entirely is rejected by the connectivity gate.

fn main() {
    let mut grid = NavGrid::build(6, 6, 1.0);
    grid.generate_components();
    let mut ctx = PathfindingContext::new(grid);
    ctx.register_spawn(Point::new(0, 0)).unwrap();
    ctx.register_exit(Point::new(5, 5)).unwrap();
    let _ = ctx.precompute_all_paths();

    let mut cursor = AgentPathCursor::register(&mut ctx);
    let route = ctx
        .get_or_compute(Point::new(0, 0), Point::new(5, 5))
        .unwrap();
    println!("initial route: {} nodes", route.len());
    cursor.assign_path(route);

    // The agent walks two nodes before the tower lands.
    let _ = cursor.advance();
    let _ = cursor.advance();
    let position = ctx.grid.grid_to_world(cursor.path()[cursor.nodes_passed()]);

    match ctx.try_commit_obstruction(Point::new(3, 0)) {
        Ok(()) => println!("tower committed at (3, 0)"),
        Err(e) => println!("tower rejected: {}", e),
    }

    match cursor.sync(&mut ctx, position) {
        SyncStatus::Rerouted => {
            println!("agent rejoined on a {} node route", cursor.path().len())
        }
        status => println!("agent status: {:?}", status),
    }

    // Walling the spawn in completely is refused before anything changes.
    ctx.try_commit_obstruction(Point::new(1, 0)).unwrap();
    match ctx.try_commit_obstruction(Point::new(0, 1)) {
        Err(PlacementError::WouldBlockPath(cell)) => {
            println!("gate refused obstruction at {}", cell)
        }
        other => println!("unexpected outcome: {:?}", other),
    }

    while cursor.advance().is_some() {}
    println!("agent state: {:?}", cursor.state());
}
