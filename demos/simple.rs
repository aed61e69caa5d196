use defense_pathfinding::{NavGrid, PathfindingContext, TileClass};
use grid_util::point::Point;

// In this example a route is found on a 5x5 field with shape
//  _____
// |S    |
// |  #  |
// |  #  |
// |     |
// |    E|
//  -----
// where
// - # marks a blocked tile
// - S marks the spawn
// - E marks the exit
//
// Cells have a 4-neighborhood

fn main() {
    let mut grid = NavGrid::build(5, 5, 1.0);
    grid.apply_tile_classification(Point::new(2, 1), TileClass::Blocked);
    grid.apply_tile_classification(Point::new(2, 2), TileClass::Blocked);
    grid.generate_components();
    println!("{}", grid);

    let mut ctx = PathfindingContext::new(grid);
    ctx.register_spawn(Point::new(0, 0)).unwrap();
    ctx.register_exit(Point::new(4, 4)).unwrap();
    let (cached, unroutable) = ctx.precompute_all_paths();
    println!("precomputed {} routes ({} unroutable)", cached, unroutable);

    let path = ctx
        .get_or_compute(Point::new(0, 0), Point::new(4, 4))
        .unwrap();
    println!("Route:");
    for p in path {
        println!("{:?}", p);
    }
}
