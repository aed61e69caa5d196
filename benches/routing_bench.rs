use criterion::{criterion_group, criterion_main, Criterion};
use defense_pathfinding::{NavGrid, PathfindingContext, TileClass};
use grid_util::point::Point;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

const N: usize = 64;

fn scattered_field() -> PathfindingContext {
    let mut rng = StdRng::seed_from_u64(0);
    let mut grid = NavGrid::build(N, N, 1.0);
    for x in 0..N as i32 {
        for y in 0..N as i32 {
            if rng.gen_bool(0.2) {
                grid.apply_tile_classification(Point::new(x, y), TileClass::Blocked);
            }
        }
    }
    grid.apply_tile_classification(Point::new(0, 0), TileClass::Spawn);
    grid.apply_tile_classification(Point::new(N as i32 - 1, N as i32 - 1), TileClass::Exit);
    grid.generate_components();
    let mut ctx = PathfindingContext::new(grid);
    let _ = ctx.register_from_tiles();
    let _ = ctx.precompute_all_paths();
    ctx
}

fn route_bench(c: &mut Criterion) {
    let ctx = scattered_field();
    let start = Point::new(0, 0);
    let goal = Point::new(N as i32 - 1, N as i32 - 1);

    c.bench_function("uncached route, 64x64 scattered", |b| {
        b.iter(|| black_box(ctx.find_path(start, goal)))
    });

    let mut ctx = scattered_field();
    c.bench_function("cached route, 64x64 scattered", |b| {
        b.iter(|| black_box(ctx.get_or_compute(start, goal)))
    });
}

fn validator_bench(c: &mut Criterion) {
    let mut ctx = scattered_field();
    let mut rng = StdRng::seed_from_u64(1);
    let cells: Vec<Point> = (0..64)
        .map(|_| Point::new(rng.gen_range(0..N as i32), rng.gen_range(0..N as i32)))
        .collect();

    c.bench_function("placement gate, 64x64 scattered", |b| {
        b.iter(|| {
            for &cell in &cells {
                black_box(ctx.would_disconnect(cell));
            }
        })
    });
}

criterion_group!(benches, route_bench, validator_bench);
criterion_main!(benches);
