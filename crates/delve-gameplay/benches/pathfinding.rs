//! BFS and smoothing on square mazes of increasing size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use delve_common::TileCoord;
use delve_gameplay::pathfinding::{find_path, smooth_tile_path};
use delve_world::WalkableGrid;

/// Open grid with a wall every fourth column, each wall gapped at
/// alternating ends so the route snakes across the whole map.
fn make_grid(n: u32) -> WalkableGrid {
    let mut grid = WalkableGrid::open(n, n);
    for x in (2..n as i32).step_by(4) {
        let gap = if (x / 4) % 2 == 0 { n as i32 - 1 } else { 0 };
        for y in 0..n as i32 {
            if y != gap {
                grid.set_walkable(TileCoord::new(x, y), false);
                grid.set_opaque(TileCoord::new(x, y), true);
            }
        }
    }
    grid
}

fn bench_find_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_path");
    for &n in &[32u32, 64, 128, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let grid = make_grid(n);
            let goal = TileCoord::new(n as i32 - 1, n as i32 - 1);
            b.iter(|| find_path(black_box(&grid), TileCoord::new(0, 0), goal));
        });
    }
    group.finish();
}

fn bench_smooth(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_and_smooth");
    for &n in &[32u32, 64, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let grid = make_grid(n);
            let goal = TileCoord::new(n as i32 - 1, n as i32 - 1);
            b.iter(|| {
                let path = find_path(&grid, TileCoord::new(0, 0), goal);
                smooth_tile_path(black_box(&grid), &path)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_path, bench_smooth);
criterion_main!(benches);
