//! Benchmark overlay construction.
//!
//! Overlay cost should follow the number of visited cells in view, not the
//! size of the explored history.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fog_explorer::core::types::Coordinate;
use fog_explorer::exploration::cell::GridCell;
use fog_explorer::exploration::grid::ExplorationGrid;
use fog_explorer::location::simulate::RandomWalk;
use fog_explorer::render::overlay::FogRenderer;
use fog_explorer::render::viewport::Viewport;

const CELL: f64 = 0.003;
const HOME: Coordinate = Coordinate::new(34.0522, -118.2437);

/// Fully explored square block of `side` × `side` cells around HOME
fn explored_block(grid: &mut ExplorationGrid, side: i32) {
    let center = grid.cell_for(HOME);
    let half = side / 2;
    for dlat in -half..=half {
        for dlon in -half..=half {
            grid.insert(GridCell::new(center.lat_index + dlat, center.lon_index + dlon));
        }
    }
}

/// `count` visited cells far from HOME (off-screen history)
fn distant_history(grid: &mut ExplorationGrid, count: usize) {
    let base = grid.cell_for(Coordinate::new(-30.0, 100.0));
    let row = 1_000;
    for i in 0..count as i32 {
        grid.insert(GridCell::new(base.lat_index + i / row, base.lon_index + i % row));
    }
}

fn bench_history_size(c: &mut Criterion) {
    let renderer = FogRenderer::default();
    let viewport = Viewport::around(HOME, 0.05);
    let mut group = c.benchmark_group("overlay_vs_history");

    for history in [0usize, 10_000, 100_000, 1_000_000] {
        let mut grid = ExplorationGrid::with_cell_size(CELL);
        explored_block(&mut grid, 15);
        distant_history(&mut grid, history);

        group.bench_with_input(BenchmarkId::from_parameter(history), &grid, |b, grid| {
            b.iter(|| black_box(renderer.build_overlay(black_box(&viewport), grid)))
        });
    }
    group.finish();
}

fn bench_visible_cells(c: &mut Criterion) {
    let renderer = FogRenderer::default();
    let mut group = c.benchmark_group("overlay_vs_visible");

    for side in [5, 25, 75, 150] {
        let mut grid = ExplorationGrid::with_cell_size(CELL);
        explored_block(&mut grid, side);
        let viewport = Viewport::around(HOME, side as f64 * CELL);

        group.bench_with_input(BenchmarkId::from_parameter(side * side), &grid, |b, grid| {
            b.iter(|| black_box(renderer.build_overlay(black_box(&viewport), grid)))
        });
    }
    group.finish();
}

fn bench_mark_walk(c: &mut Criterion) {
    let track = RandomWalk::new(42, HOME, 10_000, 30.0).with_bad_fix_rate(0.0).generate();

    c.bench_function("mark_visited_10k_walk", |b| {
        b.iter(|| {
            let mut grid = ExplorationGrid::with_cell_size(CELL);
            for fix in &track {
                grid.mark_visited(fix.coordinate());
            }
            black_box(grid.len())
        })
    });
}

criterion_group!(benches, bench_history_size, bench_visible_cells, bench_mark_walk);
criterion_main!(benches);
