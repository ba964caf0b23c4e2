//! Benchmarks [`sph_solver::grid::BoxGrid::sort`] and the neighbor search it
//! feeds, across a range of particle counts, mirroring the scaling sweep in
//! `benches/quadtree/main.rs`.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use sph_solver::field::{Field, ParticleKind};
use sph_solver::grid::BoxGrid;
use sph_solver::kernel::Kernel;
use sph_solver::neighbor::find_neighbors;

fn cubic_field(num_particles: usize, spacing: f64) -> Field {
    let per_axis = (num_particles as f64).cbrt().ceil() as usize;
    let mut field = Field::with_capacity(per_axis.pow(3));
    for x in 0..per_axis {
        for y in 0..per_axis {
            for z in 0..per_axis {
                let pos = DVec3::new(x as f64, y as f64, z as f64) * spacing;
                field.push(pos, DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Free);
            }
        }
    }
    field.lower = DVec3::ZERO;
    field.upper = DVec3::splat(per_axis as f64 * spacing);
    field
}

fn box_index_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("box_index");
    group.noise_threshold(0.05);
    let spacing = 0.01;
    let kh = 2.0 * spacing;
    for num_particles in [1_000, 10_000, 100_000] {
        let field = cubic_field(num_particles, spacing);
        group.bench_with_input(BenchmarkId::new("sort", num_particles), &field, |b, field| {
            let mut grid = BoxGrid::new(field.lower, field.upper, kh);
            b.iter(|| grid.sort(field));
        });
        group.bench_with_input(BenchmarkId::new("neighbor_search", num_particles), &field, |b, field| {
            let mut grid = BoxGrid::new(field.lower, field.upper, kh);
            grid.sort(field);
            b.iter(|| {
                for i in 0..field.n_total().min(500) {
                    let box_id = grid.box_of(field.pos[i]);
                    let _ = find_neighbors(i, box_id, field, &grid, kh, Kernel::CubicSpline, true);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, box_index_benchmark);
criterion_main!(benches);
