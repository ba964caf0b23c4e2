//! Benchmarks [`sph_solver::integrator::derivative_computation`], the
//! fork-join hot loop of a single rank's time step, across particle counts
//! (`benches/hydrodynamics/main.rs`'s scaling-sweep pattern, ported off
//! bevy's `Simulation`/`SimulationBuilder` onto a bare `Field`/`BoxGrid`).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::DVec3;
use sph_solver::domain::SubdomainInfo;
use sph_solver::field::{Field, ParticleKind};
use sph_solver::grid::BoxGrid;
use sph_solver::integrator::derivative_computation;
use sph_solver::params::Parameter;

fn cubic_field(num_particles: usize, spacing: f64) -> (Field, SubdomainInfo, f64) {
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
    let n = field.n_total();
    let info = SubdomainInfo { rank: 0, n_ranks: 1, starting_box: 0, ending_box: 0, starting_particle: 0, ending_particle: n - 1, box_size: 2.0 * spacing };
    (field, info, 2.0 * spacing)
}

fn derivatives_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("derivatives");
    group.noise_threshold(0.05);
    let mut parameter = Parameter::default_for_tests();
    let spacing = 0.01;
    parameter.kh = 2.0 * spacing;
    for num_particles in [1_000, 10_000, 100_000] {
        let (field, info, kh) = cubic_field(num_particles, spacing);
        parameter.kh = kh;
        group.throughput(Throughput::Elements(field.n_total() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_particles), &field, |b, field| {
            let mut grid = BoxGrid::new(field.lower, field.upper, parameter.kh);
            b.iter(|| derivative_computation(field, &parameter, &mut grid, &info, false));
        });
    }
    group.finish();
}

criterion_group!(benches, derivatives_benchmark);
criterion_main!(benches);
