//! Single-rank, end-to-end scenarios that exercise several modules together
//! (field seeding, neighbor search, physics, and the two integrators)
//! without going through MPI: each test builds a small [`Field`] by hand,
//! drives it through [`derivative_computation`]/[`euler_update`]/
//! [`rk2_update`], and checks a closed-form or symmetry property of the
//! result.

use approx::assert_relative_eq;
use glam::DVec3;

use sph_solver::domain::{check_partition_precondition, SubdomainInfo};
use sph_solver::field::{Field, ParticleKind};
use sph_solver::grid::BoxGrid;
use sph_solver::integrator::{derivative_computation, euler_update, rk2_update};
use sph_solver::params::{AngleLaw, MovingBoundary, Parameter, PosLaw};
use sph_solver::physics::update_moving;

fn single_box_info(n_total: usize) -> SubdomainInfo {
    SubdomainInfo { rank: 0, n_ranks: 1, starting_box: 0, ending_box: 0, starting_particle: 0, ending_particle: n_total - 1, box_size: 1.0 }
}

/// Two free particles half a smoothing length apart, converging along x with
/// equal and opposite speed: the pairwise pressure/viscosity term is
/// antisymmetric under particle exchange (same bracket value, opposite
/// gradient direction), so the two velocity changes must be exact negatives
/// of each other and the two density changes must be exactly equal, for any
/// nonzero relative approach speed.
#[test]
fn converging_particle_pair_gets_equal_and_opposite_velocity_change() {
    let mut parameter = Parameter::default_for_tests();
    parameter.g = 0.0;
    let kh = parameter.kh;
    let spacing = 0.5 * kh;

    let mut field = Field::with_capacity(2);
    field.push(DVec3::ZERO, DVec3::new(0.1, 0.0, 0.0), parameter.density_ref, 0.0, 1.0, ParticleKind::Free);
    field.push(DVec3::new(spacing, 0.0, 0.0), DVec3::new(-0.1, 0.0, 0.0), parameter.density_ref, 0.0, 1.0, ParticleKind::Free);
    field.lower = DVec3::splat(-kh);
    field.upper = DVec3::splat(kh);

    let info = single_box_info(2);
    let mut grid = BoxGrid::new(field.lower, field.upper, 2.0 * kh);
    let derivatives = derivative_computation(&field, &parameter, &mut grid, &info, false);

    assert!((derivatives.d_velocity[0].x + derivatives.d_velocity[1].x).abs() < 1e-9);
    assert!((derivatives.d_density[0] - derivatives.d_density[1]).abs() < 1e-9);
    assert!(derivatives.d_velocity[0].x.abs() > 1e-9, "the converging pair should feel a nonzero viscous push-back");

    let mut next = Field::default();
    euler_update(&field, &mut next, &parameter, &info, &derivatives, 0.0, 1e-4);
    assert!((next.vel[0].x + next.vel[1].x).abs() < 1e-9);
    assert!((next.density[0] - parameter.density_ref - (next.density[1] - parameter.density_ref)).abs() < 1e-9);
}

/// A single free particle alone in its box sees no neighbors: continuity is
/// exactly zero and momentum is exactly gravity, so one Euler step leaves
/// density unchanged and sets velocity to `(0, 0, -g*k)`.
#[test]
fn isolated_particle_feels_only_gravity() {
    let parameter = Parameter::default_for_tests();
    let mut field = Field::with_capacity(1);
    field.push(DVec3::ZERO, DVec3::ZERO, parameter.density_ref, 0.0, 1.0, ParticleKind::Free);
    field.lower = DVec3::splat(-parameter.kh);
    field.upper = DVec3::splat(parameter.kh);

    let info = single_box_info(1);
    let mut grid = BoxGrid::new(field.lower, field.upper, 2.0 * parameter.kh);
    let derivatives = derivative_computation(&field, &parameter, &mut grid, &info, false);
    assert_eq!(derivatives.d_density[0], 0.0);
    assert_eq!(derivatives.d_velocity[0], DVec3::new(0.0, 0.0, -parameter.g));

    let k = 1e-4;
    let mut next = Field::default();
    euler_update(&field, &mut next, &parameter, &info, &derivatives, 0.0, k);
    assert_eq!(next.density[0], field.density[0]);
    assert!((next.vel[0] - DVec3::new(0.0, 0.0, -parameter.g * k)).length() < 1e-12);
}

/// A sinusoidal moving wall's position follows the closed form
/// `amplitude * sin(2*pi*t/charactTime)` along its configured direction at
/// every evaluated time, regardless of how many steps already ran, since
/// `updateMoving` always evaluates the law relative to the particle's
/// recorded origin rather than its current position.
#[test]
fn sinusoidal_moving_wall_matches_closed_form_at_every_step() {
    let charact_time = 1.0;
    let amplitude = 0.1;
    let law = MovingBoundary {
        pos_law: PosLaw::Sine,
        angle_law: AngleLaw::Linear,
        charact_time,
        amplitude,
        direction: DVec3::new(1.0, 0.0, 0.0),
        rotation_center: DVec3::ZERO,
        teta: DVec3::ZERO,
    };
    let mut parameter = Parameter::default_for_tests();
    parameter.moving_boundaries = vec![law];

    let mut field = Field::with_capacity(1);
    field.push(DVec3::ZERO, DVec3::ZERO, parameter.density_ref, 0.0, 1.0, ParticleKind::Moving(0));

    let k = 0.01;
    let mut t = 0.0_f64;
    for _ in 0..50 {
        update_moving(&mut field, 0, &parameter, t, k);
        let expected_x = amplitude * (2.0 * std::f64::consts::PI * (t + k) / charact_time).sin();
        assert!((field.pos[0].x - expected_x).abs() < 1e-12, "t={t}: got {}, expected {}", field.pos[0].x, expected_x);
        t += k;
    }
}

/// `nTotalBoxesX` below `2 * nRanks` is rejected before any step is taken.
#[test]
fn too_few_boxes_for_rank_count_is_rejected_up_front() {
    assert!(check_partition_precondition(7, 4).is_err());
    assert!(check_partition_precondition(8, 4).is_ok());
}

/// For a single free particle under constant gravity with no neighbors, the
/// velocity derivative never depends on position, so the underlying ODE is
/// exactly quadratic in time. RK2 with theta=1/2 reproduces the analytic
/// position `x0 + v0*k - g*k^2/2` to floating-point precision, while plain
/// Euler's `x0 + v0*k` is missing the second-order term — demonstrating
/// RK2's better convergence order on the same step size.
#[test]
fn rk2_reproduces_quadratic_motion_exactly_where_euler_does_not() {
    let mut parameter = Parameter::default_for_tests();
    parameter.theta = 0.5;
    parameter.g = 9.81;
    let k = 0.1;
    let v0 = 2.0;

    let mut field = Field::with_capacity(1);
    field.push(DVec3::ZERO, DVec3::new(0.0, 0.0, v0), parameter.density_ref, 0.0, 1.0, ParticleKind::Free);
    field.lower = DVec3::splat(-parameter.kh);
    field.upper = DVec3::splat(parameter.kh);

    let info = single_box_info(1);
    let mut grid = BoxGrid::new(field.lower, field.upper, 2.0 * parameter.kh);

    let current_d = derivative_computation(&field, &parameter, &mut grid, &info, false);

    let mut euler_next = Field::default();
    euler_update(&field, &mut euler_next, &parameter, &info, &current_d, 0.0, k);
    let analytic = v0 * k - 0.5 * parameter.g * k * k;
    assert!((euler_next.pos[0].z - v0 * k).abs() < 1e-12, "euler should advance by v0*k only");
    assert!((euler_next.pos[0].z - analytic).abs() > 1e-4, "euler should visibly miss the quadratic term at this step size");

    let k_mid = 0.5 * k / parameter.theta;
    let mut mid = field.clone();
    euler_update(&field, &mut mid, &parameter, &info, &current_d, 0.0, k_mid);
    let mid_d = derivative_computation(&mid, &parameter, &mut grid, &info, true);

    let mut rk2_next = Field::default();
    rk2_update(&field, &mid, &mut rk2_next, &parameter, &info, &current_d, &mid_d, 0.0, k);
    assert_relative_eq!(rk2_next.pos[0].z, analytic, epsilon = 1e-9);
}
