//! Time integration: derivative computation over the owned-particle range,
//! and the Euler / RK2-midpoint update rules (spec §4.5), grounded in
//! `original_source/CPP_Physics/TimeIntegration.cpp`'s
//! `derivativeComputation`/`eulerUpdate`/`RK2Update`/`timeIntegration`, with
//! the fork-join loop expressed via `rayon` per `fkjogu-stochasticsampling`'s
//! pattern instead of the original's `#pragma omp parallel for`.

use glam::DVec3;
use rayon::prelude::*;

use crate::communication::reduce_min_broadcast;
use crate::domain::{self, SubdomainInfo};
use crate::field::{Field, ParticleKind};
use crate::grid::BoxGrid;
use crate::neighbor::find_neighbors;
use crate::params::{IntegrationMethod, Parameter};
use crate::physics::{continuity, equation_of_state, momentum, update_moving, xsph_correction};
use mpi::topology::SystemCommunicator;

/// Per-particle derivatives over the *whole* field length: entries outside
/// `[starting_particle, ending_particle]` are left at zero, mirroring the
/// original's full-length but partially-filled derivative vectors.
pub struct Derivatives {
    pub d_density: Vec<f64>,
    pub d_velocity: Vec<DVec3>,
    pub d_position: Vec<DVec3>,
}

/// Computes density/velocity/position derivatives for every owned particle
/// (`derivativeComputation`). Re-sorts the grid unless `mid_point` is set,
/// since the midpoint field reuses the pre-step box assignment to avoid a
/// second sort (spec §3's `BoxGrid` note on the `2*kh` RK2 cell size).
pub fn derivative_computation(field: &Field, parameter: &Parameter, grid: &mut BoxGrid, info: &SubdomainInfo, mid_point: bool) -> Derivatives {
    if !mid_point {
        grid.sort(field);
    }
    let n = field.n_total();
    let mut d_density = vec![0.0; n];
    let mut d_velocity = vec![DVec3::ZERO; n];
    let mut d_position = vec![DVec3::ZERO; n];

    let range: Vec<usize> = (info.starting_particle..=info.ending_particle).collect();
    let results: Vec<(usize, f64, DVec3, DVec3)> = range
        .into_par_iter()
        .map(|i| {
            let b = grid.box_of(field.pos[i]);
            let neighbors = find_neighbors(i, b, field, grid, parameter.kh, parameter.kernel, true);
            let d_rho = continuity(i, &neighbors, field);
            let d_vel = if matches!(field.kind[i], ParticleKind::Free) {
                momentum(i, &neighbors, field, parameter)
            } else {
                DVec3::ZERO
            };
            let d_pos = xsph_correction(i, &neighbors, field, parameter);
            (i, d_rho, d_vel, d_pos)
        })
        .collect();

    for (i, d_rho, d_vel, d_pos) in results {
        d_density[i] = d_rho;
        d_velocity[i] = d_vel;
        d_position[i] = d_pos;
    }

    Derivatives { d_density, d_velocity, d_position }
}

/// Advances every owned particle by `k` from `current` into `next` using a
/// plain forward Euler step (`eulerUpdate`).
pub fn euler_update(current: &Field, next: &mut Field, parameter: &Parameter, info: &SubdomainInfo, derivatives: &Derivatives, t: f64, k: f64) {
    *next = current.clone();
    for i in info.starting_particle..=info.ending_particle {
        next.density[i] = current.density[i] + k * derivatives.d_density[i];
        match current.kind[i] {
            ParticleKind::Free => {
                next.vel[i] = current.vel[i] + derivatives.d_velocity[i] * k;
                next.pos[i] = current.pos[i] + derivatives.d_position[i] * k;
            }
            ParticleKind::Fixed => {}
            ParticleKind::Moving(_) => update_moving(next, i, parameter, t, k),
        }
        equation_of_state_refresh(next, i, parameter);
    }
}

/// Advances every owned particle by `k` from `current` into `next`, blending
/// the derivatives at `t` and at the RK2 midpoint with weight `theta`
/// (`RK2Update`).
pub fn rk2_update(current: &Field, mid: &Field, next: &mut Field, parameter: &Parameter, info: &SubdomainInfo, current_d: &Derivatives, mid_d: &Derivatives, t: f64, k: f64) {
    *next = current.clone();
    let theta = parameter.theta;
    for i in info.starting_particle..=info.ending_particle {
        next.density[i] = current.density[i] + k * ((1.0 - theta) * current_d.d_density[i] + theta * mid_d.d_density[i]);
        match current.kind[i] {
            ParticleKind::Free => {
                next.vel[i] = current.vel[i] + (current_d.d_velocity[i] * (1.0 - theta) + mid_d.d_velocity[i] * theta) * k;
                next.pos[i] = current.pos[i] + (current_d.d_position[i] * (1.0 - theta) + mid_d.d_position[i] * theta) * k;
            }
            ParticleKind::Fixed => {}
            ParticleKind::Moving(_) => update_moving(next, i, parameter, t, k),
        }
        equation_of_state_refresh(next, i, parameter);
    }
}

fn equation_of_state_refresh(field: &mut Field, i: usize, parameter: &Parameter) {
    field.pressure[i] = equation_of_state(field.density[i], parameter);
}

/// One full time step from `(current, t)` to `(next, t+k)`: derivative
/// computation, a method-dependent update, and — for RK2 — the midpoint
/// halo re-share over `world` (`timeIntegration` + `shareRKMidpoint`). Also
/// returns the derivatives computed at `current`, so the caller can feed
/// them into [`propose_next_timestep`]'s force-magnitude term without a
/// second derivative pass.
pub fn time_integration(world: &SystemCommunicator, current: &Field, grid: &mut BoxGrid, parameter: &Parameter, info: &SubdomainInfo, t: f64, k: f64) -> (Field, Derivatives) {
    let current_d = derivative_computation(current, parameter, grid, info, false);
    let mut next = Field::default();
    match parameter.integration_method {
        IntegrationMethod::Euler => {
            euler_update(current, &mut next, parameter, info, &current_d, t, k);
        }
        IntegrationMethod::Rk2 => {
            let k_mid = 0.5 * k / parameter.theta;
            let mut mid = current.clone();
            euler_update(current, &mut mid, parameter, info, &current_d, t, k_mid);
            domain::share_rk2_midpoint(world, &mut mid, info).expect("midpoint re-share failed");
            let mid_d = derivative_computation(&mid, parameter, grid, info, true);
            rk2_update(current, &mid, &mut next, parameter, info, &current_d, &mid_d, t, k);
        }
    }
    (next, current_d)
}

/// Courant-like adaptive timestep proposal, bounded by local maxima of both
/// speed and force magnitude (spec §4.5): `kh / (c + max|v|)` for the speed
/// term, `sqrt(kh / max|dv/dt|)` for the acceleration term, the smaller of
/// the two reduced to the global minimum across ranks when
/// `parameter.adaptive_time_step` is set (Open Question 1's fixed reduction
/// lives in [`crate::communication::reduce_min_broadcast`]).
pub fn propose_next_timestep(world: &SystemCommunicator, field: &Field, derivatives: &Derivatives, parameter: &Parameter, info: &SubdomainInfo) -> f64 {
    if !parameter.adaptive_time_step {
        return parameter.k;
    }
    let max_speed = (info.starting_particle..=info.ending_particle).map(|i| field.vel[i].length()).fold(0.0_f64, f64::max);
    let max_accel = (info.starting_particle..=info.ending_particle).map(|i| derivatives.d_velocity[i].length()).fold(0.0_f64, f64::max);
    let speed_bound = parameter.kh / (parameter.c + max_speed);
    let local_proposition = if max_accel > 0.0 {
        speed_bound.min((parameter.kh / max_accel).sqrt())
    } else {
        speed_bound
    };
    reduce_min_broadcast(world, local_proposition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ParticleKind;
    use crate::params::Parameter;

    fn single_free_particle_field() -> (Field, SubdomainInfo) {
        let mut field = Field::with_capacity(1);
        field.push(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), 1000.0, 0.0, 1.0, ParticleKind::Free);
        let info = SubdomainInfo { rank: 0, n_ranks: 1, starting_box: 0, ending_box: 0, starting_particle: 0, ending_particle: 0, box_size: 0.04 };
        (field, info)
    }

    #[test]
    fn euler_update_advances_free_particle_by_velocity() {
        let (field, info) = single_free_particle_field();
        let parameter = Parameter::default_for_tests();
        let derivatives = Derivatives { d_density: vec![0.0], d_velocity: vec![DVec3::ZERO], d_position: vec![DVec3::new(1.0, 0.0, 0.0)] };
        let mut next = Field::default();
        euler_update(&field, &mut next, &parameter, &info, &derivatives, 0.0, 0.1);
        assert!((next.pos[0].x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn fixed_particle_position_is_unchanged_by_euler_update() {
        let mut field = Field::with_capacity(1);
        field.push(DVec3::new(2.0, 0.0, 0.0), DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Fixed);
        let info = SubdomainInfo { rank: 0, n_ranks: 1, starting_box: 0, ending_box: 0, starting_particle: 0, ending_particle: 0, box_size: 0.04 };
        let parameter = Parameter::default_for_tests();
        let derivatives = Derivatives { d_density: vec![0.0], d_velocity: vec![DVec3::X], d_position: vec![DVec3::X] };
        let mut next = Field::default();
        euler_update(&field, &mut next, &parameter, &info, &derivatives, 0.0, 0.1);
        assert_eq!(next.pos[0], field.pos[0]);
    }

}
