//! Per-particle physics: continuity, momentum with Violeau artificial
//! viscosity, XSPH position correction, the two equations of state, moving-
//! boundary kinematics, and the density/mass/pressure initializers (spec
//! §4.4), grounded in `original_source/CPP_Physics/Init.cpp` for the
//! initializer semantics.

use glam::DVec3;

use crate::field::{Field, ParticleKind};
use crate::neighbor::Neighbors;
use crate::params::{AngleLaw, MovingBoundary, Parameter, PosLaw, StateEquationMethod};

/// `dρ/dt` for particle `i` (spec §4.4's `continuity`). Zero when `i` has
/// no neighbors other than itself at nonzero distance.
pub fn continuity(i: usize, neighbors: &Neighbors, field: &Field) -> f64 {
    let pos_i = field.pos[i];
    let vel_i = field.vel[i];
    let mut d_rho = 0.0;
    for (n, &j) in neighbors.ids.iter().enumerate() {
        if j == i {
            continue;
        }
        let r_ij = pos_i - field.pos[j];
        let r = r_ij.length();
        if r <= 0.0 {
            continue;
        }
        let e_ij = r_ij / r;
        d_rho += field.mass[j] * (vel_i - field.vel[j]).dot(e_ij) * neighbors.grad_w[n];
    }
    d_rho
}

/// The Violeau artificial viscosity term `Pi_ij` between `i` and `j`: zero
/// under expansion, otherwise `-(alpha*c*mu - beta*mu^2) / rho_bar`.
fn violeau_viscosity(field: &Field, i: usize, j: usize, r_ij: DVec3, r: f64, kh: f64, parameter: &Parameter) -> f64 {
    let v_ij = field.vel[i] - field.vel[j];
    let approach = v_ij.dot(r_ij);
    if approach >= 0.0 {
        return 0.0;
    }
    let mu = kh * approach / (r * r + parameter.epsilon * kh * kh);
    let rho_bar = 0.5 * (field.density[i] + field.density[j]);
    -(parameter.alpha * parameter.c * mu - parameter.beta * mu * mu) / rho_bar
}

/// `dv/dt` for a free particle `i` (spec §4.4's `momentum`): the pressure
/// term with Violeau viscosity, plus gravity on the z axis.
pub fn momentum(i: usize, neighbors: &Neighbors, field: &Field, parameter: &Parameter) -> DVec3 {
    let pos_i = field.pos[i];
    let rho_i = field.density[i];
    let p_i = field.pressure[i];
    let mut d_v = DVec3::new(0.0, 0.0, -parameter.g);
    for (n, &j) in neighbors.ids.iter().enumerate() {
        if j == i {
            continue;
        }
        let r_ij = pos_i - field.pos[j];
        let r = r_ij.length();
        if r <= 0.0 {
            continue;
        }
        let rho_j = field.density[j];
        let p_j = field.pressure[j];
        let pi_ij = violeau_viscosity(field, i, j, r_ij, r, parameter.kh, parameter);
        let factor = p_i / (rho_i * rho_i) + p_j / (rho_j * rho_j) + pi_ij;
        let grad = (r_ij / r) * neighbors.grad_w[n];
        d_v -= grad * (field.mass[j] * factor);
    }
    d_v
}

/// The XSPH-corrected position derivative `v_hat_i` (spec §4.4's
/// `xsphCorrection`): the velocity derivative itself is [`momentum`].
pub fn xsph_correction(i: usize, neighbors: &Neighbors, field: &Field, parameter: &Parameter) -> DVec3 {
    let vel_i = field.vel[i];
    let rho_i = field.density[i];
    let mut correction = DVec3::ZERO;
    for (n, &j) in neighbors.ids.iter().enumerate() {
        if j == i {
            continue;
        }
        let weight = 2.0 * field.mass[j] / (rho_i + field.density[j]);
        correction += (field.vel[j] - vel_i) * (weight * neighbors.w[n]);
    }
    vel_i + correction * parameter.epsilon_xsph
}

/// Pressure from density via the configured equation of state (spec §4.4's
/// `equationOfState`).
pub fn equation_of_state(rho: f64, parameter: &Parameter) -> f64 {
    match parameter.state_equation_method {
        StateEquationMethod::QuasiIncompressible => parameter.b * ((rho / parameter.density_ref).powf(parameter.gamma) - 1.0),
        StateEquationMethod::PerfectGas => rho * Parameter::GAS_CONSTANT * parameter.temperature / parameter.molar_mass,
    }
}

/// Recomputes `field.pressure[i]` from `field.density[i]`
/// (`pressureComputation`).
pub fn pressure_computation(field: &mut Field, i: usize, parameter: &Parameter) {
    field.pressure[i] = equation_of_state(field.density[i], parameter);
}

/// Position and velocity for moving-boundary particle `i` at `(t, t+k)`,
/// evaluated at `t_eval` (spec §4.4's `movingKinematics`): constant ramp,
/// sine, exponential approach along `direction`, or rigid rotation about
/// `rotation_center` driven by an angle law applied to `teta`.
pub fn moving_kinematics(law: &MovingBoundary, origin: DVec3, t_eval: f64) -> (DVec3, DVec3) {
    match law.pos_law {
        PosLaw::Constant => {
            let displacement = if t_eval < law.charact_time { t_eval / law.charact_time } else { 1.0 };
            let speed = if t_eval < law.charact_time { 1.0 / law.charact_time } else { 0.0 };
            (origin + law.direction * (law.amplitude * displacement), law.direction * (law.amplitude * speed))
        }
        PosLaw::Sine => {
            let omega = 2.0 * std::f64::consts::PI / law.charact_time;
            let displacement = law.amplitude * (omega * t_eval).sin();
            let speed = law.amplitude * omega * (omega * t_eval).cos();
            (origin + law.direction * displacement, law.direction * speed)
        }
        PosLaw::Exponential => {
            let displacement = law.amplitude * (1.0 - (-t_eval / law.charact_time).exp());
            let speed = (law.amplitude / law.charact_time) * (-t_eval / law.charact_time).exp();
            (origin + law.direction * displacement, law.direction * speed)
        }
        PosLaw::Rotating => {
            let angle_scale = match law.angle_law {
                AngleLaw::Linear => t_eval / law.charact_time,
                AngleLaw::Sine => (2.0 * std::f64::consts::PI / law.charact_time * t_eval).sin(),
                AngleLaw::Exponential => 1.0 - (-t_eval / law.charact_time).exp(),
            };
            let teta = law.teta * angle_scale;
            let rotated = rotate_euler(origin - law.rotation_center, teta);
            let eps = 1e-6;
            let teta_ahead = law.teta * (angle_scale + eps);
            let rotated_ahead = rotate_euler(origin - law.rotation_center, teta_ahead);
            let speed = (rotated_ahead - rotated) / eps;
            (law.rotation_center + rotated, speed)
        }
    }
}

/// Rotates `v` by the Euler angle triple `teta` (roll/pitch/yaw, applied
/// x-y-z), used by the rigid-rotation moving-boundary law.
fn rotate_euler(v: DVec3, teta: DVec3) -> DVec3 {
    let (sx, cx) = teta.x.sin_cos();
    let (sy, cy) = teta.y.sin_cos();
    let (sz, cz) = teta.z.sin_cos();
    let after_x = DVec3::new(v.x, cx * v.y - sx * v.z, sx * v.y + cx * v.z);
    let after_y = DVec3::new(cy * after_x.x + sy * after_x.z, after_x.y, -sy * after_x.x + cy * after_x.z);
    DVec3::new(cz * after_y.x - sz * after_y.y, sz * after_y.x + cz * after_y.y, after_y.z)
}

/// Sets position and velocity for moving particle `i` at `(t, t+k)` using
/// its configured law, evaluated at `t + k` relative to `field.origin[i]`
/// (`updateMovingPos` + `updateMovingSpeed`). Each particle keeps its own
/// origin (spec §9 note on [`Field::origin`]) rather than sharing one
/// reference point per law, so a moving body made of many particles
/// translates/rotates as a rigid group instead of collapsing onto a single
/// point.
pub fn update_moving(field: &mut Field, i: usize, parameter: &Parameter, t: f64, k: f64) {
    let ParticleKind::Moving(law_index) = field.kind[i] else {
        return;
    };
    let law = &parameter.moving_boundaries[law_index as usize];
    let (pos, vel) = moving_kinematics(law, field.origin[i], t + k);
    field.pos[i] = pos;
    field.vel[i] = vel;
}

/// Zero velocity for every particle, except moving particles which take
/// their boundary law's velocity at `t=0` (`speedInit`).
pub fn init_speeds(field: &mut Field, parameter: &Parameter) {
    for v in field.vel.iter_mut() {
        *v = DVec3::ZERO;
    }
    for i in 0..field.n_total() {
        if let ParticleKind::Moving(law_index) = field.kind[i] {
            let law = &parameter.moving_boundaries[law_index as usize];
            let (_, vel) = moving_kinematics(law, field.origin[i], 0.0);
            field.vel[i] = vel;
        }
    }
}

/// Density initialization (`densityInit`): hydrostatic (integrated from the
/// highest free-surface z downward using the configured equation of state)
/// or homogeneous (everyone at `density_ref`). Boundaries always take
/// `density_ref` under the hydrostatic scheme.
pub fn init_densities(field: &mut Field, parameter: &Parameter) {
    match parameter.density_init_method {
        crate::params::DensityInitMethod::Homogeneous => {
            for d in field.density.iter_mut() {
                *d = parameter.density_ref;
            }
        }
        crate::params::DensityInitMethod::Hydrostatic => {
            let z_max = field
                .kind
                .iter()
                .zip(field.pos.iter())
                .filter(|(k, _)| matches!(k, ParticleKind::Free))
                .map(|(_, p)| p.z)
                .fold(0.0_f64, f64::max);
            for i in 0..field.n_total() {
                field.density[i] = match field.kind[i] {
                    ParticleKind::Free => {
                        let h = z_max - field.pos[i].z;
                        match parameter.state_equation_method {
                            StateEquationMethod::QuasiIncompressible => {
                                let ratio = 1.0 + (1.0 / parameter.b) * parameter.density_ref * parameter.g * h;
                                parameter.density_ref * ratio.powf(1.0 / parameter.gamma)
                            }
                            StateEquationMethod::PerfectGas => {
                                parameter.density_ref * (1.0 + (parameter.molar_mass / Parameter::GAS_CONSTANT / parameter.temperature) * parameter.density_ref * parameter.g * h)
                            }
                        }
                    }
                    _ => parameter.density_ref,
                };
            }
        }
    }
}

/// `mass = density * volume` (`massInit`, the `violeau2012` mass-init
/// scheme).
pub fn init_masses(field: &mut Field, volume: &[f64]) {
    for i in 0..field.n_total() {
        field.mass[i] = field.density[i] * volume[i];
    }
}
