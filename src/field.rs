//! The structure-of-arrays particle container (spec §3).
//!
//! Particles are identified only by their current index into the parallel
//! arrays below; indices are invalidated by [`Field::reorder`],
//! [`Field::append`] and [`Field::truncate_front`]. After any exchange the
//! layout is `[left halo | owned | right halo]`, tracked by
//! [`crate::domain::SubdomainInfo`] rather than by `Field` itself.

use glam::DVec3;
use mpi::traits::Equivalence;

/// The tag of a particle, mirroring `original_source/Headers/Structures.h::ParticleType`.
///
/// `Moving(k)` selects one of the configured moving-boundary laws in
/// `Parameter::moving_boundaries[k]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    Free,
    Fixed,
    Moving(u32),
}

impl ParticleKind {
    /// Wire encoding used by [`ParticleRecord`]: 0 = Free, 1 = Fixed, 2+k = Moving(k).
    fn to_code(self) -> i32 {
        match self {
            ParticleKind::Free => 0,
            ParticleKind::Fixed => 1,
            ParticleKind::Moving(k) => 2 + k as i32,
        }
    }

    fn from_code(code: i32) -> Self {
        match code {
            0 => ParticleKind::Free,
            1 => ParticleKind::Fixed,
            k => ParticleKind::Moving((k - 2) as u32),
        }
    }
}

/// The wire format for a single particle, carrying the six fields together
/// as required by spec §4.6 ("all messages carry the six per-particle
/// fields together"). One `Vec<ParticleRecord>` send replaces the original
/// nine separate `MPI_Send` calls (`MPI_Send_All` in `original_source`);
/// message order and tag discipline are unaffected since this is still a
/// single payload per protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Equivalence)]
#[repr(C)]
pub struct ParticleRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub density: f64,
    pub pressure: f64,
    pub mass: f64,
    pub kind: i32,
    pub origin_x: f64,
    pub origin_y: f64,
    pub origin_z: f64,
}

/// The structure-of-arrays particle container (spec §3's `Field`).
#[derive(Debug, Clone, Default)]
pub struct Field {
    pub pos: Vec<DVec3>,
    pub vel: Vec<DVec3>,
    pub density: Vec<f64>,
    pub pressure: Vec<f64>,
    pub mass: Vec<f64>,
    pub kind: Vec<ParticleKind>,

    /// Each particle's position when it was created (spawned by geometry
    /// seeding, or received from a neighbor). Travels with the particle
    /// through sort/migration/halo exchange; moving-boundary kinematics
    /// (`crate::physics::moving_kinematics`) are evaluated relative to this
    /// rather than to any rank-local or law-shared reference point, so they
    /// stay correct regardless of which rank currently owns the particle.
    pub origin: Vec<DVec3>,

    pub n_free: usize,
    pub n_fixed: usize,
    pub n_moving: usize,

    /// Axis-aligned subdomain bounds, `l` and `u` in spec notation.
    pub lower: DVec3,
    pub upper: DVec3,

    pub current_time: f64,
    pub next_k: f64,
}

impl Field {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            pos: Vec::with_capacity(n),
            vel: Vec::with_capacity(n),
            density: Vec::with_capacity(n),
            pressure: Vec::with_capacity(n),
            mass: Vec::with_capacity(n),
            kind: Vec::with_capacity(n),
            origin: Vec::with_capacity(n),
            ..Default::default()
        }
    }

    pub fn n_total(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// Invariant I1: every per-particle array has the same length.
    pub fn check_shape_invariant(&self) {
        let n = self.n_total();
        debug_assert_eq!(self.vel.len(), n);
        debug_assert_eq!(self.density.len(), n);
        debug_assert_eq!(self.pressure.len(), n);
        debug_assert_eq!(self.mass.len(), n);
        debug_assert_eq!(self.kind.len(), n);
        debug_assert_eq!(self.origin.len(), n);
    }

    /// Appends one particle, with its own position recorded as its moving-
    /// boundary reference origin.
    pub fn push(&mut self, pos: DVec3, vel: DVec3, density: f64, pressure: f64, mass: f64, kind: ParticleKind) {
        self.pos.push(pos);
        self.vel.push(vel);
        self.density.push(density);
        self.pressure.push(pressure);
        self.mass.push(mass);
        self.kind.push(kind);
        self.origin.push(pos);
    }

    pub fn record_at(&self, i: usize) -> ParticleRecord {
        ParticleRecord {
            x: self.pos[i].x,
            y: self.pos[i].y,
            z: self.pos[i].z,
            vx: self.vel[i].x,
            vy: self.vel[i].y,
            vz: self.vel[i].z,
            density: self.density[i],
            pressure: self.pressure[i],
            mass: self.mass[i],
            kind: self.kind[i].to_code(),
            origin_x: self.origin[i].x,
            origin_y: self.origin[i].y,
            origin_z: self.origin[i].z,
        }
    }

    pub fn push_record(&mut self, r: &ParticleRecord) {
        self.pos.push(DVec3::new(r.x, r.y, r.z));
        self.vel.push(DVec3::new(r.vx, r.vy, r.vz));
        self.density.push(r.density);
        self.pressure.push(r.pressure);
        self.mass.push(r.mass);
        self.kind.push(ParticleKind::from_code(r.kind));
        self.origin.push(DVec3::new(r.origin_x, r.origin_y, r.origin_z));
    }

    pub fn records_in(&self, range: std::ops::Range<usize>) -> Vec<ParticleRecord> {
        range.map(|i| self.record_at(i)).collect()
    }

    pub fn overwrite_at(&mut self, i: usize, r: &ParticleRecord) {
        self.pos[i] = DVec3::new(r.x, r.y, r.z);
        self.vel[i] = DVec3::new(r.vx, r.vy, r.vz);
        self.density[i] = r.density;
        self.pressure[i] = r.pressure;
        self.mass[i] = r.mass;
        self.kind[i] = ParticleKind::from_code(r.kind);
        self.origin[i] = DVec3::new(r.origin_x, r.origin_y, r.origin_z);
    }

    /// Appends a batch of records to the end of the arrays (receiver side of
    /// `insertParticles(..., end)` in `original_source/CPP_Physics/MPI.cpp`).
    pub fn append_records(&mut self, records: &[ParticleRecord]) {
        for r in records {
            self.push_record(r);
        }
    }

    /// Prepends a batch of records to the front of the arrays (receiver side
    /// of `insertParticles(..., begin)`).
    pub fn prepend_records(&mut self, records: &[ParticleRecord]) {
        let mut new_pos = Vec::with_capacity(records.len() + self.n_total());
        let mut new_vel = Vec::with_capacity(records.len() + self.n_total());
        let mut new_density = Vec::with_capacity(records.len() + self.n_total());
        let mut new_pressure = Vec::with_capacity(records.len() + self.n_total());
        let mut new_mass = Vec::with_capacity(records.len() + self.n_total());
        let mut new_kind = Vec::with_capacity(records.len() + self.n_total());
        let mut new_origin = Vec::with_capacity(records.len() + self.n_total());
        for r in records {
            new_pos.push(DVec3::new(r.x, r.y, r.z));
            new_vel.push(DVec3::new(r.vx, r.vy, r.vz));
            new_density.push(r.density);
            new_pressure.push(r.pressure);
            new_mass.push(r.mass);
            new_kind.push(ParticleKind::from_code(r.kind));
            new_origin.push(DVec3::new(r.origin_x, r.origin_y, r.origin_z));
        }
        new_pos.append(&mut self.pos);
        new_vel.append(&mut self.vel);
        new_density.append(&mut self.density);
        new_pressure.append(&mut self.pressure);
        new_mass.append(&mut self.mass);
        new_kind.append(&mut self.kind);
        new_origin.append(&mut self.origin);
        self.pos = new_pos;
        self.vel = new_vel;
        self.density = new_density;
        self.pressure = new_pressure;
        self.mass = new_mass;
        self.kind = new_kind;
        self.origin = new_origin;
    }

    /// Removes `[0, count)`, shifting everything else down (`deleteHalos`'s
    /// left cut, and the left part of migration's removal).
    pub fn drain_front(&mut self, count: usize) {
        self.pos.drain(0..count);
        self.vel.drain(0..count);
        self.density.drain(0..count);
        self.pressure.drain(0..count);
        self.mass.drain(0..count);
        self.kind.drain(0..count);
        self.origin.drain(0..count);
    }

    /// Truncates to `[0, len)`, dropping the tail (`deleteHalos`'s right cut,
    /// and `resizeField`).
    pub fn truncate(&mut self, len: usize) {
        self.pos.truncate(len);
        self.vel.truncate(len);
        self.density.truncate(len);
        self.pressure.truncate(len);
        self.mass.truncate(len);
        self.kind.truncate(len);
        self.origin.truncate(len);
    }

    /// Reorders every per-particle array by the given permutation
    /// (`perm[i]` is the old index that should end up at new index `i`),
    /// the generalization of `sortParticles` in `original_source`.
    pub fn reorder(&mut self, perm: &[usize]) {
        let n = perm.len();
        debug_assert_eq!(n, self.n_total());
        let pos: Vec<_> = perm.iter().map(|&i| self.pos[i]).collect();
        let vel: Vec<_> = perm.iter().map(|&i| self.vel[i]).collect();
        let density: Vec<_> = perm.iter().map(|&i| self.density[i]).collect();
        let pressure: Vec<_> = perm.iter().map(|&i| self.pressure[i]).collect();
        let mass: Vec<_> = perm.iter().map(|&i| self.mass[i]).collect();
        let kind: Vec<_> = perm.iter().map(|&i| self.kind[i]).collect();
        let origin: Vec<_> = perm.iter().map(|&i| self.origin[i]).collect();
        self.pos = pos;
        self.vel = vel;
        self.density = density;
        self.pressure = pressure;
        self.mass = mass;
        self.kind = kind;
        self.origin = origin;
    }

    /// Recomputes `n_free`/`n_fixed`/`n_moving` from the current `kind`
    /// array (`processUpdate`'s recount in `original_source`).
    pub fn recount_kinds(&mut self) {
        self.n_free = 0;
        self.n_fixed = 0;
        self.n_moving = 0;
        for k in &self.kind {
            match k {
                ParticleKind::Free => self.n_free += 1,
                ParticleKind::Fixed => self.n_fixed += 1,
                ParticleKind::Moving(_) => self.n_moving += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_invariant_holds_after_push() {
        let mut field = Field::with_capacity(2);
        field.push(DVec3::ZERO, DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Free);
        field.push(DVec3::X, DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Fixed);
        field.check_shape_invariant();
        assert_eq!(field.n_total(), 2);
    }

    #[test]
    fn record_round_trip_preserves_kind() {
        let mut field = Field::with_capacity(1);
        field.push(DVec3::new(1.0, 2.0, 3.0), DVec3::new(0.1, 0.2, 0.3), 998.0, 10.0, 0.5, ParticleKind::Moving(2));
        let record = field.record_at(0);
        let mut other = Field::with_capacity(1);
        other.push_record(&record);
        assert_eq!(other.pos[0], field.pos[0]);
        assert_eq!(other.kind[0], ParticleKind::Moving(2));
    }

    #[test]
    fn reorder_permutes_all_arrays_consistently() {
        let mut field = Field::with_capacity(3);
        field.push(DVec3::new(0.0, 0.0, 0.0), DVec3::ZERO, 1.0, 0.0, 1.0, ParticleKind::Free);
        field.push(DVec3::new(1.0, 0.0, 0.0), DVec3::ZERO, 2.0, 0.0, 1.0, ParticleKind::Fixed);
        field.push(DVec3::new(2.0, 0.0, 0.0), DVec3::ZERO, 3.0, 0.0, 1.0, ParticleKind::Moving(0));
        field.reorder(&[2, 0, 1]);
        assert_eq!(field.density, vec![3.0, 1.0, 2.0]);
        assert_eq!(field.kind[0], ParticleKind::Moving(0));
    }

    #[test]
    fn prepend_then_append_preserves_middle_order() {
        let mut field = Field::with_capacity(1);
        field.push(DVec3::ZERO, DVec3::ZERO, 5.0, 0.0, 1.0, ParticleKind::Free);
        let left = vec![ParticleRecord {
            x: -1.0,
            y: 0.0,
            z: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            density: 1.0,
            pressure: 0.0,
            mass: 1.0,
            kind: 0,
            origin_x: -1.0,
            origin_y: 0.0,
            origin_z: 0.0,
        }];
        let right = vec![ParticleRecord {
            x: 1.0,
            y: 0.0,
            z: 0.0,
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            density: 9.0,
            pressure: 0.0,
            mass: 1.0,
            kind: 1,
            origin_x: 1.0,
            origin_y: 0.0,
            origin_z: 0.0,
        }];
        field.prepend_records(&left);
        field.append_records(&right);
        assert_eq!(field.density, vec![1.0, 5.0, 9.0]);
    }
}
