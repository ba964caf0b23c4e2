//! The 1-D x-axis subdomain decomposition: partitioning, halo (overlap)
//! exchange, particle migration, RK2 midpoint re-share, and the
//! scatter/gather pair used at startup and at write time (spec §4.6).
//!
//! Generalizes `original_source/CPP_Physics/MPI.cpp`, which special-cases
//! rank 0, the last rank, and middle ranks as three separate code paths.
//! Here every rank runs one code path parameterized by `has_left`/
//! `has_right`: rank 0's missing left neighbor is modeled by collapsing its
//! left interval to a single point (`left_min == left_max`), which already
//! makes the classifier never select it — exactly what the three original
//! branches did by hand.

use glam::DVec3;
use mpi::topology::SystemCommunicator;
use mpi::traits::*;

use crate::communication::{Channel, Rank, SizedCommunicator, Tag};
use crate::error::{SphError, SphResult};
use crate::field::{Field, ParticleRecord};

/// Per-rank decomposition metadata (spec §3's `SubdomainInfo`).
#[derive(Debug, Clone, Copy)]
pub struct SubdomainInfo {
    pub rank: Rank,
    pub n_ranks: Rank,
    pub starting_box: usize,
    pub ending_box: usize,
    pub starting_particle: usize,
    pub ending_particle: usize,
    pub box_size: f64,
}

impl SubdomainInfo {
    pub fn has_left_neighbor(&self) -> bool {
        self.rank > 0
    }

    pub fn has_right_neighbor(&self) -> bool {
        self.rank < self.n_ranks - 1
    }

    pub fn is_single_rank(&self) -> bool {
        self.n_ranks == 1
    }
}

/// The side-boundary table `startBoxX`, `n_ranks + 1` entries, band `i`
/// owning boxes `[start[i], start[i+1])` along x.
fn start_box_x(n_total_boxes_x: usize, n_ranks: usize) -> Vec<usize> {
    (0..=n_ranks).map(|i| n_total_boxes_x * i / n_ranks).collect()
}

/// Spec §4.6's precondition: `nTotalBoxesX >= 2*nRanks`.
pub fn check_partition_precondition(n_total_boxes_x: usize, n_ranks: usize) -> SphResult<()> {
    if n_total_boxes_x < 2 * n_ranks {
        return Err(SphError::ConsistencyError(format!(
            "nTotalBoxesX ({n_total_boxes_x}) must be at least 2 * nRanks ({n_ranks}); the x-extent is too narrow for this many ranks"
        )));
    }
    Ok(())
}

/// The local band's x-bounds, padded by one halo box on each side that has
/// a neighbor.
fn local_band_bounds(global_l0: f64, global_u0: f64, starts: &[usize], rank: usize, n_ranks: usize, box_size: f64) -> (f64, f64) {
    let l = if rank == 0 {
        global_l0
    } else {
        global_l0 + (starts[rank] as f64 - 1.0) * box_size
    };
    let u = if rank == n_ranks - 1 {
        global_u0.min(global_l0 + starts[rank + 1] as f64 * box_size)
    } else {
        global_l0 + (starts[rank + 1] as f64 + 1.0) * box_size
    };
    (l, u)
}

fn domain_number(x: f64, limits: &[f64]) -> usize {
    let mut i = 0;
    while i < limits.len() && x > limits[i] {
        i += 1;
    }
    i.saturating_sub(1)
}

/// Splits the global field on rank 0 into per-rank particle batches, ordered
/// by destination rank, then distributes them point-to-point (the scatter
/// half of spec §4.6). Every rank, including rank 0, runs one `Overlap`
/// exchange afterwards to populate its halos.
///
/// Departs from `original_source`'s `MPI_Scatterv` collective in favor of
/// per-rank point-to-point sends through [`Channel`] (simpler to express
/// with `mpi`'s safe bindings; the wire contract — counts then arrays, one
/// tag per protocol — is unaffected). Noted in DESIGN.md.
pub fn scatter_field(world: &SystemCommunicator, global: Option<&Field>, box_size: f64) -> SphResult<(Field, SubdomainInfo)> {
    let rank = world.rank();
    let n_ranks = world.size();
    let channel = Channel::new(world, Tag::Scatter);

    let mut n_total_boxes_x = 0i32;
    let mut error_code = 0i32;
    let (global_l0, global_u0, global_l, global_u) = if rank == 0 {
        let global = global.expect("global field must be present on rank 0");
        let extent_x = global.upper.x - global.lower.x;
        n_total_boxes_x = (extent_x / box_size).ceil() as i32;
        if check_partition_precondition(n_total_boxes_x as usize, n_ranks as usize).is_err() {
            error_code = 1;
        }
        (global.lower.x, global.upper.x, global.lower, global.upper)
    } else {
        (0.0, 0.0, DVec3::ZERO, DVec3::ZERO)
    };

    let root = world.process_at_rank(0);
    root.broadcast_into(&mut error_code);
    if error_code != 0 {
        return Err(SphError::ConsistencyError(
            "nTotalBoxesX must be at least 2 * nRanks; the x-extent is too narrow for this many ranks".to_string(),
        ));
    }
    root.broadcast_into(&mut n_total_boxes_x);
    let mut global_l = global_l;
    let mut global_u = global_u;
    root.broadcast_into(&mut global_l.x);
    root.broadcast_into(&mut global_l.y);
    root.broadcast_into(&mut global_l.z);
    root.broadcast_into(&mut global_u.x);
    root.broadcast_into(&mut global_u.y);
    root.broadcast_into(&mut global_u.z);
    let mut global_l0 = global_l0;
    root.broadcast_into(&mut global_l0);
    let _ = global_u0;

    let starts = start_box_x(n_total_boxes_x as usize, n_ranks as usize);
    let (local_l0, local_u0) = local_band_bounds(global_l0, global_l0 + n_total_boxes_x as f64 * box_size, &starts, rank as usize, n_ranks as usize, box_size);

    // The x-band box-id range this rank owns (spec §4.6's `startingBox..endingBox`,
    // ignoring the y/z extent since those don't affect the partition). The local
    // `BoxGrid`'s own box ids are a separate, rank-local numbering built later from
    // `local.lower`/`local.upper`.
    let starting_box = starts[rank as usize];
    let ending_box = starts[rank as usize + 1].saturating_sub(1);

    let mut local = Field::with_capacity(0);
    local.lower = DVec3::new(local_l0, global_l.y, global_l.z);
    local.upper = DVec3::new(local_u0, global_u.y, global_u.z);

    if rank == 0 {
        let global = global.expect("global field must be present on rank 0");
        let limits: Vec<f64> = starts.iter().map(|&s| global_l0 + s as f64 * box_size).collect();
        let mut buckets: Vec<Vec<ParticleRecord>> = vec![Vec::new(); n_ranks as usize];
        for i in 0..global.n_total() {
            let band = domain_number(global.pos[i].x, &limits);
            buckets[band].push(global.record_at(i));
        }
        for (dest, batch) in buckets.iter().enumerate() {
            if dest == 0 {
                local.append_records(batch);
            } else {
                channel.send_vec(dest as Rank, batch);
            }
        }
    } else {
        let records: Vec<ParticleRecord> = channel.receive_vec(0);
        local.append_records(&records);
    }
    local.recount_kinds();

    let mut info = SubdomainInfo {
        rank,
        n_ranks,
        starting_box,
        ending_box,
        starting_particle: 0,
        ending_particle: local.n_total().saturating_sub(1),
        box_size,
    };
    share_overlap(world, &mut local, &mut info)?;
    local.recount_kinds();
    Ok((local, info))
}

/// Concatenates every rank's owned range back into `global` on rank 0, in
/// rank order (the gather half of spec §4.6). Halos are never included.
pub fn gather_field(world: &SystemCommunicator, local: &Field, info: &SubdomainInfo) -> Option<Field> {
    let channel = Channel::new(world, Tag::Scatter);
    let owned = local.records_in(info.starting_particle..info.ending_particle + 1);
    if world.rank() == 0 {
        let mut global = Field::with_capacity(local.n_total());
        global.lower = local.lower;
        global.upper = local.upper;
        global.append_records(&owned);
        for source in 1..info.n_ranks {
            let batch: Vec<ParticleRecord> = channel.receive_vec(source);
            global.append_records(&batch);
        }
        global.recount_kinds();
        Some(global)
    } else {
        channel.send_vec(0, &owned);
        None
    }
}

/// Removes halos, leaving only `[starting_particle, ending_particle]`
/// (`deleteHalos`).
pub fn delete_halos(field: &mut Field, info: &mut SubdomainInfo) {
    let end = info.ending_particle;
    let start = info.starting_particle;
    field.truncate(end + 1);
    field.drain_front(start);
    info.starting_particle = 0;
    info.ending_particle = field.n_total().saturating_sub(1);
}

enum Bucket {
    Left = 0,
    Stay = 1,
    Right = 2,
}

/// Stably groups `field`'s particles by `classify`, reordering them as
/// `[left group | stay group | right group]`; returns `(n_left, n_right)`.
fn group_by_bucket(field: &mut Field, classify: impl Fn(f64) -> Bucket) -> (usize, usize) {
    let n = field.n_total();
    let mut keyed: Vec<(u8, usize)> = (0..n).map(|i| (classify(field.pos[i].x) as u8, i)).collect();
    keyed.sort_by_key(|&(key, _)| key);
    let perm: Vec<usize> = keyed.iter().map(|&(_, i)| i).collect();
    let n_left = keyed.iter().filter(|&&(k, _)| k == Bucket::Left as u8).count();
    let n_right = keyed.iter().filter(|&&(k, _)| k == Bucket::Right as u8).count();
    field.reorder(&perm);
    (n_left, n_right)
}

/// Halo (overlap) exchange: refreshes the one-box-thick halo on each side
/// from the neighbor's current edge (spec §4.6's "Overlap").
pub fn share_overlap(world: &SystemCommunicator, field: &mut Field, info: &mut SubdomainInfo) -> SphResult<()> {
    if info.is_single_rank() {
        info.starting_particle = 0;
        info.ending_particle = field.n_total().saturating_sub(1);
        return Ok(());
    }

    let l0 = field.lower.x;
    let u0 = field.upper.x;
    let box_size = info.box_size;
    let has_left = info.has_left_neighbor();
    let has_right = info.has_right_neighbor();

    let left_min = if has_left { l0 + box_size } else { l0 };
    let left_max = if has_left { l0 + 2.0 * box_size } else { l0 };
    let right_min = if has_right { u0 - 2.0 * box_size } else { u0 };
    let right_max = if has_right { u0 - box_size } else { u0 };

    for (i, pos) in field.pos.iter().enumerate() {
        if pos.x < left_min || pos.x > right_max {
            return Err(SphError::RuntimeDivergence {
                particle: i,
                x: pos.x,
                y: pos.y,
                z: pos.z,
                step: 0,
            });
        }
    }

    let (n_left, n_right) = group_by_bucket(field, |x| {
        if has_right && x > right_min && x <= right_max {
            Bucket::Right
        } else if has_left && x <= left_max && x > left_min {
            Bucket::Left
        } else {
            Bucket::Stay
        }
    });
    let n_total = field.n_total();
    let start_right = n_total - n_right;

    let channel = Channel::new(world, Tag::Overlap);
    let (mut recv_left, mut recv_right) = (Vec::new(), Vec::new());
    let rank = info.rank;
    if rank % 2 == 0 {
        if has_right {
            channel.send_vec(rank + 1, &field.records_in(start_right..n_total));
        }
        if has_left {
            channel.send_vec(rank - 1, &field.records_in(0..n_left));
        }
        if has_left {
            recv_left = channel.receive_vec(rank - 1);
        }
        if has_right {
            recv_right = channel.receive_vec(rank + 1);
        }
    } else {
        if has_left {
            recv_left = channel.receive_vec(rank - 1);
        }
        if has_right {
            recv_right = channel.receive_vec(rank + 1);
        }
        if has_right {
            channel.send_vec(rank + 1, &field.records_in(start_right..n_total));
        }
        if has_left {
            channel.send_vec(rank - 1, &field.records_in(0..n_left));
        }
    }

    let size_recv_left = recv_left.len();
    let size_recv_right = recv_right.len();
    field.prepend_records(&recv_left);
    field.append_records(&recv_right);

    info.starting_particle = size_recv_left;
    info.ending_particle = field.n_total() - size_recv_right - 1;
    Ok(())
}

/// Particle migration: owners of particles that left the band transfer
/// ownership to the neighbor whose band now contains them (spec §4.6's
/// "Migration").
pub fn share_migrate(world: &SystemCommunicator, field: &mut Field, info: &mut SubdomainInfo) -> SphResult<()> {
    if info.is_single_rank() {
        return Ok(());
    }

    let l0 = field.lower.x;
    let u0 = field.upper.x;
    let box_size = info.box_size;
    let has_left = info.has_left_neighbor();
    let has_right = info.has_right_neighbor();

    let min_x = if has_left { l0 + box_size } else { l0 };
    let max_x = if has_right { u0 - box_size } else { u0 };

    let (n_left, n_right) = group_by_bucket(field, |x| {
        if x > max_x {
            Bucket::Right
        } else if x <= min_x {
            Bucket::Left
        } else {
            Bucket::Stay
        }
    });
    let n_total = field.n_total();
    let start_right = n_total - n_right;
    let start_left = start_right - n_left;

    let channel = Channel::new(world, Tag::Migration);
    let (mut recv_left, mut recv_right) = (Vec::new(), Vec::new());
    let rank = info.rank;
    if rank % 2 == 0 {
        if has_right {
            channel.send_vec(rank + 1, &field.records_in(start_right..n_total));
        }
        if has_left {
            channel.send_vec(rank - 1, &field.records_in(start_left..start_right));
        }
        if has_left {
            recv_left = channel.receive_vec(rank - 1);
        }
        if has_right {
            recv_right = channel.receive_vec(rank + 1);
        }
    } else {
        if has_left {
            recv_left = channel.receive_vec(rank - 1);
        }
        if has_right {
            recv_right = channel.receive_vec(rank + 1);
        }
        if has_right {
            channel.send_vec(rank + 1, &field.records_in(start_right..n_total));
        }
        if has_left {
            channel.send_vec(rank - 1, &field.records_in(start_left..start_right));
        }
    }

    field.truncate(start_left);
    field.append_records(&recv_left);
    field.append_records(&recv_right);
    info.starting_particle = 0;
    info.ending_particle = field.n_total().saturating_sub(1);
    Ok(())
}

/// RK2 midpoint re-share: sends each rank's just-updated owned-edge
/// particles to overwrite the neighbor's matching halo slice in place (spec
/// §4.6's "RK2 midpoint re-share"). Sizes must already match what Overlap
/// last received; no insertion happens here.
pub fn share_rk2_midpoint(world: &SystemCommunicator, field: &mut Field, info: &SubdomainInfo) -> SphResult<()> {
    if info.is_single_rank() {
        return Ok(());
    }
    let start = info.starting_particle;
    let end = info.ending_particle;
    let n_total = field.n_total();
    let size_from_left = start;
    let size_from_right = n_total - end - 1;
    let has_left = info.has_left_neighbor();
    let has_right = info.has_right_neighbor();
    let rank = info.rank;
    let channel = Channel::new(world, Tag::Rk2Midpoint);

    let mut left_buf = vec![ParticleRecord::default(); size_from_left];
    let mut right_buf = vec![ParticleRecord::default(); size_from_right];

    if rank % 2 == 0 {
        if has_right {
            let size_to_right = channel.receive_len(rank + 1);
            channel.send_vec(rank + 1, &field.records_in(end + 1 - size_to_right..end + 1));
        }
        if has_left {
            let size_to_left = channel.receive_len(rank - 1);
            channel.send_vec(rank - 1, &field.records_in(start..start + size_to_left));
        }
        if has_left {
            channel.send_len(rank - 1, size_from_left);
            channel.receive_vec_into(rank - 1, &mut left_buf);
        }
        if has_right {
            channel.send_len(rank + 1, size_from_right);
            channel.receive_vec_into(rank + 1, &mut right_buf);
        }
    } else {
        if has_left {
            channel.send_len(rank - 1, size_from_left);
            channel.receive_vec_into(rank - 1, &mut left_buf);
        }
        if has_right {
            channel.send_len(rank + 1, size_from_right);
            channel.receive_vec_into(rank + 1, &mut right_buf);
        }
        if has_right {
            let size_to_right = channel.receive_len(rank + 1);
            channel.send_vec(rank + 1, &field.records_in(end + 1 - size_to_right..end + 1));
        }
        if has_left {
            let size_to_left = channel.receive_len(rank - 1);
            channel.send_vec(rank - 1, &field.records_in(start..start + size_to_left));
        }
    }

    for (i, r) in left_buf.iter().enumerate() {
        field.overwrite_at(i, r);
    }
    for (i, r) in right_buf.iter().enumerate() {
        field.overwrite_at(end + 1 + i, r);
    }
    Ok(())
}

/// `deleteHalos -> shareMigrate -> shareOverlap`, then recount kinds
/// (`processUpdate`, spec §4.7).
pub fn process_update(world: &SystemCommunicator, field: &mut Field, info: &mut SubdomainInfo) -> SphResult<()> {
    if info.is_single_rank() {
        return Ok(());
    }
    delete_halos(field, info);
    share_migrate(world, field, info)?;
    share_overlap(world, field, info)?;
    field.recount_kinds();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_box_x_covers_full_range_without_gaps() {
        let starts = start_box_x(7, 4);
        assert_eq!(starts[0], 0);
        assert_eq!(*starts.last().unwrap(), 7);
        assert!(starts.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn partition_precondition_rejects_too_few_boxes() {
        assert!(check_partition_precondition(7, 4).is_err());
        assert!(check_partition_precondition(8, 4).is_ok());
    }

    #[test]
    fn domain_number_finds_containing_band() {
        let limits = vec![0.0, 1.0, 2.0, 3.0];
        assert_eq!(domain_number(0.0, &limits), 0);
        assert_eq!(domain_number(0.5, &limits), 0);
        assert_eq!(domain_number(1.5, &limits), 1);
        assert_eq!(domain_number(2.9, &limits), 2);
    }

    #[test]
    fn group_by_bucket_orders_left_stay_right() {
        let mut field = Field::with_capacity(3);
        field.push(DVec3::new(0.4, 0.0, 0.0), DVec3::ZERO, 1.0, 0.0, 1.0, crate::field::ParticleKind::Free);
        field.push(DVec3::new(1.0, 0.0, 0.0), DVec3::ZERO, 1.0, 0.0, 1.0, crate::field::ParticleKind::Free);
        field.push(DVec3::new(2.6, 0.0, 0.0), DVec3::ZERO, 1.0, 0.0, 1.0, crate::field::ParticleKind::Free);
        let (n_left, n_right) = group_by_bucket(&mut field, |x| {
            if x > 2.0 {
                Bucket::Right
            } else if x <= 0.5 {
                Bucket::Left
            } else {
                Bucket::Stay
            }
        });
        assert_eq!(n_left, 1);
        assert_eq!(n_right, 1);
        assert_eq!(field.pos[0].x, 0.4);
        assert_eq!(field.pos[2].x, 2.6);
    }
}
