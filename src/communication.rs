//! A thin wrapper around the `mpi` crate's point-to-point primitives, used
//! by [`crate::domain`] for the three subdomain protocols. Generalizes the
//! teacher's `MpiWorld<T>` (`communication/mpi_world.rs`): one channel per
//! message tag, every payload preceded by an explicit count send (spec §9,
//! "avoid relying on unbuffered synchrony").

use mpi::topology::SystemCommunicator;
use mpi::traits::*;

pub type Rank = i32;

/// A process's place in the communicator, generalizing the teacher's
/// `SizedCommunicator` trait.
pub trait SizedCommunicator {
    fn rank(&self) -> Rank;
    fn size(&self) -> Rank;
}

impl SizedCommunicator for SystemCommunicator {
    fn rank(&self) -> Rank {
        self.rank()
    }

    fn size(&self) -> Rank {
        self.size()
    }
}

/// The message tags used by the three subdomain protocols (spec §4.6: "each
/// protocol uses a distinct message tag").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Tag {
    Overlap = 0,
    Migration = 1,
    Rk2Midpoint = 2,
    Scatter = 3,
}

/// A point-to-point channel bound to one message tag. Wraps a
/// `SystemCommunicator` reference the way the teacher's `MpiWorld<T>` wraps
/// one per exchanged type.
pub struct Channel<'a> {
    world: &'a SystemCommunicator,
    tag: Tag,
}

impl<'a> Channel<'a> {
    pub fn new(world: &'a SystemCommunicator, tag: Tag) -> Self {
        Self { world, tag }
    }

    /// Sends `data`'s length, then `data` itself, to `rank`.
    pub fn send_vec<T: Equivalence>(&self, rank: Rank, data: &[T]) {
        let partner = self.world.process_at_rank(rank);
        let len = data.len() as i32;
        partner.send_with_tag(&len, self.tag as i32);
        partner.send_with_tag(data, self.tag as i32);
    }

    /// Receives a length-prefixed vector from `rank`.
    pub fn receive_vec<T: Equivalence + Default + Clone>(&self, rank: Rank) -> Vec<T> {
        let partner = self.world.process_at_rank(rank);
        let (len, _) = partner.receive_with_tag::<i32>(self.tag as i32);
        let mut buffer = vec![T::default(); len as usize];
        partner.receive_into_with_tag(&mut buffer[..], self.tag as i32);
        buffer
    }

    /// Receives a length-prefixed vector from `rank`, writing it in place
    /// starting at `offset` in `target` (used by the RK2 midpoint re-share,
    /// which overwrites an existing halo slice rather than inserting).
    pub fn receive_vec_into<T: Equivalence>(&self, rank: Rank, target: &mut [T]) {
        let partner = self.world.process_at_rank(rank);
        let (len, _) = partner.receive_with_tag::<i32>(self.tag as i32);
        debug_assert_eq!(len as usize, target.len());
        partner.receive_into_with_tag(target, self.tag as i32);
    }

    pub fn send_slice<T: Equivalence>(&self, rank: Rank, data: &[T]) {
        let partner = self.world.process_at_rank(rank);
        let len = data.len() as i32;
        partner.send_with_tag(&len, self.tag as i32);
        partner.send_with_tag(data, self.tag as i32);
    }

    /// Sends a bare length value, not followed by data (the RK2 midpoint
    /// re-share's size request/response handshake).
    pub fn send_len(&self, rank: Rank, len: usize) {
        let value = len as i32;
        self.world.process_at_rank(rank).send_with_tag(&value, self.tag as i32);
    }

    /// Receives a bare length value, not followed by data.
    pub fn receive_len(&self, rank: Rank) -> usize {
        let (value, _) = self.world.process_at_rank(rank).receive_with_tag::<i32>(self.tag as i32);
        value as usize
    }
}

/// Gathers one `f64` per rank to rank 0, takes the minimum over *every*
/// rank, and broadcasts it back (spec §4.5's adaptive-time-step reduction;
/// resolves Open Question 1 in favor of the fixed semantics — the
/// `original_source` reduction excludes the last rank's proposal, a bug this
/// crate does not reproduce, see DESIGN.md).
pub fn reduce_min_broadcast(world: &SystemCommunicator, local_proposition: f64) -> f64 {
    if world.size() == 1 {
        return local_proposition;
    }
    let root_process = world.process_at_rank(0);
    let mut next_k = local_proposition;
    if world.rank() == 0 {
        let mut all = vec![0.0_f64; world.size() as usize];
        root_process.gather_into_root(&local_proposition, &mut all[..]);
        next_k = all.into_iter().fold(f64::INFINITY, f64::min);
    } else {
        root_process.gather_into(&local_proposition);
    }
    root_process.broadcast_into(&mut next_k);
    next_k
}

/// Checks that every rank observed the same value, mirroring the teacher's
/// `all_ranks_have_same_value` consistency check; used before trusting a
/// rank-0-detected error broadcast (spec §7).
pub fn all_ranks_agree(world: &SystemCommunicator, local: i32) -> bool {
    if world.size() == 1 {
        return true;
    }
    let root_process = world.process_at_rank(0);
    let mut agrees = true;
    if world.rank() == 0 {
        let mut all = vec![0_i32; world.size() as usize];
        root_process.gather_into_root(&local, &mut all[..]);
        agrees = all.iter().all(|&v| v == local);
    } else {
        root_process.gather_into(&local);
    }
    root_process.broadcast_into(&mut agrees);
    agrees
}
