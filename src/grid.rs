//! Uniform spatial grid over a local subdomain: box indexing and the
//! 27-stencil adjacency used for neighbor search (spec §4.2, `BoxGrid` in
//! §3).

use glam::DVec3;

use crate::field::Field;

/// An integer cell coordinate within the local grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellCoord {
    x: i64,
    y: i64,
    z: i64,
}

impl CellCoord {
    fn from_position(pos: DVec3, lower: DVec3, box_size: f64) -> Self {
        Self {
            x: ((pos.x - lower.x) / box_size).floor() as i64,
            y: ((pos.y - lower.y) / box_size).floor() as i64,
            z: ((pos.z - lower.z) / box_size).floor() as i64,
        }
    }

    fn clamp_to(&self, n: (i64, i64, i64)) -> Self {
        Self {
            x: self.x.clamp(0, n.0 - 1),
            y: self.y.clamp(0, n.1 - 1),
            z: self.z.clamp(0, n.2 - 1),
        }
    }
}

/// The uniform grid tiling a rank's local subdomain. Side length is `kh`
/// for the Euler integrator, `2*kh` for RK2, so RK2 needs only one sort per
/// step (spec §3).
pub struct BoxGrid {
    lower: DVec3,
    box_size: f64,
    n: (i64, i64, i64),
    /// Particle indices owned by each box, indexed by flattened box id.
    boxes: Vec<Vec<usize>>,
    /// Precomputed ≤27 neighbor box ids for each box (clipped at borders, no wrap).
    adjacency: Vec<Vec<usize>>,
}

impl BoxGrid {
    /// Builds a grid covering `[lower, upper]` with cubic cells of side
    /// `box_size` (ceiling division for the cell counts).
    pub fn new(lower: DVec3, upper: DVec3, box_size: f64) -> Self {
        let extent = upper - lower;
        let nx = (extent.x / box_size).ceil().max(1.0) as i64;
        let ny = (extent.y / box_size).ceil().max(1.0) as i64;
        let nz = (extent.z / box_size).ceil().max(1.0) as i64;
        let n = (nx, ny, nz);
        let n_boxes = (nx * ny * nz) as usize;
        let mut adjacency = Vec::with_capacity(n_boxes);
        for bz in 0..nz {
            for by in 0..ny {
                for bx in 0..nx {
                    let mut neighbors = Vec::with_capacity(27);
                    for dz in -1..=1 {
                        for dy in -1..=1 {
                            for dx in -1..=1 {
                                let (cx, cy, cz) = (bx + dx, by + dy, bz + dz);
                                if cx >= 0 && cx < nx && cy >= 0 && cy < ny && cz >= 0 && cz < nz {
                                    neighbors.push(Self::flatten(n, (cx, cy, cz)));
                                }
                            }
                        }
                    }
                    adjacency.push(neighbors);
                }
            }
        }
        Self {
            lower,
            box_size,
            n,
            boxes: vec![Vec::new(); n_boxes],
            adjacency,
        }
    }

    fn flatten(n: (i64, i64, i64), c: (i64, i64, i64)) -> usize {
        (c.z * n.0 * n.1 + c.y * n.0 + c.x) as usize
    }

    pub fn n_boxes(&self) -> usize {
        self.boxes.len()
    }

    pub fn box_size(&self) -> f64 {
        self.box_size
    }

    /// Maps a position to its owning box id, flooring `(pos - lower) /
    /// box_size` along each axis (`boxOf`). Positions outside `[lower,
    /// upper]` are clamped into the boundary cell.
    pub fn box_of(&self, pos: DVec3) -> usize {
        let coord = CellCoord::from_position(pos, self.lower, self.box_size).clamp_to(self.n);
        Self::flatten(self.n, (coord.x, coord.y, coord.z))
    }

    /// The neighbor box ids for `box_id`, including `box_id` itself.
    pub fn adjacent_boxes(&self, box_id: usize) -> &[usize] {
        &self.adjacency[box_id]
    }

    pub fn particles_in(&self, box_id: usize) -> &[usize] {
        &self.boxes[box_id]
    }

    /// Rebuilds the box lists from the field's current positions
    /// (`sort(field)`). After this call the union of all box lists is
    /// exactly `{0..n_total-1}` (invariant after §4.2).
    pub fn sort(&mut self, field: &Field) {
        for b in &mut self.boxes {
            b.clear();
        }
        for (i, &pos) in field.pos.iter().enumerate() {
            let box_id = self.box_of(pos);
            self.boxes[box_id].push(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ParticleKind;

    #[test]
    fn sort_covers_every_particle_exactly_once() {
        let lower = DVec3::ZERO;
        let upper = DVec3::new(1.0, 1.0, 1.0);
        let mut grid = BoxGrid::new(lower, upper, 0.25);
        let mut field = Field::with_capacity(4);
        for p in [
            DVec3::new(0.01, 0.01, 0.01),
            DVec3::new(0.5, 0.5, 0.5),
            DVec3::new(0.99, 0.99, 0.99),
            DVec3::new(0.3, 0.1, 0.9),
        ] {
            field.push(p, DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Free);
        }
        grid.sort(&field);
        let mut seen: Vec<usize> = (0..grid.n_boxes()).flat_map(|b| grid.particles_in(b).to_vec()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn out_of_bounds_position_clamps_into_boundary_cell() {
        let grid = BoxGrid::new(DVec3::ZERO, DVec3::new(1.0, 1.0, 1.0), 0.5);
        let inside = grid.box_of(DVec3::new(0.9, 0.9, 0.9));
        let outside = grid.box_of(DVec3::new(1.3, 1.3, 1.3));
        assert_eq!(inside, outside);
    }

    #[test]
    fn adjacency_is_clipped_at_borders() {
        let grid = BoxGrid::new(DVec3::ZERO, DVec3::new(1.0, 1.0, 1.0), 0.5);
        // a 2x2x2 grid: every box is a corner box, so each has 8 neighbors including itself.
        for b in 0..grid.n_boxes() {
            assert_eq!(grid.adjacent_boxes(b).len(), 8);
        }
    }
}
