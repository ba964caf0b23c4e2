//! Neighbor search: given a particle and its box's 27-stencil, the list of
//! particles within radius `kh` and their paired kernel values (spec §4.3).

use crate::field::Field;
use crate::grid::BoxGrid;
use crate::kernel::{grad_w, w, Kernel};

/// The neighbor set for a single particle. `ids[n]`, `grad_w[n]` and
/// `w[n]` (the latter only when requested) share an index.
pub struct Neighbors {
    pub ids: Vec<usize>,
    pub grad_w: Vec<f64>,
    pub w: Vec<f64>,
}

/// Finds every particle within `kh` of particle `i` by scanning box `b`'s
/// adjacency (including `b` itself). `i` is included in its own neighbor
/// list whenever `r = 0` is within support, matching every call site that
/// needs a term defined at `r=0` (the XSPH weight, the continuity self-term
/// for compact kernels): self-inclusion is therefore unconditional here and
/// left to the physics formulas to drop when a term is ill-defined at
/// `r=0` (open question 3).
pub fn find_neighbors(i: usize, b: usize, field: &Field, grid: &BoxGrid, kh: f64, kernel: Kernel, with_w: bool) -> Neighbors {
    let pos_i = field.pos[i];
    let mut ids = Vec::new();
    let mut grads = Vec::new();
    let mut ws = Vec::new();
    for &cell in grid.adjacent_boxes(b) {
        for &j in grid.particles_in(cell) {
            let r = (field.pos[j] - pos_i).length();
            if r < kh {
                ids.push(j);
                grads.push(grad_w(r, kh, kernel));
                if with_w {
                    ws.push(w(r, kh, kernel));
                }
            }
        }
    }
    Neighbors { ids, grad_w: grads, w: ws }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ParticleKind;
    use glam::DVec3;

    #[test]
    fn finds_only_particles_within_radius() {
        let kh = 0.1;
        let mut field = Field::with_capacity(3);
        field.push(DVec3::ZERO, DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Free);
        field.push(DVec3::new(0.05, 0.0, 0.0), DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Free);
        field.push(DVec3::new(0.5, 0.0, 0.0), DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Free);
        let mut grid = BoxGrid::new(DVec3::new(-1.0, -1.0, -1.0), DVec3::new(1.0, 1.0, 1.0), kh);
        grid.sort(&field);
        let b = grid.box_of(field.pos[0]);
        let neighbors = find_neighbors(0, b, &field, &grid, kh, Kernel::CubicSpline, true);
        assert!(neighbors.ids.contains(&0));
        assert!(neighbors.ids.contains(&1));
        assert!(!neighbors.ids.contains(&2));
        assert_eq!(neighbors.ids.len(), neighbors.grad_w.len());
        assert_eq!(neighbors.ids.len(), neighbors.w.len());
    }
}
