//! The per-rank control flow (spec §4.7), grounded in the teacher's staged
//! simulation loop (`simulation/mod.rs`) and startup sequencing
//! (`simulation_builder.rs`), generalized from bevy stages to a plain
//! function driving one time step at a time.

use std::path::Path;

use log::info;
use mpi::topology::SystemCommunicator;
use mpi::traits::*;

use crate::diagnostics::Diagnostics;
use crate::domain::{self, SubdomainInfo};
use crate::error::{SphError, SphResult};
use crate::field::Field;
use crate::grid::BoxGrid;
use crate::integrator::{propose_next_timestep, time_integration};
use crate::output;
use crate::params::{IntegrationMethod, Parameter};

/// Runs the solver to completion: `T` is reached when `currentTime >= T`
/// (spec §4.7). `global` is `Some` only on rank 0, holding the seeded
/// initial field; every other rank passes `None`.
pub fn run(world: &SystemCommunicator, parameter: &Parameter, global: Option<Field>, output_stem: &str, output_dir: &Path) -> SphResult<()> {
    let box_size = match parameter.integration_method {
        IntegrationMethod::Euler => parameter.kh,
        IntegrationMethod::Rk2 => 2.0 * parameter.kh,
    };

    let writers = output::writers_for(parameter, output_dir);

    let mut current_time = 0.0_f64;
    let mut k = parameter.k;
    let mut write_count = 1u64;
    let mut step = 0u64;

    if world.rank() == 0 {
        let initial = global.as_ref().expect("global field must be present on rank 0");
        let snapshot = output::Snapshot { field: initial, time: current_time, step: 0 };
        output::write_all(&writers, &snapshot, output_stem).map_err(|e| SphError::ConsistencyError(format!("failed to write step 0: {e}")))?;
    }

    let (mut field, mut info) = domain::scatter_field(world, global.as_ref(), box_size)?;
    let mut grid = BoxGrid::new(field.lower, field.upper, box_size);
    grid.sort(&field);

    let mut diagnostics = Diagnostics::new();

    while current_time < parameter.t_end {
        step += 1;
        let step_span = diagnostics.start("step");
        let (next, derivatives) = time_integration(world, &field, &mut grid, parameter, &info, current_time, k);
        field = next;
        current_time += k;
        if parameter.adaptive_time_step {
            k = propose_next_timestep(world, &field, &derivatives, parameter, &info);
        }

        let exchange_span = diagnostics.start("process_update");
        domain::process_update(world, &mut field, &mut info).map_err(|e| tag_step(e, step))?;
        diagnostics.record(exchange_span);

        let epsilon = 1e-9;
        if write_count as f64 * parameter.write_interval <= current_time + epsilon * current_time {
            let gather_span = diagnostics.start("gather_and_write");
            let gathered = domain::gather_field(world, &field, &info);
            if let Some(global_field) = gathered {
                let snapshot = output::Snapshot { field: &global_field, time: current_time, step };
                output::write_all(&writers, &snapshot, output_stem).map_err(|e| SphError::ConsistencyError(format!("failed to write step {step}: {e}")))?;
            }
            diagnostics.record(gather_span);
            write_count += 1;
        }
        diagnostics.record(step_span);
        info!("step {step} t={current_time:.6} k={k:.3e}");
    }

    diagnostics.log_summary(world.rank());
    world.barrier();
    Ok(())
}

/// Rewrites a `RuntimeDivergence`'s step number; every other variant passes
/// through unchanged. `domain`'s protocol functions don't carry the step
/// counter, so the orchestrator — the only caller that knows it — fills it
/// in here.
fn tag_step(err: SphError, step: u64) -> SphError {
    match err {
        SphError::RuntimeDivergence { particle, x, y, z, .. } => SphError::RuntimeDivergence { particle, x, y, z, step },
        other => other,
    }
}

