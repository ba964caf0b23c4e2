//! Command-line front end (spec §6): parses `parameterFile`, `geometryFile`
//! and an optional `outputStem`, sets up per-rank logging the way
//! `simulation_builder.rs::log_setup` does, builds the initial field on rank
//! 0, and hands off to [`sph_solver::orchestrator::run`].

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::error;
use mpi::topology::SystemCommunicator;
use mpi::traits::*;
use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, LevelPadding, TermLogger, TerminalMode, WriteLogger};
use time::UtcOffset;

use sph_solver::error::{SphError, SphResult};
use sph_solver::field::Field;
use sph_solver::geometry::GeometryFile;
use sph_solver::orchestrator;
use sph_solver::params::Parameter;
use sph_solver::physics;

/// Positional CLI contract from spec §6.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    parameter_file: PathBuf,
    geometry_file: PathBuf,
    #[clap(default_value = "result")]
    output_stem: String,
    #[clap(short, parse(from_occurrences))]
    verbosity: u8,
}

fn main() -> ExitCode {
    let universe = mpi::initialize().expect("MPI failed to initialize");
    let world = universe.world();
    let rank = world.rank();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(clap_error) => {
            if rank == 0 {
                eprintln!("{clap_error}");
            }
            return exit_code_of(SphError::ArgumentError(clap_error.to_string()).exit_code());
        }
    };

    setup_logging(rank, world.size(), cli.verbosity);

    match run(&world, rank, &cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(sph_error) => {
            error!("{sph_error}");
            exit_code_of(sph_error.exit_code())
        }
    }
}

fn exit_code_of(code: i32) -> ExitCode {
    ExitCode::from(code as u8)
}

/// `rank 0` logs to terminal and to `logs/rank_<n>.log`; every other rank
/// logs to file only (`simulation_builder.rs::log_setup`).
fn setup_logging(rank: i32, n_ranks: i32, verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let padding = (n_ranks as f64).log10().floor() as usize + 1;
    let log_dir = Path::new("logs");
    fs::create_dir_all(log_dir).expect("failed to create log directory");
    let log_path = log_dir.join(format!("rank_{rank:0padding$}.log"));
    // Local UTC offset, read once at startup the way `simulation_builder.rs::log_setup`
    // does, so logged timestamps read in the operator's local time rather than UTC.
    let local = chrono::Local::now();
    let offset = UtcOffset::from_whole_seconds(local.offset().local_minus_utc()).unwrap_or(UtcOffset::UTC);
    let config = ConfigBuilder::default().set_level_padding(LevelPadding::Right).set_time_offset(offset).set_thread_level(LevelFilter::Off).build();
    let file = fs::File::create(&log_path).expect("failed to create log file");
    if rank == 0 {
        CombinedLogger::init(vec![
            TermLogger::new(level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
            WriteLogger::new(level, config, file),
        ])
        .expect("failed to initialize logging");
    } else {
        WriteLogger::init(level, config, file).expect("failed to initialize logging");
    }
}

/// Reads the parameter file on every rank independently — §3 guarantees it
/// is replicated identically — then, on rank 0 only, reads the geometry
/// file and seeds the initial global field. Initialization errors detected
/// on rank 0 (geometry parsing, the partition precondition surfaced through
/// the first [`sph_solver::domain::scatter_field`] call inside
/// [`orchestrator::run`]) are broadcast so every rank terminates with the
/// same exit code (spec §7), rather than leaving non-root ranks blocked
/// waiting on a scatter that rank 0 never sends.
fn run(world: &SystemCommunicator, rank: i32, cli: &Cli) -> SphResult<()> {
    let parameter = load_parameter(&cli.parameter_file)?;

    let mut init_result = if rank == 0 { Some(build_initial_field(&cli.geometry_file, &parameter)) } else { None };

    let mut error_code = match &init_result {
        Some(Err(e)) => e.exit_code(),
        _ => 0,
    };
    let root = world.process_at_rank(0);
    root.broadcast_into(&mut error_code);
    if error_code != 0 {
        return Err(match init_result.take() {
            Some(Err(e)) => e,
            _ => error_for_code(error_code),
        });
    }

    let global = init_result.take().map(|r| r.expect("checked above"));
    orchestrator::run(world, &parameter, global, &cli.output_stem, Path::new("output"))
}

fn error_for_code(code: i32) -> SphError {
    match code {
        1 => SphError::ArgumentError("a peer rank reported an argument error".into()),
        2 => SphError::ParameterError("a peer rank reported a parameter error".into()),
        4 => SphError::ConsistencyError("a peer rank reported a consistency error".into()),
        _ => SphError::GeometryError("a peer rank reported a geometry error during initialization".into()),
    }
}

fn load_parameter(path: &Path) -> SphResult<Parameter> {
    let text = fs::read_to_string(path).map_err(|e| SphError::ParameterError(format!("failed to read parameter file {}: {e}", path.display())))?;
    Parameter::parse(&text)
}

/// Builds rank 0's initial global [`Field`]: geometry seeding, then density/
/// mass/speed initialization in the order `original_source/CPP_Physics/Init.cpp`
/// runs them (density from the chosen method, mass from density times
/// per-shape volume, speed zero except for moving particles, pressure from
/// the equation of state applied to the freshly initialized density).
fn build_initial_field(path: &Path, parameter: &Parameter) -> SphResult<Field> {
    let text = fs::read_to_string(path).map_err(|e| SphError::GeometryError(format!("failed to read geometry file {}: {e}", path.display())))?;
    let geometry = GeometryFile::parse(&text)?;
    let (mut field, volumes) = geometry.seed();
    physics::init_densities(&mut field, parameter);
    physics::init_masses(&mut field, &volumes);
    physics::init_speeds(&mut field, parameter);
    for i in 0..field.n_total() {
        physics::pressure_computation(&mut field, i, parameter);
    }
    Ok(field)
}
