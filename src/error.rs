//! The error taxonomy from spec §7, with one process exit code per variant.

use thiserror::Error;

/// Result alias used throughout the solver.
pub type SphResult<T> = Result<T, SphError>;

#[derive(Error, Debug)]
pub enum SphError {
    #[error("wrong number or form of command line arguments: {0}")]
    ArgumentError(String),

    #[error("parameter file error: {0}")]
    ParameterError(String),

    #[error("geometry file error: {0}")]
    GeometryError(String),

    #[error("parameter/geometry pair is inconsistent: {0}")]
    ConsistencyError(String),

    #[error(
        "particle {particle} at position ({x}, {y}, {z}) diverged at step {step}: moved \
         farther than one subdomain in a single time step"
    )]
    RuntimeDivergence {
        particle: usize,
        x: f64,
        y: f64,
        z: f64,
        step: u64,
    },
}

impl SphError {
    /// The exit code contract from spec §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            SphError::ArgumentError(_) => 1,
            SphError::ParameterError(_) => 2,
            SphError::GeometryError(_) => 3,
            SphError::ConsistencyError(_) => 4,
            SphError::RuntimeDivergence { .. } => 5,
        }
    }
}
