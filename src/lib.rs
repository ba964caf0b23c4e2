//! A distributed smoothed-particle-hydrodynamics solver for weakly-
//! compressible free-surface flows, decomposed into a 1-D x-axis band per
//! MPI rank.
//!
//! The module layout mirrors the teacher's per-concern file split
//! (`domain/`, `communication/`, `parameter_plugin/`, `io/output/`), flattened
//! here since this crate has no bevy plugin graph to hang separate
//! directories off of: one file per spec component instead of one file per
//! ECS system.

pub mod communication;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod field;
pub mod geometry;
pub mod grid;
pub mod integrator;
pub mod kernel;
pub mod neighbor;
pub mod orchestrator;
pub mod output;
pub mod params;
pub mod physics;
