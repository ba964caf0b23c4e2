//! Output writers (spec §6: "the only contract the core exposes to writers
//! is a snapshot gather call producing a global field identical in shape to
//! the initial one, plus the current simulation time"). Grounded in the
//! teacher's writer-trait layering (`io/output/plugin.rs`'s plugin-per-format
//! idea, without the bevy machinery); format selection is carried in
//! [`crate::params::Parameter`]'s `paraview`/`matlab` selectors.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::field::{Field, ParticleKind};
use crate::params::{MatlabOutput, ParaviewOutput, Parameter};

/// A snapshot of the global field at one point in simulated time, the only
/// input a writer ever sees.
pub struct Snapshot<'a> {
    pub field: &'a Field,
    pub time: f64,
    pub step: u64,
}

/// Implemented by every output format. `write` is only ever called on rank
/// 0, after a [`crate::domain::gather_field`].
pub trait Writer {
    fn write(&self, snapshot: &Snapshot, stem: &str) -> io::Result<()>;
}

/// Plain-text CSV writer: one row per particle, one file per step, matching
/// the columns of [`crate::field::ParticleRecord`]. This is the crate's own
/// baseline format, always written regardless of the `paraview`/`matlab`
/// selectors, since spec §6 names no tabular format explicitly.
pub struct CsvWriter {
    pub output_dir: PathBuf,
}

impl Writer for CsvWriter {
    fn write(&self, snapshot: &Snapshot, stem: &str) -> io::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{stem}_{:06}.csv", snapshot.step));
        let mut file = fs::File::create(path)?;
        writeln!(file, "# time {}", snapshot.time)?;
        writeln!(file, "x,y,z,vx,vy,vz,density,pressure,mass,kind")?;
        let field = snapshot.field;
        for i in 0..field.n_total() {
            let p = field.pos[i];
            let v = field.vel[i];
            writeln!(
                file,
                "{},{},{},{},{},{},{},{},{},{}",
                p.x,
                p.y,
                p.z,
                v.x,
                v.y,
                v.z,
                field.density[i],
                field.pressure[i],
                field.mass[i],
                kind_label(field.kind[i]),
            )?;
        }
        Ok(())
    }
}

fn kind_label(kind: ParticleKind) -> &'static str {
    match kind {
        ParticleKind::Free => "free",
        ParticleKind::Fixed => "fixed",
        ParticleKind::Moving(_) => "moving",
    }
}

/// Legacy-format stub: writes only a short header line naming the selector
/// in effect. The original Paraview/Matlab exporters are out of scope
/// (spec §1); this preserves the external contract (a file appears at the
/// expected path) without reimplementing either format.
pub struct StubWriter {
    pub output_dir: PathBuf,
    pub label: &'static str,
}

impl Writer for StubWriter {
    fn write(&self, snapshot: &Snapshot, stem: &str) -> io::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{stem}_{:06}.{}", snapshot.step, self.label));
        let mut file = fs::File::create(path)?;
        writeln!(file, "# {} output not implemented; {} particles at t={}", self.label, snapshot.field.n_total(), snapshot.time)
    }
}

/// Builds the writer set selected by `parameter`, rooted at `output_dir`.
pub fn writers_for(parameter: &Parameter, output_dir: &Path) -> Vec<Box<dyn Writer>> {
    let mut writers: Vec<Box<dyn Writer>> = vec![Box::new(CsvWriter { output_dir: output_dir.to_path_buf() })];
    match parameter.paraview {
        ParaviewOutput::NoParaview => {}
        _ => writers.push(Box::new(StubWriter { output_dir: output_dir.to_path_buf(), label: "vtk" })),
    }
    if let MatlabOutput::FullMatlab = parameter.matlab {
        writers.push(Box::new(StubWriter { output_dir: output_dir.to_path_buf(), label: "mat" }));
    }
    writers
}

/// Writes one snapshot through every writer in `writers`.
pub fn write_all(writers: &[Box<dyn Writer>], snapshot: &Snapshot, stem: &str) -> io::Result<()> {
    for writer in writers {
        writer.write(snapshot, stem)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use tempfile_like_dir::temp_subdir;

    mod tempfile_like_dir {
        use std::path::PathBuf;

        /// A directory under the system temp root, unique per test, cleaned
        /// up on drop. Avoids pulling in the `tempfile` crate for three
        /// tests' worth of scratch space.
        pub struct TempDir(pub PathBuf);

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }

        pub fn temp_subdir(name: &str) -> TempDir {
            let dir = std::env::temp_dir().join(format!("sph_solver_test_{name}_{}", std::process::id()));
            TempDir(dir)
        }
    }

    #[test]
    fn csv_writer_creates_one_row_per_particle() {
        let dir = temp_subdir("csv_writer");
        let mut field = Field::with_capacity(2);
        field.push(DVec3::ZERO, DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Free);
        field.push(DVec3::X, DVec3::ZERO, 1000.0, 0.0, 1.0, ParticleKind::Fixed);
        let writer = CsvWriter { output_dir: dir.0.clone() };
        let snapshot = Snapshot { field: &field, time: 0.0, step: 0 };
        writer.write(&snapshot, "result").unwrap();
        let contents = std::fs::read_to_string(dir.0.join("result_000000.csv")).unwrap();
        assert_eq!(contents.lines().count(), 4);
    }

    #[test]
    fn writers_for_includes_csv_and_skips_paraview_when_disabled() {
        let mut parameter = Parameter::default_for_tests();
        parameter.paraview = ParaviewOutput::NoParaview;
        parameter.matlab = MatlabOutput::NoMatlab;
        let writers = writers_for(&parameter, Path::new("/tmp"));
        assert_eq!(writers.len(), 1);
    }
}
