//! Geometry-file parsing and shape seeding (spec §6's `#GEOM` grammar), the
//! out-of-scope-adjacent collaborator that builds rank 0's initial
//! [`Field`] before the first scatter. Grounded in
//! `original_source`'s `CPP_Interface/Playground.cpp` for the section/tag
//! structure; the retrieval pack does not carry the original `meshcube`/
//! `meshcylinder`/`meshsphere` bodies, so the three seeding patterns below
//! are reimplemented from the shape descriptions in spec §6 rather than
//! transcribed, using `rand` (pack-wide dependency) for the jitter term.

use glam::DVec3;
use rand::Rng;

use crate::error::SphError;
use crate::field::{Field, ParticleKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeKind {
    Brick,
    Cylinder,
    Sphere,
}

/// A shape subsection's status tag (spec §6: "0=Free, 1=Moving, 2=Fixed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Free,
    Moving,
    Fixed,
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    kind: ShapeKind,
    status: Status,
    spacing: f64,
    jitter: f64,
    origin: DVec3,
    dimension: DVec3,
}

/// The parsed `#GEOM` section: domain bounds plus an ordered list of shapes.
/// The `#FLUID` section is accepted but not retained — every scalar and
/// method selector it carries is also present, more completely, in the
/// parameter file (spec §6), so this crate treats `#FLUID` as a legacy
/// passthrough block rather than a second source of truth.
pub struct GeometryFile {
    lower: DVec3,
    upper: DVec3,
    shapes: Vec<Shape>,
}

impl GeometryFile {
    pub fn parse(text: &str) -> Result<Self, SphError> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let mut lower = None;
        let mut upper = None;
        let mut shapes = Vec::new();

        while let Some(line) = lines.next() {
            match line {
                "#FLUID" => {
                    for _ in 0..8 {
                        lines.next().ok_or_else(geometry_eof)?;
                    }
                    for _ in 0..5 {
                        lines.next().ok_or_else(geometry_eof)?;
                    }
                }
                "#GEOM" => {
                    lower = Some(read_vec3(&mut lines, "lower")?);
                    upper = Some(read_vec3(&mut lines, "upper")?);
                }
                "#brick" | "#cylin" | "#spher" => {
                    let kind = match line {
                        "#brick" => ShapeKind::Brick,
                        "#cylin" => ShapeKind::Cylinder,
                        "#spher" => ShapeKind::Sphere,
                        _ => unreachable!(),
                    };
                    shapes.push(read_shape(&mut lines, kind)?);
                }
                other => return Err(SphError::GeometryError(format!("unknown section or tag `{other}`"))),
            }
        }

        Ok(GeometryFile {
            lower: lower.ok_or_else(|| SphError::GeometryError("missing #GEOM lower bound".into()))?,
            upper: upper.ok_or_else(|| SphError::GeometryError("missing #GEOM upper bound".into()))?,
            shapes,
        })
    }

    /// Seeds every shape subsection into a fresh global [`Field`], in file
    /// order. Moving shapes are assigned `Moving(k)` by the order in which
    /// they appear, so the Kth moving shape pairs positionally with
    /// `parameter.moving_boundaries[k]` the same way the parameter file's
    /// moving-boundary table is ordered.
    ///
    /// Returns the field alongside a parallel `volume` array (one entry per
    /// particle, `spacing^3` of the shape that spawned it) for
    /// [`crate::physics::init_masses`]'s `violeau2012` scheme: density and
    /// velocity are left at zero here, filled in by
    /// [`crate::physics::init_densities`]/[`crate::physics::init_speeds`]
    /// once the full field exists.
    pub fn seed(&self) -> (Field, Vec<f64>) {
        let mut field = Field::with_capacity(0);
        field.lower = self.lower;
        field.upper = self.upper;
        let mut volumes = Vec::new();
        let mut moving_index = 0u32;
        for shape in &self.shapes {
            let kind = match shape.status {
                Status::Free => ParticleKind::Free,
                Status::Fixed => ParticleKind::Fixed,
                Status::Moving => {
                    let k = ParticleKind::Moving(moving_index);
                    moving_index += 1;
                    k
                }
            };
            let points = match shape.kind {
                ShapeKind::Brick => seed_brick(shape),
                ShapeKind::Cylinder => seed_cylinder(shape),
                ShapeKind::Sphere => seed_sphere(shape),
            };
            let volume = shape.spacing.powi(3);
            for p in points {
                field.push(p, DVec3::ZERO, 0.0, 0.0, 0.0, kind);
                volumes.push(volume);
            }
        }
        field.recount_kinds();
        (field, volumes)
    }
}

fn geometry_eof() -> SphError {
    SphError::GeometryError("unexpected end of file".into())
}

fn read_vec3<'a>(lines: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<DVec3, SphError> {
    let mut v = [0.0; 3];
    for slot in v.iter_mut() {
        let line = lines.next().ok_or_else(geometry_eof)?;
        let value: f64 = line.split_whitespace().last().ok_or_else(|| SphError::GeometryError(format!("malformed {what} line")))?.parse().map_err(|_| SphError::GeometryError(format!("malformed {what} line")))?;
        *slot = value;
    }
    Ok(DVec3::new(v[0], v[1], v[2]))
}

fn read_scalar_field<'a>(lines: &mut impl Iterator<Item = &'a str>, key: &str) -> Result<f64, SphError> {
    let line = lines.next().ok_or_else(geometry_eof)?;
    let mut tokens = line.split_whitespace();
    let found_key = tokens.next().ok_or_else(|| SphError::GeometryError(format!("expected `{key}`")))?;
    if found_key != key {
        return Err(SphError::GeometryError(format!("expected `{key}`, found `{found_key}`")));
    }
    tokens.next().and_then(|s| s.parse::<f64>().ok()).ok_or_else(|| SphError::GeometryError(format!("malformed `{key}` line")))
}

fn read_shape<'a>(lines: &mut impl Iterator<Item = &'a str>, kind: ShapeKind) -> Result<Shape, SphError> {
    let status = match read_scalar_field(lines, "status")? as i32 {
        0 => Status::Free,
        1 => Status::Moving,
        2 => Status::Fixed,
        other => return Err(SphError::GeometryError(format!("unknown shape status {other}"))),
    };
    let spacing = read_scalar_field(lines, "spacing")?;
    let jitter = read_scalar_field(lines, "jitter")?;
    let origin = read_vec3(lines, "origin")?;
    let dimension = read_vec3(lines, "dimension")?;
    Ok(Shape { kind, status, spacing, jitter, origin, dimension })
}

fn jittered(p: DVec3, spacing: f64, jitter: f64) -> DVec3 {
    if jitter <= 0.0 {
        return p;
    }
    let mut rng = rand::thread_rng();
    let offset = DVec3::new(
        rng.gen_range(-0.5..0.5) * jitter * spacing,
        rng.gen_range(-0.5..0.5) * jitter * spacing,
        rng.gen_range(-0.5..0.5) * jitter * spacing,
    );
    p + offset
}

/// A regular grid of points filling the box `[origin, origin + dimension]`
/// at the given spacing, inclusive of both faces.
fn seed_brick(shape: &Shape) -> Vec<DVec3> {
    let steps_x = (shape.dimension.x / shape.spacing).max(1.0).round() as i64;
    let steps_y = (shape.dimension.y / shape.spacing).max(1.0).round() as i64;
    let steps_z = (shape.dimension.z / shape.spacing).max(1.0).round() as i64;
    let mut points = Vec::new();
    for i in 0..=steps_x {
        for j in 0..=steps_y {
            for k in 0..=steps_z {
                let p = shape.origin + DVec3::new(i as f64, j as f64, k as f64) * shape.spacing;
                points.push(jittered(p, shape.spacing, shape.jitter));
            }
        }
    }
    points
}

/// Concentric rings spaced `s` apart, filling a cylinder of radius
/// `dimension.x` and height `dimension.y` about the z axis through
/// `origin`, stacked in layers `s` apart along the axis.
fn seed_cylinder(shape: &Shape) -> Vec<DVec3> {
    let radius = shape.dimension.x;
    let height = shape.dimension.y;
    let s = shape.spacing;
    let n_layers = (height / s).max(1.0).round() as i64;
    let n_rings = (radius / s).max(1.0).round() as i64;
    let mut points = Vec::new();
    for layer in 0..=n_layers {
        let z = shape.origin.z + layer as f64 * s;
        points.push(jittered(DVec3::new(shape.origin.x, shape.origin.y, z), s, shape.jitter));
        for ring in 1..=n_rings {
            let r = ring as f64 * s;
            let n_points_on_ring = ((2.0 * std::f64::consts::PI * r) / s).max(1.0).round() as i64;
            for p in 0..n_points_on_ring {
                let theta = 2.0 * std::f64::consts::PI * p as f64 / n_points_on_ring as f64;
                let pos = shape.origin + DVec3::new(r * theta.cos(), r * theta.sin(), z - shape.origin.z);
                points.push(jittered(pos, s, shape.jitter));
            }
        }
    }
    points
}

/// Concentric shells spaced `s` apart, filling a sphere of radius
/// `dimension.x` about `origin`, each shell populated on a latitude/
/// longitude grid at roughly `s` point spacing.
fn seed_sphere(shape: &Shape) -> Vec<DVec3> {
    let radius = shape.dimension.x;
    let s = shape.spacing;
    let n_shells = (radius / s).max(1.0).round() as i64;
    let mut points = vec![jittered(shape.origin, s, shape.jitter)];
    for shell in 1..=n_shells {
        let r = shell as f64 * s;
        let n_lat = ((std::f64::consts::PI * r) / s).max(1.0).round() as i64;
        for lat in 0..=n_lat {
            let phi = std::f64::consts::PI * lat as f64 / n_lat as f64;
            let ring_radius = r * phi.sin();
            let n_lon = ((2.0 * std::f64::consts::PI * ring_radius) / s).max(1.0).round() as i64;
            for lon in 0..n_lon {
                let theta = 2.0 * std::f64::consts::PI * lon as f64 / n_lon as f64;
                let pos = shape.origin + DVec3::new(ring_radius * theta.cos(), ring_radius * theta.sin(), r * phi.cos());
                points.push(jittered(pos, s, shape.jitter));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> String {
        "#GEOM\nlower 0.0 0.0 0.0\nupper 1.0 1.0 1.0\n#brick\nstatus 0\nspacing 0.5\njitter 0.0\norigin 0.0 0.0 0.0\ndimension 0.5 0.5 0.5\n".to_string()
    }

    #[test]
    fn parses_bounds_and_one_brick_shape() {
        let geometry = GeometryFile::parse(&sample_text()).unwrap();
        assert_eq!(geometry.shapes.len(), 1);
        assert_eq!(geometry.shapes[0].kind, ShapeKind::Brick);
    }

    #[test]
    fn seeding_a_brick_produces_a_regular_grid_within_bounds() {
        let geometry = GeometryFile::parse(&sample_text()).unwrap();
        let (field, volumes) = geometry.seed();
        assert!(field.n_total() >= 8);
        assert_eq!(volumes.len(), field.n_total());
        for p in &field.pos {
            assert!(p.x >= 0.0 && p.x <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn unknown_tag_is_a_geometry_error() {
        let err = GeometryFile::parse("#bogus\n").unwrap_err();
        assert!(matches!(err, SphError::GeometryError(_)));
    }

    #[test]
    fn missing_geom_section_is_a_geometry_error() {
        let err = GeometryFile::parse("").unwrap_err();
        assert!(matches!(err, SphError::GeometryError(_)));
    }
}
