//! The `Parameter` section and its bespoke line-oriented text format (spec
//! §6). Grounded in the teacher's "one typed struct per named section"
//! parameter-loading pattern (`parameter_plugin/`), but the format itself is
//! the hand-written key/value grammar §6 defines rather than YAML, since no
//! `serde` format matches a flat `key value` text file with repeated
//! moving-boundary tables.

use glam::DVec3;

use crate::error::SphError;
use crate::kernel::Kernel;

pub const GAS_CONSTANT_GROUND_TRUTH: f64 = 8.314;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMethod {
    Euler,
    Rk2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityInitMethod {
    Hydrostatic,
    Homogeneous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEquationMethod {
    QuasiIncompressible,
    PerfectGas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassInitMethod {
    Violeau2012,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViscosityModel {
    VioleauArtificial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParaviewOutput {
    NoParaview,
    FullParaview,
    NFreeParaview,
    NMovingFixedParaview,
    NFreeNMovingFixedParaview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatlabOutput {
    NoMatlab,
    FullMatlab,
}

/// A moving boundary's position law, mirroring `original_source`'s `PosLaw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosLaw {
    Constant,
    Sine,
    Exponential,
    Rotating,
}

/// A moving boundary's angle law, mirroring `original_source`'s `AngleLaw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleLaw {
    Linear,
    Sine,
    Exponential,
}

/// One row of the moving-boundary table (spec §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingBoundary {
    pub pos_law: PosLaw,
    pub angle_law: AngleLaw,
    pub charact_time: f64,
    pub amplitude: f64,
    pub direction: DVec3,
    pub rotation_center: DVec3,
    pub teta: DVec3,
}

/// The simulation's scalar constants and enumerated choices (spec §3's
/// `Parameter`). Built on rank 0 during initialization, then replicated
/// identically on every rank; never mutated afterward except by a fresh
/// load.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub kh: f64,
    pub h: f64,
    pub k: f64,
    pub t_end: f64,
    pub density_ref: f64,
    pub b: f64,
    pub gamma: f64,
    pub g: f64,
    pub write_interval: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub epsilon: f64,
    pub molar_mass: f64,
    pub temperature: f64,
    pub theta: f64,
    pub epsilon_xsph: f64,

    pub kernel: Kernel,
    pub viscosity_model: ViscosityModel,
    pub integration_method: IntegrationMethod,
    pub adaptive_time_step: bool,
    pub density_init_method: DensityInitMethod,
    pub state_equation_method: StateEquationMethod,
    pub mass_init_method: MassInitMethod,
    pub paraview: ParaviewOutput,
    pub matlab: MatlabOutput,

    pub moving_boundaries: Vec<MovingBoundary>,
}

impl Parameter {
    pub const GAS_CONSTANT: f64 = GAS_CONSTANT_GROUND_TRUTH;

    /// Parses the §6 parameter-file grammar: one recognized `key value...`
    /// pair per non-blank, non-`#`-comment line. Moving-boundary rows are
    /// accumulated positionally: the Nth occurrence of each moving-boundary
    /// key belongs to moving boundary N (mirroring `original_source`'s
    /// parallel `std::vector` columns keyed by insertion order).
    pub fn parse(text: &str) -> Result<Self, SphError> {
        let mut raw = RawParameter::default();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let key = tokens.next().ok_or_else(|| missing_value(line_no))?;
            let rest: Vec<&str> = tokens.collect();
            raw.set(key, &rest, line_no)?;
        }
        raw.finish()
    }
}

fn missing_value(line_no: usize) -> SphError {
    SphError::ParameterError(format!("line {}: missing key", line_no + 1))
}

fn bad_value(key: &str, line_no: usize) -> SphError {
    SphError::ParameterError(format!("line {}: bad value for `{}`", line_no + 1, key))
}

fn parse_f64(key: &str, rest: &[&str], line_no: usize) -> Result<f64, SphError> {
    rest.first().and_then(|s| s.parse::<f64>().ok()).ok_or_else(|| bad_value(key, line_no))
}

fn parse_vec3(key: &str, rest: &[&str], line_no: usize) -> Result<DVec3, SphError> {
    if rest.len() != 3 {
        return Err(bad_value(key, line_no));
    }
    let mut v = [0.0; 3];
    for (i, slot) in v.iter_mut().enumerate() {
        *slot = rest[i].parse::<f64>().map_err(|_| bad_value(key, line_no))?;
    }
    Ok(DVec3::new(v[0], v[1], v[2]))
}

/// Intermediate accumulator: every scalar key is optional until
/// [`RawParameter::finish`] checks all are present, and every
/// moving-boundary column grows independently by append.
#[derive(Default)]
struct RawParameter {
    kh: Option<f64>,
    h: Option<f64>,
    k: Option<f64>,
    t_end: Option<f64>,
    density_ref: Option<f64>,
    b: Option<f64>,
    gamma: Option<f64>,
    g: Option<f64>,
    write_interval: Option<f64>,
    c: Option<f64>,
    alpha: Option<f64>,
    beta: Option<f64>,
    epsilon: Option<f64>,
    molar_mass: Option<f64>,
    temperature: Option<f64>,
    theta: Option<f64>,
    epsilon_xsph: Option<f64>,
    kernel: Option<Kernel>,
    viscosity_model: Option<ViscosityModel>,
    integration_method: Option<IntegrationMethod>,
    adaptive_time_step: Option<bool>,
    density_init_method: Option<DensityInitMethod>,
    state_equation_method: Option<StateEquationMethod>,
    mass_init_method: Option<MassInitMethod>,
    paraview: Option<ParaviewOutput>,
    matlab: Option<MatlabOutput>,
    pos_law: Vec<PosLaw>,
    angle_law: Vec<AngleLaw>,
    charact_time: Vec<f64>,
    amplitude: Vec<f64>,
    direction: Vec<DVec3>,
    rotation_center: Vec<DVec3>,
    teta: Vec<DVec3>,
}

impl RawParameter {
    fn set(&mut self, key: &str, rest: &[&str], line_no: usize) -> Result<(), SphError> {
        match key {
            "kh" => self.kh = Some(parse_f64(key, rest, line_no)?),
            "h" => self.h = Some(parse_f64(key, rest, line_no)?),
            "k" => self.k = Some(parse_f64(key, rest, line_no)?),
            "T" => self.t_end = Some(parse_f64(key, rest, line_no)?),
            "densityRef" => self.density_ref = Some(parse_f64(key, rest, line_no)?),
            "B" => self.b = Some(parse_f64(key, rest, line_no)?),
            "gamma" => self.gamma = Some(parse_f64(key, rest, line_no)?),
            "g" => self.g = Some(parse_f64(key, rest, line_no)?),
            "writeInterval" => self.write_interval = Some(parse_f64(key, rest, line_no)?),
            "c" => self.c = Some(parse_f64(key, rest, line_no)?),
            "alpha" => self.alpha = Some(parse_f64(key, rest, line_no)?),
            "beta" => self.beta = Some(parse_f64(key, rest, line_no)?),
            "epsilon" => self.epsilon = Some(parse_f64(key, rest, line_no)?),
            "molarMass" => self.molar_mass = Some(parse_f64(key, rest, line_no)?),
            "temperature" => self.temperature = Some(parse_f64(key, rest, line_no)?),
            "theta" => self.theta = Some(parse_f64(key, rest, line_no)?),
            "epsilonXSPH" => self.epsilon_xsph = Some(parse_f64(key, rest, line_no)?),
            "kernel" => {
                let value = rest.first().ok_or_else(|| bad_value(key, line_no))?;
                self.kernel = Some(Kernel::from_key(value).ok_or_else(|| bad_value(key, line_no))?);
            }
            "integrationMethod" => {
                self.integration_method = Some(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                    "euler" => IntegrationMethod::Euler,
                    "RK2" => IntegrationMethod::Rk2,
                    _ => return Err(bad_value(key, line_no)),
                });
            }
            "adaptativeTimeStep" => {
                self.adaptive_time_step = Some(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                    "no" => false,
                    "yes" => true,
                    _ => return Err(bad_value(key, line_no)),
                });
            }
            "densityInitMethod" => {
                self.density_init_method = Some(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                    "hydrostatic" => DensityInitMethod::Hydrostatic,
                    "homogeneous" => DensityInitMethod::Homogeneous,
                    _ => return Err(bad_value(key, line_no)),
                });
            }
            "stateEquationMethod" => {
                self.state_equation_method = Some(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                    "quasiIncompressible" => StateEquationMethod::QuasiIncompressible,
                    "perfectGas" => StateEquationMethod::PerfectGas,
                    _ => return Err(bad_value(key, line_no)),
                });
            }
            "massInitMethod" => {
                self.mass_init_method = Some(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                    "violeau2012" => MassInitMethod::Violeau2012,
                    _ => return Err(bad_value(key, line_no)),
                });
            }
            "viscosityModel" => {
                self.viscosity_model = Some(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                    "violeauArtificial" => ViscosityModel::VioleauArtificial,
                    _ => return Err(bad_value(key, line_no)),
                });
            }
            "paraview" => {
                self.paraview = Some(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                    "noParaview" => ParaviewOutput::NoParaview,
                    "fullParaview" => ParaviewOutput::FullParaview,
                    "nFreeParaview" => ParaviewOutput::NFreeParaview,
                    "nMovingFixedParaview" => ParaviewOutput::NMovingFixedParaview,
                    "nFree_nMovingFixedParaview" => ParaviewOutput::NFreeNMovingFixedParaview,
                    _ => return Err(bad_value(key, line_no)),
                });
            }
            "matlab" => {
                self.matlab = Some(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                    "noMatlab" => MatlabOutput::NoMatlab,
                    "fullMatlab" => MatlabOutput::FullMatlab,
                    _ => return Err(bad_value(key, line_no)),
                });
            }
            "posLaw" => self.pos_law.push(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                "constant" => PosLaw::Constant,
                "sine" => PosLaw::Sine,
                "exponential" => PosLaw::Exponential,
                "rotating" => PosLaw::Rotating,
                _ => return Err(bad_value(key, line_no)),
            }),
            "angleLaw" => self.angle_law.push(match *rest.first().ok_or_else(|| bad_value(key, line_no))? {
                "linear" => AngleLaw::Linear,
                "sine" => AngleLaw::Sine,
                "exponential" => AngleLaw::Exponential,
                _ => return Err(bad_value(key, line_no)),
            }),
            "charactTime" => self.charact_time.push(parse_f64(key, rest, line_no)?),
            "amplitude" => self.amplitude.push(parse_f64(key, rest, line_no)?),
            "direction" => self.direction.push(parse_vec3(key, rest, line_no)?),
            "rotationCenter" => self.rotation_center.push(parse_vec3(key, rest, line_no)?),
            "teta" => self.teta.push(parse_vec3(key, rest, line_no)?),
            _ => return Err(SphError::ParameterError(format!("line {}: unknown key `{}`", line_no + 1, key))),
        }
        Ok(())
    }

    fn finish(self) -> Result<Parameter, SphError> {
        macro_rules! require {
            ($field:ident) => {
                self.$field.ok_or_else(|| SphError::ParameterError(format!("missing required key `{}`", stringify!($field))))?
            };
        }
        let n = self.pos_law.len();
        if self.angle_law.len() != n || self.charact_time.len() != n || self.amplitude.len() != n || self.direction.len() != n || self.rotation_center.len() != n || self.teta.len() != n {
            return Err(SphError::ParameterError("moving-boundary table columns have mismatched lengths".into()));
        }
        let moving_boundaries = (0..n)
            .map(|i| MovingBoundary {
                pos_law: self.pos_law[i],
                angle_law: self.angle_law[i],
                charact_time: self.charact_time[i],
                amplitude: self.amplitude[i],
                direction: self.direction[i],
                rotation_center: self.rotation_center[i],
                teta: self.teta[i],
            })
            .collect();
        Ok(Parameter {
            kh: require!(kh),
            h: require!(h),
            k: require!(k),
            t_end: require!(t_end),
            density_ref: require!(density_ref),
            b: require!(b),
            gamma: require!(gamma),
            g: require!(g),
            write_interval: require!(write_interval),
            c: require!(c),
            alpha: require!(alpha),
            beta: require!(beta),
            epsilon: require!(epsilon),
            molar_mass: require!(molar_mass),
            temperature: require!(temperature),
            theta: require!(theta),
            epsilon_xsph: require!(epsilon_xsph),
            kernel: require!(kernel),
            viscosity_model: require!(viscosity_model),
            integration_method: require!(integration_method),
            adaptive_time_step: require!(adaptive_time_step),
            density_init_method: require!(density_init_method),
            state_equation_method: require!(state_equation_method),
            mass_init_method: require!(mass_init_method),
            paraview: require!(paraview),
            matlab: require!(matlab),
            moving_boundaries,
        })
    }
}

impl Parameter {
    /// A minimal, internally consistent parameter set for tests and
    /// benchmarks that only exercise a handful of fields.
    pub fn default_for_tests() -> Self {
        Parameter {
            kh: 0.02,
            h: 0.01,
            k: 1e-4,
            t_end: 1.0,
            density_ref: 1000.0,
            b: 1.0e5,
            gamma: 7.0,
            g: 9.81,
            write_interval: 0.01,
            c: 20.0,
            alpha: 0.01,
            beta: 0.0,
            epsilon: 0.01,
            molar_mass: 0.029,
            temperature: 293.0,
            theta: 0.5,
            epsilon_xsph: 0.5,
            kernel: Kernel::CubicSpline,
            viscosity_model: ViscosityModel::VioleauArtificial,
            integration_method: IntegrationMethod::Rk2,
            adaptive_time_step: false,
            density_init_method: DensityInitMethod::Hydrostatic,
            state_equation_method: StateEquationMethod::QuasiIncompressible,
            mass_init_method: MassInitMethod::Violeau2012,
            paraview: ParaviewOutput::FullParaview,
            matlab: MatlabOutput::NoMatlab,
            moving_boundaries: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_text() -> String {
        "kh 0.02\nh 0.01\nk 1e-4\nT 1.0\ndensityRef 1000.0\nB 1.0e5\ngamma 7.0\ng 9.81\n\
         writeInterval 0.01\nc 20.0\nalpha 0.01\nbeta 0.0\nepsilon 0.01\nmolarMass 0.029\n\
         temperature 293.0\ntheta 0.5\nepsilonXSPH 0.5\nkernel Cubic_spline\n\
         viscosityModel violeauArtificial\nintegrationMethod RK2\nadaptativeTimeStep no\n\
         densityInitMethod hydrostatic\nstateEquationMethod quasiIncompressible\n\
         massInitMethod violeau2012\nparaview fullParaview\nmatlab noMatlab\n"
            .to_string()
    }

    #[test]
    fn parses_a_minimal_file_with_no_moving_boundaries() {
        let parameter = Parameter::parse(&minimal_text()).unwrap();
        assert_eq!(parameter.kernel, Kernel::CubicSpline);
        assert!(parameter.moving_boundaries.is_empty());
    }

    #[test]
    fn parses_one_moving_boundary_row() {
        let mut text = minimal_text();
        text.push_str("posLaw sine\nangleLaw linear\ncharactTime 2.0\namplitude 0.5\n");
        text.push_str("direction 1.0 0.0 0.0\nrotationCenter 0.0 0.0 0.0\nteta 0.0 0.0 0.0\n");
        let parameter = Parameter::parse(&text).unwrap();
        assert_eq!(parameter.moving_boundaries.len(), 1);
        assert_eq!(parameter.moving_boundaries[0].pos_law, PosLaw::Sine);
    }

    #[test]
    fn missing_required_key_is_a_parameter_error() {
        let err = Parameter::parse("kh 0.02\n").unwrap_err();
        assert!(matches!(err, SphError::ParameterError(_)));
    }

    #[test]
    fn unknown_key_is_a_parameter_error() {
        let err = Parameter::parse("bogusKey 1.0\n").unwrap_err();
        assert!(matches!(err, SphError::ParameterError(_)));
    }
}
