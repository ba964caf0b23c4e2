//! SPH smoothing kernels: smoothing value `W(r, kh)` and gradient magnitude
//! `dW/dr(r, kh)` for the six supported families, plus a sampled gradient
//! table for cheap lookups.
//!
//! Each family derives an internal smoothing length `h` from `kh` and a
//! normalization constant `alpha_d`, following `Wab`/`gradWab` in
//! `original_source/CPP_Physics/Kernel.cpp`. `original_source` leaves the
//! Gaussian untruncated (there, `kh` only bounds the search box, not the
//! kernel itself); this crate truncates it at `r = h` like every other
//! family, since spec §4.2/I4 requires compact support ("zero outside
//! declared support") uniformly across all six selectors.

use std::f64::consts::PI;

/// A kernel family selector (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    Gaussian,
    BellShaped,
    CubicSpline,
    Quadratic,
    Quintic,
    QuinticSpline,
}

impl Kernel {
    pub fn from_key(s: &str) -> Option<Self> {
        match s {
            "Gaussian" => Some(Kernel::Gaussian),
            "Bell_shaped" => Some(Kernel::BellShaped),
            "Cubic_spline" => Some(Kernel::CubicSpline),
            "Quadratic" => Some(Kernel::Quadratic),
            "Quintic" => Some(Kernel::Quintic),
            "Quintic_spline" => Some(Kernel::QuinticSpline),
            _ => None,
        }
    }

    /// The internal smoothing length `h`, derived from `kh` (`gethFromkh`).
    pub fn h_from_kh(self, kh: f64) -> f64 {
        match self {
            Kernel::Gaussian | Kernel::BellShaped => kh,
            Kernel::CubicSpline | Kernel::Quadratic | Kernel::Quintic => kh / 2.0,
            Kernel::QuinticSpline => kh / 3.0,
        }
    }

    /// The compact support radius, in the same units as `kh`.
    pub fn support(self, kh: f64) -> f64 {
        match self {
            Kernel::Gaussian => kh,
            Kernel::BellShaped => self.h_from_kh(kh),
            Kernel::CubicSpline | Kernel::Quadratic | Kernel::Quintic => 2.0 * self.h_from_kh(kh),
            Kernel::QuinticSpline => 3.0 * self.h_from_kh(kh),
        }
    }
}

/// Smoothing value `W(r, kh)`. Zero outside the kernel's compact support (I4).
pub fn w(r: f64, kh: f64, kernel: Kernel) -> f64 {
    let h = kernel.h_from_kh(kh);
    let q = r / h;
    match kernel {
        Kernel::Gaussian => {
            let alpha_d = 1.0 / (PI.powf(1.5) * h * h * h);
            if r < h {
                alpha_d * (-q * q).exp()
            } else {
                0.0
            }
        }
        Kernel::BellShaped => {
            let alpha_d = 6.5625 / (PI * h * h * h);
            if r < h {
                alpha_d * (1.0 + 3.0 * q) * (1.0 - q).powi(3)
            } else {
                0.0
            }
        }
        Kernel::CubicSpline => {
            let alpha_d = 1.5 / (PI * h * h * h);
            if r < h {
                alpha_d * (1.5 - q * q + 0.5 * q * q * q)
            } else if r < 2.0 * h {
                alpha_d * (1.0 / 6.0) * (1.0 - q).powi(3)
            } else {
                0.0
            }
        }
        Kernel::Quadratic => {
            let alpha_d = 1.25 / (PI * h * h * h);
            if r < 2.0 * h {
                alpha_d * (0.0625 * q * q - 0.75 * q + 0.75)
            } else {
                0.0
            }
        }
        Kernel::Quintic => {
            let alpha_d = 1.3125 / (PI * h * h * h);
            if r < 2.0 * h {
                alpha_d * (1.0 - 0.5 * q).powi(4) * (2.0 * q + 1.0)
            } else {
                0.0
            }
        }
        Kernel::QuinticSpline => {
            let alpha_d = 3.0 / (359.0 * PI * h * h * h);
            if r < h {
                alpha_d * ((3.0 - q).powi(5) - 6.0 * (2.0 - q).powi(5) + 15.0 * (1.0 - q).powi(5))
            } else if r < 2.0 * h {
                alpha_d * ((3.0 - q).powi(5) - 6.0 * (2.0 - q).powi(5))
            } else if r < 3.0 * h {
                alpha_d * (3.0 - q).powi(5)
            } else {
                0.0
            }
        }
    }
}

/// Gradient magnitude `dW/dr(r, kh)`, signed. Zero outside compact support (I4).
pub fn grad_w(r: f64, kh: f64, kernel: Kernel) -> f64 {
    let h = kernel.h_from_kh(kh);
    let q = r / h;
    match kernel {
        Kernel::Gaussian => {
            let alpha_d = 1.0 / (PI.powf(1.5) * h * h * h);
            if r < h {
                (alpha_d / h) * (-2.0 * q) * (-q * q).exp()
            } else {
                0.0
            }
        }
        Kernel::BellShaped => {
            let alpha_d = 6.5625 / (PI * h * h * h);
            if r < h {
                (alpha_d / h) * 3.0 * ((1.0 - q).powi(3) - (1.0 + 3.0 * q) * (1.0 - q).powi(2))
            } else {
                0.0
            }
        }
        Kernel::CubicSpline => {
            let alpha_d = 1.5 / (PI * h * h * h);
            if r < h {
                (alpha_d / h) * (1.5 * q * q - 2.0 * q)
            } else if r < 2.0 * h {
                (alpha_d / h) * (-0.5 * (2.0 - q) * (2.0 - q))
            } else {
                0.0
            }
        }
        Kernel::Quadratic => {
            let alpha_d = 1.25 / (PI * h * h * h);
            if r < 2.0 * h {
                (alpha_d / h) * (0.375 * q - 0.75)
            } else {
                0.0
            }
        }
        Kernel::Quintic => {
            let alpha_d = 1.3125 / (PI * h * h * h);
            if r < 2.0 * h {
                (alpha_d / h) * (-5.0 * q) * (1.0 - 0.5 * q).powi(3)
            } else {
                0.0
            }
        }
        Kernel::QuinticSpline => {
            let alpha_d = 3.0 / (359.0 * PI * h * h * h);
            if r < h {
                (alpha_d / h) * (-5.0 * (3.0 - q).powi(4) + 30.0 * (2.0 - q).powi(4) - 75.0 * (1.0 - q).powi(4))
            } else if r < 2.0 * h {
                (alpha_d / h) * (-5.0 * (3.0 - q).powi(4) + 30.0 * (2.0 - q).powi(4))
            } else if r < 3.0 * h {
                (alpha_d / h) * (-5.0 * (3.0 - q).powi(4))
            } else {
                0.0
            }
        }
    }
}

/// A uniformly-sampled gradient table over `[0, kh]`, `resolution` points
/// inclusive of both ends (`kernelGradPre`). Runtime lookup rounds to the
/// nearest sample.
pub struct GradientTable {
    kh: f64,
    resolution: usize,
    samples: Vec<f64>,
}

impl GradientTable {
    /// # Panics
    /// Panics if `resolution <= 1`: an unsampleable table is a contract
    /// violation by the caller, not a runtime condition (spec §4.1).
    pub fn new(kernel: Kernel, kh: f64, resolution: usize) -> Self {
        assert!(resolution > 1, "gradient table resolution must exceed 1");
        let increment = kh / (resolution as f64 - 1.0);
        let samples = (0..resolution).map(|i| grad_w(i as f64 * increment, kh, kernel)).collect();
        Self { kh, resolution, samples }
    }

    /// Looks up the nearest precomputed sample for `r` (`indexSamples`).
    pub fn lookup(&self, r: f64) -> f64 {
        let index = (r * (self.resolution as f64 - 1.0) / self.kh).round();
        let index = index.clamp(0.0, (self.resolution - 1) as f64) as usize;
        self.samples[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_kernels_vanish_beyond_support() {
        for kernel in [
            Kernel::Gaussian,
            Kernel::BellShaped,
            Kernel::CubicSpline,
            Kernel::Quadratic,
            Kernel::Quintic,
            Kernel::QuinticSpline,
        ] {
            let kh = 0.05;
            let support = kernel.support(kh);
            assert_eq!(w(support * 1.01, kh, kernel), 0.0);
            assert_eq!(grad_w(support * 1.01, kh, kernel), 0.0);
        }
    }

    #[test]
    fn cubic_spline_is_positive_at_origin() {
        let kh = 0.04;
        assert!(w(0.0, kh, Kernel::CubicSpline) > 0.0);
        assert_eq!(grad_w(0.0, kh, Kernel::CubicSpline), 0.0);
    }

    #[test]
    fn gradient_table_matches_analytic_at_sample_points() {
        let kh = 0.06;
        let table = GradientTable::new(Kernel::QuinticSpline, kh, 64);
        for i in 0..64 {
            let r = i as f64 * kh / 63.0;
            let analytic = grad_w(r, kh, Kernel::QuinticSpline);
            let looked_up = table.lookup(r);
            assert!((analytic - looked_up).abs() < 1e-9, "sample {i}: {analytic} vs {looked_up}");
        }
    }

    #[test]
    fn from_key_parses_all_parameter_file_spellings() {
        assert_eq!(Kernel::from_key("Gaussian"), Some(Kernel::Gaussian));
        assert_eq!(Kernel::from_key("Quintic_spline"), Some(Kernel::QuinticSpline));
        assert_eq!(Kernel::from_key("nonsense"), None);
    }
}
