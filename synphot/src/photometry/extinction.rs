//! Interstellar extinction laws
//!
//! Each law gives A(λ)/E(B-V); an extinction curve for a given E(B-V) is a
//! [`Bandpass`] with throughput `10^(-0.4 E(B-V) k(λ))`.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use thiserror::Error;

use super::bandpass::Bandpass;

#[derive(Debug, Error, PartialEq)]
pub enum ExtinctionError {
    #[error("Unknown extinction law: {0}")]
    UnknownLaw(String),
}

/// Supported reddening laws
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtinctionLaw {
    /// Cardelli, Clayton & Mathis (1989) Milky Way curve with the given Rv
    Cardelli { rv: f64 },
    /// Calzetti et al. (2000) starburst attenuation, Rv = 4.05
    Calzetti,
}

const LAW_NAMES: &[(&str, ExtinctionLaw)] = &[
    ("gal1", ExtinctionLaw::Cardelli { rv: 3.1 }),
    ("mwavg", ExtinctionLaw::Cardelli { rv: 3.1 }),
    ("mwrv21", ExtinctionLaw::Cardelli { rv: 2.1 }),
    ("mwrv4", ExtinctionLaw::Cardelli { rv: 4.0 }),
    ("xgal", ExtinctionLaw::Calzetti),
    ("xgalsb", ExtinctionLaw::Calzetti),
];

impl FromStr for ExtinctionLaw {
    type Err = ExtinctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        LAW_NAMES
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, law)| *law)
            .ok_or_else(|| ExtinctionError::UnknownLaw(s.to_string()))
    }
}

impl fmt::Display for ExtinctionLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtinctionLaw::Cardelli { rv } => write!(f, "ccm89(rv={rv})"),
            ExtinctionLaw::Calzetti => write!(f, "calzetti00"),
        }
    }
}

impl ExtinctionLaw {
    /// A(λ)/E(B-V) at `wavelength` in Angstrom
    pub fn k(&self, wavelength: f64) -> f64 {
        match *self {
            ExtinctionLaw::Cardelli { rv } => {
                let (a, b) = ccm89_coefficients(1e4 / wavelength);
                rv * a + b
            }
            ExtinctionLaw::Calzetti => calzetti00(wavelength / 1e4),
        }
    }

    /// Extinction curve for colour excess `ebmv`, sampled on `waveset`
    pub fn curve(&self, ebmv: f64, waveset: &Array1<f64>) -> Bandpass {
        let throughput = waveset.mapv(|w| 10f64.powf(-0.4 * ebmv * self.k(w)));
        Bandpass::from_arrays(format!("ebmvx({ebmv},{self})"), waveset.clone(), throughput)
    }
}

/// CCM89 a(x) and b(x) for inverse wavelength `x` in μm⁻¹, clamped to 0.3–10
fn ccm89_coefficients(x: f64) -> (f64, f64) {
    let x = x.clamp(0.3, 10.0);

    if x < 1.1 {
        let p = x.powf(1.61);
        (0.574 * p, -0.527 * p)
    } else if x < 3.3 {
        let y = x - 1.82;
        let a = 1.0 + 0.17699 * y - 0.50447 * y.powi(2) - 0.02427 * y.powi(3)
            + 0.72085 * y.powi(4)
            + 0.01979 * y.powi(5)
            - 0.77530 * y.powi(6)
            + 0.32999 * y.powi(7);
        let b = 1.41338 * y + 2.28305 * y.powi(2) + 1.07233 * y.powi(3)
            - 5.38434 * y.powi(4)
            - 0.62251 * y.powi(5)
            + 5.30260 * y.powi(6)
            - 2.09002 * y.powi(7);
        (a, b)
    } else if x <= 8.0 {
        let (fa, fb) = if x < 5.9 {
            (0.0, 0.0)
        } else {
            let d = x - 5.9;
            (
                -0.04473 * d.powi(2) - 0.009779 * d.powi(3),
                0.2130 * d.powi(2) + 0.1207 * d.powi(3),
            )
        };
        let a = 1.752 - 0.316 * x - 0.104 / ((x - 4.67).powi(2) + 0.341) + fa;
        let b = -3.090 + 1.825 * x + 1.206 / ((x - 4.62).powi(2) + 0.263) + fb;
        (a, b)
    } else {
        let d = x - 8.0;
        let a = -1.073 - 0.628 * d + 0.137 * d.powi(2) - 0.070 * d.powi(3);
        let b = 13.670 + 4.257 * d - 0.420 * d.powi(2) + 0.374 * d.powi(3);
        (a, b)
    }
}

/// Calzetti (2000) k(λ) for wavelength in μm, clamped to 0.12–2.2 μm
fn calzetti00(microns: f64) -> f64 {
    const RV: f64 = 4.05;
    let lam = microns.clamp(0.12, 2.2);
    let k = if lam >= 0.63 {
        2.659 * (-1.857 + 1.040 / lam) + RV
    } else {
        2.659 * (-2.156 + 1.509 / lam - 0.198 / lam.powi(2) + 0.011 / lam.powi(3)) + RV
    };
    k.max(0.0)
}
