//! The fixed set of functions an expression may call

use std::collections::HashMap;
use std::fmt;

/// Functions understood by the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `spec(name)` - catalog or file spectrum
    Spec,
    /// `unit(value, fluxunit)` - flat spectrum
    Unit,
    /// `band(keyword, ...)` - obsmode bandpass
    Band,
    /// `rn(spectrum, bandpass, value, fluxunit)` - renormalization
    Renorm,
    /// `z(spectrum, redshift)`
    Redshift,
    /// `ebmv(ebmv)` - Milky Way average extinction
    Ebmv,
    /// `ebmvx(ebmv, law)`
    Ebmvx,
    /// `et(spectrum, seconds)` - exposure time scaling
    ExposureTime,
    /// `bb(temperature)`
    Blackbody,
    /// `pl(refwave, index, fluxunit)`
    PowerLaw,
    /// `box(center, width)`
    Box,
    /// `em(center, fwhm, flux, fluxunit)`
    Emission,
}

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(1) => write!(f, "1 argument"),
            Arity::Exactly(n) => write!(f, "{n} arguments"),
            Arity::AtLeast(n) => write!(f, "at least {n} argument(s)"),
        }
    }
}

const FUNCTIONS: &[(&str, Function, Arity)] = &[
    ("spec", Function::Spec, Arity::Exactly(1)),
    ("unit", Function::Unit, Arity::Exactly(2)),
    ("band", Function::Band, Arity::AtLeast(1)),
    ("rn", Function::Renorm, Arity::Exactly(4)),
    ("z", Function::Redshift, Arity::Exactly(2)),
    ("ebmv", Function::Ebmv, Arity::Exactly(1)),
    ("ebmvx", Function::Ebmvx, Arity::Exactly(2)),
    ("et", Function::ExposureTime, Arity::Exactly(2)),
    ("bb", Function::Blackbody, Arity::Exactly(1)),
    ("pl", Function::PowerLaw, Arity::Exactly(3)),
    ("box", Function::Box, Arity::Exactly(2)),
    ("em", Function::Emission, Arity::Exactly(4)),
];

/// Name to function lookup, built once per evaluator
pub fn registry() -> HashMap<&'static str, (Function, Arity)> {
    FUNCTIONS
        .iter()
        .map(|&(name, function, arity)| (name, (function, arity)))
        .collect()
}
