//! Photometry models and utilities

pub mod bandpass;
pub mod extinction;
pub mod observation;
pub mod sources;
pub mod spectrum;
pub mod trapezoid;
pub mod units;

pub use bandpass::{Bandpass, BandpassError};
pub use extinction::{ExtinctionError, ExtinctionLaw};
pub use observation::{renormalize, Observation, ObservationError};
pub use spectrum::{SourceSpectrum, SpectrumError, CGS};
pub use trapezoid::{trap_integrate_samples, TrapezoidError};
pub use units::{FluxUnit, UnitError};
