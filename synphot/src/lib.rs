//! Synthetic photometry expressions
//!
//! This crate turns textual source and bandpass descriptions such as
//! `rn(unit(1.,flam),band(stis,ccd,g430m,c4451,52X0.2),10.0,abmag)` into
//! tabulated spectra and throughput curves, using calibration tables found
//! under the `PYSYN_CDBS` root.
//!
//! * [`parser`] - tokenizer and recursive descent parser
//! * [`eval`] - evaluator dispatching function calls to constructors
//! * [`refs`] - reference data: tables, collecting area, default waveset
//! * [`photometry`] - spectra, bandpasses, unit conversions, integration
//! * [`io`] / [`obsmode`] - table reading and obsmode graph traversal

pub mod eval;
pub mod io;
pub mod obsmode;
pub mod parser;
pub mod photometry;
pub mod refs;

pub use eval::{EvalError, Evaluator, SpectrumLike};
pub use photometry::{Bandpass, FluxUnit, Observation, SourceSpectrum};
pub use refs::{configure_references, query_references, RefOverrides, RefSnapshot};

/// Evaluate `text` against the process-wide reference data
///
/// # Arguments
///
/// * `text` - Expression such as `rn(bb(5000),band(johnson,v),10,abmag)`
///
/// # Returns
///
/// The resulting spectrum or bandpass
pub fn evaluate_expression(text: &str) -> Result<SpectrumLike, EvalError> {
    Evaluator::new(refs::global()).evaluate_str(text)
}
