//! Spectrum-through-bandpass quantities: effective wavelength, count rate
//! and renormalization.

use ndarray::Array1;
use thiserror::Error;

use super::bandpass::Bandpass;
use super::spectrum::{SourceSpectrum, SpectrumError};
use super::trapezoid::trap_integrate_samples;
use super::units::FluxUnit;

#[derive(Debug, Error, PartialEq)]
pub enum ObservationError {
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error("Spectrum {spectrum} has no flux through bandpass {bandpass}")]
    NoOverlap { spectrum: String, bandpass: String },
}

/// A source spectrum observed through a bandpass
#[derive(Debug, Clone)]
pub struct Observation {
    product: SourceSpectrum,
    bandpass_name: String,
}

impl Observation {
    pub fn new(spectrum: &SourceSpectrum, bandpass: &Bandpass) -> Self {
        Self {
            product: spectrum.through(bandpass),
            bandpass_name: bandpass.name().to_string(),
        }
    }

    /// The product spectrum in photlam
    pub fn spectrum(&self) -> &SourceSpectrum {
        &self.product
    }

    /// Integrated photon flux through the bandpass, photons s⁻¹ cm⁻²
    pub fn integrated_photlam(&self) -> Result<f64, ObservationError> {
        Ok(self.product.integrate()?)
    }

    /// Detected counts per second for a collecting area in cm²
    pub fn count_rate(&self, area: f64) -> Result<f64, ObservationError> {
        Ok(self.integrated_photlam()? * area)
    }

    /// Effective wavelength in Angstrom, `∫F λ² dλ / ∫F λ dλ` with F in flam
    pub fn effective_wavelength(&self) -> Result<f64, ObservationError> {
        let wave = self.product.wave();
        let flam = self
            .product
            .flux_in(FluxUnit::Flam, None)
            .map_err(SpectrumError::from)?;

        let wave_vec = wave.to_vec();
        let num: Array1<f64> = &flam * wave * wave;
        let den: Array1<f64> = &flam * wave;
        let num = trap_integrate_samples(&wave_vec, &num.to_vec()).map_err(SpectrumError::from)?;
        let den = trap_integrate_samples(&wave_vec, &den.to_vec()).map_err(SpectrumError::from)?;

        if den == 0.0 {
            return Err(self.no_overlap());
        }
        Ok(num / den)
    }

    fn no_overlap(&self) -> ObservationError {
        ObservationError::NoOverlap {
            spectrum: self.product.name().to_string(),
            bandpass: self.bandpass_name.clone(),
        }
    }
}

/// Scale `spectrum` so its flux through `bandpass` equals `value` in `unit`
///
/// # Arguments
///
/// * `spectrum` - Spectrum to renormalize
/// * `bandpass` - Reference bandpass
/// * `value` - Target flux or magnitude
/// * `unit` - Unit of `value`
/// * `waveset` - Grid used to tabulate the flat reference spectrum
/// * `area` - Collecting area in cm², used by `counts` and `obmag`
///
/// # Returns
///
/// The scaled spectrum. Magnitude units compare against a flat 0-mag
/// reference; flux-density units against a flat spectrum of `value`.
pub fn renormalize(
    spectrum: &SourceSpectrum,
    bandpass: &Bandpass,
    value: f64,
    unit: FluxUnit,
    waveset: &Array1<f64>,
    area: f64,
) -> Result<SourceSpectrum, ObservationError> {
    let observed = Observation::new(spectrum, bandpass);
    let total = observed.integrated_photlam()?;
    if !(total > 0.0) {
        return Err(observed.no_overlap());
    }

    let (lower, upper) = bandpass.range();
    let wave = spectrum.wave();
    if wave[0] > lower || wave[wave.len() - 1] < upper {
        log::warn!(
            "Spectrum {} only partially covers bandpass {} ({lower}..{upper} Å)",
            spectrum.name(),
            bandpass.name()
        );
    }

    let factor = match unit {
        FluxUnit::Counts => value / (total * area),
        FluxUnit::ObMag => 10f64.powf(-0.4 * value) / (total * area),
        FluxUnit::AbMag | FluxUnit::StMag => {
            let reference = SourceSpectrum::flat(0.0, unit, waveset, area)?;
            let reference_total = Observation::new(&reference, bandpass).integrated_photlam()?;
            reference_total / total * 10f64.powf(-0.4 * value)
        }
        _ => {
            let reference = SourceSpectrum::flat(value, unit, waveset, area)?;
            let reference_total = Observation::new(&reference, bandpass).integrated_photlam()?;
            reference_total / total
        }
    };

    log::debug!(
        "Renormalizing {} to {value} {unit} through {} (factor {factor:e})",
        spectrum.name(),
        bandpass.name()
    );

    Ok(spectrum.scaled(factor).with_name(format!(
        "rn({},{},{value},{unit})",
        spectrum.name(),
        bandpass.name()
    )))
}
