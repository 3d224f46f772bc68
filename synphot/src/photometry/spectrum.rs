//! Spectrum model for synthetic photometry
//!
//! A [`SourceSpectrum`] is a tabulated flux density in photlam sampled on an
//! ascending wavelength grid in Angstrom. Between samples the flux is
//! linearly interpolated; outside the grid it is zero.

use ndarray::Array1;
use thiserror::Error;

use super::bandpass::Bandpass;
use super::trapezoid::{trap_integrate_samples, TrapezoidError};
use super::units::{FluxUnit, UnitError};

/// Constants in CGS units
pub struct CGS {}

impl CGS {
    /// AB magnitude system zero-point flux density
    /// Units: 3631e-23 erg s⁻¹ cm⁻² Hz⁻¹
    pub const AB_ZERO_POINT_FLUX_DENSITY: f64 = 3631e-23;

    /// 1 Jansky in CGS units
    /// Units: 1e-23 erg s⁻¹ cm⁻² Hz⁻¹
    pub const JANSKY_IN_CGS: f64 = 1e-23;

    /// Planck's constant
    /// Units: 6.62607015e-27 erg⋅s (erg-seconds in CGS)
    pub const PLANCK_CONSTANT: f64 = 6.62607015e-27;

    /// Speed of light in vacuum
    /// Units: 2.99792458e10 cm/s (centimeters per second in CGS)
    pub const SPEED_OF_LIGHT: f64 = 2.99792458e10;

    /// Speed of light in Angstrom per second
    pub const SPEED_OF_LIGHT_ANGSTROM: f64 = 2.99792458e18;

    /// Boltzmann constant
    /// Units: erg/K
    pub const BOLTZMANN_CONSTANT: f64 = 1.380649e-16;

    /// Solar radius in cm
    pub const SOLAR_RADIUS: f64 = 6.957e10;

    /// One kiloparsec in cm
    pub const KILOPARSEC: f64 = 3.0856775814913673e21;
}

/// Errors that can occur with spectrum operations
#[derive(Debug, Error, PartialEq)]
pub enum SpectrumError {
    #[error("Wavelength and flux vectors must have the same length")]
    LengthMismatch,

    #[error("A tabulated spectrum needs at least two samples")]
    TooFewPoints,

    #[error("Wavelengths must be in ascending order")]
    NotAscending,

    #[error("Wavelengths and fluxes must be finite")]
    NonFinite,

    #[error("Redshift must be greater than -1, got {0}")]
    InvalidRedshift(f64),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Integration(#[from] TrapezoidError),
}

/// Check that a wavelength/value table is usable for interpolation
pub(crate) fn validate_table(wave: &[f64], values: &[f64]) -> Result<(), SpectrumError> {
    if wave.len() != values.len() {
        return Err(SpectrumError::LengthMismatch);
    }
    if wave.len() < 2 {
        return Err(SpectrumError::TooFewPoints);
    }
    if wave.iter().chain(values.iter()).any(|v| !v.is_finite()) {
        return Err(SpectrumError::NonFinite);
    }
    if wave.windows(2).any(|w| w[1] <= w[0]) {
        return Err(SpectrumError::NotAscending);
    }
    Ok(())
}

/// Linear interpolation on an ascending grid, zero outside the grid
pub(crate) fn interpolate(wave: &Array1<f64>, values: &Array1<f64>, at: f64) -> f64 {
    let n = wave.len();
    if n == 0 || at < wave[0] || at > wave[n - 1] {
        return 0.0;
    }

    if n == 1 {
        return values[0];
    }

    // invariant: wave[lower] <= at <= wave[upper]
    let (mut lower, mut upper) = (0, n - 1);
    while upper - lower > 1 {
        let mid = (lower + upper) / 2;
        if wave[mid] <= at {
            lower = mid;
        } else {
            upper = mid;
        }
    }

    let t = (at - wave[lower]) / (wave[upper] - wave[lower]);
    values[lower] * (1.0 - t) + values[upper] * t
}

/// Sorted union of two wavelength grids
pub(crate) fn merge_wavesets(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    let mut merged: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    merged.sort_by(f64::total_cmp);
    merged.dedup();
    Array1::from(merged)
}

/// A tabulated source spectrum in photlam
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpectrum {
    name: String,

    /// Wavelengths in Angstrom
    wave: Array1<f64>,

    /// Flux density in photlam at each wavelength
    flux: Array1<f64>,
}

impl SourceSpectrum {
    /// Create a spectrum from a wavelength/flux table
    ///
    /// # Arguments
    ///
    /// * `name` - Descriptive name carried for diagnostics
    /// * `wave` - Wavelengths in Angstrom, strictly ascending
    /// * `flux` - Flux values expressed in `unit`
    /// * `unit` - Unit of `flux`; count-based units are rejected
    pub fn from_table(
        name: impl Into<String>,
        wave: Vec<f64>,
        flux: Vec<f64>,
        unit: FluxUnit,
    ) -> Result<Self, SpectrumError> {
        validate_table(&wave, &flux)?;
        let wave = Array1::from(wave);
        let flux = unit.to_photlam(&Array1::from(flux), &wave, None)?;
        Ok(Self {
            name: name.into(),
            wave,
            flux,
        })
    }

    /// Create a spectrum directly from photlam samples.
    ///
    /// The caller guarantees the grid is ascending and matches `flux`.
    pub(crate) fn from_photlam(
        name: impl Into<String>,
        wave: Array1<f64>,
        flux: Array1<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            wave,
            flux,
        }
    }

    /// A spectrum that is constant in `unit`, sampled on `waveset`
    ///
    /// # Arguments
    ///
    /// * `value` - Flux value in `unit`
    /// * `unit` - Unit of `value`
    /// * `waveset` - Wavelength grid in Angstrom
    /// * `area` - Collecting area in cm², used by count-based units
    pub fn flat(
        value: f64,
        unit: FluxUnit,
        waveset: &Array1<f64>,
        area: f64,
    ) -> Result<Self, SpectrumError> {
        let values = Array1::from_elem(waveset.len(), value);
        let flux = unit.to_photlam(&values, waveset, Some(area))?;
        Ok(Self {
            name: format!("unit({value},{unit})"),
            wave: waveset.clone(),
            flux,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the spectrum, keeping its samples
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Wavelength samples in Angstrom
    pub fn wave(&self) -> &Array1<f64> {
        &self.wave
    }

    /// Flux samples in photlam
    pub fn flux(&self) -> &Array1<f64> {
        &self.flux
    }

    /// Flux samples converted to `unit`
    pub fn flux_in(&self, unit: FluxUnit, area: Option<f64>) -> Result<Array1<f64>, UnitError> {
        unit.from_photlam(&self.flux, &self.wave, area)
    }

    /// Flux in photlam at `wavelength` (Å), zero outside the table
    pub fn sample(&self, wavelength: f64) -> f64 {
        interpolate(&self.wave, &self.flux, wavelength)
    }

    /// Multiply every flux sample by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            name: self.name.clone(),
            wave: self.wave.clone(),
            flux: &self.flux * factor,
        }
    }

    /// Shift the spectrum to redshift `z`; fluxes are kept per sample
    pub fn redshifted(&self, z: f64) -> Result<Self, SpectrumError> {
        if !(z > -1.0) {
            return Err(SpectrumError::InvalidRedshift(z));
        }
        Ok(Self {
            name: format!("z({},{z})", self.name),
            wave: &self.wave * (1.0 + z),
            flux: self.flux.clone(),
        })
    }

    /// Sum of two spectra on the union of their wavesets
    pub fn plus(&self, other: &SourceSpectrum) -> Self {
        let wave = merge_wavesets(&self.wave, &other.wave);
        let flux = wave.mapv(|w| self.sample(w) + other.sample(w));
        Self {
            name: format!("{}+{}", self.name, other.name),
            wave,
            flux,
        }
    }

    /// Difference of two spectra on the union of their wavesets
    pub fn minus(&self, other: &SourceSpectrum) -> Self {
        let wave = merge_wavesets(&self.wave, &other.wave);
        let flux = wave.mapv(|w| self.sample(w) - other.sample(w));
        Self {
            name: format!("{}-{}", self.name, other.name),
            wave,
            flux,
        }
    }

    /// Spectrum seen through a bandpass, sampled on both wavesets
    pub fn through(&self, bandpass: &Bandpass) -> Self {
        let wave = merge_wavesets(&self.wave, bandpass.wave());
        let flux = wave.mapv(|w| self.sample(w) * bandpass.at(w));
        Self {
            name: format!("{}*{}", bandpass.name(), self.name),
            wave,
            flux,
        }
    }

    /// Integrated photon flux in photons s⁻¹ cm⁻²
    pub fn integrate(&self) -> Result<f64, SpectrumError> {
        let wave = self.wave.to_vec();
        let flux = self.flux.to_vec();
        Ok(trap_integrate_samples(&wave, &flux)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn ramp() -> SourceSpectrum {
        SourceSpectrum::from_table(
            "ramp",
            vec![1000.0, 2000.0, 3000.0],
            vec![0.0, 1.0, 2.0],
            FluxUnit::Photlam,
        )
        .unwrap()
    }

    #[test]
    fn test_table_validation() {
        let err = SourceSpectrum::from_table("x", vec![1.0, 2.0], vec![1.0], FluxUnit::Photlam);
        assert_eq!(err, Err(SpectrumError::LengthMismatch));

        let err =
            SourceSpectrum::from_table("x", vec![2.0, 1.0], vec![1.0, 1.0], FluxUnit::Photlam);
        assert_eq!(err, Err(SpectrumError::NotAscending));

        let err = SourceSpectrum::from_table("x", vec![2.0], vec![1.0], FluxUnit::Photlam);
        assert_eq!(err, Err(SpectrumError::TooFewPoints));
    }

    #[test]
    fn test_sample_interpolates_and_zeroes_outside() {
        let sp = ramp();
        assert_relative_eq!(sp.sample(1500.0), 0.5);
        assert_relative_eq!(sp.sample(3000.0), 2.0);
        assert_eq!(sp.sample(999.0), 0.0);
        assert_eq!(sp.sample(3001.0), 0.0);
    }

    #[test]
    fn test_flat_flam_is_not_flat_in_photlam() {
        let waveset = array![1000.0, 2000.0];
        let sp = SourceSpectrum::flat(1.0, FluxUnit::Flam, &waveset, 1.0).unwrap();
        // photlam = flam × λ / hc, so doubling λ doubles photlam
        assert_relative_eq!(sp.flux()[1] / sp.flux()[0], 2.0, max_relative = 1e-12);

        let flam = sp.flux_in(FluxUnit::Flam, None).unwrap();
        assert_relative_eq!(flam[0], 1.0, max_relative = 1e-12);
        assert_relative_eq!(flam[1], 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_redshift_stretches_waveset() {
        let sp = ramp().redshifted(1.0).unwrap();
        assert_eq!(sp.wave(), &array![2000.0, 4000.0, 6000.0]);
        assert_eq!(sp.flux(), &array![0.0, 1.0, 2.0]);
        assert!(ramp().redshifted(-1.0).is_err());
    }

    #[test]
    fn test_plus_merges_wavesets() {
        let a = ramp();
        let b = SourceSpectrum::from_table(
            "b",
            vec![1500.0, 2500.0],
            vec![1.0, 1.0],
            FluxUnit::Photlam,
        )
        .unwrap();
        let sum = a.plus(&b);
        assert_eq!(sum.wave().len(), 5);
        assert_relative_eq!(sum.sample(2000.0), 2.0);
        assert_relative_eq!(sum.sample(1000.0), 0.0);
    }

    #[test]
    fn test_integrate() {
        // triangle-ish ramp: 1000*(0+1)/2 + 1000*(1+2)/2 = 2000
        assert_relative_eq!(ramp().integrate().unwrap(), 2000.0);
    }
}
