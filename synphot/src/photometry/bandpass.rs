//! Wavelength-dependent throughput of an instrument configuration

use ndarray::Array1;
use thiserror::Error;

use super::spectrum::{interpolate, merge_wavesets, validate_table, SpectrumError};

/// Errors that can occur while building a bandpass
#[derive(Debug, Error, PartialEq)]
pub enum BandpassError {
    #[error(transparent)]
    Table(#[from] SpectrumError),

    #[error("Throughput values must be non-negative")]
    Negative,

    #[error("Box width must be positive, got {0}")]
    InvalidWidth(f64),
}

/// Models the throughput of an instrument across a range of wavelengths
///
/// Stores wavelength/throughput pairs and linearly interpolates between
/// them. Outside the tabulated range the throughput is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Bandpass {
    name: String,

    /// Wavelengths in Angstrom
    wave: Array1<f64>,

    /// Dimensionless throughput at each wavelength
    throughput: Array1<f64>,
}

impl Bandpass {
    /// Create a box-shaped bandpass with unit throughput
    ///
    /// # Arguments
    ///
    /// * `center` - Central wavelength in Angstrom
    /// * `width` - Full width in Angstrom
    ///
    /// # Returns
    /// A Result containing the new Bandpass or an error
    pub fn from_box(center: f64, width: f64) -> Result<Self, BandpassError> {
        if !(width > 0.0) {
            return Err(BandpassError::InvalidWidth(width));
        }

        let low = center - width / 2.0;
        let high = center + width / 2.0;

        // Small enough to leave the integral alone, large enough to survive
        // rounding at typical wavelengths
        let smol = 1e-5;

        let wavelengths = vec![low - smol, low, high, high + smol];
        let throughput = vec![0.0, 1.0, 1.0, 0.0];

        Self::from_table(format!("box({center},{width})"), wavelengths, throughput)
    }

    /// Create a new Bandpass from wavelength and throughput tables
    ///
    /// # Arguments
    ///
    /// * `name` - Descriptive name carried for diagnostics
    /// * `wavelengths` - Wavelengths in Angstrom, must be in ascending order
    /// * `throughput` - Throughput values for each wavelength
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The vectors have different lengths or fewer than two points
    /// - Wavelengths are not in ascending order
    /// - Any throughput value is negative or non-finite
    pub fn from_table(
        name: impl Into<String>,
        wavelengths: Vec<f64>,
        throughput: Vec<f64>,
    ) -> Result<Self, BandpassError> {
        validate_table(&wavelengths, &throughput)?;

        if throughput.iter().any(|&t| t < 0.0) {
            return Err(BandpassError::Negative);
        }

        Ok(Self {
            name: name.into(),
            wave: Array1::from(wavelengths),
            throughput: Array1::from(throughput),
        })
    }

    /// Build from arrays already known to be valid
    pub(crate) fn from_arrays(
        name: impl Into<String>,
        wave: Array1<f64>,
        throughput: Array1<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            wave,
            throughput,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the bandpass, keeping its samples
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Wavelength samples in Angstrom
    pub fn wave(&self) -> &Array1<f64> {
        &self.wave
    }

    /// Throughput samples
    pub fn throughput(&self) -> &Array1<f64> {
        &self.throughput
    }

    /// Get the throughput at a specific wavelength
    ///
    /// If the wavelength is outside the defined range, returns 0.0
    pub fn at(&self, wavelength: f64) -> f64 {
        interpolate(&self.wave, &self.throughput, wavelength)
    }

    /// Returns the tabulated wavelength range as (lower, upper) in Angstrom
    pub fn range(&self) -> (f64, f64) {
        (self.wave[0], self.wave[self.wave.len() - 1])
    }

    /// Multiply every throughput sample by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            name: self.name.clone(),
            wave: self.wave.clone(),
            throughput: &self.throughput * factor,
        }
    }

    /// Product of two bandpasses on the union of their wavesets
    pub fn times(&self, other: &Bandpass) -> Self {
        let wave = merge_wavesets(&self.wave, &other.wave);
        let throughput = wave.mapv(|w| self.at(w) * other.at(w));
        Self {
            name: format!("{}*{}", self.name, other.name),
            wave,
            throughput,
        }
    }

    /// Integrate the throughput multiplied by `f` over the wavelength range
    ///
    /// # Arguments
    ///
    /// * `f` - Function of wavelength (Å) multiplied with the throughput
    pub fn integrate<F>(&self, f: F) -> f64
    where
        F: Fn(f64) -> f64,
    {
        let mut sum = 0.0;

        for i in 0..self.wave.len() - 1 {
            let x1 = self.wave[i];
            let x2 = self.wave[i + 1];
            let y1 = self.throughput[i] * f(x1);
            let y2 = self.throughput[i + 1] * f(x2);

            sum += (x2 - x1) * (y1 + y2) / 2.0;
        }

        sum
    }

    /// Equivalent width in Angstrom, the integral of the throughput
    pub fn equivalent_width(&self) -> f64 {
        self.integrate(|_| 1.0)
    }

    /// Pivot wavelength in Angstrom, `sqrt(∫Tλ dλ / ∫T/λ dλ)`
    pub fn pivot_wavelength(&self) -> f64 {
        let num = self.integrate(|w| w);
        let den = self.integrate(|w| 1.0 / w);
        (num / den).sqrt()
    }
}
