//! Flux unit conversions
//!
//! Everything inside the crate is carried in photlam
//! (photons s⁻¹ cm⁻² Å⁻¹) on wavelengths in Angstrom. These helpers move
//! values between photlam and the units accepted in expressions.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use thiserror::Error;

use super::spectrum::CGS;

/// AB magnitude zero point, `abmag = -2.5 log10(fnu) - 48.60`
pub const AB_ZERO: f64 = 48.60;

/// ST magnitude zero point, `stmag = -2.5 log10(flam) - 21.10`
pub const ST_ZERO: f64 = 21.10;

/// Errors raised while converting flux units
#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    #[error("Unknown flux unit: {0}")]
    Unknown(String),

    #[error("Flux unit {0} requires a collecting area")]
    NeedsArea(FluxUnit),

    #[error("Flux unit {0} requires at least two wavelength samples")]
    NeedsBins(FluxUnit),

    #[error("Wavelength and flux arrays differ in length ({0} vs {1})")]
    LengthMismatch(usize, usize),
}

/// Flux units understood by the expression language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FluxUnit {
    /// photons s⁻¹ cm⁻² Å⁻¹
    Photlam,
    /// photons s⁻¹ cm⁻² Hz⁻¹
    Photnu,
    /// erg s⁻¹ cm⁻² Å⁻¹
    Flam,
    /// erg s⁻¹ cm⁻² Hz⁻¹
    Fnu,
    /// Jansky
    Jy,
    /// milliJansky
    MJy,
    AbMag,
    StMag,
    /// Magnitude of the detected counts
    ObMag,
    /// Detected counts per wavelength bin
    Counts,
}

const UNIT_NAMES: &[(&str, FluxUnit)] = &[
    ("photlam", FluxUnit::Photlam),
    ("photnu", FluxUnit::Photnu),
    ("flam", FluxUnit::Flam),
    ("fnu", FluxUnit::Fnu),
    ("jy", FluxUnit::Jy),
    ("mjy", FluxUnit::MJy),
    ("abmag", FluxUnit::AbMag),
    ("stmag", FluxUnit::StMag),
    ("obmag", FluxUnit::ObMag),
    ("counts", FluxUnit::Counts),
];

impl FromStr for FluxUnit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        UNIT_NAMES
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, unit)| *unit)
            .ok_or_else(|| UnitError::Unknown(s.to_string()))
    }
}

impl fmt::Display for FluxUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = UNIT_NAMES
            .iter()
            .find(|(_, unit)| unit == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown");
        write!(f, "{name}")
    }
}

impl FluxUnit {
    /// True for logarithmic units
    pub fn is_magnitude(self) -> bool {
        matches!(self, FluxUnit::AbMag | FluxUnit::StMag | FluxUnit::ObMag)
    }

    /// True for units defined through detected counts
    pub fn is_count_based(self) -> bool {
        matches!(self, FluxUnit::ObMag | FluxUnit::Counts)
    }

    /// Convert a single value at `wave` (Å) into photlam.
    ///
    /// `bin_width` is only consulted by count-based units, together with `area`.
    fn value_to_photlam(
        self,
        value: f64,
        wave: f64,
        area: Option<f64>,
        bin_width: f64,
    ) -> Result<f64, UnitError> {
        let hc = CGS::PLANCK_CONSTANT * CGS::SPEED_OF_LIGHT_ANGSTROM;
        let photlam = match self {
            FluxUnit::Photlam => value,
            FluxUnit::Photnu => value * CGS::SPEED_OF_LIGHT_ANGSTROM / (wave * wave),
            FluxUnit::Flam => value * wave / hc,
            FluxUnit::Fnu => value / (CGS::PLANCK_CONSTANT * wave),
            FluxUnit::Jy => value * CGS::JANSKY_IN_CGS / (CGS::PLANCK_CONSTANT * wave),
            FluxUnit::MJy => value * 1e-3 * CGS::JANSKY_IN_CGS / (CGS::PLANCK_CONSTANT * wave),
            FluxUnit::AbMag => {
                let fnu = 10f64.powf(-0.4 * (value + AB_ZERO));
                fnu / (CGS::PLANCK_CONSTANT * wave)
            }
            FluxUnit::StMag => {
                let flam = 10f64.powf(-0.4 * (value + ST_ZERO));
                flam * wave / hc
            }
            FluxUnit::ObMag | FluxUnit::Counts => {
                let area = area.ok_or(UnitError::NeedsArea(self))?;
                let counts = if self == FluxUnit::ObMag {
                    10f64.powf(-0.4 * value)
                } else {
                    value
                };
                counts / (area * bin_width)
            }
        };
        Ok(photlam)
    }

    /// Convert a single photlam value at `wave` (Å) into this unit.
    fn value_from_photlam(
        self,
        photlam: f64,
        wave: f64,
        area: Option<f64>,
        bin_width: f64,
    ) -> Result<f64, UnitError> {
        let hc = CGS::PLANCK_CONSTANT * CGS::SPEED_OF_LIGHT_ANGSTROM;
        let value = match self {
            FluxUnit::Photlam => photlam,
            FluxUnit::Photnu => photlam * wave * wave / CGS::SPEED_OF_LIGHT_ANGSTROM,
            FluxUnit::Flam => photlam * hc / wave,
            FluxUnit::Fnu => photlam * CGS::PLANCK_CONSTANT * wave,
            FluxUnit::Jy => photlam * CGS::PLANCK_CONSTANT * wave / CGS::JANSKY_IN_CGS,
            FluxUnit::MJy => photlam * CGS::PLANCK_CONSTANT * wave / (1e-3 * CGS::JANSKY_IN_CGS),
            FluxUnit::AbMag => -2.5 * (photlam * CGS::PLANCK_CONSTANT * wave).log10() - AB_ZERO,
            FluxUnit::StMag => -2.5 * (photlam * hc / wave).log10() - ST_ZERO,
            FluxUnit::ObMag | FluxUnit::Counts => {
                let area = area.ok_or(UnitError::NeedsArea(self))?;
                let counts = photlam * area * bin_width;
                if self == FluxUnit::ObMag {
                    -2.5 * counts.log10()
                } else {
                    counts
                }
            }
        };
        Ok(value)
    }

    /// Convert an array of values in this unit into photlam.
    ///
    /// # Arguments
    ///
    /// * `values` - Flux values in this unit
    /// * `wave` - Wavelengths in Angstrom, same length as `values`
    /// * `area` - Collecting area in cm², required by `counts` and `obmag`
    pub fn to_photlam(
        self,
        values: &Array1<f64>,
        wave: &Array1<f64>,
        area: Option<f64>,
    ) -> Result<Array1<f64>, UnitError> {
        self.convert(values, wave, area, Self::value_to_photlam)
    }

    /// Convert an array of photlam values into this unit.
    pub fn from_photlam(
        self,
        photlam: &Array1<f64>,
        wave: &Array1<f64>,
        area: Option<f64>,
    ) -> Result<Array1<f64>, UnitError> {
        self.convert(photlam, wave, area, Self::value_from_photlam)
    }

    fn convert<F>(
        self,
        values: &Array1<f64>,
        wave: &Array1<f64>,
        area: Option<f64>,
        per_value: F,
    ) -> Result<Array1<f64>, UnitError>
    where
        F: Fn(Self, f64, f64, Option<f64>, f64) -> Result<f64, UnitError>,
    {
        if values.len() != wave.len() {
            return Err(UnitError::LengthMismatch(wave.len(), values.len()));
        }

        let widths = if self.is_count_based() {
            if wave.len() < 2 {
                return Err(UnitError::NeedsBins(self));
            }
            bin_widths(wave)
        } else {
            Array1::ones(wave.len())
        };

        let converted = values
            .iter()
            .zip(wave.iter())
            .zip(widths.iter())
            .map(|((&v, &w), &dw)| per_value(self, v, w, area, dw))
            .collect::<Result<Vec<f64>, UnitError>>()?;

        Ok(Array1::from(converted))
    }
}

/// Widths of the bins centred on each wavelength sample.
///
/// Bin edges sit halfway between neighbouring samples; the outer edges are
/// mirrored across the first and last samples.
pub fn bin_widths(wave: &Array1<f64>) -> Array1<f64> {
    let n = wave.len();
    if n < 2 {
        return Array1::zeros(n);
    }

    let mut edges = Vec::with_capacity(n + 1);
    edges.push(wave[0] - (wave[1] - wave[0]) / 2.0);
    for i in 0..n - 1 {
        edges.push((wave[i] + wave[i + 1]) / 2.0);
    }
    edges.push(wave[n - 1] + (wave[n - 1] - wave[n - 2]) / 2.0);

    Array1::from_iter(edges.windows(2).map(|e| e[1] - e[0]))
}
