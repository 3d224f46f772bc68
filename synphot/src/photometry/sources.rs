//! Analytic source spectra
//!
//! Blackbodies, power laws and Gaussian emission lines, each realised as a
//! tabulated [`SourceSpectrum`] in photlam.

use ndarray::Array1;

use super::spectrum::{SourceSpectrum, SpectrumError, CGS};
use super::units::FluxUnit;

/// Number of samples used to tabulate an emission line
const EMISSION_LINE_SAMPLES: usize = 201;

/// Half-width of a tabulated emission line, in units of sigma
const EMISSION_LINE_SIGMAS: f64 = 5.0;

/// Blackbody photon radiance in photons s⁻¹ cm⁻² Å⁻¹ sr⁻¹
///
/// # Arguments
///
/// * `wavelength` - Wavelength in Angstrom
/// * `temperature` - Temperature in Kelvin
fn planck_photons(wavelength: f64, temperature: f64) -> f64 {
    if wavelength <= 0.0 {
        return 0.0;
    }
    // hc/k in Å·K
    let hc_over_k =
        CGS::PLANCK_CONSTANT * CGS::SPEED_OF_LIGHT_ANGSTROM / CGS::BOLTZMANN_CONSTANT;
    let x = hc_over_k / (wavelength * temperature);

    // 2c/λ⁴ with c in cm/s, λ in Å, per Å of bandwidth
    let numerator = 2.0 * CGS::SPEED_OF_LIGHT * 1e24 / wavelength.powi(4);
    let denominator = x.exp_m1();
    if denominator.is_infinite() {
        0.0
    } else {
        numerator / denominator
    }
}

/// Blackbody of `temperature` normalised to one solar radius at 1 kpc
///
/// # Arguments
///
/// * `temperature` - Temperature in Kelvin, must be positive
/// * `waveset` - Wavelength grid in Angstrom
pub fn blackbody(temperature: f64, waveset: &Array1<f64>) -> Result<SourceSpectrum, SpectrumError> {
    if !(temperature > 0.0) {
        return Err(SpectrumError::InvalidParameter(format!(
            "blackbody temperature must be positive, got {temperature}"
        )));
    }

    let dilution = std::f64::consts::PI * (CGS::SOLAR_RADIUS / CGS::KILOPARSEC).powi(2);
    let flux = waveset.mapv(|w| planck_photons(w, temperature) * dilution);

    Ok(SourceSpectrum::from_photlam(
        format!("bb({temperature})"),
        waveset.clone(),
        flux,
    ))
}

/// Power law `(λ / refwave)^index`, valued 1 in `unit` at `refwave`
pub fn power_law(
    refwave: f64,
    index: f64,
    unit: FluxUnit,
    waveset: &Array1<f64>,
    area: f64,
) -> Result<SourceSpectrum, SpectrumError> {
    if !(refwave > 0.0) {
        return Err(SpectrumError::InvalidParameter(format!(
            "power law reference wavelength must be positive, got {refwave}"
        )));
    }

    let values = waveset.mapv(|w| (w / refwave).powf(index));
    let flux = unit.to_photlam(&values, waveset, Some(area))?;

    Ok(SourceSpectrum::from_photlam(
        format!("pl({refwave},{index},{unit})"),
        waveset.clone(),
        flux,
    ))
}

/// Gaussian emission line carrying a total flux of `total_flux`
///
/// # Arguments
///
/// * `center` - Line centre in Angstrom
/// * `fwhm` - Full width at half maximum in Angstrom
/// * `total_flux` - Integrated line flux
/// * `unit` - `flam` (erg s⁻¹ cm⁻² total) or `photlam` (photons s⁻¹ cm⁻² total)
///
/// # Returns
///
/// A spectrum tabulated over ±5σ around the centre
pub fn emission_line(
    center: f64,
    fwhm: f64,
    total_flux: f64,
    unit: FluxUnit,
) -> Result<SourceSpectrum, SpectrumError> {
    if !(center > 0.0) || !(fwhm > 0.0) {
        return Err(SpectrumError::InvalidParameter(format!(
            "emission line needs positive center and fwhm, got {center} and {fwhm}"
        )));
    }
    if !matches!(unit, FluxUnit::Flam | FluxUnit::Photlam) {
        return Err(SpectrumError::InvalidParameter(format!(
            "emission line flux must be given in flam or photlam, got {unit}"
        )));
    }

    let sigma = fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
    let half_width = (EMISSION_LINE_SIGMAS * sigma).min(center * 0.999);
    let wave = Array1::linspace(center - half_width, center + half_width, EMISSION_LINE_SAMPLES);

    let peak = total_flux / (sigma * (2.0 * std::f64::consts::PI).sqrt());
    let profile = wave.mapv(|w| peak * (-(w - center).powi(2) / (2.0 * sigma * sigma)).exp());
    let flux = unit.to_photlam(&profile, &wave, None)?;

    Ok(SourceSpectrum::from_photlam(
        format!("em({center},{fwhm},{total_flux},{unit})"),
        wave,
        flux,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_blackbody_peaks_near_wien_wavelength() {
        let waveset = Array1::linspace(1000.0, 20000.0, 1901);
        let sp = blackbody(5800.0, &waveset).unwrap();

        // The photon spectrum peaks at hc/(3.92 kT), about 6330 Å for the Sun
        let (imax, _) = sp
            .flux()
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        let peak = waveset[imax];
        assert!(peak > 6000.0 && peak < 6700.0, "peak at {peak}");
    }

    #[test]
    fn test_blackbody_rejects_non_positive_temperature() {
        assert!(blackbody(0.0, &array![1000.0, 2000.0]).is_err());
    }

    #[test]
    fn test_power_law_is_one_at_reference() {
        let waveset = array![1000.0, 2000.0, 4000.0];
        let sp = power_law(2000.0, -2.0, FluxUnit::Photlam, &waveset, 1.0).unwrap();
        assert_relative_eq!(sp.flux()[1], 1.0);
        assert_relative_eq!(sp.flux()[0], 4.0);
        assert_relative_eq!(sp.flux()[2], 0.25);
    }

    #[test]
    fn test_emission_line_total_photlam() {
        let sp = emission_line(6563.0, 10.0, 1e-3, FluxUnit::Photlam).unwrap();
        assert_relative_eq!(sp.integrate().unwrap(), 1e-3, max_relative = 1e-3);
        assert!(emission_line(6563.0, 10.0, 1.0, FluxUnit::AbMag).is_err());
    }
}
