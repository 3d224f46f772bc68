//! Default wavelength grid used to tabulate analytic spectra

use std::fmt;

use ndarray::Array1;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WavesetError {
    #[error("Waveset minimum must be positive, got {0}")]
    NonPositiveMin(f64),

    #[error("Waveset maximum {max} must exceed minimum {min}")]
    EmptyRange { min: f64, max: f64 },

    #[error("Waveset needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("Waveset delta must be positive, got {0}")]
    NonPositiveDelta(f64),

    #[error("Waveset would need {0} points, more than the limit of {MAX_POINTS}")]
    TooManyPoints(f64),
}

/// Largest grid a waveset may realize to
pub const MAX_POINTS: usize = 10_000_000;

/// Parameters describing a waveset
///
/// With `delta` set, `num` is ignored and the point count is derived so the
/// spacing is as close to `delta` as possible while keeping both endpoints.
/// When `log` is true, `delta` is a spacing in log10 space.
#[derive(Debug, Clone, PartialEq)]
pub struct WavesetSpec {
    /// First wavelength in Angstrom
    pub minwave: f64,
    /// Last wavelength in Angstrom
    pub maxwave: f64,
    pub num: usize,
    pub delta: Option<f64>,
    pub log: bool,
}

impl Default for WavesetSpec {
    /// 10000 log-spaced points from 500 to 26000 Å
    fn default() -> Self {
        Self {
            minwave: 500.0,
            maxwave: 26000.0,
            num: 10000,
            delta: None,
            log: true,
        }
    }
}

impl WavesetSpec {
    pub fn validate(&self) -> Result<(), WavesetError> {
        if !(self.minwave > 0.0) {
            return Err(WavesetError::NonPositiveMin(self.minwave));
        }
        if !(self.maxwave > self.minwave) {
            return Err(WavesetError::EmptyRange {
                min: self.minwave,
                max: self.maxwave,
            });
        }
        match self.delta {
            Some(delta) if !(delta > 0.0) => return Err(WavesetError::NonPositiveDelta(delta)),
            None if self.num < 2 => return Err(WavesetError::TooFewPoints(self.num)),
            _ => {}
        }
        self.point_count().map(|_| ())
    }

    /// Number of samples this range realizes to
    ///
    /// # Errors
    ///
    /// `TooManyPoints` when the count exceeds [`MAX_POINTS`], including a
    /// `delta` so small the count is not finite
    pub fn point_count(&self) -> Result<usize, WavesetError> {
        let count = match self.delta {
            None => self.num as f64,
            Some(delta) => {
                let span = if self.log {
                    self.maxwave.log10() - self.minwave.log10()
                } else {
                    self.maxwave - self.minwave
                };
                ((span / delta).round() + 1.0).max(2.0)
            }
        };
        if !(count <= MAX_POINTS as f64) {
            return Err(WavesetError::TooManyPoints(count));
        }
        Ok(count as usize)
    }

    /// Human-readable description in `Min/Max/Num/Delta/Log` form
    pub fn descriptor(&self) -> String {
        let (num, delta) = match self.delta {
            Some(delta) => ("None".to_string(), delta.to_string()),
            None => (self.num.to_string(), "None".to_string()),
        };
        format!(
            "Min: {}, Max: {}, Num: {num}, Delta: {delta}, Log: {}",
            self.minwave, self.maxwave, self.log
        )
    }
}

/// A realized wavelength grid
#[derive(Debug, Clone, PartialEq)]
pub struct Waveset {
    spec: WavesetSpec,
    samples: Array1<f64>,
}

impl Waveset {
    /// Realize `spec`, checking it first
    ///
    /// # Returns
    ///
    /// A grid whose first and last samples are exactly `minwave` and
    /// `maxwave`, spaced evenly in linear or log10 space
    pub fn new(spec: WavesetSpec) -> Result<Self, WavesetError> {
        spec.validate()?;
        let n = spec.point_count()?;
        Ok(Self::realize(spec, n))
    }

    /// Tabulate a validated spec into `n` samples
    fn realize(spec: WavesetSpec, n: usize) -> Self {

        let mut samples = if spec.log {
            Array1::logspace(10.0, spec.minwave.log10(), spec.maxwave.log10(), n)
        } else {
            Array1::linspace(spec.minwave, spec.maxwave, n)
        };
        // logspace round-trips through log10
        samples[0] = spec.minwave;
        samples[n - 1] = spec.maxwave;

        Self { spec, samples }
    }

    pub fn spec(&self) -> &WavesetSpec {
        &self.spec
    }

    /// Wavelength samples in Angstrom
    pub fn samples(&self) -> &Array1<f64> {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn descriptor(&self) -> String {
        self.spec.descriptor()
    }
}

impl Default for Waveset {
    fn default() -> Self {
        let spec = WavesetSpec::default();
        let n = spec.num;
        Self::realize(spec, n)
    }
}

impl fmt::Display for Waveset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_waveset() {
        let ws = Waveset::default();
        assert_eq!(ws.len(), 10000);
        assert_eq!(ws.samples()[0], 500.0);
        assert_eq!(ws.samples()[9999], 26000.0);
        assert_eq!(
            ws.descriptor(),
            "Min: 500, Max: 26000, Num: 10000, Delta: None, Log: true"
        );
        assert_eq!(Waveset::new(WavesetSpec::default()).unwrap(), ws);
    }

    #[test]
    fn test_log_spacing_has_constant_ratio() {
        let ws = Waveset::default();
        let s = ws.samples();
        let r0 = s[1] / s[0];
        let r1 = s[5000] / s[4999];
        assert_relative_eq!(r0, r1, max_relative = 1e-9);
    }

    #[test]
    fn test_linear_with_delta() {
        let ws = Waveset::new(WavesetSpec {
            minwave: 1000.0,
            maxwave: 2000.0,
            num: 0,
            delta: Some(3.0),
            log: false,
        })
        .unwrap();

        // round(1000 / 3) + 1
        assert_eq!(ws.len(), 334);
        assert_eq!(ws.samples()[0], 1000.0);
        assert_eq!(ws.samples()[333], 2000.0);
        assert_eq!(
            ws.descriptor(),
            "Min: 1000, Max: 2000, Num: None, Delta: 3, Log: false"
        );
    }

    #[test]
    fn test_log_with_delta() {
        let ws = Waveset::new(WavesetSpec {
            minwave: 1000.0,
            maxwave: 10000.0,
            num: 0,
            delta: Some(0.01),
            log: true,
        })
        .unwrap();
        assert_eq!(ws.len(), 101);
        assert_relative_eq!(ws.samples()[50], 10f64.powf(3.5), max_relative = 1e-12);
    }

    #[test]
    fn test_invalid_specs() {
        let base = WavesetSpec::default();
        let bad_min = WavesetSpec {
            minwave: 0.0,
            ..base.clone()
        };
        assert_eq!(Waveset::new(bad_min), Err(WavesetError::NonPositiveMin(0.0)));

        let inverted = WavesetSpec {
            minwave: 3000.0,
            maxwave: 2000.0,
            ..base.clone()
        };
        assert!(matches!(
            Waveset::new(inverted),
            Err(WavesetError::EmptyRange { .. })
        ));

        let one_point = WavesetSpec { num: 1, ..base.clone() };
        assert_eq!(Waveset::new(one_point), Err(WavesetError::TooFewPoints(1)));

        let zero_delta = WavesetSpec {
            delta: Some(0.0),
            ..base
        };
        assert_eq!(
            Waveset::new(zero_delta),
            Err(WavesetError::NonPositiveDelta(0.0))
        );
    }

    #[test]
    fn test_oversized_grids_are_rejected() {
        let tiny_delta = WavesetSpec {
            minwave: 500.0,
            maxwave: 26000.0,
            num: 0,
            delta: Some(1e-300),
            log: false,
        };
        assert!(matches!(
            tiny_delta.point_count(),
            Err(WavesetError::TooManyPoints(_))
        ));
        assert!(matches!(
            Waveset::new(tiny_delta),
            Err(WavesetError::TooManyPoints(_))
        ));

        let huge_num = WavesetSpec {
            num: usize::MAX,
            ..WavesetSpec::default()
        };
        assert!(matches!(
            Waveset::new(huge_num),
            Err(WavesetError::TooManyPoints(_))
        ));

        let at_limit = WavesetSpec {
            num: MAX_POINTS,
            ..WavesetSpec::default()
        };
        assert_eq!(at_limit.point_count(), Ok(MAX_POINTS));
    }
}
