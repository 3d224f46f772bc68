//! Trapezoidal integration utility

use thiserror::Error;

/// Errors that can occur during trapezoidal integration
#[derive(Debug, Error, PartialEq)]
pub enum TrapezoidError {
    #[error("Insufficient points for integration, need at least 2 points")]
    InsufficientPoints,

    #[error("Points must be in ascending order")]
    NotAscending,

    #[error("Abscissa and ordinate lengths differ ({0} vs {1})")]
    LengthMismatch(usize, usize),
}

/// Trapezoidal integral of already-sampled values.
///
/// `x` must be strictly ascending and the same length as `y`.
pub fn trap_integrate_samples(x: &[f64], y: &[f64]) -> Result<f64, TrapezoidError> {
    if x.len() != y.len() {
        return Err(TrapezoidError::LengthMismatch(x.len(), y.len()));
    }

    if x.len() < 2 {
        return Err(TrapezoidError::InsufficientPoints);
    }

    if x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TrapezoidError::NotAscending);
    }

    // ∫[x₁,x₂] f(x)dx ≈ (x₂-x₁) × (f(x₁)+f(x₂))/2
    let integral_sum = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum();

    Ok(integral_sum)
}
