//! Hermite-Gaussian densities.
//!
//! The n-th harmonic-oscillator eigenfunction is
//! `ψ_n(ξ) = (2^n n! √π)^(-1/2) · H_n(ξ) · e^(−ξ²/2)`, so `|ψ_n|²` is a probability
//! density in ξ. Mapping returns through `ξ = r / (σ√2)` gives the density in r:
//!
//! `log f_n(r) = −½ln π − n ln 2 − ln n! − ξ² + 2 ln|H_n(ξ)| − ln(σ√2)`

use super::{HERMITE_ZERO_EPS, LN_FLOOR};
use statrs::function::factorial;
use std::f64::consts::{PI, SQRT_2};

/// Physicists' Hermite polynomial `H_n(x)` by recurrence.
pub fn hermite(n: usize, x: f64) -> f64 {
    let mut prev = 1.0;
    if n == 0 {
        return prev;
    }
    let mut curr = 2.0 * x;
    for k in 1..n {
        let next = 2.0 * x * curr - 2.0 * k as f64 * prev;
        prev = curr;
        curr = next;
    }
    curr
}

/// `ln Γ(n + 1)`, exact for integer n.
pub fn ln_factorial(n: usize) -> f64 {
    factorial::ln_factorial(n as u64)
}

/// Natural log with its argument floored away from zero.
pub fn guarded_ln(x: f64) -> f64 {
    x.max(LN_FLOOR).ln()
}

/// Standardised coordinate of a return for scale `sigma`.
pub fn xi(r: f64, sigma: f64) -> f64 {
    r / (sigma.max(LN_FLOOR) * SQRT_2)
}

fn log_normalisation(n: usize, sigma: f64) -> f64 {
    -0.5 * PI.ln() - n as f64 * 2f64.ln() - ln_factorial(n) - guarded_ln(sigma * SQRT_2)
}

/// Log-density with `|H_n|` floored. Used for display curves.
pub fn log_density(n: usize, r: f64, sigma: f64) -> f64 {
    let x = xi(r, sigma);
    log_normalisation(n, sigma) - x * x + 2.0 * guarded_ln(hermite(n, x).abs())
}

/// Log-density for likelihood scoring.
///
/// Returns `None` when the sample sits on a zero crossing of `H_n` or the result is
/// not finite, so the caller can drop it instead of letting it dominate the mean.
pub fn log_density_checked(n: usize, r: f64, sigma: f64) -> Option<f64> {
    let x = xi(r, sigma);
    let h = hermite(n, x).abs();
    if !h.is_finite() || h < HERMITE_ZERO_EPS {
        return None;
    }
    let value = log_normalisation(n, sigma) - x * x + 2.0 * guarded_ln(h);
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hermite_low_orders() {
        let x = 0.7;
        assert_eq!(hermite(0, x), 1.0);
        assert!((hermite(1, x) - 2.0 * x).abs() < 1e-12);
        assert!((hermite(2, x) - (4.0 * x * x - 2.0)).abs() < 1e-12);
        assert!((hermite(3, x) - (8.0 * x.powi(3) - 12.0 * x)).abs() < 1e-12);
        assert!((hermite(4, x) - (16.0 * x.powi(4) - 48.0 * x * x + 12.0)).abs() < 1e-12);
    }

    #[test]
    fn test_ln_factorial() {
        assert!(ln_factorial(0).abs() < 1e-12);
        assert!(ln_factorial(1).abs() < 1e-12);
        assert!((ln_factorial(5) - 120f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_ln_factorial_matches_ln_gamma() {
        use statrs::function::gamma::ln_gamma;
        for n in [2usize, 7, 20, 60] {
            let expected = ln_gamma((n + 1) as f64);
            assert!((ln_factorial(n) - expected).abs() < 1e-9 * expected.max(1.0));
        }
        // Past the factorial cache the sum of logs still agrees
        let summed: f64 = (2..=200).map(|k| (k as f64).ln()).sum();
        assert!((ln_factorial(200) - summed).abs() < 1e-8 * summed);
    }

    #[test]
    fn test_densities_integrate_to_one() {
        let sigma = 0.002;
        for n in 0..5 {
            let lo = -0.05;
            let hi = 0.05;
            let steps = 20_000;
            let dr = (hi - lo) / steps as f64;
            let integral: f64 = (0..steps)
                .map(|i| log_density(n, lo + (i as f64 + 0.5) * dr, sigma).exp() * dr)
                .sum();
            assert!((integral - 1.0).abs() < 1e-6, "n={} integral={}", n, integral);
        }
    }

    #[test]
    fn test_zero_crossing_is_excluded() {
        // H_1(0) = 0
        assert!(log_density_checked(1, 0.0, 0.01).is_none());
        assert!(log_density_checked(1, 0.005, 0.01).is_some());
        // Display variant stays finite
        assert!(log_density(1, 0.0, 0.01).is_finite());
    }
}
