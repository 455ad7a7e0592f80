//! Standard normal helpers used by the closed-form pricer.
//!
//! The CDF goes through the Abramowitz & Stegun 7.1.26 rational approximation
//! of `erf`, max absolute error about 1.5e-7.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

const P: f64 = 0.3275911;
const A1: f64 = 0.254829592;
const A2: f64 = -0.284496736;
const A3: f64 = 1.421413741;
const A4: f64 = -1.453152027;
const A5: f64 = 1.061405429;

/// A&S 7.1.26. Odd in `x` away from zero; erf(0) comes out as 1e-9.
#[inline]
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// N(x). Negative arguments are reflected as 1 - N(-x), so the pair
/// sums to one for every x != 0. N(0) carries the approximation error.
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    if x < 0.0 {
        1.0 - norm_cdf(-x)
    } else {
        0.5 * (1.0 + erf(x * FRAC_1_SQRT_2))
    }
}

/// phi(x), the standard normal density.
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ContinuousCDF, Normal};

    #[test]
    fn test_cdf_matches_exact_within_bound() {
        let exact = Normal::standard();
        let mut worst: f64 = 0.0;
        for i in -800..=800 {
            let x = i as f64 / 100.0;
            worst = worst.max((norm_cdf(x) - exact.cdf(x)).abs());
        }
        assert!(worst < 1.5e-7, "max abs error {worst}");
    }

    #[test]
    fn test_cdf_symmetry() {
        for x in [0.1, 0.5, 1.0, 1.96, 3.0, 6.0] {
            let s = norm_cdf(x) + norm_cdf(-x);
            assert!((s - 1.0).abs() < 1e-15, "N({x}) + N(-{x}) = {s}");
        }
    }

    #[test]
    fn test_cdf_at_zero_within_bound() {
        // erf(0) is 1e-9 under A&S, so N(0) sits just above one half
        assert!((norm_cdf(0.0) - 0.5).abs() < 1.5e-7);
        assert!((norm_cdf(-0.0) - 0.5).abs() < 1.5e-7);
        let s = norm_cdf(0.0) + norm_cdf(-0.0);
        assert!((s - 1.0).abs() < 3e-7, "N(0) + N(-0) = {s}");
    }

    #[test]
    fn test_cdf_tails() {
        assert!(norm_cdf(-10.0) >= 0.0);
        assert!(norm_cdf(-10.0) < 1e-9);
        assert!(norm_cdf(10.0) <= 1.0);
        assert!(norm_cdf(10.0) > 1.0 - 1e-9);
    }

    #[test]
    fn test_pdf_peak() {
        assert!((norm_pdf(0.0) - 0.398_942_280_401_432_7).abs() < 1e-15);
        assert_eq!(norm_pdf(1.3), norm_pdf(-1.3));
    }
}
