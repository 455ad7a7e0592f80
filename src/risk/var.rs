//! Value-at-Risk estimators. All figures are reported as positive losses
//! in the same units as the input returns (or P/L).

use crate::errors::{DeskError, DeskResult};
use statrs::distribution::{ContinuousCDF, Normal};

fn check_confidence(confidence: f64) -> DeskResult<()> {
    if confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(DeskError::invalid("confidence", confidence))
    }
}

/// Index of the VaR observation in ascending-sorted returns.
#[inline]
fn tail_index(len: usize, confidence: f64) -> usize {
    let idx = ((1.0 - confidence) * len as f64) as usize;
    idx.min(len.saturating_sub(1))
}

fn sorted(returns: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Historical VaR: the loss at the (1 - confidence) quantile. Zero for no data.
pub fn historical_var(returns: &[f64], confidence: f64) -> DeskResult<f64> {
    check_confidence(confidence)?;
    let s = sorted(returns);
    if s.is_empty() {
        return Ok(0.0);
    }
    Ok(-s[tail_index(s.len(), confidence)])
}

/// Expected shortfall: mean loss over the tail up to and including the VaR observation.
pub fn expected_shortfall(returns: &[f64], confidence: f64) -> DeskResult<f64> {
    check_confidence(confidence)?;
    let s = sorted(returns);
    if s.is_empty() {
        return Ok(0.0);
    }
    let idx = tail_index(s.len(), confidence);
    let tail = &s[..=idx];
    Ok(-(tail.iter().sum::<f64>() / tail.len() as f64))
}

/// Parametric (variance-covariance) VaR for a position of `value` whose
/// one-period returns have standard deviation `sigma`.
pub fn parametric_var(value: f64, sigma: f64, confidence: f64) -> DeskResult<f64> {
    check_confidence(confidence)?;
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(DeskError::invalid("sigma", sigma));
    }
    let z = Normal::standard().inverse_cdf(confidence);
    Ok(z * sigma * value.abs())
}

/// Sample standard deviation. Zero with fewer than two points.
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (nf - 1.0);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn returns() -> Vec<f64> {
        // -10%, -9%, ..., +9%
        (-10..10).map(|i| i as f64 / 100.0).collect()
    }

    #[test]
    fn test_historical_var_picks_quantile() {
        // 20 points at 95%: index 1 -> -9%
        let var = historical_var(&returns(), 0.95).unwrap();
        assert!((var - 0.09).abs() < 1e-12, "var={var}");
        // 85%: index 3 -> -7%
        assert!((historical_var(&returns(), 0.85).unwrap() - 0.07).abs() < 1e-12);
    }

    #[test]
    fn test_order_does_not_matter() {
        let mut r = returns();
        r.reverse();
        assert_eq!(historical_var(&r, 0.95).unwrap(), historical_var(&returns(), 0.95).unwrap());
    }

    #[test]
    fn test_expected_shortfall_averages_tail() {
        // tail = [-10%, -9%]
        let es = expected_shortfall(&returns(), 0.95).unwrap();
        assert!((es - 0.095).abs() < 1e-12, "es={es}");
        assert!(es >= historical_var(&returns(), 0.95).unwrap());
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(historical_var(&[], 0.95).unwrap(), 0.0);
        assert_eq!(expected_shortfall(&[], 0.99).unwrap(), 0.0);
        assert_eq!(historical_var(&[-0.02], 0.99).unwrap(), 0.02);
    }

    #[test]
    fn test_parametric_var() {
        let var = parametric_var(1_000_000.0, 0.02, 0.95).unwrap();
        assert!((var - 1.644854 * 0.02 * 1_000_000.0).abs() < 1.0, "var={var}");
        assert!(parametric_var(-1_000_000.0, 0.02, 0.95).unwrap() > 0.0);
        assert!(parametric_var(1.0, -0.1, 0.95).is_err());
    }

    #[test]
    fn test_bad_confidence() {
        assert!(historical_var(&returns(), 1.0).is_err());
        assert!(expected_shortfall(&returns(), 0.0).is_err());
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[1.0]), 0.0);
        assert!((std_dev(&[1.0, 2.0, 3.0, 4.0]) - 1.2909944).abs() < 1e-6);
    }
}
