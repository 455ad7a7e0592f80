use crate::errors::{DeskError, DeskResult};
use crate::pricing::black_scholes::price;
use crate::pricing::PricingRequest;

const VOL_LOW: f64 = 0.01;
const VOL_HIGH: f64 = 5.0;

/// Bisection settings. Defaults match the desk's options service.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ImpliedVol {
    pub volatility: f64,
    pub iterations: u32,
    /// |model price - market price| at the returned volatility
    pub residual: f64,
}

/// Volatility that reproduces `market_price` under closed-form Black-Scholes.
///
/// Price is monotone in sigma, so bisection on [0.01, 5.0] always converges
/// when the target lies inside the bracket. The request's own volatility is ignored.
pub fn implied_volatility(
    market_price: f64,
    request: &PricingRequest,
    config: SolverConfig,
) -> DeskResult<ImpliedVol> {
    if !market_price.is_finite() || market_price <= 0.0 {
        return Err(DeskError::invalid("market_price", market_price));
    }

    let at = |vol: f64| price(&request.with_volatility(vol)).map(|r| r.theoretical_price);

    let floor = at(VOL_LOW)?;
    let cap = at(VOL_HIGH)?;
    if market_price < floor - config.tolerance || market_price > cap + config.tolerance {
        return Err(DeskError::NoConvergence(format!(
            "market price {market_price} outside attainable range [{floor:.6}, {cap:.6}]"
        )));
    }

    let mut lo = VOL_LOW;
    let mut hi = VOL_HIGH;
    let mut mid = 0.5 * (lo + hi);

    for i in 1..=config.max_iterations {
        let diff = at(mid)? - market_price;
        if diff.abs() < config.tolerance {
            return Ok(ImpliedVol {
                volatility: mid,
                iterations: i,
                residual: diff.abs(),
            });
        }
        if diff > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
        mid = 0.5 * (lo + hi);
    }

    let residual = (at(mid)? - market_price).abs();
    tracing::debug!(
        market_price = market_price,
        volatility = mid,
        residual = residual,
        "implied vol hit iteration cap"
    );
    Err(DeskError::NoConvergence(format!(
        "{} iterations, residual {residual:.3e}",
        config.max_iterations
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::OptionType;

    fn request(option_type: OptionType) -> PricingRequest {
        PricingRequest {
            spot: 150.0,
            strike: 155.0,
            time_to_expiry: 0.25,
            volatility: 0.2,
            risk_free_rate: 0.05,
            option_type,
        }
    }

    #[test]
    fn test_recovers_input_vol() {
        for option_type in [OptionType::Call, OptionType::Put] {
            for vol in [0.12, 0.2, 0.45, 1.1] {
                let req = request(option_type).with_volatility(vol);
                let target = price(&req).unwrap().theoretical_price;
                let iv = implied_volatility(target, &req, SolverConfig::default()).unwrap();
                assert!(
                    (iv.volatility - vol).abs() < 1e-4,
                    "{option_type} vol={vol}: got {}",
                    iv.volatility
                );
                assert!(iv.residual < 1e-6);
            }
        }
    }

    #[test]
    fn test_desk_example_price() {
        // 8.50 for the 150/155 3-month call
        let iv = implied_volatility(8.5, &request(OptionType::Call), SolverConfig::default()).unwrap();
        assert!(iv.volatility > 0.3 && iv.volatility < 0.4, "iv={}", iv.volatility);
        assert!(iv.iterations <= 100);
    }

    #[test]
    fn test_rejects_bad_market_price() {
        let req = request(OptionType::Call);
        assert!(matches!(
            implied_volatility(0.0, &req, SolverConfig::default()),
            Err(DeskError::InvalidInput { field: "market_price", .. })
        ));
        assert!(implied_volatility(f64::NAN, &req, SolverConfig::default()).is_err());
    }

    #[test]
    fn test_unattainable_price() {
        // A call can never be worth more than the underlying
        let err = implied_volatility(200.0, &request(OptionType::Call), SolverConfig::default()).unwrap_err();
        assert!(matches!(err, DeskError::NoConvergence(_)));
    }

    #[test]
    fn test_iteration_cap() {
        let req = request(OptionType::Call);
        let target = price(&req.with_volatility(0.3137)).unwrap().theoretical_price;
        let cfg = SolverConfig { tolerance: 1e-12, max_iterations: 3 };
        assert!(matches!(
            implied_volatility(target, &req, cfg),
            Err(DeskError::NoConvergence(_))
        ));
    }

    #[test]
    fn test_expired_request_rejected() {
        let req = PricingRequest { time_to_expiry: -0.1, ..request(OptionType::Put) };
        assert!(matches!(
            implied_volatility(5.0, &req, SolverConfig::default()),
            Err(DeskError::InvalidInput { field: "time_to_expiry", .. })
        ));
    }
}
