use crate::errors::{DeskError, DeskResult};
use crate::pricing::normal::{norm_cdf, norm_pdf};
use crate::pricing::{OptionType, PricingRequest, PricingResult};

/// Which theta formula to report.
///
/// `Simplified` keeps only the volatility-decay term and is what the desk
/// screens display. `Full` adds the discounted-strike carry term of the
/// textbook Black-Scholes theta. Both are per calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThetaConvention {
    #[default]
    Simplified,
    Full,
}

/// Closed-form Black-Scholes-Merton for European options.
/// Single underlying, continuous compounding, no dividends.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackScholes {
    pub theta: ThetaConvention,
}

impl BlackScholes {
    pub fn new(theta: ThetaConvention) -> Self {
        Self { theta }
    }

    /// Price plus delta, gamma, theta, vega, rho. Rejects degenerate inputs.
    pub fn evaluate(&self, req: &PricingRequest) -> DeskResult<PricingResult> {
        req.validate()?;

        let sqrt_t = req.time_to_expiry.sqrt();
        let sigma_sqrt_t = req.volatility * sqrt_t;
        let d1 = ((req.spot / req.strike).ln()
            + (req.risk_free_rate + 0.5 * req.volatility * req.volatility) * req.time_to_expiry)
            / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;

        let df = req.discount_factor();
        let discounted_strike = req.strike * df;
        let pdf_d1 = norm_pdf(d1);
        let nd1 = norm_cdf(d1);

        // Shared by calls and puts
        let gamma = pdf_d1 / (req.spot * sigma_sqrt_t);
        let vega = req.spot * pdf_d1 * sqrt_t / 100.0;
        let decay = -(req.spot * pdf_d1 * req.volatility) / (2.0 * sqrt_t);

        let (price, delta, carry, rho) = match req.option_type {
            OptionType::Call => {
                let nd2 = norm_cdf(d2);
                (
                    req.spot * nd1 - discounted_strike * nd2,
                    nd1,
                    -req.risk_free_rate * discounted_strike * nd2,
                    req.strike * req.time_to_expiry * df * nd2 / 100.0,
                )
            }
            OptionType::Put => {
                let n_minus_d2 = norm_cdf(-d2);
                (
                    discounted_strike * n_minus_d2 - req.spot * norm_cdf(-d1),
                    nd1 - 1.0,
                    req.risk_free_rate * discounted_strike * n_minus_d2,
                    -req.strike * req.time_to_expiry * df * n_minus_d2 / 100.0,
                )
            }
        };

        let annual_theta = match self.theta {
            ThetaConvention::Simplified => decay,
            ThetaConvention::Full => decay + carry,
        };

        let result = PricingResult {
            theoretical_price: price,
            delta,
            gamma,
            theta: annual_theta / 365.0,
            vega,
            rho,
        };
        if !result.is_finite() {
            let (field, value) = overflowing_input(req);
            return Err(DeskError::invalid(field, value));
        }

        Ok(PricingResult {
            // N(x) is approximate; deep OTM prices can dip a hair below zero.
            theoretical_price: price.max(0.0),
            ..result
        })
    }
}

/// Input to blame when validated inputs still overflow f64.
fn overflowing_input(req: &PricingRequest) -> (&'static str, f64) {
    let total_variance = req.volatility * req.volatility * req.time_to_expiry;
    let sigma_sqrt_t = req.volatility * req.time_to_expiry.sqrt();
    if !total_variance.is_finite() || !sigma_sqrt_t.is_finite() || sigma_sqrt_t == 0.0 {
        return ("volatility", req.volatility);
    }
    let df = req.discount_factor();
    if !df.is_finite() || df == 0.0 {
        return ("risk_free_rate", req.risk_free_rate);
    }
    ("time_to_expiry", req.time_to_expiry)
}

/// Price a request with the display (simplified-theta) convention.
/// Pure: no state, no I/O, safe to call from any task.
pub fn price(request: &PricingRequest) -> DeskResult<PricingResult> {
    BlackScholes::default().evaluate(request)
}
