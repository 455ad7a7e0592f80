pub mod normal;
pub mod black_scholes;
pub mod implied_vol;
pub mod monte_carlo;

use crate::errors::{DeskError, DeskResult};

/// Seconds in the 365-day year used to turn an expiry date into `time_to_expiry`.
const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Payoff at expiry for a terminal underlying price.
    #[inline]
    pub fn payoff(self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Market parameters for one European option evaluation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PricingRequest {
    pub spot: f64,
    pub strike: f64,
    /// Years until expiry. Zero or negative means the contract has expired.
    pub time_to_expiry: f64,
    pub volatility: f64,
    pub risk_free_rate: f64,
    pub option_type: OptionType,
}

impl PricingRequest {
    /// Reject any input that would make d1/d2 undefined.
    pub fn validate(&self) -> DeskResult<()> {
        check_positive("spot", self.spot)?;
        check_positive("strike", self.strike)?;
        check_positive("time_to_expiry", self.time_to_expiry)?;
        check_positive("volatility", self.volatility)?;
        if !self.risk_free_rate.is_finite() {
            return Err(DeskError::invalid("risk_free_rate", self.risk_free_rate));
        }
        Ok(())
    }

    pub fn with_volatility(self, volatility: f64) -> Self {
        Self { volatility, ..self }
    }

    #[inline]
    pub fn discount_factor(&self) -> f64 {
        (-self.risk_free_rate * self.time_to_expiry).exp()
    }

    /// Value if exercised now; what an expired contract is worth.
    #[inline]
    pub fn intrinsic_value(&self) -> f64 {
        self.option_type.payoff(self.spot, self.strike)
    }
}

#[inline]
fn check_positive(field: &'static str, value: f64) -> DeskResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DeskError::invalid(field, value))
    }
}

/// Theoretical value and first-order sensitivities.
/// theta is per calendar day, vega and rho per percentage point.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PricingResult {
    pub theoretical_price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl PricingResult {
    pub fn is_finite(&self) -> bool {
        [self.theoretical_price, self.delta, self.gamma, self.theta, self.vega, self.rho]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Years between `now` and an expiry timestamp, on a 365-day year.
/// Negative once the expiry has passed.
pub fn time_to_expiry(
    expiry: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> f64 {
    (expiry - now).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_YEAR
}
