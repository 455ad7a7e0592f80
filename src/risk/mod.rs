pub mod limits;
pub mod stress;
pub mod var;

use crate::errors::DeskResult;
use crate::portfolio::book::PortfolioGreeks;
use limits::LimitStatus;
use stress::StressResult;

/// Book-level risk figures published with every snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RiskReport {
    pub greeks: PortfolioGreeks,
    pub confidence: f64,
    /// Historical VaR over the P/L change window, in currency
    pub historical_var: f64,
    pub expected_shortfall: f64,
    /// Normal VaR from the sample std-dev of the same window
    pub parametric_var: f64,
    pub observations: usize,
    pub limits: Vec<LimitStatus>,
    pub breached: bool,
    /// Standard scenario P&L, filled in by the engine after each mark
    pub stress: Vec<StressResult>,
}

impl Default for RiskReport {
    fn default() -> Self {
        Self {
            greeks: PortfolioGreeks::default(),
            confidence: 0.95,
            historical_var: 0.0,
            expected_shortfall: 0.0,
            parametric_var: 0.0,
            observations: 0,
            limits: Vec::new(),
            breached: false,
            stress: Vec::new(),
        }
    }
}

/// Compute VaR/ES from P/L changes and evaluate limits against them.
pub fn compute_report(
    greeks: PortfolioGreeks,
    pnl_changes: &[f64],
    confidence: f64,
    max_abs_delta: f64,
    max_var: f64,
) -> DeskResult<RiskReport> {
    let historical_var = var::historical_var(pnl_changes, confidence)?;
    let expected_shortfall = var::expected_shortfall(pnl_changes, confidence)?;
    // Changes are already in currency, so value = 1
    let parametric_var = var::parametric_var(1.0, var::std_dev(pnl_changes), confidence)?;

    let limits = limits::check_risk_limits(&greeks, historical_var, max_abs_delta, max_var).to_vec();
    let breached = limits::any_breached(&limits);

    Ok(RiskReport {
        greeks,
        confidence,
        historical_var,
        expected_shortfall,
        parametric_var,
        observations: pnl_changes.len(),
        limits,
        breached,
        stress: Vec::new(),
    })
}
