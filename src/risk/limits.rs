use crate::portfolio::book::PortfolioGreeks;

/// One limit evaluation, as shown on the risk screen.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LimitStatus {
    pub name: &'static str,
    pub description: &'static str,
    pub limit: f64,
    pub current: f64,
    pub utilization_pct: f64,
    pub breached: bool,
}

impl LimitStatus {
    fn evaluate(name: &'static str, description: &'static str, limit: f64, current: f64) -> Self {
        let utilization_pct = if limit > 0.0 { current / limit * 100.0 } else { 0.0 };
        Self {
            name,
            description,
            limit,
            current,
            utilization_pct,
            breached: current > limit,
        }
    }
}

/// Check book-level limits. Pure function, no side effects.
#[inline]
pub fn check_risk_limits(
    greeks: &PortfolioGreeks,
    var_1d: f64,
    max_abs_delta: f64,
    max_var: f64,
) -> [LimitStatus; 2] {
    [
        // 1. Net directional exposure, in share-equivalents
        LimitStatus::evaluate(
            "portfolio_delta",
            "Absolute portfolio delta (share equivalents)",
            max_abs_delta,
            greeks.delta.abs(),
        ),
        // 2. One-period VaR in currency
        LimitStatus::evaluate("portfolio_var", "Portfolio VaR", max_var, var_1d),
    ]
}

#[inline]
pub fn any_breached(limits: &[LimitStatus]) -> bool {
    limits.iter().any(|l| l.breached)
}
