//! Scenario stress tests. Each scenario shocks spot per underlying, shifts
//! volatility and the risk-free rate, then fully re-marks the book.
//! Results are P&L against the unshocked marks.

use crate::portfolio::book::{mark_position, MarkContext, OptionBook};
use crate::pricing::black_scholes::BlackScholes;
use std::collections::HashMap;

/// Floor applied to shocked volatility so a negative vol shift still prices.
const MIN_SHOCKED_VOL: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
pub struct StressScenario {
    pub name: &'static str,
    pub description: &'static str,
    /// Relative spot move per underlying, e.g. -0.30 = -30%
    pub price_shocks: &'static [(&'static str, f64)],
    /// Spot move for underlyings not listed above
    pub default_price_shock: f64,
    /// Absolute shift in annualised volatility, e.g. 0.15 = +15 vol points
    pub vol_shock: f64,
    /// Absolute shift in the risk-free rate, e.g. -0.02 = -200bp
    pub rate_shock: f64,
}

impl StressScenario {
    fn price_shock(&self, underlying: &str) -> f64 {
        self.price_shocks
            .iter()
            .find(|(sym, _)| *sym == underlying)
            .map(|(_, shock)| *shock)
            .unwrap_or(self.default_price_shock)
    }
}

pub const MARKET_CRASH: StressScenario = StressScenario {
    name: "market_crash",
    description: "Severe 2008-style market downturn",
    price_shocks: &[
        ("AAPL", -0.30),
        ("GOOGL", -0.35),
        ("TSLA", -0.45),
        ("MSFT", -0.25),
        ("AMZN", -0.40),
        ("SPY", -0.30),
    ],
    default_price_shock: -0.05,
    vol_shock: 0.15,
    rate_shock: -0.02,
};

pub const RATE_SHOCK: StressScenario = StressScenario {
    name: "rate_shock",
    description: "Sudden 300bp rise in interest rates",
    price_shocks: &[("AAPL", -0.10), ("GOOGL", -0.08), ("TSLA", -0.15), ("MSFT", -0.12)],
    default_price_shock: -0.05,
    vol_shock: 0.05,
    rate_shock: 0.03,
};

pub const VOL_SPIKE: StressScenario = StressScenario {
    name: "vol_spike",
    description: "Volatility spike with moderate price moves",
    price_shocks: &[("AAPL", -0.05), ("GOOGL", -0.08), ("TSLA", -0.12)],
    default_price_shock: -0.05,
    vol_shock: 0.25,
    rate_shock: 0.0,
};

pub const SECTOR_ROTATION: StressScenario = StressScenario {
    name: "sector_rotation",
    description: "Rotation out of technology into value",
    price_shocks: &[
        ("AAPL", -0.20),
        ("GOOGL", -0.25),
        ("MSFT", -0.18),
        ("TSLA", -0.30),
        ("AMZN", -0.22),
    ],
    default_price_shock: -0.05,
    vol_shock: 0.08,
    rate_shock: 0.01,
};

pub const STANDARD_SCENARIOS: [StressScenario; 4] =
    [MARKET_CRASH, RATE_SHOCK, VOL_SPIKE, SECTOR_ROTATION];

#[derive(Debug, Clone, serde::Serialize)]
pub struct PositionPnl {
    pub symbol: String,
    pub pnl: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StressResult {
    pub scenario: &'static str,
    pub description: &'static str,
    pub portfolio_pnl: f64,
    /// P&L over unshocked book value; zero for an empty book
    pub portfolio_return: f64,
    /// Position with the largest loss, None if nothing loses
    pub worst_position: Option<String>,
    pub worst_position_loss: f64,
    pub positions: Vec<PositionPnl>,
}

/// Re-mark every priced position under `scenario` and report the P&L.
/// Positions without a spot, or that fail to price either way, are left out.
pub fn run_stress_test(
    book: &OptionBook,
    spots: &HashMap<String, f64>,
    ctx: MarkContext,
    model: &BlackScholes,
    scenario: &StressScenario,
) -> StressResult {
    let shocked_ctx = MarkContext {
        risk_free_rate: ctx.risk_free_rate + scenario.rate_shock,
        volatility: (ctx.volatility + scenario.vol_shock).max(MIN_SHOCKED_VOL),
        ..ctx
    };

    let mut result = StressResult {
        scenario: scenario.name,
        description: scenario.description,
        portfolio_pnl: 0.0,
        portfolio_return: 0.0,
        worst_position: None,
        worst_position_loss: 0.0,
        positions: Vec::with_capacity(book.positions().len()),
    };
    let mut base_value = 0.0;

    for pos in book.positions() {
        let Some(&spot) = spots.get(&pos.underlying) else {
            continue;
        };
        let shocked_spot = spot * (1.0 + scenario.price_shock(&pos.underlying));

        let (Some(base), Some(shocked)) = (
            mark_position(pos, spot, ctx, model),
            mark_position(pos, shocked_spot, shocked_ctx, model),
        ) else {
            continue;
        };

        let pnl = shocked.market_value - base.market_value;
        base_value += base.market_value;
        result.portfolio_pnl += pnl;
        if pnl < result.worst_position_loss {
            result.worst_position_loss = pnl;
            result.worst_position = Some(pos.symbol.clone());
        }
        result.positions.push(PositionPnl {
            symbol: pos.symbol.clone(),
            pnl,
        });
    }

    if base_value != 0.0 {
        result.portfolio_return = result.portfolio_pnl / base_value;
    }

    tracing::debug!(
        scenario = scenario.name,
        pnl = result.portfolio_pnl,
        worst = ?result.worst_position,
        "stress scenario evaluated"
    );
    result
}

pub fn run_standard_stress_tests(
    book: &OptionBook,
    spots: &HashMap<String, f64>,
    ctx: MarkContext,
    model: &BlackScholes,
) -> Vec<StressResult> {
    STANDARD_SCENARIOS
        .iter()
        .map(|s| run_stress_test(book, spots, ctx, model, s))
        .collect()
}
