use crate::pricing::black_scholes::BlackScholes;
use crate::pricing::{time_to_expiry, OptionType, PricingRequest};
use chrono::{DateTime, Duration, Utc};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Shares per listed equity option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Instrument {
    Stock,
    Option {
        option_type: OptionType,
        strike: f64,
        expiry: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Position {
    pub id: String,
    /// Display symbol, e.g. AAPL_CALL_155
    pub symbol: String,
    pub underlying: String,
    /// Shares for stock, contracts for options. Negative = short.
    pub quantity: f64,
    pub instrument: Instrument,
}

impl Position {
    pub fn stock(underlying: &str, quantity: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: underlying.to_string(),
            underlying: underlying.to_string(),
            quantity,
            instrument: Instrument::Stock,
        }
    }

    pub fn option(
        underlying: &str,
        option_type: OptionType,
        strike: f64,
        expiry: DateTime<Utc>,
        contracts: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: format!("{underlying}_{option_type}_{strike}"),
            underlying: underlying.to_string(),
            quantity: contracts,
            instrument: Instrument::Option {
                option_type,
                strike,
                expiry,
            },
        }
    }
}

/// Position-level valuation: unit price times quantity (and multiplier for options).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PositionMark {
    pub symbol: String,
    pub underlying: String,
    pub quantity: f64,
    pub spot: f64,
    /// Per share or per option (before multiplier)
    pub unit_price: f64,
    pub market_value: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
    pub time_to_expiry: Option<f64>,
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct PortfolioGreeks {
    pub market_value: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Market inputs shared by every option mark in one pass.
#[derive(Debug, Clone, Copy)]
pub struct MarkContext {
    pub now: DateTime<Utc>,
    pub risk_free_rate: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, Default)]
pub struct OptionBook {
    positions: Vec<Position>,
}

impl OptionBook {
    pub fn new(positions: Vec<Position>) -> Self {
        Self { positions }
    }

    /// The desk's starting book: three equity lines and two option lines.
    /// Option expiries are relative to `now` so the book is live at startup.
    pub fn sample(now: DateTime<Utc>) -> Self {
        Self::new(vec![
            Position::stock("AAPL", 500.0),
            Position::stock("GOOGL", 50.0),
            Position::stock("TSLA", 200.0),
            Position::option("AAPL", OptionType::Call, 155.0, now + Duration::days(70), 10.0),
            Position::option("SPY", OptionType::Put, 420.0, now + Duration::days(45), 25.0),
        ])
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Value every position whose underlying has a price in `spots`.
    /// Positions without a price are left out of the result.
    pub fn mark(
        &self,
        spots: &HashMap<String, f64>,
        ctx: MarkContext,
        model: &BlackScholes,
    ) -> SmallVec<[PositionMark; 8]> {
        let mut out = SmallVec::new();
        for pos in &self.positions {
            let Some(&spot) = spots.get(&pos.underlying) else {
                continue;
            };
            match mark_position(pos, spot, ctx, model) {
                Some(mark) => out.push(mark),
                None => tracing::debug!(symbol = %pos.symbol, spot = spot, "position not marked"),
            }
        }
        out
    }
}

/// Value one position at `spot`. None only if pricing rejects the inputs.
pub fn mark_position(
    pos: &Position,
    spot: f64,
    ctx: MarkContext,
    model: &BlackScholes,
) -> Option<PositionMark> {
    let base = PositionMark {
        symbol: pos.symbol.clone(),
        underlying: pos.underlying.clone(),
        quantity: pos.quantity,
        spot,
        ..PositionMark::default()
    };

    match &pos.instrument {
        Instrument::Stock => Some(PositionMark {
            unit_price: spot,
            market_value: spot * pos.quantity,
            delta: pos.quantity,
            ..base
        }),
        Instrument::Option {
            option_type,
            strike,
            expiry,
        } => {
            let t = time_to_expiry(*expiry, ctx.now);
            let request = PricingRequest {
                spot,
                strike: *strike,
                time_to_expiry: t,
                volatility: ctx.volatility,
                risk_free_rate: ctx.risk_free_rate,
                option_type: *option_type,
            };
            let scale = pos.quantity * CONTRACT_MULTIPLIER;

            if t <= 0.0 {
                // Expired: worth intrinsic, no time value
                let intrinsic = request.intrinsic_value();
                let unit_delta = match option_type {
                    OptionType::Call if spot > *strike => 1.0,
                    OptionType::Put if spot < *strike => -1.0,
                    _ => 0.0,
                };
                return Some(PositionMark {
                    unit_price: intrinsic,
                    market_value: intrinsic * scale,
                    delta: unit_delta * scale,
                    time_to_expiry: Some(t),
                    expired: true,
                    ..base
                });
            }

            match model.evaluate(&request) {
                Ok(r) => Some(PositionMark {
                    unit_price: r.theoretical_price,
                    market_value: r.theoretical_price * scale,
                    delta: r.delta * scale,
                    gamma: r.gamma * scale,
                    theta: r.theta * scale,
                    vega: r.vega * scale,
                    rho: r.rho * scale,
                    time_to_expiry: Some(t),
                    ..base
                }),
                Err(e) => {
                    tracing::warn!(symbol = %pos.symbol, error = %e, "option mark failed");
                    None
                }
            }
        }
    }
}

/// Sum position-level figures into book totals.
pub fn aggregate(marks: &[PositionMark]) -> PortfolioGreeks {
    marks.iter().fold(PortfolioGreeks::default(), |acc, m| PortfolioGreeks {
        market_value: acc.market_value + m.market_value,
        delta: acc.delta + m.delta,
        gamma: acc.gamma + m.gamma,
        theta: acc.theta + m.theta,
        vega: acc.vega + m.vega,
        rho: acc.rho + m.rho,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::black_scholes::price;
    use chrono::TimeZone;

    fn ctx() -> MarkContext {
        MarkContext {
            now: Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap(),
            risk_free_rate: 0.05,
            volatility: 0.25,
        }
    }

    fn spots() -> HashMap<String, f64> {
        [("AAPL", 150.25), ("GOOGL", 2825.5), ("TSLA", 238.9), ("SPY", 425.0)]
            .into_iter()
            .map(|(s, p)| (s.to_string(), p))
            .collect()
    }

    #[test]
    fn test_sample_book_marks_every_line() {
        let book = OptionBook::sample(ctx().now);
        let marks = book.mark(&spots(), ctx(), &BlackScholes::default());
        assert_eq!(marks.len(), 5);
        assert_eq!(marks[3].symbol, "AAPL_CALL_155");
        assert!(marks.iter().all(|m| !m.expired));
    }

    #[test]
    fn test_stock_mark() {
        let m = mark_position(&Position::stock("TSLA", 200.0), 238.9, ctx(), &BlackScholes::default()).unwrap();
        assert!((m.market_value - 47_780.0).abs() < 1e-9);
        assert_eq!(m.delta, 200.0);
        assert_eq!(m.gamma, 0.0);
        assert!(m.time_to_expiry.is_none());
    }

    #[test]
    fn test_option_mark_scales_by_contracts() {
        let c = ctx();
        let pos = Position::option("AAPL", OptionType::Call, 155.0, c.now + Duration::days(70), 10.0);
        let m = mark_position(&pos, 150.25, c, &BlackScholes::default()).unwrap();

        let unit = price(&PricingRequest {
            spot: 150.25,
            strike: 155.0,
            time_to_expiry: 70.0 / 365.0,
            volatility: 0.25,
            risk_free_rate: 0.05,
            option_type: OptionType::Call,
        })
        .unwrap();

        assert!((m.unit_price - unit.theoretical_price).abs() < 1e-9);
        assert!((m.market_value - unit.theoretical_price * 1000.0).abs() < 1e-6);
        assert!((m.delta - unit.delta * 1000.0).abs() < 1e-6);
        assert!(m.theta < 0.0);
    }

    #[test]
    fn test_expired_option_marks_at_intrinsic() {
        let c = ctx();
        let pos = Position::option("SPY", OptionType::Put, 420.0, c.now - Duration::days(1), 25.0);
        let m = mark_position(&pos, 410.0, c, &BlackScholes::default()).unwrap();
        assert!(m.expired);
        assert!((m.market_value - 10.0 * 2500.0).abs() < 1e-9);
        assert_eq!(m.delta, -2500.0);
        assert_eq!(m.vega, 0.0);

        let otm = mark_position(&pos, 430.0, c, &BlackScholes::default()).unwrap();
        assert_eq!(otm.market_value, 0.0);
        assert_eq!(otm.delta, 0.0);
    }

    #[test]
    fn test_missing_spot_skipped() {
        let book = OptionBook::sample(ctx().now);
        let mut partial = spots();
        partial.remove("SPY");
        let marks = book.mark(&partial, ctx(), &BlackScholes::default());
        assert_eq!(marks.len(), 4);
        assert!(marks.iter().all(|m| m.underlying != "SPY"));
    }

    #[test]
    fn test_aggregate_sums() {
        let book = OptionBook::sample(ctx().now);
        let marks = book.mark(&spots(), ctx(), &BlackScholes::default());
        let total = aggregate(&marks);
        let mv: f64 = marks.iter().map(|m| m.market_value).sum();
        let delta: f64 = marks.iter().map(|m| m.delta).sum();
        assert!((total.market_value - mv).abs() < 1e-6);
        assert!((total.delta - delta).abs() < 1e-9);
        // Long options only: convexity adds up
        assert!(total.gamma > 0.0);
        assert!(total.vega > 0.0);
    }
}
