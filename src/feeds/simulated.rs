use crate::config::{AppConfig, SimSymbol};
use crate::errors::{DeskError, DeskResult};
use crate::pricing::monte_carlo::gbm_step;
use crate::state::EngineEvent;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tokio::sync::mpsc;

/// Simulated time advanced per tick: one trading day.
pub const SIM_DT_YEARS: f64 = 1.0 / 252.0;

/// Geometric Brownian motion price generator for the desk's underlyings.
/// Owns its RNG; a fixed seed gives a reproducible tape.
pub struct MarketSimulator {
    rng: StdRng,
    prices: Vec<(String, f64)>,
    volatility: f64,
    drift: f64,
}

impl MarketSimulator {
    pub fn new(symbols: &[SimSymbol], volatility: f64, drift: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            prices: symbols
                .iter()
                .map(|s| (s.symbol.clone(), s.start_price))
                .collect(),
            volatility,
            drift,
        }
    }

    /// Current price for every symbol.
    pub fn prices(&self) -> &[(String, f64)] {
        &self.prices
    }

    /// Advance every symbol by one step and return the new prices.
    pub fn step(&mut self) -> &[(String, f64)] {
        for (_, price) in self.prices.iter_mut() {
            let z: f64 = StandardNormal.sample(&mut self.rng);
            *price = gbm_step(*price, self.drift, self.volatility, SIM_DT_YEARS, z);
        }
        &self.prices
    }
}

/// Send one quote per symbol. Err only if the engine has gone away.
async fn publish(
    prices: &[(String, f64)],
    engine_tx: &mpsc::Sender<EngineEvent>,
) -> DeskResult<()> {
    let timestamp_ms = chrono::Utc::now().timestamp_millis();
    for (symbol, price) in prices {
        engine_tx
            .send(EngineEvent::Quote {
                symbol: symbol.clone(),
                price: *price,
                timestamp_ms,
            })
            .await
            .map_err(|_| DeskError::ChannelClosed("engine".into()))?;
    }
    Ok(())
}

/// Background quote generator. Replaces per-screen timers with one task
/// that publishes immutable quotes to the engine over a bounded channel.
pub async fn run_market_simulator(config: AppConfig, engine_tx: mpsc::Sender<EngineEvent>) {
    tracing::info!(
        symbols = config.sim_symbols.len(),
        tick_ms = config.sim_tick_ms,
        seeded = config.sim_seed.is_some(),
        "market simulator started"
    );

    let mut sim = MarketSimulator::new(
        &config.sim_symbols,
        config.sim_volatility,
        config.risk_free_rate,
        config.sim_seed,
    );

    // Opening prints before the first step
    if let Err(e) = publish(sim.prices(), &engine_tx).await {
        tracing::error!(error = %e, "market simulator shutting down");
        return;
    }

    let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(config.sim_tick_ms));
    interval.tick().await;

    loop {
        interval.tick().await;
        let prices = sim.step();
        if let Err(e) = publish(prices, &engine_tx).await {
            tracing::error!(error = %e, "market simulator shutting down");
            return;
        }
    }
}
