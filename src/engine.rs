use crate::errors::DeskResult;
use crate::portfolio::book::{aggregate, MarkContext, PositionMark};
use crate::portfolio::tracker::PnlTracker;
use crate::risk::stress::run_standard_stress_tests;
use crate::risk::{compute_report, RiskReport};
use crate::state::{AppState, EngineEvent, EngineSnapshot, EngineState, QuoteState, WsMessage};
use portable_atomic::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Single owner of live desk state. Quotes update prices; ticks re-mark the
/// book, recompute risk and publish a fresh snapshot.
pub struct Engine {
    state: Arc<AppState>,
    engine_state: EngineState,
    quotes: BTreeMap<String, QuoteState>,
    spots: HashMap<String, f64>,
    pnl: PnlTracker,
    marks: Vec<PositionMark>,
    risk: RiskReport,
    breached: bool,
}

impl Engine {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            engine_state: EngineState::Warming,
            quotes: BTreeMap::new(),
            spots: HashMap::new(),
            pnl: PnlTracker::new(),
            marks: Vec::new(),
            risk: RiskReport::default(),
            breached: false,
        }
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine_state
    }

    /// Apply one event. Ok(false) means the engine should stop.
    pub fn process_event(&mut self, event: EngineEvent) -> DeskResult<bool> {
        match event {
            EngineEvent::Quote {
                symbol,
                price,
                timestamp_ms,
            } => self.on_quote(symbol, price, timestamp_ms),

            EngineEvent::Tick => {
                self.state.counters.ticks_processed.fetch_add(1, Ordering::Relaxed);
                if self.engine_state == EngineState::Live {
                    self.remark()?;
                }
            }

            EngineEvent::Shutdown => {
                tracing::info!("shutdown event received");
                self.transition(EngineState::Halted, "shutdown requested");
                self.publish_snapshot();
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn on_quote(&mut self, symbol: String, price: f64, timestamp_ms: i64) {
        if !(price.is_finite() && price > 0.0) {
            tracing::warn!(symbol = %symbol, price = price, "dropping bad quote");
            return;
        }
        self.state.counters.quotes_received.fetch_add(1, Ordering::Relaxed);

        let ts = chrono::DateTime::from_timestamp_millis(timestamp_ms)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();

        let quote = self
            .quotes
            .entry(symbol.clone())
            .and_modify(|q| q.update(price, ts.clone()))
            .or_insert_with(|| QuoteState::new(&symbol, price, ts.clone()));
        let change_pct = quote.change_pct;
        self.spots.insert(symbol.clone(), price);

        self.state.broadcast(WsMessage::Quote {
            symbol,
            price,
            change_pct,
            timestamp: ts,
        });

        if self.engine_state == EngineState::Warming {
            let expected = self.state.config.sim_symbols.len();
            if self.spots.len() >= expected {
                tracing::info!(symbols = expected, "all underlyings priced, going live");
                self.transition(EngineState::Live, "all underlyings priced");
            }
        }
    }

    /// Mark the book at current spots and refresh risk.
    fn remark(&mut self) -> DeskResult<()> {
        let cfg = &self.state.config;
        let ctx = MarkContext {
            now: chrono::Utc::now(),
            risk_free_rate: cfg.risk_free_rate,
            volatility: cfg.sim_volatility,
        };

        let marks = self.state.book.mark(&self.spots, ctx, &self.state.pricer);
        let greeks = aggregate(&marks);
        self.pnl.record(greeks.market_value);
        self.marks = marks.into_vec();
        self.state.counters.book_marks.fetch_add(1, Ordering::Relaxed);

        let stress = run_standard_stress_tests(&self.state.book, &self.spots, ctx, &self.state.pricer);
        self.risk = RiskReport {
            stress,
            ..compute_report(
                greeks,
                &self.pnl.changes(),
                cfg.var_confidence,
                cfg.max_abs_delta,
                cfg.max_var,
            )?
        };

        self.state.broadcast(WsMessage::BookUpdate {
            market_value: greeks.market_value,
            total_pnl: self.pnl.total_pnl(),
            delta: greeks.delta,
            gamma: greeks.gamma,
            theta: greeks.theta,
            vega: greeks.vega,
            rho: greeks.rho,
        });
        self.state.broadcast(WsMessage::RiskUpdate {
            historical_var: self.risk.historical_var,
            expected_shortfall: self.risk.expected_shortfall,
            parametric_var: self.risk.parametric_var,
            breached: self.risk.breached,
        });

        // Alert on the edge into breach, not on every tick while breached
        if self.risk.breached && !self.breached {
            for limit in self.risk.limits.iter().filter(|l| l.breached) {
                tracing::warn!(
                    limit = limit.name,
                    current = limit.current,
                    threshold = limit.limit,
                    "risk limit breached"
                );
                self.state.broadcast(WsMessage::LimitBreach {
                    limit: limit.name.to_string(),
                    current: limit.current,
                    threshold: limit.limit,
                });
            }
        }
        self.breached = self.risk.breached;

        self.publish_snapshot();
        Ok(())
    }

    fn transition(&mut self, to: EngineState, reason: &str) {
        self.engine_state = to;
        self.state.broadcast(WsMessage::EngineStateMsg {
            state: to.to_string(),
            reason: reason.into(),
        });
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            engine_state: self.engine_state,
            timestamp: chrono::Utc::now().to_rfc3339(),
            quotes: self.quotes.values().cloned().collect(),
            positions: self.marks.clone(),
            pnl: self.pnl.clone(),
            risk: self.risk.clone(),
        }
    }

    fn publish_snapshot(&self) {
        // watch::send only fails with no receivers; AppState keeps one
        let _ = self.state.snapshot_tx.send(self.snapshot());
    }
}

/// Core engine loop. Receives events, updates state, publishes snapshots.
pub async fn run_engine(state: Arc<AppState>, mut rx: mpsc::Receiver<EngineEvent>) {
    tracing::info!("engine task started");
    let mut engine = Engine::new(state.clone());

    while let Some(event) = rx.recv().await {
        match engine.process_event(event) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                tracing::error!(error = %e, "engine error");
                state.counters.errors_recovered.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    tracing::info!(state = %engine.engine_state(), "engine task shutting down");
}
