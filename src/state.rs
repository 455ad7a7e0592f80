use crate::config::AppConfig;
use crate::portfolio::book::{OptionBook, PositionMark};
use crate::portfolio::tracker::PnlTracker;
use crate::pricing::black_scholes::BlackScholes;
use crate::risk::RiskReport;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

// ── Engine State Machine ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No quotes seen yet
    Warming,
    /// Every configured symbol has a price; book is being marked
    Live,
    Halted,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warming => write!(f, "warming"),
            Self::Live => write!(f, "live"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

// ── Messages INTO the engine (bounded channels) ──

#[derive(Debug, Clone)]
pub enum EngineEvent {
    Quote {
        symbol: String,
        price: f64,
        timestamp_ms: i64,
    },
    Tick,
    Shutdown,
}

// ── Messages OUT of the engine ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "quote")]
    Quote {
        symbol: String,
        price: f64,
        change_pct: f64,
        timestamp: String,
    },

    #[serde(rename = "book_update")]
    BookUpdate {
        market_value: f64,
        total_pnl: f64,
        delta: f64,
        gamma: f64,
        theta: f64,
        vega: f64,
        rho: f64,
    },

    #[serde(rename = "risk_update")]
    RiskUpdate {
        historical_var: f64,
        expected_shortfall: f64,
        parametric_var: f64,
        breached: bool,
    },

    #[serde(rename = "limit_breach")]
    LimitBreach {
        limit: String,
        current: f64,
        threshold: f64,
    },

    #[serde(rename = "engine_state")]
    EngineStateMsg { state: String, reason: String },
}

// ── Last quote per symbol ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct QuoteState {
    pub symbol: String,
    pub price: f64,
    pub open_price: f64,
    pub change_pct: f64,
    pub timestamp: String,
}

impl QuoteState {
    pub fn new(symbol: &str, price: f64, timestamp: String) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            open_price: price,
            change_pct: 0.0,
            timestamp,
        }
    }

    pub fn update(&mut self, price: f64, timestamp: String) {
        self.price = price;
        self.change_pct = if self.open_price > 0.0 {
            (price / self.open_price - 1.0) * 100.0
        } else {
            0.0
        };
        self.timestamp = timestamp;
    }
}

// ── Engine snapshot for dashboard (sent via watch channel) ──

/// Immutable view of the desk. Built by the engine, read by handlers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineSnapshot {
    pub engine_state: EngineState,
    pub timestamp: String,
    pub quotes: Vec<QuoteState>,
    pub positions: Vec<PositionMark>,
    pub pnl: PnlTracker,
    pub risk: RiskReport,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            engine_state: EngineState::Warming,
            timestamp: String::new(),
            quotes: Vec::new(),
            positions: Vec::new(),
            pnl: PnlTracker::new(),
            risk: RiskReport::default(),
        }
    }
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub ticks_processed: AtomicU64,
    pub quotes_received: AtomicU64,
    pub book_marks: AtomicU64,
    pub pricing_requests: AtomicU64,
    pub pricing_rejections: AtomicU64,
    pub errors_recovered: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            ticks_processed: AtomicU64::new(0),
            quotes_received: AtomicU64::new(0),
            book_marks: AtomicU64::new(0),
            pricing_requests: AtomicU64::new(0),
            pricing_rejections: AtomicU64::new(0),
            errors_recovered: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,

    /// Pricer used by request handlers, built from config once
    pub pricer: BlackScholes,

    /// Starting book, shared read-only with the engine
    pub book: Arc<OptionBook>,

    // Engine -> Dashboard: latest snapshot (watch = single producer, multi consumer)
    pub snapshot_tx: watch::Sender<EngineSnapshot>,
    pub snapshot_rx: watch::Receiver<EngineSnapshot>,

    // Engine -> Dashboard: event stream (broadcast for WS clients)
    pub ws_tx: broadcast::Sender<WsMessage>,

    // Lock-free performance counters
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, book: Arc<OptionBook>) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(2048);
        let (snapshot_tx, snapshot_rx) = watch::channel(EngineSnapshot::default());
        let pricer = BlackScholes::new(config.theta_convention);

        Arc::new(Self {
            config,
            pricer,
            book,
            snapshot_tx,
            snapshot_rx,
            ws_tx,
            counters: PerfCounters::new(),
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.ws_tx.send(msg);
    }
}
