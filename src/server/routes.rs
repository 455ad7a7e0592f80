use crate::errors::{DeskError, DeskResult};
use crate::portfolio::book::Position;
use crate::pricing::implied_vol::{implied_volatility, ImpliedVol, SolverConfig};
use crate::pricing::monte_carlo::{McConfig, MonteCarloPricer, SimulationResult};
use crate::pricing::{time_to_expiry, OptionType, PricingRequest, PricingResult};
use crate::risk::RiskReport;
use crate::state::{AppState, EngineSnapshot};
use axum::extract::State;
use axum::response::Json;
use portable_atomic::Ordering::Relaxed;
use std::sync::Arc;

/// Upper bound on caller-requested Monte Carlo work
const MAX_MC_PATHS: usize = 1_000_000;
const MAX_MC_STEPS: usize = 1_000;

/// Dashboard pricing form: expiry is a calendar date, not a year fraction.
#[derive(Debug, serde::Deserialize)]
pub struct QuoteRequest {
    pub symbol: String,
    pub strike: f64,
    /// YYYY-MM-DD, expiring at 00:00 UTC
    pub expiry: String,
    pub option_type: OptionType,
    pub spot: f64,
    pub volatility: f64,
    pub risk_free_rate: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
pub struct QuoteResponse {
    pub symbol: String,
    pub time_to_expiry: f64,
    pub black_scholes: PricingResult,
    pub monte_carlo: SimulationResult,
}

#[derive(Debug, serde::Deserialize)]
pub struct ImpliedVolRequest {
    pub market_price: f64,
    pub spot: f64,
    pub strike: f64,
    pub time_to_expiry: f64,
    pub risk_free_rate: f64,
    pub option_type: OptionType,
}

#[derive(Debug, serde::Deserialize)]
pub struct MonteCarloRequest {
    #[serde(flatten)]
    pub request: PricingRequest,
    pub paths: Option<usize>,
    pub steps: Option<usize>,
    pub seed: Option<u64>,
}

/// Count a pricing call and its outcome.
fn track<T>(state: &AppState, result: DeskResult<T>) -> DeskResult<T> {
    state.counters.pricing_requests.fetch_add(1, Relaxed);
    if result.is_err() {
        state.counters.pricing_rejections.fetch_add(1, Relaxed);
    }
    result
}

fn mc_config(state: &AppState, paths: Option<usize>, steps: Option<usize>, seed: Option<u64>) -> McConfig {
    McConfig {
        paths: paths.unwrap_or(state.config.mc_paths).min(MAX_MC_PATHS),
        steps: steps.unwrap_or(state.config.mc_steps).min(MAX_MC_STEPS),
        seed,
        confidence: state.config.mc_confidence,
    }
}

/// Simulation is CPU-bound: keep it off the async workers.
async fn simulate_blocking(config: McConfig, request: PricingRequest) -> DeskResult<SimulationResult> {
    tokio::task::spawn_blocking(move || MonteCarloPricer::new(config)?.simulate(&request))
        .await
        .map_err(|e| DeskError::Simulation(format!("worker failed: {e}")))?
}

/// GET /api/state -- current engine snapshot (from watch channel, no lock)
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<EngineSnapshot> {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot)
}

/// GET /api/book -- static position definitions
pub async fn get_book(State(state): State<Arc<AppState>>) -> Json<Vec<Position>> {
    Json(state.book.positions().to_vec())
}

/// GET /api/risk -- portfolio Greeks, VaR and limit status
pub async fn get_risk(State(state): State<Arc<AppState>>) -> Json<RiskReport> {
    Json(state.snapshot_rx.borrow().risk.clone())
}

/// POST /api/price -- closed-form price and Greeks
pub async fn post_price(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PricingRequest>,
) -> DeskResult<Json<PricingResult>> {
    track(&state, state.pricer.evaluate(&request)).map(Json)
}

/// POST /api/quote -- options screen: closed form next to a Monte Carlo estimate
pub async fn post_quote(
    State(state): State<Arc<AppState>>,
    Json(q): Json<QuoteRequest>,
) -> DeskResult<Json<QuoteResponse>> {
    let expiry = chrono::NaiveDate::parse_from_str(q.expiry.trim(), "%Y-%m-%d")?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DeskError::Parse(format!("bad expiry {}", q.expiry)))?
        .and_utc();

    let request = PricingRequest {
        spot: q.spot,
        strike: q.strike,
        time_to_expiry: time_to_expiry(expiry, chrono::Utc::now()),
        volatility: q.volatility,
        risk_free_rate: q.risk_free_rate,
        option_type: q.option_type,
    };

    let black_scholes = track(&state, state.pricer.evaluate(&request))?;
    let monte_carlo = simulate_blocking(mc_config(&state, None, None, q.seed), request).await?;

    tracing::debug!(
        symbol = %q.symbol,
        bs = black_scholes.theoretical_price,
        mc = monte_carlo.option_price,
        "quote priced"
    );

    Ok(Json(QuoteResponse {
        symbol: q.symbol,
        time_to_expiry: request.time_to_expiry,
        black_scholes,
        monte_carlo,
    }))
}

/// POST /api/implied-vol -- bisection on the closed form
pub async fn post_implied_vol(
    State(state): State<Arc<AppState>>,
    Json(q): Json<ImpliedVolRequest>,
) -> DeskResult<Json<ImpliedVol>> {
    let request = PricingRequest {
        spot: q.spot,
        strike: q.strike,
        time_to_expiry: q.time_to_expiry,
        // Placeholder; the solver replaces it
        volatility: 0.2,
        risk_free_rate: q.risk_free_rate,
        option_type: q.option_type,
    };
    let result = implied_volatility(q.market_price, &request, SolverConfig::default());
    track(&state, result).map(Json)
}

/// POST /api/monte-carlo -- simulation with optional paths/steps/seed
pub async fn post_monte_carlo(
    State(state): State<Arc<AppState>>,
    Json(q): Json<MonteCarloRequest>,
) -> DeskResult<Json<SimulationResult>> {
    let config = mc_config(&state, q.paths, q.steps, q.seed);
    let result = simulate_blocking(config, q.request).await;
    track(&state, result).map(Json)
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ticks_processed": state.counters.ticks_processed.load(Relaxed),
        "quotes_received": state.counters.quotes_received.load(Relaxed),
        "book_marks": state.counters.book_marks.load(Relaxed),
        "pricing_requests": state.counters.pricing_requests.load(Relaxed),
        "pricing_rejections": state.counters.pricing_rejections.load(Relaxed),
        "errors_recovered": state.counters.errors_recovered.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::portfolio::book::OptionBook;
    use axum::response::IntoResponse;

    fn app_state() -> Arc<AppState> {
        let cfg = AppConfig::from_lookup(|k| match k {
            "MC_PATHS" => Some("2000".into()),
            "MC_STEPS" => Some("4".into()),
            _ => None,
        })
        .unwrap();
        AppState::new(cfg, Arc::new(OptionBook::sample(chrono::Utc::now())))
    }

    fn request() -> PricingRequest {
        PricingRequest {
            spot: 150.25,
            strike: 155.0,
            time_to_expiry: 0.1917,
            volatility: 0.25,
            risk_free_rate: 0.05,
            option_type: OptionType::Call,
        }
    }

    #[tokio::test]
    async fn test_price_ok_and_counted() {
        let state = app_state();
        let Json(r) = post_price(State(state.clone()), Json(request())).await.unwrap();
        assert!((r.theoretical_price - 5.1213).abs() < 1e-2);
        assert_eq!(state.counters.pricing_requests.load(Relaxed), 1);
        assert_eq!(state.counters.pricing_rejections.load(Relaxed), 0);
    }

    #[tokio::test]
    async fn test_price_rejects_expired_with_422() {
        let state = app_state();
        let bad = PricingRequest { time_to_expiry: 0.0, ..request() };
        let err = post_price(State(state.clone()), Json(bad)).await.unwrap_err();
        assert_eq!(
            err.into_response().status(),
            axum::http::StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(state.counters.pricing_rejections.load(Relaxed), 1);
    }

    #[tokio::test]
    async fn test_quote_from_expiry_date() {
        let state = app_state();
        let expiry = (chrono::Utc::now() + chrono::Duration::days(90)).format("%Y-%m-%d").to_string();
        let q = QuoteRequest {
            symbol: "AAPL".into(),
            strike: 155.0,
            expiry,
            option_type: OptionType::Put,
            spot: 150.25,
            volatility: 0.25,
            risk_free_rate: 0.05,
            seed: Some(11),
        };
        let Json(resp) = post_quote(State(state), Json(q)).await.unwrap();
        assert!(resp.time_to_expiry > 88.0 / 365.0 && resp.time_to_expiry < 91.0 / 365.0);
        assert_eq!(resp.monte_carlo.paths, 2000);
        let diff = (resp.monte_carlo.option_price - resp.black_scholes.theoretical_price).abs();
        assert!(diff < 5.0 * resp.monte_carlo.standard_error, "diff={diff}");
    }

    #[tokio::test]
    async fn test_quote_past_expiry_rejected() {
        let q = QuoteRequest {
            symbol: "SPY".into(),
            strike: 420.0,
            expiry: "2024-02-16".into(),
            option_type: OptionType::Put,
            spot: 425.0,
            volatility: 0.2,
            risk_free_rate: 0.05,
            seed: None,
        };
        let err = post_quote(State(app_state()), Json(q)).await.unwrap_err();
        assert!(matches!(err, DeskError::InvalidInput { field: "time_to_expiry", .. }));
    }

    #[tokio::test]
    async fn test_quote_bad_date_is_parse_error() {
        let q = QuoteRequest {
            symbol: "SPY".into(),
            strike: 420.0,
            expiry: "16/02/2024".into(),
            option_type: OptionType::Put,
            spot: 425.0,
            volatility: 0.2,
            risk_free_rate: 0.05,
            seed: None,
        };
        let err = post_quote(State(app_state()), Json(q)).await.unwrap_err();
        assert!(matches!(err, DeskError::Parse(_)));
    }

    #[tokio::test]
    async fn test_implied_vol_round_trip() {
        let state = app_state();
        let target = crate::pricing::black_scholes::price(&request()).unwrap().theoretical_price;
        let q = ImpliedVolRequest {
            market_price: target,
            spot: 150.25,
            strike: 155.0,
            time_to_expiry: 0.1917,
            risk_free_rate: 0.05,
            option_type: OptionType::Call,
        };
        let Json(iv) = post_implied_vol(State(state), Json(q)).await.unwrap();
        assert!((iv.volatility - 0.25).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_monte_carlo_request_parsing_and_caps() {
        let body = serde_json::json!({
            "spot": 100.0, "strike": 100.0, "time_to_expiry": 1.0,
            "volatility": 0.2, "risk_free_rate": 0.0, "option_type": "CALL",
            "paths": 5_000_000, "steps": 1, "seed": 5
        });
        let q: MonteCarloRequest = serde_json::from_value(body).unwrap();
        let state = app_state();
        let config = mc_config(&state, q.paths, q.steps, q.seed);
        assert_eq!(config.paths, MAX_MC_PATHS);
        assert_eq!(config.steps, 1);
        assert_eq!(config.seed, Some(5));
    }

    #[tokio::test]
    async fn test_book_lists_positions() {
        let Json(positions) = get_book(State(app_state())).await;
        assert_eq!(positions.len(), 5);
        assert!(positions.iter().all(|p| !p.id.is_empty()));
    }
}
