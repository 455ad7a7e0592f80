pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// HTTP + WS surface over the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(routes::get_state))
        .route("/api/book", get(routes::get_book))
        .route("/api/risk", get(routes::get_risk))
        .route("/api/counters", get(routes::get_counters))
        .route("/api/price", post(routes::post_price))
        .route("/api/quote", post(routes::post_quote))
        .route("/api/implied-vol", post(routes::post_implied_vol))
        .route("/api/monte-carlo", post(routes::post_monte_carlo))
        .route("/ws", get(ws::ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
