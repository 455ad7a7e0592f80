mod config;
mod engine;
mod errors;
mod feeds;
mod portfolio;
mod pricing;
mod risk;
mod server;
mod state;

use crate::portfolio::book::OptionBook;
use crate::state::*;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("options desk starting");

    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        port = cfg.server_port,
        rate = cfg.risk_free_rate,
        vol = cfg.sim_volatility,
        symbols = cfg.sim_symbols.len(),
        theta = ?cfg.theta_convention,
        "config loaded"
    );

    let (engine_tx, engine_rx) = mpsc::channel::<EngineEvent>(512);

    let book = Arc::new(OptionBook::sample(chrono::Utc::now()));
    tracing::info!(positions = book.positions().len(), "book loaded");

    let app_state = AppState::new(cfg.clone(), book);

    // ── Spawn tasks ──

    // 1. Simulated market feed
    let feed_cfg = cfg.clone();
    let feed_tx = engine_tx.clone();
    tokio::spawn(async move {
        feeds::simulated::run_market_simulator(feed_cfg, feed_tx).await;
    });

    // 2. Tick generator, drives book re-marking
    let tick_tx = engine_tx.clone();
    let tick_ms = cfg.sim_tick_ms;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(tick_ms));
        loop {
            interval.tick().await;
            if tick_tx.send(EngineEvent::Tick).await.is_err() {
                break;
            }
        }
    });

    // 3. Engine task (sole owner of live desk state)
    let engine_state = app_state.clone();
    let engine_handle = tokio::spawn(async move {
        engine::run_engine(engine_state, engine_rx).await;
    });

    // 4. Axum HTTP + WS server
    let app = server::router(app_state.clone());

    let addr = format!("0.0.0.0:{}", cfg.server_port);
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    let shutdown_tx = engine_tx.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("signal handler error: {e}");
            return;
        }
        tracing::info!("ctrl-c received, stopping");
        let _ = shutdown_tx.send(EngineEvent::Shutdown).await;
    };

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!("server error: {e}");
    }

    let _ = engine_handle.await;
    tracing::info!("options desk stopped");
}
