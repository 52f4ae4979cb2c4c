mod config;
mod db;
mod errors;
mod execution;
mod features;
mod ingest;
mod models;
mod odds;
mod pipeline;
mod refresh;
mod report;
mod risk;
mod server;
mod state;

use crate::state::{AppState, RefreshEvent};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("puck_edge starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        shrink = cfg.edge.shrink_factor,
        kelly = cfg.edge.kelly_fraction,
        bankroll = cfg.edge.bankroll,
        consensus = cfg.edge.consensus_method.as_str(),
        "edge config loaded"
    );

    // Init database
    let db_pool = match db::init_db(&cfg.data_dir) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("database init error: {e}");
            std::process::exit(1);
        }
    };

    // Bounded refresh queue; a full queue means a refresh is already pending
    let (refresh_tx, refresh_rx) = mpsc::channel::<RefreshEvent>(16);
    let app_state = AppState::new(cfg.clone(), db_pool, refresh_tx.clone());

    // ── Spawn tasks ──

    // 1. Refresh task (the only writer of derived tables)
    let refresh_state = app_state.clone();
    let refresh_handle = tokio::spawn(async move {
        refresh::run_refresh_loop(refresh_state, refresh_rx).await;
    });

    // 2. Interval ticker
    let tick_tx = refresh_tx.clone();
    let interval_secs = cfg.refresh_interval_secs;
    tokio::spawn(async move {
        refresh::run_ticker(interval_secs, tick_tx).await;
    });

    // 3. Axum HTTP + WS server
    let app = server::router(app_state.clone());
    let addr = format!("0.0.0.0:{}", cfg.server_port);
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("signal handler error: {e}");
        }
    };
    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!("server error: {e}");
    }

    // Let an in-flight refresh finish before exiting
    if refresh_tx.send(RefreshEvent::Shutdown).await.is_ok() {
        let _ = refresh_handle.await;
    }
    tracing::info!("puck_edge stopped");
}
