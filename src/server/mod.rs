pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::{get, post};
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/schedule", post(routes::post_schedule))
        .route("/api/games", post(routes::post_games))
        .route("/api/snapshots", post(routes::post_snapshot))
        .route("/api/refresh", post(routes::post_refresh))
        .route("/api/state", get(routes::get_state))
        .route("/api/edges", get(routes::get_edges))
        .route("/api/consensus", get(routes::get_consensus))
        .route("/api/features", get(routes::get_features))
        .route("/api/trends", get(routes::get_trends))
        .route("/api/runs", get(routes::get_runs))
        .route("/api/counters", get(routes::get_counters))
        .route("/ws", get(ws::ws_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
