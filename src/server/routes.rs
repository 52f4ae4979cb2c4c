use crate::db;
use crate::errors::EdgeResult;
use crate::features::trends::{slate_trends, DEFAULT_SHOTS_LINE};
use crate::features::{GameResult, ScheduleEvent};
use crate::ingest::{self, SnapshotPayload};
use crate::risk::limits::BetLabel;
use crate::state::{AppState, RefreshSnapshot, WsMessage};
use axum::extract::{Query, State};
use axum::response::Json;
use chrono::{NaiveDate, Utc};
use portable_atomic::Ordering::Relaxed;
use std::sync::Arc;

#[derive(serde::Deserialize)]
pub struct EdgesQuery {
    pub snapshot: Option<String>,
    pub label: Option<String>,
    pub min_edge: Option<f64>,
}

#[derive(serde::Deserialize)]
pub struct SnapshotQuery {
    pub snapshot: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct FeaturesQuery {
    pub date: Option<String>,
}

#[derive(serde::Deserialize)]
pub struct TrendsQuery {
    pub date: Option<String>,
    pub line: Option<f64>,
}

#[derive(serde::Deserialize)]
pub struct RunsQuery {
    pub limit: Option<usize>,
}

fn error_json(e: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": e.to_string() }))
}

/// Explicit snapshot id, or the latest one ingested.
fn resolve_snapshot(state: &AppState, requested: Option<String>) -> EdgeResult<Option<String>> {
    match requested {
        Some(id) => Ok(Some(id)),
        None => Ok(db::latest_snapshot(&state.db)?.map(|s| s.snapshot_id)),
    }
}

// ── Ingestion ──

/// POST /api/schedule -- upsert scheduled events
pub async fn post_schedule(
    State(state): State<Arc<AppState>>,
    Json(events): Json<Vec<ScheduleEvent>>,
) -> Json<serde_json::Value> {
    match db::upsert_schedule(&state.db, &events) {
        Ok(rows) => {
            tracing::info!(rows, "schedule loaded");
            state.broadcast(WsMessage::DataLoaded { kind: "schedule".into(), rows });
            Json(serde_json::json!({ "loaded": rows }))
        }
        Err(e) => error_json(e),
    }
}

/// POST /api/games -- upsert per-team game results
pub async fn post_games(
    State(state): State<Arc<AppState>>,
    Json(games): Json<Vec<GameResult>>,
) -> Json<serde_json::Value> {
    match db::upsert_games(&state.db, &games) {
        Ok(rows) => {
            tracing::info!(rows, "game results loaded");
            state.broadcast(WsMessage::DataLoaded { kind: "games".into(), rows });
            Json(serde_json::json!({ "loaded": rows }))
        }
        Err(e) => error_json(e),
    }
}

/// POST /api/snapshots -- match feed events, store quotes, queue a refresh
pub async fn post_snapshot(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SnapshotPayload>,
) -> Json<serde_json::Value> {
    let report = match ingest::ingest_snapshot(&state.db, &payload, state.config.match_window_minutes, Utc::now()) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "snapshot rejected");
            return error_json(e);
        }
    };

    state.counters.snapshots_ingested.fetch_add(1, Relaxed);
    state.counters.quotes_ingested.fetch_add(report.quotes as u64, Relaxed);
    state.broadcast(WsMessage::SnapshotIngested {
        snapshot_id: report.snapshot_id.clone(),
        quotes: report.quotes,
        matched: report.matched,
        ambiguous: report.ambiguous,
        not_found: report.not_found,
    });

    let queued = state.request_refresh().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "refresh not queued after ingest");
        false
    });
    Json(serde_json::json!({ "snapshot": report, "refresh_queued": queued }))
}

/// POST /api/refresh -- queue a refresh of the latest snapshot
pub async fn post_refresh(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.request_refresh() {
        Ok(queued) => Json(serde_json::json!({ "queued": queued })),
        Err(e) => error_json(e),
    }
}

// ── Reads (cold path) ──

/// GET /api/state -- latest refresh summary (from watch channel, no lock)
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<RefreshSnapshot> {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot)
}

/// GET /api/edges -- edge records, best edge first
pub async fn get_edges(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EdgesQuery>,
) -> Json<serde_json::Value> {
    let label = match params.label.as_deref().map(|l| BetLabel::parse(l).ok_or(l)) {
        None => None,
        Some(Ok(label)) => Some(label),
        Some(Err(raw)) => return error_json(format!("unknown label {raw:?}")),
    };

    let snapshot = match resolve_snapshot(&state, params.snapshot) {
        Ok(Some(id)) => id,
        Ok(None) => return Json(serde_json::json!({ "snapshot": null, "edges": [] })),
        Err(e) => return error_json(e),
    };

    match db::get_edges(&state.db, &snapshot, label, params.min_edge) {
        Ok(edges) => Json(serde_json::json!({ "snapshot": snapshot, "edges": edges })),
        Err(e) => error_json(e),
    }
}

/// GET /api/consensus -- fair probabilities per market
pub async fn get_consensus(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SnapshotQuery>,
) -> Json<serde_json::Value> {
    let snapshot = match resolve_snapshot(&state, params.snapshot) {
        Ok(Some(id)) => id,
        Ok(None) => return Json(serde_json::json!({ "snapshot": null, "consensus": [] })),
        Err(e) => return error_json(e),
    };

    match db::get_consensus(&state.db, &snapshot) {
        Ok(rows) => Json(serde_json::json!({ "snapshot": snapshot, "consensus": rows })),
        Err(e) => error_json(e),
    }
}

/// GET /api/features -- team feature snapshots, optionally for one date
pub async fn get_features(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeaturesQuery>,
) -> Json<serde_json::Value> {
    let date = match params.date.as_deref().map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d")) {
        None => None,
        Some(Ok(d)) => Some(d),
        Some(Err(e)) => return error_json(format!("bad date: {e}")),
    };

    match db::get_features(&state.db, date) {
        Ok(features) => Json(serde_json::json!({ "features": features })),
        Err(e) => error_json(e),
    }
}

/// GET /api/trends -- slate shot-volume trends graded against a shots line
pub async fn get_trends(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendsQuery>,
) -> Json<serde_json::Value> {
    let date = match params.date.as_deref().map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d")) {
        None => None,
        Some(Ok(d)) => Some(d),
        Some(Err(e)) => return error_json(format!("bad date: {e}")),
    };
    let line = params.line.unwrap_or(DEFAULT_SHOTS_LINE);
    if !(line > 0.0 && line.is_finite()) {
        return error_json(format!("line must be positive, got {line}"));
    }

    let loaded = db::load_schedule(&state.db).and_then(|s| Ok((s, db::load_games(&state.db)?)));
    match loaded {
        Ok((schedule, games)) => {
            let trends = slate_trends(&schedule, &games, state.config.local_offset(), date, line);
            Json(serde_json::json!({ "line": line, "trends": trends }))
        }
        Err(e) => error_json(e),
    }
}

/// GET /api/runs -- refresh run log, newest first
pub async fn get_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunsQuery>,
) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(20).min(200);
    match db::get_runs(&state.db, limit) {
        Ok(runs) => Json(serde_json::json!({ "runs": runs })),
        Err(e) => error_json(e),
    }
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "snapshots_ingested": state.counters.snapshots_ingested.load(Relaxed),
        "quotes_ingested": state.counters.quotes_ingested.load(Relaxed),
        "refreshes_run": state.counters.refreshes_run.load(Relaxed),
        "refreshes_failed": state.counters.refreshes_failed.load(Relaxed),
        "skips_recorded": state.counters.skips_recorded.load(Relaxed),
        "refresh_requests_dropped": state.counters.refresh_requests_dropped.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::RefreshEvent;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_refresh_request_coalesces_when_queue_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = AppState::new(AppConfig::default(), db::open_in_memory().unwrap(), tx);

        let Json(first) = post_refresh(State(state.clone())).await;
        assert_eq!(first["queued"], true);
        let Json(second) = post_refresh(State(state.clone())).await;
        assert_eq!(second["queued"], false);
        assert_eq!(state.counters.refresh_requests_dropped.load(Relaxed), 1);
        assert_eq!(rx.recv().await, Some(RefreshEvent::Trigger));
    }

    #[tokio::test]
    async fn test_trends_served_for_slate() {
        use chrono::TimeZone;

        let (tx, _rx) = mpsc::channel(1);
        let state = AppState::new(AppConfig::default(), db::open_in_memory().unwrap(), tx);
        let start = |d| Utc.with_ymd_and_hms(2026, 1, d, 0, 0, 0).unwrap();
        db::upsert_schedule(
            &state.db,
            &[ScheduleEvent { event_id: "e1".into(), home_team: "DET".into(), away_team: "BOS".into(), start_time: start(13) }],
        )
        .unwrap();
        let games: Vec<GameResult> = (5..=9)
            .map(|d| GameResult {
                game_id: format!("g{d}"),
                team: "BOS".into(),
                opponent: "CHI".into(),
                is_home: true,
                start_time: start(d),
                goals_for: Some(3),
                goals_against: Some(2),
                shots_for: Some(40),
                shots_against: Some(25),
            })
            .collect();
        db::upsert_games(&state.db, &games).unwrap();

        let Json(body) = get_trends(
            State(state.clone()),
            Query(TrendsQuery { date: Some("2026-01-12".into()), line: None }),
        )
        .await;
        assert_eq!(body["line"], DEFAULT_SHOTS_LINE);
        let trends = body["trends"].as_array().unwrap();
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0]["team"], "BOS");
        assert_eq!(trends[0]["grade"], "DIAMOND");
        assert_eq!(trends[1]["grade"], "PASS");

        let Json(body) = get_trends(State(state), Query(TrendsQuery { date: None, line: Some(-1.0) })).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_edges_on_empty_store() {
        let (tx, _rx) = mpsc::channel(1);
        let state = AppState::new(AppConfig::default(), db::open_in_memory().unwrap(), tx);
        let Json(body) = get_edges(
            State(state.clone()),
            Query(EdgesQuery { snapshot: None, label: None, min_edge: None }),
        )
        .await;
        assert!(body["snapshot"].is_null());

        let Json(body) = get_edges(
            State(state),
            Query(EdgesQuery { snapshot: None, label: Some("maybe".into()), min_edge: None }),
        )
        .await;
        assert!(body["error"].is_string());
    }
}
