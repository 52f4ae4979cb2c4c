use crate::config::AppConfig;
use crate::db::{self, DbPool, RunLog, RUN_FAIL, RUN_OK};
use crate::errors::{EdgeError, EdgeResult};
use crate::features::history::slate_snapshots;
use crate::pipeline::{run_pipeline, RefreshOutput};
use crate::report::{summarize, SlateSummary};
use crate::state::{AppState, RefreshEvent, RefreshSnapshot, RefreshStatus, WsMessage};
use chrono::Utc;
use portable_atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Result of one successful refresh pass.
#[derive(Debug, Clone)]
pub struct RefreshRun {
    pub run_id: String,
    pub snapshot_id: String,
    pub output: RefreshOutput,
    pub summary: SlateSummary,
}

/// Recompute everything derived from one snapshot and persist it.
fn refresh_snapshot(db: &DbPool, cfg: &AppConfig, snapshot_id: &str) -> EdgeResult<RefreshOutput> {
    let quotes = db::load_quotes(db, snapshot_id)?;
    let schedule = db::load_schedule(db)?;
    let games = db::load_games(db)?;
    let offset = cfg.local_offset();

    let features = slate_snapshots(&schedule, &games, offset);
    let output = run_pipeline(snapshot_id, &quotes, &schedule, &features, offset, &cfg.edge);

    let feature_rows: Vec<_> = features.values().collect();
    db::save_refresh(db, snapshot_id, &output, &feature_rows)?;
    Ok(output)
}

/// Write the `FAIL` row and hand back the refresh error. A run-log write
/// failure is only logged so the original cause survives.
fn record_failure(db: &DbPool, mut log: RunLog, err: EdgeError) -> EdgeError {
    log.status = RUN_FAIL.into();
    log.message = err.to_string();
    if let Err(log_err) = db::insert_run_log(db, &log) {
        tracing::error!(run = %log.run_id, error = %log_err, "failed to record failed run");
    }
    err
}

/// One refresh of the latest snapshot with its run-log row. A failure is
/// logged as `FAIL` and returned; the caller keeps running.
/// `Ok(None)` when nothing has been ingested yet.
pub fn run_refresh(db: &DbPool, cfg: &AppConfig) -> EdgeResult<Option<RefreshRun>> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let mut log = RunLog {
        run_id: run_id.clone(),
        snapshot_id: None,
        started_at: Utc::now().to_rfc3339(),
        finished_at: String::new(),
        status: RUN_OK.into(),
        message: String::new(),
        edges: 0,
        skips: 0,
    };

    let snapshot_id = match db::latest_snapshot(db) {
        Ok(None) => return Ok(None),
        Ok(Some(snapshot)) => snapshot.snapshot_id,
        Err(e) => {
            log.finished_at = Utc::now().to_rfc3339();
            return Err(record_failure(db, log, e));
        }
    };
    log.snapshot_id = Some(snapshot_id.clone());

    let result = refresh_snapshot(db, cfg, &snapshot_id);
    log.finished_at = Utc::now().to_rfc3339();
    let output = match result {
        Ok(output) => output,
        Err(e) => return Err(record_failure(db, log, e)),
    };

    log.message = format!("{} markets, {} edges", output.fair.len(), output.edges.len());
    log.edges = output.edges.len() as i64;
    log.skips = output.skips.len() as i64;
    db::insert_run_log(db, &log)?;

    let summary = summarize(Some(&snapshot_id), &output.edges);
    Ok(Some(RefreshRun { run_id, snapshot_id, output, summary }))
}

/// Refresh task. Owns the only refresh path, so passes never overlap.
pub async fn run_refresh_loop(state: Arc<AppState>, mut rx: mpsc::Receiver<RefreshEvent>) {
    tracing::info!("refresh task started");

    while let Some(event) = rx.recv().await {
        if event == RefreshEvent::Shutdown {
            tracing::info!("shutdown event received");
            break;
        }

        let db = state.db.clone();
        let cfg = state.config.clone();
        let joined = tokio::task::spawn_blocking(move || run_refresh(&db, &cfg)).await;
        let result = joined.unwrap_or_else(|e| Err(EdgeError::ChannelClosed(format!("refresh worker: {e}"))));
        let timestamp = Utc::now().to_rfc3339();

        match result {
            Ok(Some(run)) => {
                state.counters.refreshes_run.fetch_add(1, Ordering::Relaxed);
                state.counters.skips_recorded.fetch_add(run.output.skips.len() as u64, Ordering::Relaxed);
                tracing::info!(
                    run = %run.run_id,
                    snapshot = %run.snapshot_id,
                    edges = run.summary.edges,
                    candidates = run.summary.candidates,
                    skips = run.output.skips.len(),
                    trigger = ?event,
                    "refresh complete"
                );

                let skips = run.output.skips.len();
                state.snapshot_tx.send_modify(|s| {
                    *s = RefreshSnapshot {
                        status: RefreshStatus::Ready,
                        last_run_id: Some(run.run_id.clone()),
                        last_run_at: Some(timestamp.clone()),
                        last_error: None,
                        summary: run.summary.clone(),
                        skips,
                    };
                });
                state.broadcast(WsMessage::RefreshComplete {
                    run_id: run.run_id,
                    summary: run.summary,
                    skips,
                    timestamp,
                });
            }
            Ok(None) => {
                tracing::debug!(trigger = ?event, "no snapshot to refresh");
            }
            Err(e) => {
                state.counters.refreshes_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, "refresh failed");
                state.snapshot_tx.send_modify(|s| {
                    s.status = RefreshStatus::Failed;
                    s.last_run_at = Some(timestamp.clone());
                    s.last_error = Some(e.to_string());
                });
                state.broadcast(WsMessage::RefreshFailed {
                    reason: e.to_string(),
                    timestamp,
                });
            }
        }
    }

    tracing::info!("refresh task shutting down");
}

/// Interval ticker feeding the refresh task.
pub async fn run_ticker(interval_secs: u64, tx: mpsc::Sender<RefreshEvent>) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;
        if tx.send(RefreshEvent::Tick).await.is_err() {
            break;
        }
    }
}
