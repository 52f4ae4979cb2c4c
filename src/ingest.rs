use crate::db::{self, DbPool, NewSnapshot};
use crate::errors::{EdgeError, EdgeResult};
use crate::features::ScheduleEvent;
use crate::odds::dedupe_quotes;
use crate::odds::feed::{quotes_from_feed, FeedEvent};
use crate::odds::matching::{match_event, MatchStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/snapshots`.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotPayload {
    pub source: String,
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub events: Vec<FeedEvent>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub snapshot_id: String,
    pub quotes: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub not_found: usize,
    /// Quotes replaced by a later listing of the same identity.
    pub duplicates: usize,
    pub skipped: Vec<String>,
}

/// Match every feed event against the schedule and flatten the matched ones
/// into quotes. Nothing is written here.
pub fn prepare_snapshot(
    payload: &SnapshotPayload,
    schedule: &[ScheduleEvent],
    window_minutes: i64,
    now: DateTime<Utc>,
) -> EdgeResult<(NewSnapshot, IngestReport)> {
    let source = payload.source.trim();
    if source.is_empty() {
        return Err(EdgeError::Ingest("snapshot source must not be empty".into()));
    }

    let snapshot_id = uuid::Uuid::new_v4().to_string();
    let observed_at = payload.observed_at.unwrap_or(now);
    let mut report = IngestReport { snapshot_id: snapshot_id.clone(), ..Default::default() };
    let mut quotes = Vec::new();
    let mut matches = Vec::with_capacity(payload.events.len());

    for feed in &payload.events {
        let m = match_event(feed, schedule, window_minutes);
        match m.status {
            MatchStatus::Matched => report.matched += 1,
            MatchStatus::Ambiguous => report.ambiguous += 1,
            MatchStatus::NotFound => report.not_found += 1,
        }
        if m.status != MatchStatus::Matched {
            tracing::warn!(source_event = %feed.id, status = m.status.as_str(), reason = %m.reason, "feed event not matched");
        }

        let (mut q, skipped) = quotes_from_feed(feed, &m, &snapshot_id, observed_at);
        quotes.append(&mut q);
        report.skipped.extend(skipped);
        matches.push(m);
    }

    report.duplicates = dedupe_quotes(&mut quotes);
    if report.duplicates > 0 {
        tracing::debug!(duplicates = report.duplicates, "repeated quote listings collapsed");
    }
    report.quotes = quotes.len();

    let snap = NewSnapshot {
        snapshot_id,
        source: source.to_string(),
        observed_at,
        quotes,
        matches,
    };
    Ok((snap, report))
}

/// Match, flatten and persist one snapshot in a single transaction.
pub fn ingest_snapshot(
    db: &DbPool,
    payload: &SnapshotPayload,
    window_minutes: i64,
    now: DateTime<Utc>,
) -> EdgeResult<IngestReport> {
    let schedule = db::load_schedule(db)?;
    let (snap, report) = prepare_snapshot(payload, &schedule, window_minutes, now)?;
    db::insert_snapshot(db, &snap)?;
    tracing::info!(
        snapshot = %report.snapshot_id,
        quotes = report.quotes,
        matched = report.matched,
        ambiguous = report.ambiguous,
        not_found = report.not_found,
        "snapshot ingested"
    );
    Ok(report)
}
