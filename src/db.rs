use crate::errors::{EdgeError, EdgeResult};
use crate::execution::edge::EdgeRecord;
use crate::features::{GameResult, ScheduleEvent, TeamFeatureSnapshot};
use crate::odds::matching::EventMatch;
use crate::odds::{point_key, MarketKind, OutcomeQuote, Side};
use crate::pipeline::RefreshOutput;
use crate::risk::limits::BetLabel;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub type DbPool = Arc<Mutex<Connection>>;

pub fn init_db(data_dir: &Path) -> EdgeResult<DbPool> {
    std::fs::create_dir_all(data_dir).map_err(|e| EdgeError::Database(format!("create dir: {e}")))?;
    let db_path = data_dir.join("puck_edge.db");
    let conn = Connection::open(&db_path)?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA cache_size=-64000;")?;
    init_schema(&conn)?;

    tracing::info!("database initialized at {}", db_path.display());
    Ok(Arc::new(Mutex::new(conn)))
}

/// In-memory store with the same schema. Used by tests.
pub fn open_in_memory() -> EdgeResult<DbPool> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn init_schema(conn: &Connection) -> EdgeResult<()> {
    let schema = include_str!("../migrations/001_init.sql");
    conn.execute_batch(schema)?;
    Ok(())
}

fn lock(db: &DbPool) -> EdgeResult<MutexGuard<'_, Connection>> {
    db.lock().map_err(|e| EdgeError::Database(format!("lock poisoned: {e}")))
}

fn parse_ts(raw: &str) -> EdgeResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Text form of the quote point key. Lineless quotes share `"-"`.
fn point_key_column(point: Option<f64>) -> String {
    point.map_or_else(|| "-".to_string(), |p| point_key(p).to_string())
}

fn parse_side(raw: &str) -> EdgeResult<Side> {
    Side::parse(raw).ok_or_else(|| EdgeError::Parse(format!("unknown side {raw:?}")))
}

// ── Ingestion writes ──

pub fn upsert_schedule(db: &DbPool, events: &[ScheduleEvent]) -> EdgeResult<usize> {
    let mut conn = lock(db)?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO schedule_events (event_id, home_team, away_team, start_time) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for e in events {
            stmt.execute(params![e.event_id, e.home_team, e.away_team, e.start_time.to_rfc3339()])?;
        }
    }
    tx.commit()?;
    Ok(events.len())
}

pub fn upsert_games(db: &DbPool, games: &[GameResult]) -> EdgeResult<usize> {
    let mut conn = lock(db)?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO game_results (game_id, team, opponent, is_home, start_time, goals_for, goals_against, shots_for, shots_against)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for g in games {
            stmt.execute(params![
                g.game_id, g.team, g.opponent, g.is_home, g.start_time.to_rfc3339(),
                g.goals_for, g.goals_against, g.shots_for, g.shots_against
            ])?;
        }
    }
    tx.commit()?;
    Ok(games.len())
}

/// A snapshot ready to persist: header, quotes and the match log.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub snapshot_id: String,
    pub source: String,
    pub observed_at: DateTime<Utc>,
    pub quotes: Vec<OutcomeQuote>,
    pub matches: Vec<EventMatch>,
}

/// Writes the whole snapshot in one transaction so a refresh never sees
/// half of it.
pub fn insert_snapshot(db: &DbPool, snap: &NewSnapshot) -> EdgeResult<()> {
    let mut conn = lock(db)?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO snapshots (snapshot_id, source, observed_at) VALUES (?1, ?2, ?3)",
        params![snap.snapshot_id, snap.source, snap.observed_at.to_rfc3339()],
    )?;
    {
        // Same identity twice: the later price replaces the earlier one in place
        let mut stmt = tx.prepare(
            "INSERT INTO quotes (snapshot_id, event_id, market, side, point, point_key, bookmaker, american_price, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (snapshot_id, event_id, market, side, point_key, bookmaker)
             DO UPDATE SET point = excluded.point, american_price = excluded.american_price, observed_at = excluded.observed_at",
        )?;
        for q in &snap.quotes {
            stmt.execute(params![
                q.snapshot_id, q.event_id, q.market.as_str(), q.side.as_str(), q.point,
                point_key_column(q.point), q.bookmaker, q.american_price, q.observed_at.to_rfc3339()
            ])?;
        }
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO event_matches (snapshot_id, source_event_id, event_id, status, method, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for m in &snap.matches {
            stmt.execute(params![
                snap.snapshot_id, m.source_event_id, m.event_id, m.status.as_str(),
                m.method.map(|m| m.as_str()), m.reason
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Refresh writes ──

/// Replace derived rows for a snapshot with the output of one refresh.
pub fn save_refresh(
    db: &DbPool,
    snapshot_id: &str,
    output: &RefreshOutput,
    features: &[&TeamFeatureSnapshot],
) -> EdgeResult<()> {
    let mut conn = lock(db)?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM consensus WHERE snapshot_id = ?1", params![snapshot_id])?;
    tx.execute("DELETE FROM edges WHERE snapshot_id = ?1", params![snapshot_id])?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO team_features (team, date, rest_days, is_back_to_back, goal_diff_last10, shot_diff_last10, games_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for f in features {
            stmt.execute(params![
                f.team, f.date.to_string(), f.rest_days, f.is_back_to_back,
                f.goal_diff_last10, f.shot_diff_last10, f.games_used as i64
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO consensus (snapshot_id, event_id, market, line, first_side, second_side, first_prob, second_prob, vig, books_used, method)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for f in &output.fair {
            stmt.execute(params![
                snapshot_id, f.key.event_id, f.key.market.as_str(), f.key.line_value(),
                f.first_side.as_str(), f.second_side.as_str(), f.first, f.second, f.vig,
                f.books_used as i64, f.method.as_str()
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO edges (snapshot_id, event_id, side, team, opponent, best_bookmaker, best_price, best_decimal,
                implied_prob, fair_prob, model_prob, fair_price_american, edge_pct, expected_value, kelly_fraction,
                recommended_stake, label, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        )?;
        for e in &output.edges {
            stmt.execute(params![
                e.snapshot_id, e.event_id, e.side.as_str(), e.team, e.opponent, e.best_bookmaker,
                e.best_price, e.best_decimal, e.implied_prob, e.fair_prob, e.model_prob,
                e.fair_price_american, e.edge_pct, e.expected_value, e.kelly_fraction,
                e.recommended_stake, e.label.as_str(), e.notes
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn insert_run_log(db: &DbPool, run: &RunLog) -> EdgeResult<()> {
    let conn = lock(db)?;
    conn.execute(
        "INSERT INTO run_log (run_id, snapshot_id, started_at, finished_at, status, message, edges, skips)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run.run_id, run.snapshot_id, run.started_at, run.finished_at,
            run.status, run.message, run.edges, run.skips
        ],
    )?;
    Ok(())
}

// ── Reads ──

pub fn latest_snapshot(db: &DbPool) -> EdgeResult<Option<SnapshotRow>> {
    let conn = lock(db)?;
    let row = conn
        .query_row(
            "SELECT snapshot_id, source, observed_at, created_at FROM snapshots ORDER BY observed_at DESC, rowid DESC LIMIT 1",
            [],
            |row| {
                Ok(SnapshotRow {
                    snapshot_id: row.get(0)?,
                    source: row.get(1)?,
                    observed_at: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn load_quotes(db: &DbPool, snapshot_id: &str) -> EdgeResult<Vec<OutcomeQuote>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(
        "SELECT event_id, market, side, point, bookmaker, american_price, observed_at FROM quotes WHERE snapshot_id = ?1 ORDER BY id",
    )?;
    let raw = stmt.query_map(params![snapshot_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<f64>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<i32>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut quotes = Vec::new();
    for r in raw {
        let (event_id, market, side, point, bookmaker, american_price, observed_at) = r?;
        let market = MarketKind::parse(&market)
            .ok_or_else(|| EdgeError::Parse(format!("unknown market {market:?}")))?;
        quotes.push(OutcomeQuote {
            snapshot_id: snapshot_id.to_string(),
            event_id,
            market,
            side: parse_side(&side)?,
            point,
            bookmaker,
            american_price,
            observed_at: parse_ts(&observed_at)?,
        });
    }
    Ok(quotes)
}

pub fn load_schedule(db: &DbPool) -> EdgeResult<Vec<ScheduleEvent>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare("SELECT event_id, home_team, away_team, start_time FROM schedule_events ORDER BY start_time, event_id")?;
    let raw = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?))
    })?;

    let mut events = Vec::new();
    for r in raw {
        let (event_id, home_team, away_team, start_time) = r?;
        events.push(ScheduleEvent { event_id, home_team, away_team, start_time: parse_ts(&start_time)? });
    }
    Ok(events)
}

pub fn load_games(db: &DbPool) -> EdgeResult<Vec<GameResult>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(
        "SELECT game_id, team, opponent, is_home, start_time, goals_for, goals_against, shots_for, shots_against
         FROM game_results ORDER BY start_time",
    )?;
    let raw = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, String>(4)?,
            [row.get::<_, Option<i64>>(5)?, row.get(6)?, row.get(7)?, row.get(8)?],
        ))
    })?;

    let mut games = Vec::new();
    for r in raw {
        let (game_id, team, opponent, is_home, start_time, [gf, ga, sf, sa]) = r?;
        games.push(GameResult {
            game_id,
            team,
            opponent,
            is_home,
            start_time: parse_ts(&start_time)?,
            goals_for: gf,
            goals_against: ga,
            shots_for: sf,
            shots_against: sa,
        });
    }
    Ok(games)
}

pub fn get_edges(
    db: &DbPool,
    snapshot_id: &str,
    label: Option<BetLabel>,
    min_edge: Option<f64>,
) -> EdgeResult<Vec<EdgeRecord>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(
        "SELECT snapshot_id, event_id, side, team, opponent, best_bookmaker, best_price, best_decimal,
                implied_prob, fair_prob, model_prob, fair_price_american, edge_pct, expected_value,
                kelly_fraction, recommended_stake, label, notes
         FROM edges
         WHERE snapshot_id = ?1 AND (?2 IS NULL OR label = ?2) AND (?3 IS NULL OR edge_pct >= ?3)
         ORDER BY edge_pct DESC, event_id, side",
    )?;
    let raw = stmt.query_map(params![snapshot_id, label.map(|l| l.as_str()), min_edge], |row| {
        Ok((
            EdgeRecord {
                snapshot_id: row.get(0)?,
                event_id: row.get(1)?,
                side: Side::Home,
                team: row.get(3)?,
                opponent: row.get(4)?,
                best_bookmaker: row.get(5)?,
                best_price: row.get(6)?,
                best_decimal: row.get(7)?,
                implied_prob: row.get(8)?,
                fair_prob: row.get(9)?,
                model_prob: row.get(10)?,
                fair_price_american: row.get(11)?,
                edge_pct: row.get(12)?,
                expected_value: row.get(13)?,
                kelly_fraction: row.get(14)?,
                recommended_stake: row.get(15)?,
                label: BetLabel::NoPlay,
                notes: row.get(17)?,
            },
            row.get::<_, String>(2)?,
            row.get::<_, String>(16)?,
        ))
    })?;

    let mut edges = Vec::new();
    for r in raw {
        let (mut edge, side, label) = r?;
        edge.side = parse_side(&side)?;
        edge.label = BetLabel::parse(&label).ok_or_else(|| EdgeError::Parse(format!("unknown label {label:?}")))?;
        edges.push(edge);
    }
    Ok(edges)
}

pub fn get_consensus(db: &DbPool, snapshot_id: &str) -> EdgeResult<Vec<ConsensusRow>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(
        "SELECT event_id, market, line, first_side, second_side, first_prob, second_prob, vig, books_used, method
         FROM consensus WHERE snapshot_id = ?1 ORDER BY event_id, market, line",
    )?;
    let rows = stmt.query_map(params![snapshot_id], |row| {
        Ok(ConsensusRow {
            event_id: row.get(0)?,
            market: row.get(1)?,
            line: row.get(2)?,
            first_side: row.get(3)?,
            second_side: row.get(4)?,
            first_prob: row.get(5)?,
            second_prob: row.get(6)?,
            vig: row.get(7)?,
            books_used: row.get(8)?,
            method: row.get(9)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn get_features(db: &DbPool, date: Option<NaiveDate>) -> EdgeResult<Vec<TeamFeatureSnapshot>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(
        "SELECT team, date, rest_days, is_back_to_back, goal_diff_last10, shot_diff_last10, games_used
         FROM team_features WHERE (?1 IS NULL OR date = ?1) ORDER BY date DESC, team",
    )?;
    let raw = stmt.query_map(params![date.map(|d| d.to_string())], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<i64>>(2)?,
            row.get::<_, Option<bool>>(3)?,
            row.get::<_, Option<i64>>(4)?,
            row.get::<_, Option<i64>>(5)?,
            row.get::<_, i64>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for r in raw {
        let (team, date, rest_days, is_back_to_back, goal_diff_last10, shot_diff_last10, games_used) = r?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")?;
        out.push(TeamFeatureSnapshot {
            team,
            date,
            rest_days,
            is_back_to_back,
            goal_diff_last10,
            shot_diff_last10,
            games_used: games_used.max(0) as usize,
        });
    }
    Ok(out)
}

pub fn get_runs(db: &DbPool, limit: usize) -> EdgeResult<Vec<RunLog>> {
    let conn = lock(db)?;
    let mut stmt = conn.prepare(
        "SELECT run_id, snapshot_id, started_at, finished_at, status, message, edges, skips
         FROM run_log ORDER BY started_at DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(RunLog {
            run_id: row.get(0)?,
            snapshot_id: row.get(1)?,
            started_at: row.get(2)?,
            finished_at: row.get(3)?,
            status: row.get(4)?,
            message: row.get(5)?,
            edges: row.get(6)?,
            skips: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// ── Row types ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct SnapshotRow {
    pub snapshot_id: String,
    pub source: String,
    pub observed_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsensusRow {
    pub event_id: String,
    pub market: String,
    pub line: Option<f64>,
    pub first_side: String,
    pub second_side: String,
    pub first_prob: f64,
    pub second_prob: f64,
    pub vig: f64,
    pub books_used: i64,
    pub method: String,
}

pub const RUN_OK: &str = "OK";
pub const RUN_FAIL: &str = "FAIL";

#[derive(Debug, Clone, serde::Serialize)]
pub struct RunLog {
    pub run_id: String,
    pub snapshot_id: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    /// `OK` or `FAIL`
    pub status: String,
    pub message: String,
    pub edges: i64,
    pub skips: i64,
}
