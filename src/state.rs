use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::{EdgeError, EdgeResult};
use crate::report::SlateSummary;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};

// ── Refresh status ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    /// No refresh has completed yet.
    Waiting,
    Ready,
    Failed,
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ── Messages INTO the refresh task (bounded channel) ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    Tick,
    Trigger,
    Shutdown,
}

// ── Messages OUT to WebSocket clients ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "snapshot_ingested")]
    SnapshotIngested {
        snapshot_id: String,
        quotes: usize,
        matched: usize,
        ambiguous: usize,
        not_found: usize,
    },

    #[serde(rename = "data_loaded")]
    DataLoaded { kind: String, rows: usize },

    #[serde(rename = "refresh_complete")]
    RefreshComplete {
        run_id: String,
        summary: SlateSummary,
        skips: usize,
        timestamp: String,
    },

    #[serde(rename = "refresh_failed")]
    RefreshFailed {
        reason: String,
        timestamp: String,
    },
}

// ── Latest refresh for the dashboard (sent via watch channel) ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct RefreshSnapshot {
    pub status: RefreshStatus,
    pub last_run_id: Option<String>,
    pub last_run_at: Option<String>,
    pub last_error: Option<String>,
    pub summary: SlateSummary,
    pub skips: usize,
}

impl Default for RefreshSnapshot {
    fn default() -> Self {
        Self {
            status: RefreshStatus::Waiting,
            last_run_id: None,
            last_run_at: None,
            last_error: None,
            summary: SlateSummary::default(),
            skips: 0,
        }
    }
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub snapshots_ingested: AtomicU64,
    pub quotes_ingested: AtomicU64,
    pub refreshes_run: AtomicU64,
    pub refreshes_failed: AtomicU64,
    pub skips_recorded: AtomicU64,
    pub refresh_requests_dropped: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            snapshots_ingested: AtomicU64::new(0),
            quotes_ingested: AtomicU64::new(0),
            refreshes_run: AtomicU64::new(0),
            refreshes_failed: AtomicU64::new(0),
            skips_recorded: AtomicU64::new(0),
            refresh_requests_dropped: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,

    // Refresh task -> Dashboard: latest refresh (watch = single producer, multi consumer)
    pub snapshot_tx: watch::Sender<RefreshSnapshot>,
    pub snapshot_rx: watch::Receiver<RefreshSnapshot>,

    // Event stream for WS clients
    pub ws_tx: broadcast::Sender<WsMessage>,

    // Ticker/API -> Refresh task: bounded request channel
    pub refresh_tx: mpsc::Sender<RefreshEvent>,

    // Lock-free performance counters
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, refresh_tx: mpsc::Sender<RefreshEvent>) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(RefreshSnapshot::default());

        Arc::new(Self {
            config,
            db,
            snapshot_tx,
            snapshot_rx,
            ws_tx,
            refresh_tx,
            counters: PerfCounters::new(),
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.ws_tx.send(msg);
    }

    /// Non-blocking enqueue of a manual refresh. A full queue already holds a
    /// pending refresh, so the request is counted as dropped and `false` returned.
    pub fn request_refresh(&self) -> EdgeResult<bool> {
        match self.refresh_tx.try_send(RefreshEvent::Trigger) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                self.counters.refresh_requests_dropped.fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
            Err(TrySendError::Closed(_)) => Err(EdgeError::ChannelClosed("refresh task".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_request_refresh_counts_drops_and_closure() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = AppState::new(AppConfig::default(), db::open_in_memory().unwrap(), tx);

        assert!(state.request_refresh().unwrap());
        assert!(!state.request_refresh().unwrap());
        assert_eq!(state.counters.refresh_requests_dropped.load(Ordering::Relaxed), 1);
        assert_eq!(rx.recv().await, Some(RefreshEvent::Trigger));

        drop(rx);
        assert!(matches!(state.request_refresh(), Err(EdgeError::ChannelClosed(_))));
    }
}
