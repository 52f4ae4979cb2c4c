use crate::errors::{EdgeError, EdgeResult};
use crate::odds::consensus::ConsensusMethod;
use chrono::Offset;
use std::path::PathBuf;

/// Tunables of the edge pipeline. Copy so the refresh loop can hand it
/// to pure functions without cloning the whole app config.
#[derive(Debug, Clone, Copy)]
pub struct EdgeConfig {
    /// Weight on market consensus when shrinking the feature model, [0, 1].
    pub shrink_factor: f64,
    /// Fractional Kelly multiplier, [0, 1].
    pub kelly_fraction: f64,
    pub bankroll: f64,
    /// Converts a feature score into a probability delta.
    pub feature_weight: f64,
    /// Cap on the absolute feature delta.
    pub max_edge: f64,
    pub watch_edge: f64,
    pub candidate_edge: f64,
    pub consensus_method: ConsensusMethod,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            shrink_factor: 0.6,
            kelly_fraction: 0.25,
            bankroll: 1000.0,
            feature_weight: 0.015,
            max_edge: 0.06,
            watch_edge: 0.005,
            candidate_edge: 0.015,
            consensus_method: ConsensusMethod::Mean,
        }
    }
}

impl EdgeConfig {
    pub fn validate(&self) -> EdgeResult<()> {
        check_unit("SHRINK_FACTOR", self.shrink_factor)?;
        check_unit("KELLY_FRACTION", self.kelly_fraction)?;
        if !self.feature_weight.is_finite() || self.feature_weight < 0.0 {
            return Err(EdgeError::Configuration(format!(
                "FEATURE_WEIGHT must be >= 0, got {}",
                self.feature_weight
            )));
        }
        if !(0.0..0.5).contains(&self.max_edge) {
            return Err(EdgeError::Configuration(format!(
                "MAX_EDGE must be in [0, 0.5), got {}",
                self.max_edge
            )));
        }
        if self.watch_edge > self.candidate_edge {
            return Err(EdgeError::Configuration(format!(
                "WATCH_EDGE ({}) must not exceed CANDIDATE_EDGE ({})",
                self.watch_edge, self.candidate_edge
            )));
        }
        Ok(())
    }
}

fn check_unit(key: &str, value: f64) -> EdgeResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EdgeError::Configuration(format!(
            "{key} must be in [0, 1], got {value}"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub server_port: u16,
    pub edge: EdgeConfig,
    pub match_window_minutes: i64,
    /// Offset used to turn UTC start times into local slate dates.
    pub local_utc_offset_hours: i32,
    pub refresh_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            server_port: 3001,
            edge: EdgeConfig::default(),
            match_window_minutes: 90,
            local_utc_offset_hours: -5,
            refresh_interval_secs: 300,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> EdgeResult<Self> {
        dotenvy::dotenv().ok();

        let consensus_method = env_var_or("CONSENSUS_METHOD", "mean")
            .parse::<ConsensusMethod>()?;

        let edge = EdgeConfig {
            shrink_factor: parse_env("SHRINK_FACTOR", "0.6")?,
            kelly_fraction: parse_env("KELLY_FRACTION", "0.25")?,
            bankroll: parse_env("BANKROLL", "1000")?,
            feature_weight: parse_env("FEATURE_WEIGHT", "0.015")?,
            max_edge: parse_env("MAX_EDGE", "0.06")?,
            watch_edge: parse_env("WATCH_EDGE", "0.005")?,
            candidate_edge: parse_env("CANDIDATE_EDGE", "0.015")?,
            consensus_method,
        };
        edge.validate()?;

        let local_utc_offset_hours: i32 = parse_env("LOCAL_UTC_OFFSET_HOURS", "-5")?;
        if !(-12..=14).contains(&local_utc_offset_hours) {
            return Err(EdgeError::Configuration(format!(
                "LOCAL_UTC_OFFSET_HOURS out of range: {local_utc_offset_hours}"
            )));
        }

        Ok(Self {
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            server_port: parse_env("SERVER_PORT", "3001")?,
            edge,
            match_window_minutes: parse_env("MATCH_WINDOW_MINUTES", "90")?,
            local_utc_offset_hours,
            refresh_interval_secs: parse_env("REFRESH_INTERVAL_SECS", "300")?,
        })
    }

    pub fn local_offset(&self) -> chrono::FixedOffset {
        local_offset(self.local_utc_offset_hours)
    }
}

/// Fixed offset for whole hours; range is checked in `from_env`.
pub fn local_offset(hours: i32) -> chrono::FixedOffset {
    chrono::FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| chrono::Utc.fix())
}

fn parse_env<T>(key: &str, default: &str) -> EdgeResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .parse::<T>()
        .map_err(|e| EdgeError::Configuration(format!("{key}: {e}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
