pub mod history;
pub mod scorer;
pub mod trends;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled game as known to the schedule collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub event_id: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
}

/// One team's line from a finished game's box score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub game_id: String,
    pub team: String,
    pub opponent: String,
    pub is_home: bool,
    pub start_time: DateTime<Utc>,
    pub goals_for: Option<i64>,
    pub goals_against: Option<i64>,
    pub shots_for: Option<i64>,
    pub shots_against: Option<i64>,
}

/// Situational features for one team on one local date, built only from
/// games strictly before that date. `None` means no usable history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamFeatureSnapshot {
    pub team: String,
    pub date: NaiveDate,
    pub rest_days: Option<i64>,
    pub is_back_to_back: Option<bool>,
    pub goal_diff_last10: Option<i64>,
    pub shot_diff_last10: Option<i64>,
    pub games_used: usize,
}

impl TeamFeatureSnapshot {
    pub fn empty(team: &str, date: NaiveDate) -> Self {
        Self {
            team: team.to_string(),
            date,
            rest_days: None,
            is_back_to_back: None,
            goal_diff_last10: None,
            shot_diff_last10: None,
            games_used: 0,
        }
    }
}
