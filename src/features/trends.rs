/// Team shot-volume trends.
///
/// For a team and local date, shots-for are averaged over the newest
/// `SHORT_WINDOW` and `LONG_WINDOW` prior games (games missing a shot count
/// inside the window are left out of its average):
///
///   trend      = avg_short - avg_long
///   projection = avg_short
///   edge       = projection - line
///
/// The projection is graded by its ratio to the line. Like the feature
/// snapshots, only games before the local date are used.
use super::history::{prior_games, slate_teams};
use super::{GameResult, ScheduleEvent};
use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use statrs::statistics::Statistics;

pub const SHORT_WINDOW: usize = 5;
pub const LONG_WINDOW: usize = 10;

/// Team shots-on-goal line used when the caller gives none.
pub const DEFAULT_SHOTS_LINE: f64 = 30.5;

// projection / line
const DIAMOND_RATIO: f64 = 1.28;
const GOLD_RATIO: f64 = 1.12;
const SILVER_RATIO: f64 = 1.04;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShotGrade {
    Diamond,
    Gold,
    Silver,
    Pass,
}

/// Grade a projection against a line. No projection or a non-positive line
/// is a pass.
pub fn grade_projection(projection: Option<f64>, line: f64) -> ShotGrade {
    let Some(p) = projection else {
        return ShotGrade::Pass;
    };
    if !(line > 0.0 && p.is_finite()) {
        return ShotGrade::Pass;
    }
    let ratio = p / line;
    if ratio >= DIAMOND_RATIO {
        ShotGrade::Diamond
    } else if ratio >= GOLD_RATIO {
        ShotGrade::Gold
    } else if ratio >= SILVER_RATIO {
        ShotGrade::Silver
    } else {
        ShotGrade::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShotTrend {
    pub team: String,
    pub date: NaiveDate,
    pub games_used: usize,
    pub shots_for_last5: Option<f64>,
    pub shots_for_last10: Option<f64>,
    pub shots_against_last10: Option<f64>,
    pub trend: Option<f64>,
    pub line: f64,
    pub projection: Option<f64>,
    pub edge: Option<f64>,
    pub grade: ShotGrade,
}

fn window_mean<F>(prior: &[(NaiveDate, &GameResult)], n: usize, stat: F) -> Option<f64>
where
    F: Fn(&GameResult) -> Option<i64>,
{
    let values: Vec<f64> = prior
        .iter()
        .take(n)
        .filter_map(|(_, g)| stat(g))
        .map(|v| v as f64)
        .collect();
    (!values.is_empty()).then(|| values.iter().mean())
}

pub fn shot_trend(
    team: &str,
    date: NaiveDate,
    games: &[GameResult],
    offset: FixedOffset,
    line: f64,
) -> ShotTrend {
    let prior = prior_games(team, date, games, offset);

    let short = window_mean(&prior, SHORT_WINDOW, |g| g.shots_for);
    let long = window_mean(&prior, LONG_WINDOW, |g| g.shots_for);
    let against = window_mean(&prior, LONG_WINDOW, |g| g.shots_against);
    let trend = short.zip(long).map(|(s, l)| s - l);

    ShotTrend {
        team: team.to_string(),
        date,
        games_used: prior.len().min(LONG_WINDOW),
        shots_for_last5: short,
        shots_for_last10: long,
        shots_against_last10: against,
        trend,
        line,
        projection: short,
        edge: short.map(|p| p - line),
        grade: grade_projection(short, line),
    }
}

/// Trends for every slate team, optionally limited to one local date.
/// Best grade first, then largest edge; teams without history sort last.
pub fn slate_trends(
    schedule: &[ScheduleEvent],
    games: &[GameResult],
    offset: FixedOffset,
    date: Option<NaiveDate>,
    line: f64,
) -> Vec<ShotTrend> {
    let mut out: Vec<ShotTrend> = slate_teams(schedule, offset)
        .into_iter()
        .filter(|(_, d)| date.map_or(true, |want| *d == want))
        .map(|(team, d)| shot_trend(&team, d, games, offset, line))
        .collect();

    out.sort_by(|a, b| {
        a.grade.cmp(&b.grade).then_with(|| {
            let ea = a.edge.unwrap_or(f64::NEG_INFINITY);
            let eb = b.edge.unwrap_or(f64::NEG_INFINITY);
            eb.total_cmp(&ea)
        })
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn est() -> FixedOffset {
        FixedOffset::west_opt(5 * 3600).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    fn game(team: &str, day: u32, shots_for: Option<i64>) -> GameResult {
        GameResult {
            game_id: format!("{team}-{day}"),
            team: team.into(),
            opponent: "OPP".into(),
            is_home: day % 2 == 0,
            // 17:00 UTC keeps the local date on the same day
            start_time: Utc.with_ymd_and_hms(2026, 1, day, 17, 0, 0).unwrap(),
            goals_for: Some(3),
            goals_against: Some(2),
            shots_for,
            shots_against: Some(28),
        }
    }

    #[test]
    fn test_grades_follow_line_ratio() {
        assert_eq!(grade_projection(Some(3.3), 2.5), ShotGrade::Diamond);
        assert_eq!(grade_projection(Some(2.9), 2.5), ShotGrade::Gold);
        assert_eq!(grade_projection(Some(2.65), 2.5), ShotGrade::Silver);
        assert_eq!(grade_projection(Some(2.55), 2.5), ShotGrade::Pass);
        assert_eq!(grade_projection(None, 2.5), ShotGrade::Pass);
        assert_eq!(grade_projection(Some(40.0), 0.0), ShotGrade::Pass);
    }

    #[test]
    fn test_rising_volume_has_positive_trend() {
        // days 1..=10: 26 shots early, 36 in the newest five
        let games: Vec<GameResult> = (1..=10)
            .map(|day| game("DET", day, Some(if day > 5 { 36 } else { 26 })))
            .collect();
        let t = shot_trend("DET", d(12), &games, est(), DEFAULT_SHOTS_LINE);

        assert_eq!(t.games_used, 10);
        assert_eq!(t.shots_for_last5, Some(36.0));
        assert_eq!(t.shots_for_last10, Some(31.0));
        assert_eq!(t.trend, Some(5.0));
        assert_eq!(t.shots_against_last10, Some(28.0));
        assert!((t.edge.unwrap() - 5.5).abs() < 1e-12);
        assert_eq!(t.grade, ShotGrade::Gold);
    }

    #[test]
    fn test_same_day_game_is_not_used() {
        let games = vec![game("DET", 11, Some(20)), game("DET", 12, Some(60))];
        let t = shot_trend("DET", d(12), &games, est(), DEFAULT_SHOTS_LINE);
        assert_eq!(t.games_used, 1);
        assert_eq!(t.projection, Some(20.0));
        assert_eq!(t.grade, ShotGrade::Pass);
    }

    #[test]
    fn test_missing_shot_counts_are_left_out() {
        let games = vec![game("DET", 9, Some(30)), game("DET", 10, None), game("DET", 11, Some(34))];
        let t = shot_trend("DET", d(12), &games, est(), DEFAULT_SHOTS_LINE);
        assert_eq!(t.games_used, 3);
        assert_eq!(t.shots_for_last5, Some(32.0));

        let none = shot_trend("BOS", d(12), &games, est(), DEFAULT_SHOTS_LINE);
        assert_eq!(none.games_used, 0);
        assert!(none.trend.is_none());
        assert_eq!(none.grade, ShotGrade::Pass);
    }

    #[test]
    fn test_slate_trends_sorted_by_grade() {
        let schedule = vec![ScheduleEvent {
            event_id: "e1".into(),
            home_team: "DET".into(),
            away_team: "BOS".into(),
            start_time: Utc.with_ymd_and_hms(2026, 1, 13, 0, 0, 0).unwrap(),
        }];
        let mut games: Vec<GameResult> = (5..=9).map(|day| game("DET", day, Some(29))).collect();
        games.extend((5..=9).map(|day| game("BOS", day, Some(40))));

        let trends = slate_trends(&schedule, &games, est(), None, DEFAULT_SHOTS_LINE);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].team, "BOS");
        assert_eq!(trends[0].grade, ShotGrade::Diamond);
        assert_eq!(trends[1].grade, ShotGrade::Pass);
        assert_eq!(trends[0].date, d(12), "7pm local on the 12th");

        assert!(slate_trends(&schedule, &games, est(), Some(d(13)), DEFAULT_SHOTS_LINE).is_empty());
    }
}
