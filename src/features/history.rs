use super::{GameResult, ScheduleEvent, TeamFeatureSnapshot};
use chrono::{FixedOffset, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

/// Rolling window for goal/shot differentials.
const ROLLING_GAMES: usize = 10;

/// A team's games whose local date is strictly before `date`, newest first,
/// paired with that local date.
pub fn prior_games<'a>(
    team: &str,
    date: NaiveDate,
    games: &'a [GameResult],
    offset: FixedOffset,
) -> Vec<(NaiveDate, &'a GameResult)> {
    let mut prior: Vec<(NaiveDate, &GameResult)> = games
        .iter()
        .filter(|g| g.team == team)
        .map(|g| (g.start_time.with_timezone(&offset).date_naive(), g))
        .filter(|(d, _)| *d < date)
        .collect();
    prior.sort_by(|a, b| b.1.start_time.cmp(&a.1.start_time));
    prior
}

/// Slate teams paired with the local date of their game.
pub fn slate_teams(schedule: &[ScheduleEvent], offset: FixedOffset) -> BTreeSet<(String, NaiveDate)> {
    let mut wanted = BTreeSet::new();
    for event in schedule {
        let date = event.start_time.with_timezone(&offset).date_naive();
        wanted.insert((event.home_team.clone(), date));
        wanted.insert((event.away_team.clone(), date));
    }
    wanted
}

/// Build one team's feature snapshot for `date`.
///
/// Only games whose local date is strictly before `date` are used, so a
/// snapshot never sees the game it is scoring. Differentials are sums over
/// the newest `ROLLING_GAMES` games that carry the relevant stat pair.
pub fn team_snapshot(
    team: &str,
    date: NaiveDate,
    games: &[GameResult],
    offset: FixedOffset,
) -> TeamFeatureSnapshot {
    let prior = prior_games(team, date, games, offset);
    if prior.is_empty() {
        return TeamFeatureSnapshot::empty(team, date);
    }

    let rest_days = (date - prior[0].0).num_days();
    let window = &prior[..prior.len().min(ROLLING_GAMES)];

    let goal_pairs: Vec<i64> = window
        .iter()
        .filter_map(|(_, g)| Some(g.goals_for? - g.goals_against?))
        .collect();
    let shot_pairs: Vec<i64> = window
        .iter()
        .filter_map(|(_, g)| Some(g.shots_for? - g.shots_against?))
        .collect();

    TeamFeatureSnapshot {
        team: team.to_string(),
        date,
        rest_days: Some(rest_days),
        is_back_to_back: Some(rest_days == 1),
        goal_diff_last10: (!goal_pairs.is_empty()).then(|| goal_pairs.iter().sum()),
        shot_diff_last10: (!shot_pairs.is_empty()).then(|| shot_pairs.iter().sum()),
        games_used: window.len(),
    }
}

/// Snapshots for every team on the slate, keyed by (team, local date).
/// The slate is the set of scheduled events; each team is scored for the
/// local date of its game.
pub fn slate_snapshots(
    schedule: &[ScheduleEvent],
    games: &[GameResult],
    offset: FixedOffset,
) -> BTreeMap<(String, NaiveDate), TeamFeatureSnapshot> {
    slate_teams(schedule, offset)
        .into_iter()
        .map(|(team, date)| {
            let snap = team_snapshot(&team, date, games, offset);
            ((team, date), snap)
        })
        .collect()
}
