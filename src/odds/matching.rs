use super::feed::FeedEvent;
use crate::features::ScheduleEvent;
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Two candidates of the same method this close to the best one make the
/// match ambiguous.
const AMBIGUITY_MINUTES: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMethod {
    /// Feed home/away agree with the schedule.
    Direct,
    /// Feed lists the teams the other way round; sides must be swapped.
    Flipped,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Flipped => "FLIPPED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Matched,
    Ambiguous,
    NotFound,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "MATCHED",
            Self::Ambiguous => "AMBIGUOUS",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventMatch {
    pub source_event_id: String,
    pub event_id: Option<String>,
    pub status: MatchStatus,
    pub method: Option<MatchMethod>,
    pub reason: String,
}

impl EventMatch {
    fn unmatched(feed: &FeedEvent, status: MatchStatus, reason: String) -> Self {
        Self {
            source_event_id: feed.id.clone(),
            event_id: None,
            status,
            method: None,
            reason,
        }
    }
}

/// Lowercase, strip accents, collapse everything else to single spaces.
///
/// Accents go through NFKD with combining marks dropped. Stroke letters have
/// no decomposition and are folded by hand.
pub fn normalize_name(raw: &str) -> String {
    let folded: String = raw
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'ø' => 'o',
            'ł' => 'l',
            'đ' => 'd',
            other => other,
        })
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Either name contains the other. Empty names never match.
#[inline]
fn names_agree(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Map one odds-feed event onto the schedule.
///
/// Candidates must start within `window_minutes` of the feed commence time.
/// The nearest name match wins unless another match of the same method sits
/// within `AMBIGUITY_MINUTES` of it.
pub fn match_event(feed: &FeedEvent, schedule: &[ScheduleEvent], window_minutes: i64) -> EventMatch {
    let window = window_minutes as f64;
    let feed_home = normalize_name(&feed.home_team);
    let feed_away = normalize_name(&feed.away_team);

    let mut in_window = 0usize;
    let mut scored: Vec<(&ScheduleEvent, f64, MatchMethod)> = Vec::new();

    for event in schedule {
        let diff_min = (event.start_time - feed.commence_time).num_seconds().abs() as f64 / 60.0;
        if diff_min > window {
            continue;
        }
        in_window += 1;

        let home = normalize_name(&event.home_team);
        let away = normalize_name(&event.away_team);

        if names_agree(&feed_home, &home) && names_agree(&feed_away, &away) {
            scored.push((event, diff_min, MatchMethod::Direct));
        } else if names_agree(&feed_home, &away) && names_agree(&feed_away, &home) {
            scored.push((event, diff_min, MatchMethod::Flipped));
        }
    }

    if in_window == 0 {
        return EventMatch::unmatched(
            feed,
            MatchStatus::NotFound,
            format!("no events within {window_minutes} min"),
        );
    }

    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    let Some(&(best, best_diff, method)) = scored.first() else {
        return EventMatch::unmatched(
            feed,
            MatchStatus::NotFound,
            "no team-name match in time window".into(),
        );
    };

    let close: Vec<&str> = scored
        .iter()
        .filter(|(_, diff, m)| *m == method && (diff - best_diff).abs() <= AMBIGUITY_MINUTES)
        .map(|(e, _, _)| e.event_id.as_str())
        .collect();
    if close.len() > 1 {
        return EventMatch::unmatched(
            feed,
            MatchStatus::Ambiguous,
            format!("multiple close matches: {}", close.join(", ")),
        );
    }

    EventMatch {
        source_event_id: feed.id.clone(),
        event_id: Some(best.event_id.clone()),
        status: MatchStatus::Matched,
        method: Some(method),
        reason: format!("{method:?} diff_min={best_diff:.1}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn sched(id: &str, home: &str, away: &str, hour: u32) -> ScheduleEvent {
        ScheduleEvent {
            event_id: id.into(),
            home_team: home.into(),
            away_team: away.into(),
            start_time: Utc.with_ymd_and_hms(2026, 1, 12, hour, 0, 0).unwrap(),
        }
    }

    fn feed(home: &str, away: &str, hour: u32) -> FeedEvent {
        FeedEvent {
            id: "src1".into(),
            commence_time: Utc.with_ymd_and_hms(2026, 1, 12, hour, 0, 0).unwrap(),
            home_team: home.into(),
            away_team: away.into(),
            bookmakers: Vec::new(),
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Montréal  Canadiens!"), "montreal canadiens");
        assert_eq!(normalize_name("St. Louis Blues"), "st louis blues");
    }

    #[test]
    fn test_normalize_name_folds_non_latin1_accents() {
        assert_eq!(normalize_name("Šťastný Čech"), "stastny cech");
        assert_eq!(normalize_name("Nørgård Łódź"), "norgard lodz");
        assert_eq!(normalize_name("ＨＣ Ｄｙｎａｍｏ"), "hc dynamo");
    }

    #[test]
    fn test_direct_match() {
        let schedule = vec![
            sched("g1", "Montreal Canadiens", "Boston Bruins", 0),
            sched("g2", "Detroit Red Wings", "Toronto Maple Leafs", 0),
        ];
        let m = match_event(&feed("Detroit Red Wings", "Toronto Maple Leafs", 0), &schedule, 90);
        assert_eq!(m.status, MatchStatus::Matched);
        assert_eq!(m.event_id.as_deref(), Some("g2"));
        assert_eq!(m.method, Some(MatchMethod::Direct));
    }

    #[test]
    fn test_flipped_match() {
        let schedule = vec![sched("g1", "Montréal Canadiens", "Boston Bruins", 0)];
        let m = match_event(&feed("Boston Bruins", "Montreal Canadiens", 0), &schedule, 90);
        assert_eq!(m.status, MatchStatus::Matched);
        assert_eq!(m.method, Some(MatchMethod::Flipped));
    }

    #[test]
    fn test_outside_window_not_found() {
        let schedule = vec![sched("g1", "Detroit Red Wings", "Boston Bruins", 0)];
        let mut f = feed("Detroit Red Wings", "Boston Bruins", 0);
        f.commence_time = f.commence_time + Duration::minutes(91);
        let m = match_event(&f, &schedule, 90);
        assert_eq!(m.status, MatchStatus::NotFound);
        assert!(m.event_id.is_none());
    }

    #[test]
    fn test_no_name_match_not_found() {
        let schedule = vec![sched("g1", "Detroit Red Wings", "Boston Bruins", 0)];
        let m = match_event(&feed("Seattle Kraken", "Boston Bruins", 0), &schedule, 90);
        assert_eq!(m.status, MatchStatus::NotFound);
        assert!(m.reason.contains("team-name"));
    }

    #[test]
    fn test_ambiguous_doubleheader() {
        let mut second = sched("g2", "Detroit Red Wings", "Boston Bruins", 0);
        second.start_time = second.start_time + Duration::minutes(5);
        let schedule = vec![sched("g1", "Detroit Red Wings", "Boston Bruins", 0), second];
        let m = match_event(&feed("Detroit Red Wings", "Boston Bruins", 0), &schedule, 90);
        assert_eq!(m.status, MatchStatus::Ambiguous);
    }

    #[test]
    fn test_nearest_wins_when_far_apart() {
        let mut later = sched("g2", "Detroit Red Wings", "Boston Bruins", 0);
        later.start_time = later.start_time + Duration::minutes(60);
        let schedule = vec![later, sched("g1", "Detroit Red Wings", "Boston Bruins", 0)];
        let m = match_event(&feed("Detroit Red Wings", "Boston Bruins", 0), &schedule, 90);
        assert_eq!(m.status, MatchStatus::Matched);
        assert_eq!(m.event_id.as_deref(), Some("g1"));
    }
}
