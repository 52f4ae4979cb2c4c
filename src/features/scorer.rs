/// Linear situational score for a home/away pairing.
///
/// score = 0.35 * (home_gd10 - away_gd10)
///       + 0.05 * (home_sd10 - away_sd10)
///       + 0.40 * (home_rest - away_rest)
///       - 0.75 * home_b2b + 0.75 * away_b2b
///
/// delta = clamp(score * feature_weight, -max_edge, max_edge)
///
/// Missing values count as zero (neutral). Pure functions.
use super::TeamFeatureSnapshot;
use serde::Serialize;

const W_GOAL_DIFF: f64 = 0.35;
const W_SHOT_DIFF: f64 = 0.05;
const W_REST: f64 = 0.40;
const W_BACK_TO_BACK: f64 = 0.75;

#[derive(Debug, Clone, Copy)]
pub struct ScorerParams {
    pub feature_weight: f64,
    pub max_edge: f64,
}

/// Score and the probability delta it converts to (home perspective).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureScore {
    pub score: f64,
    pub delta: f64,
}

#[inline]
fn num(v: Option<i64>) -> f64 {
    v.unwrap_or(0) as f64
}

#[inline]
fn flag(v: Option<bool>) -> f64 {
    if v.unwrap_or(false) { 1.0 } else { 0.0 }
}

/// Raw, unbounded feature score.
pub fn raw_score(home: &TeamFeatureSnapshot, away: &TeamFeatureSnapshot) -> f64 {
    W_GOAL_DIFF * (num(home.goal_diff_last10) - num(away.goal_diff_last10))
        + W_SHOT_DIFF * (num(home.shot_diff_last10) - num(away.shot_diff_last10))
        + W_REST * (num(home.rest_days) - num(away.rest_days))
        - W_BACK_TO_BACK * flag(home.is_back_to_back)
        + W_BACK_TO_BACK * flag(away.is_back_to_back)
}

pub fn score(home: &TeamFeatureSnapshot, away: &TeamFeatureSnapshot, params: ScorerParams) -> FeatureScore {
    let score = raw_score(home, away);
    let max = params.max_edge.abs();
    let delta = (score * params.feature_weight).clamp(-max, max);
    FeatureScore { score, delta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const PARAMS: ScorerParams = ScorerParams { feature_weight: 0.015, max_edge: 0.06 };

    fn snap(team: &str) -> TeamFeatureSnapshot {
        TeamFeatureSnapshot::empty(team, NaiveDate::from_ymd_opt(2026, 1, 12).unwrap())
    }

    #[test]
    fn test_empty_features_are_neutral() {
        let s = score(&snap("DET"), &snap("BOS"), PARAMS);
        assert_eq!(s.score, 0.0);
        assert_eq!(s.delta, 0.0);
    }

    #[test]
    fn test_weighted_combination() {
        let mut home = snap("DET");
        home.goal_diff_last10 = Some(4);
        home.shot_diff_last10 = Some(20);
        home.rest_days = Some(2);
        home.is_back_to_back = Some(false);
        let mut away = snap("BOS");
        away.goal_diff_last10 = Some(-2);
        away.shot_diff_last10 = Some(-10);
        away.rest_days = Some(1);
        away.is_back_to_back = Some(true);

        let s = score(&home, &away, PARAMS);
        let expected = 0.35 * 6.0 + 0.05 * 30.0 + 0.40 * 1.0 + 0.75;
        assert!((s.score - expected).abs() < 1e-12, "score={}", s.score);
        assert!((s.delta - 0.06).abs() < 1e-12, "delta is capped: {}", s.delta);
    }

    #[test]
    fn test_delta_clamped_both_ways() {
        let mut home = snap("DET");
        home.goal_diff_last10 = Some(-40);
        let s = score(&home, &snap("BOS"), PARAMS);
        assert!((s.delta + 0.06).abs() < 1e-12);

        let mut away = snap("BOS");
        away.goal_diff_last10 = Some(1);
        let s = score(&snap("DET"), &away, PARAMS);
        assert!((s.delta - (-0.35 * 0.015)).abs() < 1e-12, "small scores pass through");
    }

    #[test]
    fn test_home_back_to_back_penalized() {
        let mut home = snap("DET");
        home.is_back_to_back = Some(true);
        let s = score(&home, &snap("BOS"), PARAMS);
        assert!(s.delta < 0.0);
    }
}
