/// Market-anchored shrinkage of the feature model.
///
/// raw   = clamp(fair_home + delta, 0.01, 0.99)
/// home  = (1 - s) * raw + s * fair_home
/// away  = 1 - home
///
/// `s` is the weight on the market consensus. With s >= 0.5 the model can
/// never stray further from the market than half the (already capped) delta.
use serde::Serialize;

pub const PROB_FLOOR: f64 = 0.01;
pub const PROB_CEIL: f64 = 0.99;

/// Complementary model probabilities for one moneyline market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelProbability {
    pub event_id: String,
    pub fair_home: f64,
    pub fair_away: f64,
    pub delta: f64,
    pub raw_home: f64,
    pub home: f64,
    pub away: f64,
    pub shrink: f64,
}

/// Shrink `fair_home + delta` back toward `fair_home`.
/// The result is held inside [PROB_FLOOR, PROB_CEIL] and `home + away == 1`.
#[inline]
pub fn shrink(event_id: &str, fair_home: f64, delta: f64, shrink: f64) -> ModelProbability {
    let s = shrink.clamp(0.0, 1.0);
    let raw_home = (fair_home + delta).clamp(PROB_FLOOR, PROB_CEIL);
    let home = ((1.0 - s) * raw_home + s * fair_home).clamp(PROB_FLOOR, PROB_CEIL);

    ModelProbability {
        event_id: event_id.to_string(),
        fair_home,
        fair_away: 1.0 - fair_home,
        delta,
        raw_home,
        home,
        away: 1.0 - home,
        shrink: s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_example() {
        let m = shrink("e1", 0.55, 0.02, 0.6);
        assert!((m.raw_home - 0.57).abs() < 1e-12);
        assert!((m.home - 0.558).abs() < 1e-12, "home={}", m.home);
        assert!((m.away - 0.442).abs() < 1e-12, "away={}", m.away);
    }

    #[test]
    fn test_pairs_sum_to_one_and_stay_bounded() {
        for fi in 1..100 {
            let fair = fi as f64 / 100.0;
            for di in -12..=12 {
                let delta = di as f64 / 100.0;
                for si in 0..=10 {
                    let m = shrink("e", fair, delta, si as f64 / 10.0);
                    assert!((m.home + m.away - 1.0).abs() < 1e-12);
                    assert!(m.home >= PROB_FLOOR && m.home <= PROB_CEIL, "home={} fair={fair} delta={delta}", m.home);
                    assert!(m.away >= PROB_FLOOR - 1e-12 && m.away <= PROB_CEIL + 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_more_shrink_is_closer_to_market() {
        for delta in [-0.06, -0.01, 0.005, 0.03, 0.06] {
            let mut prev_gap = f64::INFINITY;
            for si in 0..=10 {
                let m = shrink("e", 0.45, delta, si as f64 / 10.0);
                let gap = (m.home - m.fair_home).abs();
                assert!(gap < prev_gap, "shrink {si} delta {delta}: gap {gap} !< {prev_gap}");
                prev_gap = gap;
            }
        }
    }

    #[test]
    fn test_full_shrink_returns_market() {
        let m = shrink("e", 0.62, 0.05, 1.0);
        assert!((m.home - 0.62).abs() < 1e-12);
    }

    #[test]
    fn test_zero_delta_is_market() {
        let m = shrink("e", 0.48, 0.0, 0.3);
        assert!((m.home - 0.48).abs() < 1e-12);
    }
}
