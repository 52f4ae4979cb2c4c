/// Expected value of a unit stake at decimal odds.
///
/// EV = p * (d - 1) - (1 - p)
///
/// where:
///   p = model win probability
///   d = decimal odds (total return per unit staked)
///
/// Pure function, no side effects, no allocations.

/// Returned instead of an error when the odds cannot pay out (d <= 1).
/// Reports must never crash on a bad price.
pub const INVALID_EV: f64 = -1.0;

#[inline]
pub fn expected_value(model_prob: f64, decimal_odds: f64) -> f64 {
    if !(decimal_odds > 1.0) || !model_prob.is_finite() {
        return INVALID_EV;
    }
    let p = model_prob;
    let q = 1.0 - p;
    p * (decimal_odds - 1.0) - q
}
