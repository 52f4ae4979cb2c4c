/// Fractional Kelly sizing for a fixed-odds bet.
///
/// f* = (b * p - q) / b
/// stake = bankroll * f* * fraction
///
/// where:
///   b = decimal_odds - 1 (net payout per unit)
///   p = model win probability, q = 1 - p
///   fraction = Kelly multiplier (0.25 = quarter Kelly)
///
/// "No bet" is a stake of 0; the stake is never negative and never exceeds
/// the bankroll. Pure function.

/// Kelly sizing result. Stack-allocated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KellyResult {
    /// Full Kelly fraction, may be negative
    pub full_fraction: f64,
    /// Recommended stake in bankroll units, in [0, bankroll]
    pub stake: f64,
}

#[inline]
pub fn compute_kelly(model_prob: f64, decimal_odds: f64, bankroll: f64, fraction: f64) -> KellyResult {
    if !(decimal_odds > 1.0) || !(bankroll > 0.0) || !model_prob.is_finite() {
        return KellyResult { full_fraction: 0.0, stake: 0.0 };
    }

    let b = decimal_odds - 1.0;
    let p = model_prob.clamp(0.0, 1.0);
    let q = 1.0 - p;
    let full_fraction = (b * p - q) / b;

    // Negative Kelly means the price is too short: no bet
    if full_fraction <= 0.0 {
        return KellyResult { full_fraction, stake: 0.0 };
    }

    let stake = (bankroll * full_fraction * fraction.clamp(0.0, 1.0)).clamp(0.0, bankroll);
    KellyResult { full_fraction, stake }
}

/// Recommended stake only.
#[inline]
pub fn kelly_stake(model_prob: f64, decimal_odds: f64, bankroll: f64, fraction: f64) -> f64 {
    compute_kelly(model_prob, decimal_odds, bankroll, fraction).stake
}
