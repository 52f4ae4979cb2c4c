use super::ev::expected_value;
use crate::config::EdgeConfig;
use crate::odds::american::{american_to_decimal, probability_to_american, ImpliedQuote};
use crate::odds::Side;
use crate::risk::kelly::compute_kelly;
use crate::risk::limits::{check_bet, BetLabel};
use serde::{Deserialize, Serialize};

/// Best available price for one side across bookmakers.
#[derive(Debug, Clone, PartialEq)]
pub struct BestPrice {
    pub bookmaker: String,
    pub american_price: i32,
    pub decimal: f64,
    pub implied: f64,
}

/// Pick the highest-paying quote (lowest implied probability).
/// Equal prices resolve to the alphabetically first bookmaker.
pub fn best_price<'a, I>(quotes: I) -> Option<BestPrice>
where
    I: IntoIterator<Item = &'a ImpliedQuote>,
{
    quotes
        .into_iter()
        .map(|q| BestPrice {
            bookmaker: q.bookmaker.clone(),
            american_price: q.american_price,
            decimal: american_to_decimal(q.american_price),
            implied: q.implied,
        })
        .min_by(|a, b| {
            b.decimal
                .total_cmp(&a.decimal)
                .then_with(|| a.bookmaker.cmp(&b.bookmaker))
        })
}

/// One side of one event, priced at its best book. Consumed by reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub snapshot_id: String,
    pub event_id: String,
    pub side: Side,
    pub team: String,
    pub opponent: String,
    pub best_bookmaker: String,
    pub best_price: i32,
    pub best_decimal: f64,
    pub implied_prob: f64,
    pub fair_prob: f64,
    pub model_prob: f64,
    /// American price at which the model probability breaks even.
    pub fair_price_american: Option<i32>,
    /// model_prob - implied_prob at the best price
    pub edge_pct: f64,
    pub expected_value: f64,
    pub kelly_fraction: f64,
    pub recommended_stake: f64,
    pub label: BetLabel,
    pub notes: String,
}

/// Inputs for one side of a priced event.
#[derive(Debug, Clone, Copy)]
pub struct SideInputs<'a> {
    pub snapshot_id: &'a str,
    pub event_id: &'a str,
    pub side: Side,
    pub team: &'a str,
    pub opponent: &'a str,
    pub fair_prob: f64,
    pub model_prob: f64,
}

/// Edge, EV, stake and label for one side at its best price.
pub fn build_edge(inputs: SideInputs<'_>, best: &BestPrice, cfg: &EdgeConfig) -> EdgeRecord {
    let edge_pct = inputs.model_prob - best.implied;
    let ev = expected_value(inputs.model_prob, best.decimal);
    let kelly = compute_kelly(inputs.model_prob, best.decimal, cfg.bankroll, cfg.kelly_fraction);
    let check = check_bet(edge_pct, ev, kelly.stake, cfg);

    EdgeRecord {
        snapshot_id: inputs.snapshot_id.to_string(),
        event_id: inputs.event_id.to_string(),
        side: inputs.side,
        team: inputs.team.to_string(),
        opponent: inputs.opponent.to_string(),
        best_bookmaker: best.bookmaker.clone(),
        best_price: best.american_price,
        best_decimal: best.decimal,
        implied_prob: best.implied,
        fair_prob: inputs.fair_prob,
        model_prob: inputs.model_prob,
        fair_price_american: probability_to_american(inputs.model_prob),
        edge_pct,
        expected_value: ev,
        kelly_fraction: kelly.full_fraction,
        recommended_stake: kelly.stake,
        label: check.label,
        notes: check.note.to_string(),
    }
}
