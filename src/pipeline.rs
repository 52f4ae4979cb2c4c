use crate::config::EdgeConfig;
use crate::execution::edge::{best_price, build_edge, EdgeRecord, SideInputs};
use crate::features::scorer::{score, ScorerParams};
use crate::features::{ScheduleEvent, TeamFeatureSnapshot};
use crate::models::shrinkage::{shrink, ModelProbability};
use crate::odds::american::{normalize_quote, ImpliedQuote};
use crate::odds::consensus::{build_consensus, FairProbability};
use crate::odds::{MarketKind, OutcomeQuote, Side};
use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Feature snapshots keyed by (team, local date).
pub type FeatureMap = BTreeMap<(String, NaiveDate), TeamFeatureSnapshot>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipScope {
    Quote,
    Market,
    Event,
}

/// A per-item failure. The pass keeps going.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skip {
    pub scope: SkipScope,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshOutput {
    pub fair: Vec<FairProbability>,
    pub model: Vec<ModelProbability>,
    pub edges: Vec<EdgeRecord>,
    pub skips: Vec<Skip>,
}

/// One pass over a snapshot: normalize, aggregate, score, shrink, price.
///
/// Pure and deterministic for the same inputs. Bad quotes, thin markets and
/// events without schedule or features become skips instead of errors.
pub fn run_pipeline(
    snapshot_id: &str,
    quotes: &[OutcomeQuote],
    schedule: &[ScheduleEvent],
    features: &FeatureMap,
    offset: FixedOffset,
    cfg: &EdgeConfig,
) -> RefreshOutput {
    let mut out = RefreshOutput::default();

    // 1. Normalize
    let mut implied: Vec<ImpliedQuote> = Vec::with_capacity(quotes.len());
    for q in quotes {
        match normalize_quote(q) {
            Ok(iq) => implied.push(iq),
            Err(e) => {
                tracing::debug!(event = %q.event_id, book = %q.bookmaker, error = %e, "quote skipped");
                out.skips.push(Skip {
                    scope: SkipScope::Quote,
                    key: format!("{}:{}:{}:{}", q.event_id, q.market, q.side, q.bookmaker),
                    reason: e.to_string(),
                });
            }
        }
    }

    // 2. Consensus per market
    for (key, fair) in build_consensus(&implied, cfg.consensus_method) {
        match fair {
            Ok(f) => out.fair.push(f),
            Err(e) => {
                tracing::debug!(event = %key.event_id, market = %key.market, error = %e, "market skipped");
                out.skips.push(Skip {
                    scope: SkipScope::Market,
                    key: format!("{}:{}", key.event_id, key.market),
                    reason: e.to_string(),
                });
            }
        }
    }

    // 3. Moneyline markets get a model probability and edges
    let events: HashMap<&str, &ScheduleEvent> =
        schedule.iter().map(|e| (e.event_id.as_str(), e)).collect();
    let params = ScorerParams { feature_weight: cfg.feature_weight, max_edge: cfg.max_edge };

    for fair in out.fair.iter().filter(|f| f.key.market == MarketKind::Moneyline) {
        let event_id = fair.key.event_id.as_str();
        let event_skip = |reason: String| Skip { scope: SkipScope::Event, key: event_id.to_string(), reason };

        let Some(event) = events.get(event_id) else {
            tracing::warn!(event = %event_id, "moneyline market has no scheduled event");
            out.skips.push(event_skip("event not in schedule".into()));
            continue;
        };

        let date = event.start_time.with_timezone(&offset).date_naive();
        let home_snap = features.get(&(event.home_team.clone(), date));
        let away_snap = features.get(&(event.away_team.clone(), date));
        let (Some(home_snap), Some(away_snap)) = (home_snap, away_snap) else {
            tracing::warn!(event = %event_id, %date, "missing team features");
            out.skips.push(event_skip(format!("missing features for {date}")));
            continue;
        };

        let (Some(fair_home), Some(fair_away)) = (fair.prob(Side::Home), fair.prob(Side::Away)) else {
            out.skips.push(event_skip("moneyline lacks home/away sides".into()));
            continue;
        };

        let feat = score(home_snap, away_snap, params);
        let model = shrink(event_id, fair_home, feat.delta, cfg.shrink_factor);

        let sides = [
            (Side::Home, &event.home_team, &event.away_team, fair_home, model.home),
            (Side::Away, &event.away_team, &event.home_team, fair_away, model.away),
        ];
        for (side, team, opponent, fair_prob, model_prob) in sides {
            let best = best_price(
                implied
                    .iter()
                    .filter(|q| q.key == fair.key && q.side == side),
            );
            let Some(best) = best else {
                out.skips.push(event_skip(format!("no price for {side}")));
                continue;
            };
            let inputs = SideInputs {
                snapshot_id,
                event_id,
                side,
                team,
                opponent,
                fair_prob,
                model_prob,
            };
            out.edges.push(build_edge(inputs, &best, cfg));
        }

        out.model.push(model);
    }

    tracing::debug!(
        snapshot = %snapshot_id,
        quotes = quotes.len(),
        markets = out.fair.len(),
        edges = out.edges.len(),
        skips = out.skips.len(),
        "pipeline pass complete"
    );
    out
}
