use super::matching::{normalize_name, EventMatch, MatchMethod, MatchStatus};
use super::{MarketKind, OutcomeQuote, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Odds-feed payload (already fetched by the ingestion collaborator) ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedOutcome {
    pub name: String,
    pub price: Option<i32>,
    pub point: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedMarket {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<FeedOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedBookmaker {
    pub key: String,
    #[serde(default)]
    pub markets: Vec<FeedMarket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvent {
    pub id: String,
    pub commence_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<FeedBookmaker>,
}

/// Resolve a feed outcome name to a side, before any flip is applied.
fn resolve_side(feed: &FeedEvent, market: MarketKind, outcome: &str) -> Option<Side> {
    match market {
        MarketKind::Total => Side::parse(outcome.trim()).filter(|s| matches!(s, Side::Over | Side::Under)),
        MarketKind::Moneyline | MarketKind::Spread => {
            let name = normalize_name(outcome);
            if name == normalize_name(&feed.home_team) {
                Some(Side::Home)
            } else if name == normalize_name(&feed.away_team) {
                Some(Side::Away)
            } else {
                None
            }
        }
    }
}

/// Turn a matched feed event into immutable quotes keyed by the schedule
/// event id. Flipped matches swap home/away. Outcomes that cannot be placed
/// are returned as skip reasons; quotes with missing prices are kept so the
/// normalizer can reject them at refresh time.
pub fn quotes_from_feed(
    feed: &FeedEvent,
    matched: &EventMatch,
    snapshot_id: &str,
    observed_at: DateTime<Utc>,
) -> (Vec<OutcomeQuote>, Vec<String>) {
    let mut quotes = Vec::new();
    let mut skipped = Vec::new();

    let event_id = match (&matched.status, &matched.event_id) {
        (MatchStatus::Matched, Some(id)) => id,
        _ => {
            skipped.push(format!("{}: {}", feed.id, matched.reason));
            return (quotes, skipped);
        }
    };
    let flipped = matched.method == Some(MatchMethod::Flipped);

    for book in &feed.bookmakers {
        for market in &book.markets {
            let Some(kind) = MarketKind::parse(&market.key) else {
                skipped.push(format!("{} @ {}: unknown market {}", feed.id, book.key, market.key));
                continue;
            };

            for outcome in &market.outcomes {
                let Some(side) = resolve_side(feed, kind, &outcome.name) else {
                    skipped.push(format!(
                        "{} @ {}: unplaceable {} outcome {:?}",
                        feed.id, book.key, kind, outcome.name
                    ));
                    continue;
                };
                let side = if flipped && kind != MarketKind::Total { side.opposite() } else { side };

                quotes.push(OutcomeQuote {
                    snapshot_id: snapshot_id.to_string(),
                    event_id: event_id.clone(),
                    market: kind,
                    side,
                    point: outcome.point,
                    bookmaker: book.key.clone(),
                    american_price: outcome.price,
                    observed_at,
                });
            }
        }
    }

    (quotes, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_feed() -> FeedEvent {
        serde_json::from_value(serde_json::json!({
            "id": "src1",
            "commence_time": "2026-01-12T00:00:00Z",
            "home_team": "Detroit Red Wings",
            "away_team": "Boston Bruins",
            "bookmakers": [{
                "key": "draftkings",
                "markets": [
                    {"key": "h2h", "outcomes": [
                        {"name": "Detroit Red Wings", "price": -130},
                        {"name": "Boston Bruins", "price": 110}
                    ]},
                    {"key": "totals", "outcomes": [
                        {"name": "Over", "price": -105, "point": 6.5},
                        {"name": "Under", "price": -115, "point": 6.5}
                    ]},
                    {"key": "player_shots", "outcomes": []}
                ]
            }]
        }))
        .unwrap()
    }

    fn matched(method: MatchMethod) -> EventMatch {
        EventMatch {
            source_event_id: "src1".into(),
            event_id: Some("g1".into()),
            status: MatchStatus::Matched,
            method: Some(method),
            reason: String::new(),
        }
    }

    #[test]
    fn test_direct_quotes() {
        let at = Utc.with_ymd_and_hms(2026, 1, 11, 18, 0, 0).unwrap();
        let (quotes, skipped) = quotes_from_feed(&sample_feed(), &matched(MatchMethod::Direct), "s1", at);
        assert_eq!(quotes.len(), 4);
        assert_eq!(skipped.len(), 1, "unknown market is skipped: {skipped:?}");
        let home = quotes.iter().find(|q| q.american_price == Some(-130)).unwrap();
        assert_eq!(home.side, Side::Home);
        assert_eq!(home.event_id, "g1");
        let over = quotes.iter().find(|q| q.side == Side::Over).unwrap();
        assert_eq!(over.point, Some(6.5));
    }

    #[test]
    fn test_flipped_swaps_team_sides_only() {
        let at = Utc.with_ymd_and_hms(2026, 1, 11, 18, 0, 0).unwrap();
        let (quotes, _) = quotes_from_feed(&sample_feed(), &matched(MatchMethod::Flipped), "s1", at);
        let det = quotes.iter().find(|q| q.american_price == Some(-130)).unwrap();
        assert_eq!(det.side, Side::Away);
        let over = quotes.iter().find(|q| q.american_price == Some(-105)).unwrap();
        assert_eq!(over.side, Side::Over);
    }

    #[test]
    fn test_unmatched_event_yields_nothing() {
        let at = Utc::now();
        let m = EventMatch {
            source_event_id: "src1".into(),
            event_id: None,
            status: MatchStatus::NotFound,
            method: None,
            reason: "no events within 90 min".into(),
        };
        let (quotes, skipped) = quotes_from_feed(&sample_feed(), &m, "s1", at);
        assert!(quotes.is_empty());
        assert_eq!(skipped.len(), 1);
    }
}
