/// Slate summary metrics.
/// All functions are pure -- they take edge records and return computed values.

use crate::execution::edge::EdgeRecord;
use crate::risk::limits::BetLabel;

/// Headline numbers for one refreshed snapshot. Used by REST and WS.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SlateSummary {
    pub snapshot_id: Option<String>,
    pub events: usize,
    pub edges: usize,
    pub candidates: usize,
    pub watch: usize,
    pub no_play: usize,
    pub total_stake: f64,
    pub mean_edge: f64,
    pub best: Option<BestEdge>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BestEdge {
    pub event_id: String,
    pub team: String,
    pub bookmaker: String,
    pub price: i32,
    pub edge_pct: f64,
    pub label: BetLabel,
}

/// Compute the summary of an edge set. Pure function.
pub fn summarize(snapshot_id: Option<&str>, edges: &[EdgeRecord]) -> SlateSummary {
    let mut summary = SlateSummary {
        snapshot_id: snapshot_id.map(str::to_string),
        edges: edges.len(),
        ..Default::default()
    };
    if edges.is_empty() {
        return summary;
    }

    let mut events: Vec<&str> = edges.iter().map(|e| e.event_id.as_str()).collect();
    events.sort_unstable();
    events.dedup();
    summary.events = events.len();

    for e in edges {
        match e.label {
            BetLabel::Candidate => summary.candidates += 1,
            BetLabel::Watch => summary.watch += 1,
            BetLabel::NoPlay => summary.no_play += 1,
        }
        summary.total_stake += e.recommended_stake;
        summary.mean_edge += e.edge_pct;
    }
    summary.mean_edge /= edges.len() as f64;

    summary.best = edges
        .iter()
        .filter(|e| e.edge_pct.is_finite())
        .max_by(|a, b| a.edge_pct.total_cmp(&b.edge_pct))
        .map(|e| BestEdge {
            event_id: e.event_id.clone(),
            team: e.team.clone(),
            bookmaker: e.best_bookmaker.clone(),
            price: e.best_price,
            edge_pct: e.edge_pct,
            label: e.label,
        });

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::Side;

    fn edge(event: &str, side: Side, edge_pct: f64, stake: f64, label: BetLabel) -> EdgeRecord {
        EdgeRecord {
            snapshot_id: "s1".into(),
            event_id: event.into(),
            side,
            team: format!("{event}-{side}"),
            opponent: String::new(),
            best_bookmaker: "dk".into(),
            best_price: 110,
            best_decimal: 2.1,
            implied_prob: 0.476,
            fair_prob: 0.5,
            model_prob: 0.476 + edge_pct,
            fair_price_american: None,
            edge_pct,
            expected_value: 0.0,
            kelly_fraction: 0.0,
            recommended_stake: stake,
            label,
            notes: String::new(),
        }
    }

    #[test]
    fn test_empty_slate() {
        let s = summarize(None, &[]);
        assert_eq!(s.edges, 0);
        assert!(s.best.is_none());
        assert_eq!(s.mean_edge, 0.0);
    }

    #[test]
    fn test_counts_and_best() {
        let edges = vec![
            edge("e1", Side::Home, 0.03, 25.0, BetLabel::Candidate),
            edge("e1", Side::Away, -0.04, 0.0, BetLabel::NoPlay),
            edge("e2", Side::Home, 0.01, 5.0, BetLabel::Watch),
            edge("e2", Side::Away, -0.02, 0.0, BetLabel::NoPlay),
        ];
        let s = summarize(Some("s1"), &edges);
        assert_eq!(s.events, 2);
        assert_eq!((s.candidates, s.watch, s.no_play), (1, 1, 2));
        assert!((s.total_stake - 30.0).abs() < 1e-12);
        assert!((s.mean_edge - (-0.005)).abs() < 1e-12);
        let best = s.best.unwrap();
        assert_eq!(best.event_id, "e1");
        assert_eq!(best.label, BetLabel::Candidate);
    }
}
