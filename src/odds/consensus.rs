/// Cross-bookmaker consensus for two-way markets.
///
/// For each market key, implied probabilities are pooled per side across every
/// contributing quote, then the two side averages are divided by their sum to
/// strip the vig:
///
///   fair_first  = avg_first  / (avg_first + avg_second)
///   fair_second = avg_second / (avg_first + avg_second)
///
/// A market missing either side yields `InsufficientData`, never 50/50.
use super::american::ImpliedQuote;
use super::{MarketKey, Side};
use crate::errors::{EdgeError, EdgeResult};
use serde::Serialize;
use smallvec::SmallVec;
use statrs::statistics::{Data, Median, Statistics};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusMethod {
    Mean,
    Median,
}

impl ConsensusMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }
}

impl std::str::FromStr for ConsensusMethod {
    type Err = EdgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            other => Err(EdgeError::Configuration(format!(
                "CONSENSUS_METHOD must be mean or median, got {other:?}"
            ))),
        }
    }
}

/// Vig-free probability pair for one market. `first + second == 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairProbability {
    pub key: MarketKey,
    pub first_side: Side,
    pub second_side: Side,
    pub first: f64,
    pub second: f64,
    /// Overround of the pooled book: sum of side averages minus one.
    pub vig: f64,
    pub books_used: usize,
    pub method: ConsensusMethod,
}

impl FairProbability {
    pub fn prob(&self, side: Side) -> Option<f64> {
        if side == self.first_side {
            Some(self.first)
        } else if side == self.second_side {
            Some(self.second)
        } else {
            None
        }
    }
}

/// Per-market buckets of implied probabilities. Most markets see a handful of
/// books, so the buckets stay inline.
#[derive(Debug, Default)]
struct SideBuckets {
    first: SmallVec<[f64; 8]>,
    second: SmallVec<[f64; 8]>,
    first_side: Option<Side>,
    second_side: Option<Side>,
    books: BTreeSet<String>,
}

/// Aggregate one market from its per-side implied probabilities.
pub fn aggregate(
    key: &MarketKey,
    first_side: Side,
    first: &[f64],
    second: &[f64],
    books_used: usize,
    method: ConsensusMethod,
) -> EdgeResult<FairProbability> {
    if first.is_empty() || second.is_empty() {
        return Err(EdgeError::InsufficientData(format!(
            "{} {}: {} {} quotes, {} {} quotes",
            key.event_id,
            key.market,
            first.len(),
            first_side,
            second.len(),
            first_side.opposite()
        )));
    }

    let avg_first = pool(first, method);
    let avg_second = pool(second, method);
    let total = avg_first + avg_second;
    if !(total > 0.0 && total.is_finite()) {
        return Err(EdgeError::InsufficientData(format!(
            "{} {}: degenerate side total {total}",
            key.event_id, key.market
        )));
    }

    let fair_first = avg_first / total;
    Ok(FairProbability {
        key: key.clone(),
        first_side,
        second_side: first_side.opposite(),
        first: fair_first,
        second: 1.0 - fair_first,
        vig: total - 1.0,
        books_used,
        method,
    })
}

#[inline]
fn pool(values: &[f64], method: ConsensusMethod) -> f64 {
    match method {
        ConsensusMethod::Mean => values.iter().mean(),
        ConsensusMethod::Median => Data::new(values.to_vec()).median(),
    }
}

/// Group normalized quotes by market and aggregate each one.
/// Results are ordered by market key so refreshes are deterministic.
pub fn build_consensus(
    quotes: &[ImpliedQuote],
    method: ConsensusMethod,
) -> Vec<(MarketKey, EdgeResult<FairProbability>)> {
    let mut markets: BTreeMap<&MarketKey, SideBuckets> = BTreeMap::new();

    for q in quotes {
        let bucket = markets.entry(&q.key).or_default();
        if q.side.is_first() {
            bucket.first.push(q.implied);
            bucket.first_side = Some(q.side);
        } else {
            bucket.second.push(q.implied);
            bucket.second_side = Some(q.side);
        }
        bucket.books.insert(q.bookmaker.clone());
    }

    markets
        .into_iter()
        .map(|(key, b)| {
            let first_side = b
                .first_side
                .or_else(|| b.second_side.map(|s| s.opposite()))
                .unwrap_or(Side::Home);
            let fair = aggregate(key, first_side, &b.first, &b.second, b.books.len(), method);
            (key.clone(), fair)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::american::implied_probability;
    use crate::odds::MarketKind;

    fn iq(event: &str, side: Side, book: &str, price: i32) -> ImpliedQuote {
        ImpliedQuote {
            key: MarketKey::moneyline(event),
            side,
            bookmaker: book.into(),
            american_price: price,
            implied: implied_probability(Some(price)).unwrap(),
        }
    }

    #[test]
    fn test_single_book_removes_vig() {
        let quotes = vec![iq("e1", Side::Home, "dk", -110), iq("e1", Side::Away, "dk", -110)];
        let out = build_consensus(&quotes, ConsensusMethod::Mean);
        assert_eq!(out.len(), 1);
        let fair = out[0].1.as_ref().unwrap();
        assert!((fair.first - 0.5).abs() < 1e-12);
        assert!((fair.first + fair.second - 1.0).abs() < 1e-12);
        assert!(fair.vig > 0.04 && fair.vig < 0.05, "vig={}", fair.vig);
        assert_eq!(fair.books_used, 1);
    }

    #[test]
    fn test_multi_book_average_then_normalize() {
        let quotes = vec![
            iq("e1", Side::Home, "dk", -150),
            iq("e1", Side::Home, "fd", -130),
            iq("e1", Side::Away, "dk", 130),
            iq("e1", Side::Away, "fd", 110),
        ];
        let out = build_consensus(&quotes, ConsensusMethod::Mean);
        let fair = out[0].1.as_ref().unwrap();

        let h = (0.6 + 130.0 / 230.0) / 2.0;
        let a = (100.0 / 230.0 + 100.0 / 210.0) / 2.0;
        assert!((fair.first - h / (h + a)).abs() < 1e-12);
        assert!((fair.first + fair.second - 1.0).abs() < 1e-12);
        assert_eq!(fair.books_used, 2);
        assert_eq!(fair.prob(Side::Away), Some(fair.second));
        assert_eq!(fair.prob(Side::Over), None);
    }

    #[test]
    fn test_relisted_book_counts_once() {
        use crate::odds::american::normalize_quote;
        use crate::odds::{dedupe_quotes, OutcomeQuote};

        let listing = |side, price| OutcomeQuote {
            snapshot_id: "s1".into(),
            event_id: "e1".into(),
            market: MarketKind::Moneyline,
            side,
            point: None,
            bookmaker: "dk".into(),
            american_price: Some(price),
            observed_at: Default::default(),
        };
        let mut raw = vec![
            listing(Side::Home, -150),
            listing(Side::Away, 130),
            listing(Side::Home, -200),
            listing(Side::Away, 170),
        ];
        assert_eq!(dedupe_quotes(&mut raw), 2);

        let quotes: Vec<_> = raw.iter().map(|q| normalize_quote(q).unwrap()).collect();
        let out = build_consensus(&quotes, ConsensusMethod::Mean);
        let fair = out[0].1.as_ref().unwrap();
        let (h, a) = (200.0 / 300.0, 100.0 / 270.0);
        assert!((fair.first - h / (h + a)).abs() < 1e-12);
        assert!((fair.first - 0.643).abs() < 1e-3);
        assert_eq!(fair.books_used, 1);
    }

    #[test]
    fn test_missing_side_yields_no_opinion() {
        let quotes = vec![iq("e1", Side::Home, "dk", -120), iq("e2", Side::Home, "dk", 100), iq("e2", Side::Away, "dk", -120)];
        let out = build_consensus(&quotes, ConsensusMethod::Mean);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0].1, Err(EdgeError::InsufficientData(_))));
        assert!(out[1].1.is_ok(), "other events must still aggregate");
    }

    #[test]
    fn test_median_method() {
        let quotes = vec![
            iq("e1", Side::Over, "a", -110),
            iq("e1", Side::Over, "b", -110),
            iq("e1", Side::Over, "c", 500),
            iq("e1", Side::Under, "a", -110),
        ]
        .into_iter()
        .map(|mut q| {
            q.key = MarketKey::for_quote("e1", MarketKind::Total, q.side, Some(6.0));
            q
        })
        .collect::<Vec<_>>();
        let out = build_consensus(&quotes, ConsensusMethod::Median);
        let fair = out[0].1.as_ref().unwrap();
        assert_eq!(fair.first_side, Side::Over);
        assert!((fair.first - 0.5).abs() < 1e-12, "median ignores the outlier: {}", fair.first);
    }

    #[test]
    fn test_fair_pairs_always_sum_to_one() {
        for home in (-400..=400).step_by(37).filter(|p: &i32| p.abs() >= 100) {
            for away in (-400..=400).step_by(41).filter(|p: &i32| p.abs() >= 100) {
                let quotes = vec![iq("e", Side::Home, "x", home), iq("e", Side::Away, "x", away)];
                let out = build_consensus(&quotes, ConsensusMethod::Mean);
                let fair = out[0].1.as_ref().unwrap();
                assert!((fair.first + fair.second - 1.0).abs() < 1e-12);
                assert!(fair.first > 0.0 && fair.first < 1.0);
            }
        }
    }

    #[test]
    fn test_parse_method() {
        assert_eq!("Median".parse::<ConsensusMethod>().unwrap(), ConsensusMethod::Median);
        assert!("mode".parse::<ConsensusMethod>().is_err());
    }
}
