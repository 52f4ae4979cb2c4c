pub mod american;
pub mod consensus;
pub mod feed;
pub mod matching;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::{Entry, HashMap};

/// Market kinds carried by the odds feed. Wire names follow the feed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketKind {
    #[serde(rename = "h2h")]
    Moneyline,
    #[serde(rename = "spreads")]
    Spread,
    #[serde(rename = "totals")]
    Total,
}

impl MarketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moneyline => "h2h",
            Self::Spread => "spreads",
            Self::Total => "totals",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "h2h" | "moneyline" => Some(Self::Moneyline),
            "spreads" | "spread" => Some(Self::Spread),
            "totals" | "total" => Some(Self::Total),
            _ => None,
        }
    }
}

impl std::fmt::Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a two-way market. Home and Over are the "first" side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
    Over,
    Under,
}

impl Side {
    #[inline]
    pub fn is_first(&self) -> bool {
        matches!(self, Self::Home | Self::Over)
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Home => Self::Away,
            Self::Away => Self::Home,
            Self::Over => Self::Under,
            Self::Under => Self::Over,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Away => "away",
            Self::Over => "over",
            Self::Under => "under",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "home" => Some(Self::Home),
            "away" => Some(Self::Away),
            "over" => Some(Self::Over),
            "under" => Some(Self::Under),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bookmaker's price for one side of one market in one snapshot.
/// Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeQuote {
    pub snapshot_id: String,
    pub event_id: String,
    pub market: MarketKind,
    pub side: Side,
    pub point: Option<f64>,
    pub bookmaker: String,
    /// `None` when the feed omitted a price; rejected by the normalizer.
    pub american_price: Option<i32>,
    pub observed_at: DateTime<Utc>,
}

impl OutcomeQuote {
    pub fn market_key(&self) -> MarketKey {
        MarketKey::for_quote(&self.event_id, self.market, self.side, self.point)
    }

    /// Identity within a snapshot: one price per book per outcome and line.
    pub fn identity(&self) -> QuoteIdentity {
        QuoteIdentity {
            event_id: self.event_id.clone(),
            market: self.market,
            side: self.side,
            point: self.point.map(point_key),
            bookmaker: self.bookmaker.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteIdentity {
    pub event_id: String,
    pub market: MarketKind,
    pub side: Side,
    pub point: Option<i64>,
    pub bookmaker: String,
}

/// Collapse quotes sharing an identity. The last one listed wins and keeps
/// the position of the first. Returns the number of quotes dropped.
pub fn dedupe_quotes(quotes: &mut Vec<OutcomeQuote>) -> usize {
    let before = quotes.len();
    let mut slots: HashMap<QuoteIdentity, usize> = HashMap::with_capacity(before);
    let mut kept: Vec<OutcomeQuote> = Vec::with_capacity(before);

    for q in quotes.drain(..) {
        match slots.entry(q.identity()) {
            Entry::Occupied(slot) => kept[*slot.get()] = q,
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(q);
            }
        }
    }

    *quotes = kept;
    before - quotes.len()
}

/// Groups the two sides of a market. Points are stored in thousandths so the
/// key is hashable; spreads are keyed by the home-side line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MarketKey {
    pub event_id: String,
    pub market: MarketKind,
    pub line: Option<i64>,
}

impl MarketKey {
    pub fn moneyline(event_id: &str) -> Self {
        Self { event_id: event_id.to_string(), market: MarketKind::Moneyline, line: None }
    }

    pub fn for_quote(event_id: &str, market: MarketKind, side: Side, point: Option<f64>) -> Self {
        let line = match market {
            MarketKind::Moneyline => None,
            MarketKind::Total => point.map(point_key),
            MarketKind::Spread => point.map(|p| if side == Side::Away { point_key(-p) } else { point_key(p) }),
        };
        Self { event_id: event_id.to_string(), market, line }
    }

    pub fn line_value(&self) -> Option<f64> {
        self.line.map(|l| l as f64 / 1000.0)
    }
}

#[inline]
pub fn point_key(point: f64) -> i64 {
    (point * 1000.0).round() as i64
}
