use crate::config::EdgeConfig;
use serde::{Deserialize, Serialize};

/// Informational label on an edge record. Nothing is ever placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetLabel {
    NoPlay,
    Watch,
    Candidate,
}

impl BetLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoPlay => "NO_PLAY",
            Self::Watch => "WATCH",
            Self::Candidate => "CANDIDATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NO_PLAY" => Some(Self::NoPlay),
            "WATCH" => Some(Self::Watch),
            "CANDIDATE" => Some(Self::Candidate),
            _ => None,
        }
    }
}

impl std::fmt::Display for BetLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate result: the label plus the reason it stopped there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetCheck {
    pub label: BetLabel,
    pub note: &'static str,
}

/// Classify an edge. Pure function, no side effects.
#[inline]
pub fn check_bet(edge_pct: f64, expected_value: f64, stake: f64, cfg: &EdgeConfig) -> BetCheck {
    // 1. Sanity: a non-finite edge is never playable
    if !edge_pct.is_finite() {
        return BetCheck { label: BetLabel::NoPlay, note: "invalid edge" };
    }

    // 2. Below the watch threshold
    if edge_pct < cfg.watch_edge {
        return BetCheck { label: BetLabel::NoPlay, note: "no edge" };
    }

    // 3. Watch band
    if edge_pct < cfg.candidate_edge {
        return BetCheck { label: BetLabel::Watch, note: "edge below candidate threshold" };
    }

    // 4. Price must pay and Kelly must want a stake
    if expected_value <= 0.0 {
        return BetCheck { label: BetLabel::Watch, note: "non-positive EV at best price" };
    }
    if stake <= 0.0 {
        return BetCheck { label: BetLabel::Watch, note: "zero Kelly stake" };
    }

    BetCheck { label: BetLabel::Candidate, note: "edge, EV and stake all positive" }
}
