/// American odds conversions.
///
/// implied(p) = 100 / (p + 100)      for p > 0
/// implied(p) = -p / (-p + 100)      for p < 0
/// decimal(p) = 1 + p / 100          for p > 0
/// decimal(p) = 1 + 100 / |p|        for p < 0
///
/// All functions are pure.
use super::{MarketKey, OutcomeQuote, Side};
use crate::errors::{EdgeError, EdgeResult};

/// A quote that survived normalization, carrying its implied probability.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpliedQuote {
    pub key: MarketKey,
    pub side: Side,
    pub bookmaker: String,
    pub american_price: i32,
    pub implied: f64,
}

/// Normalize one quote. Errors are per-quote; the batch continues.
pub fn normalize_quote(quote: &OutcomeQuote) -> EdgeResult<ImpliedQuote> {
    let implied = implied_probability(quote.american_price).map_err(|e| {
        EdgeError::InvalidPrice(format!(
            "{} {} {} @ {}: {e}",
            quote.event_id, quote.market, quote.side, quote.bookmaker
        ))
    })?;
    Ok(ImpliedQuote {
        key: quote.market_key(),
        side: quote.side,
        bookmaker: quote.bookmaker.clone(),
        // implied_probability already rejected None
        american_price: quote.american_price.unwrap_or_default(),
        implied,
    })
}

/// Implied win probability of an American price, always in (0, 1).
/// A zero or missing price is rejected; callers skip that quote.
#[inline]
pub fn implied_probability(price: Option<i32>) -> EdgeResult<f64> {
    let p = match price {
        Some(p) if p != 0 => p as f64,
        Some(_) => return Err(EdgeError::InvalidPrice("american price of 0".into())),
        None => return Err(EdgeError::InvalidPrice("missing american price".into())),
    };

    if p > 0.0 {
        Ok(100.0 / (p + 100.0))
    } else {
        Ok(-p / (-p + 100.0))
    }
}

/// Decimal odds of an American price. A zero price falls back to 1.0
/// (no payout), which downstream EV/Kelly treat as "no bet".
#[inline]
pub fn american_to_decimal(american: i32) -> f64 {
    if american > 0 {
        1.0 + american as f64 / 100.0
    } else if american < 0 {
        1.0 + 100.0 / (american as f64).abs()
    } else {
        1.0
    }
}

/// Fair American price for a probability. `None` outside (0, 1).
pub fn probability_to_american(prob: f64) -> Option<i32> {
    if !(prob > 0.0 && prob < 1.0) {
        return None;
    }
    let price = if prob >= 0.5 {
        -(100.0 * prob / (1.0 - prob))
    } else {
        100.0 * (1.0 - prob) / prob
    };
    Some(price.round() as i32)
}
