//! Per-cycle market observations: spot quotes and indicator snapshots.

use crate::domain::{Decimal, Symbol};
use serde::{Deserialize, Serialize};

/// Real-time quote for one symbol as served by a spot provider.
///
/// `price` and `prev_close` are optional because providers return
/// placeholders outside trading hours or for suspended symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
    pub symbol: Symbol,
    pub name: String,
    pub price: Option<Decimal>,
    pub prev_close: Option<Decimal>,
    pub change_pct: Option<Decimal>,
}

impl Spot {
    /// Placeholder entry for a symbol the provider could not quote.
    pub fn unavailable(symbol: Symbol) -> Self {
        let name = symbol.as_str().to_string();
        Spot {
            symbol,
            name,
            price: None,
            prev_close: None,
            change_pct: None,
        }
    }
}

/// One symbol's market state for a single decision cycle: spot price plus
/// the technical indicators the classifier consumes.
///
/// Consumed once per cycle and discarded; never persisted. A missing field
/// marks the snapshot indeterminate and the classifier holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: Symbol,
    pub name: String,
    pub price: Option<Decimal>,
    pub prev_close: Option<Decimal>,
    pub change_pct: Option<Decimal>,
    pub ma5: Option<Decimal>,
    pub ma10: Option<Decimal>,
    pub ma20: Option<Decimal>,
    pub rsi14: Option<Decimal>,
    pub macd: Option<Decimal>,
}

impl IndicatorSnapshot {
    /// True when every field the classifier needs is present.
    pub fn is_complete(&self) -> bool {
        self.price.is_some()
            && self.ma5.is_some()
            && self.ma10.is_some()
            && self.ma20.is_some()
            && self.rsi14.is_some()
            && self.macd.is_some()
    }
}
