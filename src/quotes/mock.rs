//! Mock quote source for testing without network calls.

use super::{QuoteError, QuoteSource};
use crate::domain::{Decimal, Spot, Symbol};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock quote source that returns predefined spots and close histories.
#[derive(Debug, Default)]
pub struct MockQuoteSource {
    spots: HashMap<Symbol, Spot>,
    closes: HashMap<Symbol, Vec<Decimal>>,
    fail_spot: bool,
    history_unsupported: bool,
    spot_calls: AtomicUsize,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predefined spot quote.
    pub fn with_spot(mut self, spot: Spot) -> Self {
        self.spots.insert(spot.symbol.clone(), spot);
        self
    }

    /// Convenience: add a spot with just price and previous close.
    pub fn with_price(self, symbol: Symbol, price: Decimal, prev_close: Decimal) -> Self {
        let name = symbol.as_str().to_string();
        self.with_spot(Spot {
            symbol,
            name,
            price: Some(price),
            prev_close: Some(prev_close),
            change_pct: None,
        })
    }

    /// Add a daily close history, oldest first.
    pub fn with_closes(mut self, symbol: Symbol, closes: Vec<Decimal>) -> Self {
        self.closes.insert(symbol, closes);
        self
    }

    /// Make every spot fetch fail with a network error.
    pub fn failing_spot(mut self) -> Self {
        self.fail_spot = true;
        self
    }

    /// Report `Unsupported` for history, like a spot-only supplier.
    pub fn without_history(mut self) -> Self {
        self.history_unsupported = true;
        self
    }

    /// Number of spot fetches served so far.
    pub fn spot_call_count(&self) -> usize {
        self.spot_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_spot(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Spot>, QuoteError> {
        self.spot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_spot {
            return Err(QuoteError::Network("mock spot failure".to_string()));
        }
        Ok(symbols
            .iter()
            .map(|s| {
                let spot = self
                    .spots
                    .get(s)
                    .cloned()
                    .unwrap_or_else(|| Spot::unavailable(s.clone()));
                (s.clone(), spot)
            })
            .collect())
    }

    async fn fetch_daily_closes(
        &self,
        symbol: &Symbol,
        days: usize,
    ) -> Result<Vec<Decimal>, QuoteError> {
        if self.history_unsupported {
            return Err(QuoteError::Unsupported("daily history"));
        }
        match self.closes.get(symbol) {
            Some(closes) => {
                let start = closes.len().saturating_sub(days);
                Ok(closes[start..].to_vec())
            }
            None => Ok(Vec::new()),
        }
    }
}
