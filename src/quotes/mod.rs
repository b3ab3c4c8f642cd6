//! Quote supplier abstraction: real-time spot quotes and daily close
//! history for indicator computation.
//!
//! Suppliers implement one uniform trait; an ordered failover chain tries
//! each in turn with an independent timeout, and a short-lived cache bounds
//! upstream request amplification.

use crate::domain::{Decimal, Spot, Symbol};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub mod cache;
pub mod indicators;
pub mod market;
pub mod mock;
pub mod sina;
pub mod tencent;

pub use cache::QuoteCache;
pub use market::MarketData;
pub use mock::MockQuoteSource;
pub use sina::SinaQuotes;
pub use tencent::TencentQuotes;

/// A quote supplier. One supplier may serve only a subset of the methods
/// (returning `Unsupported`); the failover chain falls through to the next.
#[async_trait]
pub trait QuoteSource: Send + Sync + fmt::Debug {
    /// Short supplier name for logs.
    fn name(&self) -> &'static str;

    /// Fetch real-time spot quotes for the given symbols.
    ///
    /// Symbols the supplier cannot quote map to placeholder entries with
    /// absent prices rather than being dropped.
    async fn fetch_spot(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Spot>, QuoteError>;

    /// Fetch up to `days` most recent daily closes, oldest first.
    async fn fetch_daily_closes(
        &self,
        symbol: &Symbol,
        days: usize,
    ) -> Result<Vec<Decimal>, QuoteError>;
}

/// Error type for quote supplier operations.
#[derive(Debug, Clone)]
pub enum QuoteError {
    /// Network error (connection refused, DNS failure, ...).
    Network(String),
    /// HTTP error status from the supplier.
    Http { status: u16, message: String },
    /// Response body did not match the supplier's wire format.
    Parse(String),
    /// The supplier does not serve this method.
    Unsupported(&'static str),
    /// The supplier did not answer within its time box.
    Timeout,
    /// Every supplier in the chain failed.
    Unavailable,
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteError::Network(msg) => write!(f, "network error: {}", msg),
            QuoteError::Http { status, message } => {
                write!(f, "http error {}: {}", status, message)
            }
            QuoteError::Parse(msg) => write!(f, "parse error: {}", msg),
            QuoteError::Unsupported(what) => write!(f, "unsupported operation: {}", what),
            QuoteError::Timeout => write!(f, "supplier timed out"),
            QuoteError::Unavailable => write!(f, "no quote supplier available"),
        }
    }
}

impl std::error::Error for QuoteError {}

/// Ordered supplier chain. Each call is timeboxed per supplier; the first
/// success wins and later suppliers are not contacted.
#[derive(Debug, Clone)]
pub struct FailoverQuotes {
    sources: Vec<Arc<dyn QuoteSource>>,
    timeout: Duration,
}

impl FailoverQuotes {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }
}

#[async_trait]
impl QuoteSource for FailoverQuotes {
    fn name(&self) -> &'static str {
        "failover"
    }

    async fn fetch_spot(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Spot>, QuoteError> {
        for source in &self.sources {
            match tokio::time::timeout(self.timeout, source.fetch_spot(symbols)).await {
                Ok(Ok(spots)) => return Ok(spots),
                Ok(Err(e)) => warn!(supplier = source.name(), error = %e, "spot fetch failed"),
                Err(_) => warn!(supplier = source.name(), "spot fetch timed out"),
            }
        }
        Err(QuoteError::Unavailable)
    }

    async fn fetch_daily_closes(
        &self,
        symbol: &Symbol,
        days: usize,
    ) -> Result<Vec<Decimal>, QuoteError> {
        for source in &self.sources {
            match tokio::time::timeout(self.timeout, source.fetch_daily_closes(symbol, days)).await
            {
                Ok(Ok(closes)) => return Ok(closes),
                Ok(Err(QuoteError::Unsupported(_))) => continue,
                Ok(Err(e)) => {
                    warn!(supplier = source.name(), symbol = %symbol, error = %e, "history fetch failed")
                }
                Err(_) => warn!(supplier = source.name(), symbol = %symbol, "history fetch timed out"),
            }
        }
        Err(QuoteError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::mock::MockQuoteSource;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[tokio::test]
    async fn test_failover_uses_first_healthy_source() {
        let broken = MockQuoteSource::new().failing_spot();
        let healthy = MockQuoteSource::new().with_spot(Spot {
            symbol: Symbol::new("600519"),
            name: "moutai".to_string(),
            price: Some(d("1680")),
            prev_close: Some(d("1660")),
            change_pct: None,
        });
        let chain = FailoverQuotes::new(
            vec![Arc::new(broken) as Arc<dyn QuoteSource>, Arc::new(healthy)],
            Duration::from_secs(1),
        );

        let spots = chain.fetch_spot(&[Symbol::new("600519")]).await.unwrap();
        assert_eq!(spots[&Symbol::new("600519")].price, Some(d("1680")));
    }

    #[tokio::test]
    async fn test_failover_all_sources_down() {
        let chain = FailoverQuotes::new(
            vec![
                Arc::new(MockQuoteSource::new().failing_spot()) as Arc<dyn QuoteSource>,
                Arc::new(MockQuoteSource::new().failing_spot()),
            ],
            Duration::from_secs(1),
        );
        let err = chain.fetch_spot(&[Symbol::new("600519")]).await.unwrap_err();
        assert!(matches!(err, QuoteError::Unavailable));
    }

    #[tokio::test]
    async fn test_failover_skips_unsupported_history() {
        // First source is spot-only; history falls through to the second.
        let spot_only = MockQuoteSource::new().without_history();
        let with_history = MockQuoteSource::new()
            .with_closes(Symbol::new("600519"), vec![d("10"), d("11"), d("12")]);
        let chain = FailoverQuotes::new(
            vec![Arc::new(spot_only) as Arc<dyn QuoteSource>, Arc::new(with_history)],
            Duration::from_secs(1),
        );

        let closes = chain
            .fetch_daily_closes(&Symbol::new("600519"), 30)
            .await
            .unwrap();
        assert_eq!(closes.len(), 3);
    }
}
