//! Market data assembly: spot quotes + close history -> indicator
//! snapshots, one per symbol per cycle.

use super::{indicators, QuoteError, QuoteSource};
use crate::domain::{IndicatorSnapshot, Symbol};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Days of history fetched for indicator computation. MACD's slow EMA is
/// the longest window (26).
const HISTORY_DAYS: usize = 30;

/// Assembles per-cycle indicator snapshots from a quote source.
#[derive(Debug, Clone)]
pub struct MarketData {
    source: Arc<dyn QuoteSource>,
}

impl MarketData {
    pub fn new(source: Arc<dyn QuoteSource>) -> Self {
        Self { source }
    }

    /// Fetch raw spot quotes for the universe (API surface; snapshots()
    /// is what cycles consume).
    pub async fn spots(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, crate::domain::Spot>, QuoteError> {
        self.source.fetch_spot(symbols).await
    }

    /// Build one snapshot per requested symbol.
    ///
    /// Spot failure fails the whole call (the cycle skips); a history
    /// failure only leaves that symbol's indicator fields absent, which
    /// downgrades it to Hold downstream.
    pub async fn snapshots(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, IndicatorSnapshot>, QuoteError> {
        let spots = self.source.fetch_spot(symbols).await?;

        let history_futures = symbols.iter().map(|symbol| {
            let source = self.source.clone();
            let symbol = symbol.clone();
            async move {
                let closes = source.fetch_daily_closes(&symbol, HISTORY_DAYS).await;
                (symbol, closes)
            }
        });
        let histories: HashMap<_, _> = join_all(history_futures).await.into_iter().collect();

        let mut snapshots = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            let spot = spots
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| crate::domain::Spot::unavailable(symbol.clone()));

            let closes = match histories.get(symbol) {
                Some(Ok(closes)) => closes.as_slice(),
                Some(Err(e)) => {
                    warn!(symbol = %symbol, error = %e, "history unavailable, snapshot indeterminate");
                    &[]
                }
                None => &[],
            };

            snapshots.insert(
                symbol.clone(),
                IndicatorSnapshot {
                    symbol: symbol.clone(),
                    name: spot.name.clone(),
                    price: spot.price,
                    prev_close: spot.prev_close,
                    change_pct: spot.change_pct,
                    ma5: indicators::sma(closes, 5),
                    ma10: indicators::sma(closes, 10),
                    ma20: indicators::sma(closes, 20),
                    rsi14: indicators::rsi(closes, 14),
                    macd: indicators::macd(closes),
                },
            );
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;
    use crate::quotes::mock::MockQuoteSource;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[tokio::test]
    async fn test_snapshots_with_full_history_are_complete() {
        let closes: Vec<Decimal> = (1..=30).map(Decimal::from_i64).collect();
        let symbol = Symbol::new("600519");
        let mock = MockQuoteSource::new()
            .with_price(symbol.clone(), d("31"), d("30"))
            .with_closes(symbol.clone(), closes);
        let market = MarketData::new(Arc::new(mock));

        let snaps = market.snapshots(&[symbol.clone()]).await.unwrap();
        let snap = &snaps[&symbol];
        assert!(snap.is_complete());
        assert_eq!(snap.ma5, Some(d("28")));
        assert_eq!(snap.rsi14, Some(Decimal::hundred()));
    }

    #[tokio::test]
    async fn test_snapshots_without_history_are_indeterminate() {
        let symbol = Symbol::new("600519");
        let mock = MockQuoteSource::new().with_price(symbol.clone(), d("100"), d("99"));
        let market = MarketData::new(Arc::new(mock));

        let snaps = market.snapshots(&[symbol.clone()]).await.unwrap();
        let snap = &snaps[&symbol];
        assert_eq!(snap.price, Some(d("100")));
        assert!(!snap.is_complete());
        assert_eq!(snap.ma20, None);
        assert_eq!(snap.macd, None);
    }

    #[tokio::test]
    async fn test_spot_failure_fails_snapshot_call() {
        let market = MarketData::new(Arc::new(MockQuoteSource::new().failing_spot()));
        let err = market.snapshots(&[Symbol::new("600519")]).await.unwrap_err();
        assert!(matches!(err, QuoteError::Network(_)));
    }
}
