//! Short-lived read-through cache over a quote source.
//!
//! Cycles for multiple models share one upstream; entries stay valid for a
//! few seconds so concurrent cycles do not amplify supplier requests.

use super::{QuoteError, QuoteSource};
use crate::domain::{Decimal, Spot, Symbol};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct SpotEntry {
    fetched_at: Instant,
    key: Vec<Symbol>,
    spots: HashMap<Symbol, Spot>,
}

struct HistoryEntry {
    fetched_at: Instant,
    closes: Vec<Decimal>,
}

/// Read-through TTL cache wrapping another `QuoteSource`.
pub struct QuoteCache<S> {
    inner: S,
    ttl: Duration,
    spot: RwLock<Option<SpotEntry>>,
    history: RwLock<HashMap<(Symbol, usize), HistoryEntry>>,
}

impl<S> QuoteCache<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            spot: RwLock::new(None),
            history: RwLock::new(HashMap::new()),
        }
    }
}

impl<S> std::fmt::Debug for QuoteCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteCache").field("ttl", &self.ttl).finish()
    }
}

#[async_trait]
impl<S: QuoteSource> QuoteSource for QuoteCache<S> {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn fetch_spot(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Spot>, QuoteError> {
        let mut key: Vec<Symbol> = symbols.to_vec();
        key.sort();

        {
            let guard = self.spot.read().await;
            if let Some(entry) = guard.as_ref() {
                if entry.key == key && entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.spots.clone());
                }
            }
        }

        let spots = self.inner.fetch_spot(symbols).await?;
        let mut guard = self.spot.write().await;
        *guard = Some(SpotEntry {
            fetched_at: Instant::now(),
            key,
            spots: spots.clone(),
        });
        Ok(spots)
    }

    async fn fetch_daily_closes(
        &self,
        symbol: &Symbol,
        days: usize,
    ) -> Result<Vec<Decimal>, QuoteError> {
        let key = (symbol.clone(), days);

        {
            let guard = self.history.read().await;
            if let Some(entry) = guard.get(&key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.closes.clone());
                }
            }
        }

        let closes = self.inner.fetch_daily_closes(symbol, days).await?;
        let mut guard = self.history.write().await;
        guard.insert(
            key,
            HistoryEntry {
                fetched_at: Instant::now(),
                closes: closes.clone(),
            },
        );
        Ok(closes)
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
    async fn test_spot_served_from_cache_within_ttl() {
        let mock = MockQuoteSource::new().with_price(Symbol::new("600519"), d("1680"), d("1660"));
        let cache = QuoteCache::new(mock, Duration::from_secs(5));
        let symbols = vec![Symbol::new("600519")];

        let first = cache.fetch_spot(&symbols).await.unwrap();
        let second = cache.fetch_spot(&symbols).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.inner.spot_call_count(), 1);
    }

    #[tokio::test]
    async fn test_spot_refetched_after_ttl() {
        let mock = MockQuoteSource::new().with_price(Symbol::new("600519"), d("1680"), d("1660"));
        let cache = QuoteCache::new(mock, Duration::ZERO);
        let symbols = vec![Symbol::new("600519")];

        let _ = cache.fetch_spot(&symbols).await.unwrap();
        let _ = cache.fetch_spot(&symbols).await.unwrap();
        assert_eq!(cache.inner.spot_call_count(), 2);
    }

    #[tokio::test]
    async fn test_different_universe_bypasses_cache() {
        let mock = MockQuoteSource::new()
            .with_price(Symbol::new("600519"), d("1680"), d("1660"))
            .with_price(Symbol::new("000858"), d("180"), d("178"));
        let cache = QuoteCache::new(mock, Duration::from_secs(5));

        let _ = cache.fetch_spot(&[Symbol::new("600519")]).await.unwrap();
        let _ = cache
            .fetch_spot(&[Symbol::new("600519"), Symbol::new("000858")])
            .await
            .unwrap();
        assert_eq!(cache.inner.spot_call_count(), 2);
    }

    #[tokio::test]
    async fn test_history_cached_per_symbol_and_window() {
        let closes: Vec<Decimal> = (1..=30).map(Decimal::from_i64).collect();
        let mock = MockQuoteSource::new().with_closes(Symbol::new("600519"), closes);
        let cache = QuoteCache::new(mock, Duration::from_secs(5));

        let a = cache
            .fetch_daily_closes(&Symbol::new("600519"), 30)
            .await
            .unwrap();
        let b = cache
            .fetch_daily_closes(&Symbol::new("600519"), 30)
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
