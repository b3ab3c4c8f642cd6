//! Sina real-time quote supplier.
//!
//! Wire format: `GET {base}/list=sh600519,sz000858` returns one line per
//! symbol, GBK-encoded:
//! `var hq_str_sh600519="贵州茅台,1679.00,1660.00,1680.00,...";`
//! Fields: name, open, prev_close, current price, ... Spot only; daily
//! history is not served here.

use super::{QuoteError, QuoteSource};
use crate::domain::{Decimal, Spot, Symbol};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SinaQuotes {
    client: Client,
    base_url: String,
}

impl SinaQuotes {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn default_url() -> Self {
        Self::new("https://hq.sinajs.cn".to_string())
    }

    async fn get_quote_text(&self, symbols: &[Symbol]) -> Result<String, QuoteError> {
        let list = symbols
            .iter()
            .map(|s| s.exchange_prefixed())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/list={}", self.base_url, list);

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .header("Referer", "https://finance.sina.com.cn/")
                .send()
                .await
                .map_err(|e| backoff::Error::transient(QuoteError::Network(e.to_string())))?;

            let status = response.status();
            if status.is_server_error() {
                return Err(backoff::Error::transient(QuoteError::Http {
                    status: status.as_u16(),
                    message: "server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(QuoteError::Http {
                    status: status.as_u16(),
                    message: "client error".to_string(),
                }));
            }

            response
                .text_with_charset("gbk")
                .await
                .map_err(|e| backoff::Error::permanent(QuoteError::Parse(e.to_string())))
        })
        .await
    }
}

/// Parse one `var hq_str_...="...";` line into a Spot.
fn parse_spot_line(symbol: &Symbol, line: &str) -> Spot {
    let payload = match line.split_once("=\"") {
        Some((_, rest)) => rest.trim_end_matches(|c| c == '"' || c == ';'),
        None => return Spot::unavailable(symbol.clone()),
    };

    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() < 4 {
        return Spot::unavailable(symbol.clone());
    }

    let name = fields[0].to_string();
    let prev_close = parse_price(fields[2]);
    let price = parse_price(fields[3]);
    let change_pct = match (price, prev_close) {
        (Some(p), Some(pc)) if pc.is_positive() => {
            Some((p - pc) / pc * Decimal::hundred())
        }
        _ => None,
    };

    Spot {
        symbol: symbol.clone(),
        name,
        price,
        prev_close,
        change_pct,
    }
}

/// Empty or zero price fields mean the symbol is not currently quoted.
fn parse_price(field: &str) -> Option<Decimal> {
    let value = Decimal::from_str_canonical(field.trim()).ok()?;
    if value.is_positive() {
        Some(value)
    } else {
        None
    }
}

#[async_trait]
impl QuoteSource for SinaQuotes {
    fn name(&self) -> &'static str {
        "sina"
    }

    async fn fetch_spot(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Spot>, QuoteError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(count = symbols.len(), "fetching sina spot quotes");

        let text = self.get_quote_text(symbols).await?;
        if text.trim().is_empty() || text.trim_start().starts_with('<') {
            // HTML or empty body: the endpoint is refusing us.
            return Err(QuoteError::Parse("unexpected response body".to_string()));
        }

        let lines: Vec<&str> = text.split(';').map(str::trim).filter(|l| !l.is_empty()).collect();
        Ok(symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| {
                let spot = lines
                    .get(i)
                    .map(|line| parse_spot_line(symbol, line))
                    .unwrap_or_else(|| Spot::unavailable(symbol.clone()));
                (symbol.clone(), spot)
            })
            .collect())
    }

    async fn fetch_daily_closes(
        &self,
        _symbol: &Symbol,
        _days: usize,
    ) -> Result<Vec<Decimal>, QuoteError> {
        Err(QuoteError::Unsupported("daily history"))
    }
}
