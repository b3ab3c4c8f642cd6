//! Tencent quote supplier: real-time spot plus daily kline history.
//!
//! Spot wire format: `GET {spot}/q=sh600519` returns GBK lines like
//! `v_sh600519="1~贵州茅台~600519~1680.00~1660.00~1679.00~...";` with
//! `~`-separated fields (name at 1, price at 3, prev close at 4).
//!
//! History: `GET {kline}/appstock/app/fqkline/get?param=sh600519,day,,,30,qfq`
//! returns JSON with per-day arrays `[date, open, close, high, low, volume]`.

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
pub struct TencentQuotes {
    client: Client,
    spot_url: String,
    kline_url: String,
}

impl TencentQuotes {
    pub fn new(spot_url: String, kline_url: String) -> Self {
        Self {
            client: Client::new(),
            spot_url,
            kline_url,
        }
    }

    pub fn default_url() -> Self {
        Self::new(
            "https://qt.gtimg.cn".to_string(),
            "https://web.ifzq.gtimg.cn".to_string(),
        )
    }

    async fn get_with_retry(&self, url: String, charset: &str) -> Result<String, QuoteError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        retry(backoff, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
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
                    .text_with_charset(charset)
                    .await
                    .map_err(|e| backoff::Error::permanent(QuoteError::Parse(e.to_string())))
            }
        })
        .await
    }
}

/// Parse one `v_sh600519="...~...";` line into a Spot.
fn parse_spot_line(symbol: &Symbol, line: &str) -> Spot {
    let payload = match line.split_once("=\"") {
        Some((_, rest)) => rest.trim_end_matches(|c| c == '"' || c == ';'),
        None => return Spot::unavailable(symbol.clone()),
    };

    let fields: Vec<&str> = payload.split('~').collect();
    if fields.len() < 5 {
        return Spot::unavailable(symbol.clone());
    }

    let name = fields[1].to_string();
    let price = parse_price(fields[3]);
    let prev_close = parse_price(fields[4]);
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

fn parse_price(field: &str) -> Option<Decimal> {
    let value = Decimal::from_str_canonical(field.trim()).ok()?;
    if value.is_positive() {
        Some(value)
    } else {
        None
    }
}

/// Extract daily closes (oldest first) from the kline JSON payload.
fn parse_kline_closes(body: &str, prefixed: &str) -> Result<Vec<Decimal>, QuoteError> {
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| QuoteError::Parse(e.to_string()))?;

    let per_symbol = json
        .get("data")
        .and_then(|d| d.get(prefixed))
        .ok_or_else(|| QuoteError::Parse(format!("no kline data for {}", prefixed)))?;

    // Forward-adjusted series when present, raw otherwise.
    let days = per_symbol
        .get("qfqday")
        .or_else(|| per_symbol.get("day"))
        .and_then(|d| d.as_array())
        .ok_or_else(|| QuoteError::Parse("missing day series".to_string()))?;

    let mut closes = Vec::with_capacity(days.len());
    for day in days {
        let close = day
            .get(2)
            .and_then(|c| c.as_str())
            .ok_or_else(|| QuoteError::Parse("malformed kline row".to_string()))?;
        let value = Decimal::from_str_canonical(close)
            .map_err(|e| QuoteError::Parse(e.to_string()))?;
        closes.push(value);
    }
    Ok(closes)
}

#[async_trait]
impl QuoteSource for TencentQuotes {
    fn name(&self) -> &'static str {
        "tencent"
    }

    async fn fetch_spot(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Spot>, QuoteError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(count = symbols.len(), "fetching tencent spot quotes");

        let list = symbols
            .iter()
            .map(|s| s.exchange_prefixed())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/q={}", self.spot_url, list);
        let text = self.get_with_retry(url, "gbk").await?;

        if text.trim().is_empty() || text.trim_start().starts_with('<') {
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
        symbol: &Symbol,
        days: usize,
    ) -> Result<Vec<Decimal>, QuoteError> {
        let prefixed = symbol.exchange_prefixed();
        let url = format!(
            "{}/appstock/app/fqkline/get?param={},day,,,{},qfq",
            self.kline_url, prefixed, days
        );
        debug!(symbol = %symbol, days, "fetching tencent kline history");

        let body = self.get_with_retry(url, "utf-8").await?;
        parse_kline_closes(&body, &prefixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_parse_spot_line() {
        let line = r#"v_sh600519="1~贵州茅台~600519~1680.00~1660.00~1679.00~12345~678~910";"#;
        let spot = parse_spot_line(&Symbol::new("600519"), line);
        assert_eq!(spot.name, "贵州茅台");
        assert_eq!(spot.price, Some(d("1680.00")));
        assert_eq!(spot.prev_close, Some(d("1660.00")));
    }

    #[test]
    fn test_parse_spot_line_too_few_fields() {
        let spot = parse_spot_line(&Symbol::new("600519"), r#"v_sh600519="1~x~y";"#);
        assert_eq!(spot.price, None);
    }

    #[test]
    fn test_parse_kline_closes() {
        let body = r#"{
            "code": 0,
            "data": {
                "sh600519": {
                    "qfqday": [
                        ["2024-03-01", "1650.00", "1660.00", "1670.00", "1640.00", "12345"],
                        ["2024-03-04", "1662.00", "1680.00", "1685.00", "1655.00", "23456"]
                    ]
                }
            }
        }"#;
        let closes = parse_kline_closes(body, "sh600519").unwrap();
        assert_eq!(closes, vec![d("1660.00"), d("1680.00")]);
    }

    #[test]
    fn test_parse_kline_falls_back_to_raw_day_series() {
        let body = r#"{"data": {"sz000858": {"day": [["2024-03-01", "178", "180", "181", "177", "1"]]}}}"#;
        let closes = parse_kline_closes(body, "sz000858").unwrap();
        assert_eq!(closes, vec![d("180")]);
    }

    #[test]
    fn test_parse_kline_missing_symbol_is_parse_error() {
        let err = parse_kline_closes(r#"{"data": {}}"#, "sh600519").unwrap_err();
        assert!(matches!(err, QuoteError::Parse(_)));
    }
}
