use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Bar, BarFeed, Error, Frequency, Result};

/// Binance caps `/api/v3/klines` at this many rows per request.
const MAX_LIMIT: usize = 1000;

/// Historical klines from the public Binance REST API.
///
/// Only closed candles are returned; the still-forming candle at the end of
/// every response is dropped so windows line up with closed-bar events.
pub struct BinanceFeed {
    base_url: String,
    http: Client,
}

impl BinanceFeed {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl BarFeed for BinanceFeed {
    async fn dataseries(
        &self,
        symbol: &str,
        frequency: Frequency,
        length: usize,
    ) -> Result<Option<Vec<Bar>>> {
        // One extra row to make up for the open candle we drop.
        let limit = (length + 1).min(MAX_LIMIT);
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol.to_uppercase(),
            frequency.code(),
            limit
        );

        debug!(symbol, %frequency, limit, "Fetching klines");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Feed(format!("HTTP {status}: {body}")));
        }

        let mut bars = parse_klines(symbol, &body, Utc::now())?;
        if bars.len() > length {
            bars.drain(..bars.len() - length);
        }
        Ok(if bars.is_empty() { None } else { Some(bars) })
    }
}

/// Parse a `/api/v3/klines` response body, keeping candles closed before `now`.
///
/// Rows are `[open_time_ms, "open", "high", "low", "close", "volume", close_time_ms, ...]`.
pub(crate) fn parse_klines(symbol: &str, body: &str, now: DateTime<Utc>) -> Result<Vec<Bar>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    let now_ms = now.timestamp_millis();

    rows.iter()
        .filter(|row| row.get(6).and_then(Value::as_i64).is_some_and(|close_ms| close_ms < now_ms))
        .map(|row| {
            let open_ms = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| Error::Feed("kline row without open time".into()))?;
            Ok(Bar {
                symbol: symbol.to_string(),
                timestamp: millis(open_ms)?,
                open: decimal(row, 1)?,
                high: decimal(row, 2)?,
                low: decimal(row, 3)?,
                close: decimal(row, 4)?,
                volume: decimal(row, 5)?,
            })
        })
        .collect()
}

fn decimal(row: &[Value], index: usize) -> Result<f64> {
    row.get(index)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| Error::Feed(format!("kline field {index} is not a decimal string")))
}

pub(crate) fn millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Feed(format!("timestamp out of range: {ms}")))
}
