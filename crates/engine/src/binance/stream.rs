use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use common::{Bar, Bars, Error, Frequency, Result};

use super::rest::millis;

/// Binance kline WebSocket stream for a single symbol.
///
/// Publishes one `Bars` event per closed candle on the broadcast channel;
/// in-progress candle updates are dropped. Reconnects automatically with
/// exponential backoff.
pub struct BinanceStream {
    symbol: String,
    frequency: Frequency,
    ws_base: String,
    bars_tx: broadcast::Sender<Bars>,
}

impl BinanceStream {
    pub fn new(
        symbol: impl Into<String>,
        frequency: Frequency,
        ws_base: impl Into<String>,
        bars_tx: broadcast::Sender<Bars>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            frequency,
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
            bars_tx,
        }
    }

    /// Run the stream loop forever, reconnecting on failure.
    /// Call this inside a `tokio::spawn`.
    pub async fn run(self) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(symbol = %self.symbol, frequency = %self.frequency, "Connecting to Binance kline stream");
            match self.connect_once().await {
                Ok(()) => {
                    info!(symbol = %self.symbol, "Kline stream closed cleanly");
                    // Binance ends sessions after 24h; reconnect promptly.
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(symbol = %self.symbol, error = %e, backoff = ?backoff, "Kline stream error, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    fn url(&self) -> Result<Url> {
        let raw = format!(
            "{}/{}@kline_{}",
            self.ws_base,
            self.symbol.to_lowercase(),
            self.frequency.code()
        );
        Url::parse(&raw).map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn connect_once(&self) -> Result<()> {
        let (ws_stream, _) = connect_async(self.url()?)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_closed_kline(&self.symbol, &text) {
                    Ok(Some(bar)) => {
                        debug!(symbol = %bar.symbol, close = bar.close, "Closed candle");
                        // Ignore send errors (no active receivers)
                        let _ = self.bars_tx.send(Bars::single(bar));
                    }
                    Ok(None) => {} // open candle or non-kline message
                    Err(e) => warn!(error = %e, "Failed to parse kline event"),
                }
            }
        }

        Ok(())
    }
}

// ─── Binance kline JSON parsing ──────────────────────────────────────────────

#[derive(Deserialize)]
struct KlineWrapper {
    k: KlineData,
}

#[derive(Deserialize)]
struct KlineData {
    #[serde(rename = "t")]
    open_time_ms: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    is_closed: bool,
}

/// Parse a kline message into a bar if it reports a closed candle.
fn parse_closed_kline(symbol: &str, text: &str) -> Result<Option<Bar>> {
    // Kline messages have an "e" field set to "kline"
    let wrapper: serde_json::Value = serde_json::from_str(text)?;
    if wrapper.get("e").and_then(|v| v.as_str()) != Some("kline") {
        return Ok(None);
    }

    let k = serde_json::from_value::<KlineWrapper>(wrapper)?.k;
    if !k.is_closed {
        return Ok(None);
    }

    Ok(Some(Bar {
        symbol: symbol.to_string(),
        timestamp: millis(k.open_time_ms)?,
        open: decimal(&k.open, "o")?,
        high: decimal(&k.high, "h")?,
        low: decimal(&k.low, "l")?,
        close: decimal(&k.close, "c")?,
        volume: decimal(&k.volume, "v")?,
    }))
}

fn decimal(raw: &str, field: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| Error::Feed(format!("kline field '{field}' is not a decimal: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(closed: bool) -> String {
        format!(
            r#"{{"e":"kline","E":1704153600100,"s":"BTCUSDT","k":{{"t":1704067200000,"T":1704153599999,
            "s":"BTCUSDT","i":"1d","o":"42000.0","c":"42800.2","h":"43000.5","l":"41500.0",
            "v":"1200.5","x":{closed}}}}}"#
        )
    }

    #[test]
    fn closed_kline_becomes_a_bar() {
        let bar = parse_closed_kline("BTCUSDT", &message(true)).unwrap().unwrap();
        assert_eq!(bar.symbol, "BTCUSDT");
        assert_eq!(bar.close, 42800.2);
        assert_eq!(bar.low, 41500.0);
        assert_eq!(bar.timestamp, millis(1_704_067_200_000).unwrap());
    }

    #[test]
    fn open_kline_is_skipped() {
        assert!(parse_closed_kline("BTCUSDT", &message(false)).unwrap().is_none());
    }

    #[test]
    fn non_kline_message_is_skipped() {
        assert!(parse_closed_kline("BTCUSDT", r#"{"result":null,"id":1}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn url_uses_lowercase_symbol_and_interval_code() {
        let (tx, _) = broadcast::channel(1);
        let stream = BinanceStream::new("BTCUSDT", Frequency::Hour4, "wss://example.test/ws/", tx);
        assert_eq!(stream.url().unwrap().as_str(), "wss://example.test/ws/btcusdt@kline_4h");
    }
}
