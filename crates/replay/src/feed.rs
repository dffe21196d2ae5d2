use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tokio::sync::RwLock;

use common::{Bar, BarFeed, Error, Frequency, Result};

use crate::{epoch, synthetic_bar};

/// Bar feed backed by an in-memory map. Cloning shares the same series.
#[derive(Clone, Default)]
pub struct MemoryFeed {
    series: Arc<RwLock<HashMap<(String, Frequency), Vec<Bar>>>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the series for `symbol` at `frequency`. Bars are stored as
    /// given, including any ordering faults.
    pub async fn insert_series(&self, symbol: &str, frequency: Frequency, bars: Vec<Bar>) {
        self.series
            .write()
            .await
            .insert((symbol.to_string(), frequency), bars);
    }

    pub async fn push(&self, frequency: Frequency, bar: Bar) {
        self.series
            .write()
            .await
            .entry((bar.symbol.clone(), frequency))
            .or_default()
            .push(bar);
    }

    /// Append a synthetic bar one period after the last one and return it.
    pub async fn push_close(&self, symbol: &str, frequency: Frequency, close: f64) -> Bar {
        let mut series = self.series.write().await;
        let bars = series.entry((symbol.to_string(), frequency)).or_default();
        let bar = match bars.last() {
            Some(last) => synthetic_bar(
                symbol,
                last.timestamp + Duration::seconds(frequency.as_secs()),
                last.close,
                close,
            ),
            None => synthetic_bar(symbol, epoch(), close, close),
        };
        bars.push(bar.clone());
        bar
    }
}

#[async_trait]
impl BarFeed for MemoryFeed {
    async fn dataseries(
        &self,
        symbol: &str,
        frequency: Frequency,
        length: usize,
    ) -> Result<Option<Vec<Bar>>> {
        let series = self.series.read().await;
        Ok(series
            .get(&(symbol.to_string(), frequency))
            .map(|bars| bars[bars.len().saturating_sub(length)..].to_vec()))
    }
}

/// Feed whose every request fails, for exercising error paths.
#[derive(Clone, Copy, Default)]
pub struct FailingFeed;

#[async_trait]
impl BarFeed for FailingFeed {
    async fn dataseries(&self, symbol: &str, _: Frequency, _: usize) -> Result<Option<Vec<Bar>>> {
        Err(Error::Feed(format!("replay feed has no connection for {symbol}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_most_recent_bars() {
        let feed = MemoryFeed::new();
        for close in [1.0, 2.0, 3.0, 4.0] {
            feed.push_close("X", Frequency::Day, close).await;
        }
        let bars = feed.dataseries("X", Frequency::Day, 2).await.unwrap().unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![3.0, 4.0]);
    }

    #[tokio::test]
    async fn frequencies_are_separate_series() {
        let feed = MemoryFeed::new();
        feed.push_close("X", Frequency::Day, 1.0).await;
        assert!(feed.dataseries("X", Frequency::Hour, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_close_continues_the_series() {
        let feed = MemoryFeed::new();
        let first = feed.push_close("X", Frequency::Day, 10.0).await;
        let second = feed.push_close("X", Frequency::Day, 12.0).await;
        assert_eq!(first.timestamp, epoch());
        assert_eq!(second.timestamp - first.timestamp, Duration::days(1));
        assert_eq!(second.open, 10.0);
    }
}
