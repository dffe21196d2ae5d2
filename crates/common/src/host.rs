use async_trait::async_trait;

use crate::{Bar, Frequency, Result};

/// Source of historical bars.
///
/// `BinanceFeed` implements this against the public REST API.
/// `MemoryFeed` in `crates/replay` implements it for tests and replays.
#[async_trait]
pub trait BarFeed: Send + Sync {
    /// Return up to `length` bars for `symbol` at `frequency`, oldest first.
    ///
    /// `Ok(None)` and `Ok(Some(vec![]))` both mean "no data for now"; callers
    /// skip the cycle rather than treating it as a failure.
    async fn dataseries(
        &self,
        symbol: &str,
        frequency: Frequency,
        length: usize,
    ) -> Result<Option<Vec<Bar>>>;
}

/// Fire-and-forget notification channel.
///
/// Call sites log a failed delivery and move on; an alert error never aborts
/// an event cycle.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, title: &str, message: &str) -> Result<()>;
}

/// Durable string key-value storage that outlives the process.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;

    async fn save(&self, key: &str, value: &str) -> Result<()>;
}
