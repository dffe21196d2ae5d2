use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use common::{Bars, Error, KvStore, Result};

use crate::Strategy;

/// Integer counter whose only copy lives in a `KvStore`.
///
/// Every call reads the stored value, so counts survive restarts and never
/// drift from what is persisted.
#[derive(Clone)]
pub struct PersistentCounter {
    store: Arc<dyn KvStore>,
}

impl PersistentCounter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Current value, 0 when the key has never been written.
    pub async fn get(&self, key: &str) -> Result<i64> {
        match self.store.load(key).await? {
            None => Ok(0),
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                Error::Store(format!("value for '{key}' is not an integer: '{raw}'"))
            }),
        }
    }

    /// Add one and persist. Returns the new value.
    pub async fn increment(&self, key: &str) -> Result<i64> {
        let value = self.get(key).await? + 1;
        self.store.save(key, &value.to_string()).await?;
        Ok(value)
    }
}

/// Counts processed bar events in the key-value store.
pub struct BarCounter {
    name: String,
    symbols: Vec<String>,
    key: String,
    counter: PersistentCounter,
}

impl BarCounter {
    pub const DEFAULT_KEY: &'static str = "counter";

    pub fn new(
        name: impl Into<String>,
        symbols: Vec<String>,
        key: impl Into<String>,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            name: name.into(),
            symbols,
            key: key.into(),
            counter: PersistentCounter::new(store),
        }
    }
}

#[async_trait]
impl Strategy for BarCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    async fn on_start(&mut self) {
        match self.counter.get(&self.key).await {
            Ok(0) => info!(strategy = %self.name, key = %self.key, "No previous count"),
            Ok(n) => info!(strategy = %self.name, key = %self.key, count = n, "Resuming count"),
            Err(e) => warn!(strategy = %self.name, error = %e, "Failed to read count"),
        }
    }

    async fn on_bars(&mut self, bars: &Bars) {
        if !bars.symbols().any(|s| self.symbols.iter().any(|t| t == s)) {
            return;
        }
        match self.counter.increment(&self.key).await {
            Ok(count) => info!(strategy = %self.name, count, "Bar event processed"),
            Err(e) => warn!(strategy = %self.name, error = %e, "Failed to update bar count"),
        }
    }
}
