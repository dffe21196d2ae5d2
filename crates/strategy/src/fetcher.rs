use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use common::{Bar, BarFeed, Frequency};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window is empty")]
    Empty,

    #[error("bar {index} is not strictly after the previous bar")]
    OutOfOrder { index: usize },
}

/// Bars for one symbol and frequency, oldest first, strictly increasing
/// timestamps, never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWindow {
    symbol: String,
    frequency: Frequency,
    bars: Vec<Bar>,
}

impl SeriesWindow {
    pub fn new(
        symbol: impl Into<String>,
        frequency: Frequency,
        bars: Vec<Bar>,
    ) -> Result<Self, WindowError> {
        if bars.is_empty() {
            return Err(WindowError::Empty);
        }
        if let Some(i) = bars.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(WindowError::OutOfOrder { index: i + 1 });
        }
        Ok(Self {
            symbol: symbol.into(),
            frequency,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Most recent bar.
    pub fn latest(&self) -> &Bar {
        // Non-empty by construction.
        &self.bars[self.bars.len() - 1]
    }
}

/// Pulls bounded history windows from a `BarFeed`.
///
/// Every failure mode collapses to `None`: the caller skips this cycle and
/// the next bar event retries.
#[derive(Clone)]
pub struct SeriesFetcher {
    feed: Arc<dyn BarFeed>,
}

impl SeriesFetcher {
    pub fn new(feed: Arc<dyn BarFeed>) -> Self {
        Self { feed }
    }

    pub async fn fetch(
        &self,
        symbol: &str,
        frequency: Frequency,
        length: usize,
    ) -> Option<SeriesWindow> {
        if symbol.is_empty() || length == 0 {
            warn!(symbol, length, "Refusing to fetch with empty symbol or zero length");
            return None;
        }

        let mut bars = match self.feed.dataseries(symbol, frequency, length).await {
            Ok(Some(bars)) if !bars.is_empty() => bars,
            Ok(_) => {
                debug!(symbol, %frequency, "No data series for symbol");
                return None;
            }
            Err(e) => {
                warn!(symbol, %frequency, error = %e, "Bar feed request failed");
                return None;
            }
        };

        if bars.len() > length {
            bars.drain(..bars.len() - length);
        }

        match SeriesWindow::new(symbol, frequency, bars) {
            Ok(window) => Some(window),
            Err(e) => {
                warn!(symbol, %frequency, error = %e, "Discarding malformed bar window");
                None
            }
        }
    }
}
