//! In-memory implementations of the host collaborators.
//!
//! Nothing here touches the network or disk. Used by tests across the
//! workspace and for replaying recorded bars through a strategy.

mod alert;
mod feed;
mod store;

pub use alert::RecordingAlerter;
pub use feed::{FailingFeed, MemoryFeed};
pub use store::MemoryKvStore;

use chrono::{DateTime, Duration, TimeZone, Utc};

use common::{Bar, Frequency};

/// Timestamp of the first bar pushed into an empty `MemoryFeed` series.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Consecutive bars with the given closes, one `frequency` apart from `start`.
///
/// Each bar opens at the previous close and its high/low sit one unit
/// outside the open/close range.
pub fn synthetic_bars(
    symbol: &str,
    frequency: Frequency,
    start: DateTime<Utc>,
    closes: &[f64],
) -> Vec<Bar> {
    let step = Duration::seconds(frequency.as_secs());
    let mut prev: Option<f64> = None;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let bar = synthetic_bar(symbol, start + step * i as i32, prev.unwrap_or(close), close);
            prev = Some(close);
            bar
        })
        .collect()
}

pub(crate) fn synthetic_bar(symbol: &str, timestamp: DateTime<Utc>, open: f64, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        timestamp,
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
        volume: 1.0,
    }
}
