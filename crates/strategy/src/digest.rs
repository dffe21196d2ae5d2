use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::state::StateBook;

/// Outcome of rendering a periodic digest.
#[derive(Debug, Clone, PartialEq)]
pub enum DigestReport {
    /// No symbol has reached `Ready`; nothing is sent.
    NoData,
    Ready { title: String, body: String },
}

impl DigestReport {
    pub const TITLE: &'static str = "Notification";
}

/// Format the latest committed snapshot of every ready symbol.
///
/// ```text
/// time: 2024-01-01 12:00:00
/// [BTCUSDT]
/// close: 42000.00
/// sma10: 41850.12
/// atr14: 812.40
/// ```
pub fn render(book: &StateBook, now: DateTime<Utc>) -> DigestReport {
    let mut ready = book.ready().peekable();
    if ready.peek().is_none() {
        return DigestReport::NoData;
    }

    let mut body = format!("time: {}\n", now.format("%Y-%m-%d %H:%M:%S"));
    for (symbol, snapshot) in ready {
        let _ = writeln!(body, "[{symbol}]");
        let _ = writeln!(body, "close: {:.2}", snapshot.close);
        for (indicator, value) in snapshot.indicators.iter() {
            let _ = writeln!(body, "{indicator}: {value:.2}");
        }
    }

    DigestReport::Ready {
        title: DigestReport::TITLE.to_string(),
        body,
    }
}
