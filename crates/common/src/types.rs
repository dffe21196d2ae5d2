use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLC observation for a symbol. Immutable once produced by a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    /// Open time of the bar.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// One bar-arrival event, keyed by symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bars {
    pub time: DateTime<Utc>,
    pub bars: BTreeMap<String, Bar>,
}

impl Bars {
    pub fn single(bar: Bar) -> Self {
        let time = bar.timestamp;
        let mut bars = BTreeMap::new();
        bars.insert(bar.symbol.clone(), bar);
        Self { time, bars }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    pub fn get(&self, symbol: &str) -> Option<&Bar> {
        self.bars.get(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Sampling interval of a bar series.
///
/// Parsed from and printed as the short codes used in config files and by
/// the Binance API (`1m`, `4h`, `1d`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    Second,
    Minute,
    Hour,
    Hour4,
    Day,
    Week,
    Month,
}

impl Frequency {
    /// Span of one bar in seconds. Months count as 31 days.
    pub fn as_secs(self) -> i64 {
        match self {
            Frequency::Second => 1,
            Frequency::Minute => 60,
            Frequency::Hour => 60 * 60,
            Frequency::Hour4 => 4 * 60 * 60,
            Frequency::Day => 24 * 60 * 60,
            Frequency::Week => 7 * 24 * 60 * 60,
            Frequency::Month => 31 * 24 * 60 * 60,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Frequency::Second => "1s",
            Frequency::Minute => "1m",
            Frequency::Hour => "1h",
            Frequency::Hour4 => "4h",
            Frequency::Day => "1d",
            Frequency::Week => "1w",
            Frequency::Month => "1M",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1s" => Ok(Frequency::Second),
            "1m" => Ok(Frequency::Minute),
            "1h" => Ok(Frequency::Hour),
            "4h" => Ok(Frequency::Hour4),
            "1d" => Ok(Frequency::Day),
            "1w" => Ok(Frequency::Week),
            "1M" => Ok(Frequency::Month),
            other => Err(format!("unknown frequency '{other}'")),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.code().to_string()
    }
}

/// Current state of the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
    Finished,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
            EngineState::Finished => write!(f, "finished"),
        }
    }
}

/// Commands sent to the engine via the command channel.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Run `on_finish` for every strategy and stop dispatching.
    Shutdown,
}
