use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use common::Bar;

use crate::fetcher::SeriesWindow;
use crate::indicators::{Indicator, IndicatorSet, IndicatorSnapshot};

/// Lifecycle of one symbol's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No successful fetch yet.
    #[default]
    Uninitialized,
    /// History arrived but not every required indicator has a value yet.
    Warm,
    /// Every required indicator had a value in the same cycle at least once.
    Ready,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Uninitialized => write!(f, "uninitialized"),
            Phase::Warm => write!(f, "warm"),
            Phase::Ready => write!(f, "ready"),
        }
    }
}

/// Why an update cycle left the state untouched. All of these are expected
/// transient conditions; the next event is the retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The feed had nothing for this symbol.
    NoData,
    /// The window is too short for any required indicator.
    InsufficientHistory { have: usize, need: usize },
    /// Some indicators had values, others did not.
    PartialReadiness { missing: Vec<Indicator> },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::InsufficientHistory { have, need } => {
                write!(f, "insufficient history ({have} of {need} bars)")
            }
            SkipReason::PartialReadiness { missing } => {
                let names: Vec<String> = missing.iter().map(|i| i.to_string()).collect();
                write!(f, "partial readiness (missing {})", names.join(", "))
            }
        }
    }
}

/// Everything committed by one successful cycle. Replaced only as a whole,
/// so readers never see indicator values from different cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub indicators: IndicatorSnapshot,
    /// Close of the bar that triggered the cycle.
    pub close: f64,
    pub bar_time: DateTime<Utc>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolState {
    pub phase: Phase,
    pub latest: Option<Snapshot>,
    pub last_notified_price: Option<f64>,
    pub last_notification: Option<DateTime<Utc>>,
}

/// Per-symbol state owned by one strategy instance.
///
/// Only the bar handler mutates it; digest readers take a shared view.
#[derive(Debug, Clone, Default)]
pub struct StateBook {
    symbols: BTreeMap<String, SymbolState>,
}

impl StateBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, symbol: &str) -> Phase {
        self.symbols
            .get(symbol)
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolState> {
        self.symbols.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut SymbolState> {
        self.symbols.get_mut(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Every symbol seen so far, in symbol order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    /// Symbols with a committed snapshot, in symbol order.
    pub fn ready(&self) -> impl Iterator<Item = (&str, &Snapshot)> {
        self.symbols
            .iter()
            .filter_map(|(sym, state)| state.latest.as_ref().map(|snap| (sym.as_str(), snap)))
    }

    /// Run one update cycle for `symbol` triggered by `bar`.
    ///
    /// A missing window or any missing indicator leaves the committed
    /// snapshot untouched. The first window seen moves the symbol to
    /// `Warm`; the first complete set of indicators moves it to `Ready`.
    pub fn apply(
        &mut self,
        bar: &Bar,
        window: Option<&SeriesWindow>,
        indicators: &IndicatorSet,
        now: DateTime<Utc>,
    ) -> Result<Snapshot, SkipReason> {
        let window = window.ok_or(SkipReason::NoData)?;

        let state = self.symbols.entry(bar.symbol.clone()).or_default();
        if state.phase == Phase::Uninitialized {
            state.phase = Phase::Warm;
        }

        let values = indicators.compute(window.bars())?;
        let snapshot = Snapshot {
            indicators: values,
            close: bar.close,
            bar_time: bar.timestamp,
            computed_at: now,
        };
        state.phase = Phase::Ready;
        state.latest = Some(snapshot.clone());
        Ok(snapshot)
    }
}
