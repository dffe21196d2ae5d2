pub mod atr;
pub mod sma;

pub use atr::{atr, true_range, AtrSmoothing};
pub use sma::sma;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::Bar;

use crate::state::SkipReason;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("indicator period must be greater than zero")]
    ZeroPeriod,

    #[error("indicator set is empty")]
    EmptySet,

    #[error("unknown indicator '{0}' (expected e.g. 'sma20' or 'atr14')")]
    Unknown(String),
}

/// Indicator values aligned to the tail of a bar window, oldest first.
///
/// Empty when the window was too short for the period. An empty series has
/// no latest value; callers skip the cycle instead of substituting a default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSeries(Vec<f64>);

impl IndicatorSeries {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.0.last().copied()
    }
}

impl From<Vec<f64>> for IndicatorSeries {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// One configured indicator. Printed and parsed as `sma10`, `atr14`, ...
///
/// Ordering puts every SMA before every ATR, each by ascending period, which
/// is the order used in logs and digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Indicator {
    Sma(usize),
    Atr(usize),
}

impl Indicator {
    pub fn period(self) -> usize {
        match self {
            Indicator::Sma(p) | Indicator::Atr(p) => p,
        }
    }

    pub fn compute(
        self,
        window: &[Bar],
        smoothing: AtrSmoothing,
    ) -> Result<IndicatorSeries, IndicatorError> {
        match self {
            Indicator::Sma(period) => sma(window, period),
            Indicator::Atr(period) => atr(window, period, smoothing),
        }
    }
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Indicator::Sma(p) => write!(f, "sma{p}"),
            Indicator::Atr(p) => write!(f, "atr{p}"),
        }
    }
}

impl FromStr for Indicator {
    type Err = IndicatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (ctor, digits): (fn(usize) -> Indicator, &str) =
            if let Some(rest) = lower.strip_prefix("sma") {
                (Indicator::Sma, rest)
            } else if let Some(rest) = lower.strip_prefix("atr") {
                (Indicator::Atr, rest)
            } else {
                return Err(IndicatorError::Unknown(s.to_string()));
            };

        let period: usize = digits
            .parse()
            .map_err(|_| IndicatorError::Unknown(s.to_string()))?;
        if period == 0 {
            return Err(IndicatorError::ZeroPeriod);
        }
        Ok(ctor(period))
    }
}

impl TryFrom<String> for Indicator {
    type Error = IndicatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Indicator> for String {
    fn from(value: Indicator) -> Self {
        value.to_string()
    }
}

/// Latest value of every configured indicator, computed in the same cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSnapshot(BTreeMap<Indicator, f64>);

impl IndicatorSnapshot {
    pub fn get(&self, indicator: Indicator) -> Option<f64> {
        self.0.get(&indicator).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Indicator, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Indicator, f64)> for IndicatorSnapshot {
    fn from_iter<T: IntoIterator<Item = (Indicator, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The set of indicators a strategy requires before it considers a symbol
/// ready, plus the ATR smoothing convention applied to every ATR in the set.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    indicators: Vec<Indicator>,
    smoothing: AtrSmoothing,
}

impl IndicatorSet {
    pub fn new(
        mut indicators: Vec<Indicator>,
        smoothing: AtrSmoothing,
    ) -> Result<Self, IndicatorError> {
        if indicators.is_empty() {
            return Err(IndicatorError::EmptySet);
        }
        if indicators.iter().any(|i| i.period() == 0) {
            return Err(IndicatorError::ZeroPeriod);
        }
        indicators.sort();
        indicators.dedup();
        Ok(Self { indicators, smoothing })
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn smoothing(&self) -> AtrSmoothing {
        self.smoothing
    }

    /// Smallest window length for which every indicator has a value.
    pub fn min_bars(&self) -> usize {
        self.indicators.iter().map(|i| i.period()).max().unwrap_or(0) + 1
    }

    /// Evaluate every indicator over `window`, all or nothing.
    ///
    /// Returns the snapshot only if each indicator produced a latest value.
    pub fn compute(&self, window: &[Bar]) -> Result<IndicatorSnapshot, SkipReason> {
        let mut values = BTreeMap::new();
        let mut missing = Vec::new();

        for &indicator in &self.indicators {
            let latest = indicator
                .compute(window, self.smoothing)
                .ok()
                .and_then(|series| series.latest());
            match latest {
                Some(v) => {
                    values.insert(indicator, v);
                }
                None => missing.push(indicator),
            }
        }

        if missing.is_empty() {
            Ok(IndicatorSnapshot(values))
        } else if values.is_empty() {
            Err(SkipReason::InsufficientHistory {
                have: window.len(),
                need: self.min_bars(),
            })
        } else {
            Err(SkipReason::PartialReadiness { missing })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::bars;
    use super::*;

    #[test]
    fn indicator_names_parse_case_insensitively() {
        assert_eq!("sma20".parse::<Indicator>().unwrap(), Indicator::Sma(20));
        assert_eq!("ATR14".parse::<Indicator>().unwrap(), Indicator::Atr(14));
        assert_eq!(Indicator::Sma(50).to_string(), "sma50");
    }

    #[test]
    fn indicator_rejects_zero_and_garbage() {
        assert_eq!("sma0".parse::<Indicator>(), Err(IndicatorError::ZeroPeriod));
        assert!(matches!("ema9".parse::<Indicator>(), Err(IndicatorError::Unknown(_))));
        assert!(matches!("sma".parse::<Indicator>(), Err(IndicatorError::Unknown(_))));
    }

    #[test]
    fn set_orders_and_dedups() {
        let set = IndicatorSet::new(
            vec![Indicator::Atr(14), Indicator::Sma(20), Indicator::Sma(10), Indicator::Sma(20)],
            AtrSmoothing::Wilder,
        )
        .unwrap();
        assert_eq!(
            set.indicators(),
            &[Indicator::Sma(10), Indicator::Sma(20), Indicator::Atr(14)]
        );
        assert_eq!(set.min_bars(), 21);
    }

    #[test]
    fn empty_set_is_rejected() {
        assert_eq!(
            IndicatorSet::new(vec![], AtrSmoothing::Simple),
            Err(IndicatorError::EmptySet)
        );
    }

    #[test]
    fn compute_reports_insufficient_history_when_nothing_is_ready() {
        let set = IndicatorSet::new(vec![Indicator::Sma(10), Indicator::Atr(14)], AtrSmoothing::Wilder)
            .unwrap();
        let err = set.compute(&bars(&[1.0; 5])).unwrap_err();
        assert_eq!(err, SkipReason::InsufficientHistory { have: 5, need: 15 });
    }

    #[test]
    fn compute_reports_partial_readiness_without_values() {
        let set = IndicatorSet::new(vec![Indicator::Sma(3), Indicator::Sma(10)], AtrSmoothing::Wilder)
            .unwrap();
        let err = set.compute(&bars(&[1.0; 6])).unwrap_err();
        assert_eq!(
            err,
            SkipReason::PartialReadiness {
                missing: vec![Indicator::Sma(10)]
            }
        );
    }

    #[test]
    fn compute_returns_every_value_once_ready() {
        let set = IndicatorSet::new(vec![Indicator::Sma(3), Indicator::Atr(3)], AtrSmoothing::Simple)
            .unwrap();
        let snapshot = set.compute(&bars(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!((snapshot.get(Indicator::Sma(3)).unwrap() - 4.0).abs() < 1e-12);
        assert!(snapshot.get(Indicator::Atr(3)).is_some());
    }
}
