//! Average True Range.
//!
//! True range of bar `i` is `max(high-low, |high-prev_close|, |low-prev_close|)`;
//! the first bar has no previous close and uses `high-low` alone.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use common::Bar;

use super::sma::rolling_mean;
use super::{IndicatorError, IndicatorSeries};

/// How the true-range series is averaged. The two conventions give different
/// numbers for the same input, so it is always chosen explicitly in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtrSmoothing {
    /// Seed with the mean of the first `period` true ranges, then
    /// `atr = (prev * (period - 1) + tr) / period`. Matches TA-Lib.
    #[default]
    Wilder,
    /// Plain moving average of the true range.
    Simple,
}

impl FromStr for AtrSmoothing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wilder" => Ok(AtrSmoothing::Wilder),
            "simple" | "sma" => Ok(AtrSmoothing::Simple),
            other => Err(format!("unknown ATR smoothing '{other}' (expected 'wilder' or 'simple')")),
        }
    }
}

/// True range of every bar in `window`.
pub fn true_range(window: &[Bar]) -> Vec<f64> {
    let mut prev_close: Option<f64> = None;
    window
        .iter()
        .map(|bar| {
            let hl = bar.high - bar.low;
            let tr = match prev_close {
                None => hl,
                Some(pc) => hl.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            };
            prev_close = Some(bar.close);
            tr
        })
        .collect()
}

/// Average true range over `period` bars, aligned to the tail of `window`.
///
/// Returns an empty series unless `window.len() > period`; otherwise
/// `window.len() - period + 1` values with either smoothing.
pub fn atr(
    window: &[Bar],
    period: usize,
    smoothing: AtrSmoothing,
) -> Result<IndicatorSeries, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    if window.len() <= period {
        return Ok(IndicatorSeries::empty());
    }

    let tr = true_range(window);
    let values = match smoothing {
        AtrSmoothing::Simple => rolling_mean(&tr, period),
        AtrSmoothing::Wilder => wilder(&tr, period),
    };
    Ok(values.into())
}

fn wilder(tr: &[f64], period: usize) -> Vec<f64> {
    let p = period as f64;
    let seed = tr[..period].iter().sum::<f64>() / p;

    let mut out = Vec::with_capacity(tr.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &value in &tr[period..] {
        prev = (prev * (p - 1.0) + value) / p;
        out.push(prev);
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::indicators::test_support::bars;

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            symbol: "TEST".into(),
            timestamp: Utc::now(),
            open: close,
            high,
            low,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn true_range_uses_gap_from_previous_close() {
        let window = vec![
            bar(102.0, 98.0, 100.0),  // first bar: 4
            bar(103.0, 99.0, 101.0),  // hl 4, |103-100| 3, |99-100| 1 -> 4
            bar(110.0, 108.0, 109.0), // hl 2, gap up |110-101| 9 -> 9
            bar(100.0, 99.0, 99.5),   // hl 1, gap down |99-109| 10 -> 10
        ];
        assert_eq!(true_range(&window), vec![4.0, 4.0, 9.0, 10.0]);
    }

    #[test]
    fn atr_is_empty_until_window_exceeds_period() {
        let window = bars(&[1.0; 14]);
        assert!(atr(&window, 14, AtrSmoothing::Wilder).unwrap().is_empty());
        assert!(atr(&window, 14, AtrSmoothing::Simple).unwrap().is_empty());
        assert_eq!(atr(&bars(&[1.0; 15]), 14, AtrSmoothing::Wilder).unwrap().len(), 2);
    }

    #[test]
    fn atr_rejects_zero_period() {
        assert_eq!(
            atr(&bars(&[1.0, 2.0]), 0, AtrSmoothing::Wilder),
            Err(IndicatorError::ZeroPeriod)
        );
    }

    #[test]
    fn flat_ranges_give_the_same_atr_under_both_smoothings() {
        // Constant close with high/low +-1: every true range is 2.
        let window = bars(&[50.0; 30]);
        for smoothing in [AtrSmoothing::Wilder, AtrSmoothing::Simple] {
            let series = atr(&window, 14, smoothing).unwrap();
            assert_eq!(series.len(), 17);
            assert!(series.values().iter().all(|v| (v - 2.0).abs() < 1e-12));
        }
    }

    #[test]
    fn smoothings_diverge_after_a_volatility_spike() {
        let mut window = vec![
            bar(11.0, 9.0, 10.0),
            bar(11.0, 9.0, 10.0),
            bar(11.0, 9.0, 10.0),
            bar(21.0, 9.0, 20.0), // tr 12
            bar(21.0, 19.0, 20.0),
        ];
        window.push(bar(21.0, 19.0, 20.0));

        let wilder = atr(&window, 3, AtrSmoothing::Wilder).unwrap();
        let simple = atr(&window, 3, AtrSmoothing::Simple).unwrap();
        // tr = [2, 2, 2, 12, 2, 2]
        assert_eq!(simple.values(), &[2.0, 16.0 / 3.0, 16.0 / 3.0, 16.0 / 3.0]);
        let w = wilder.values();
        assert!((w[0] - 2.0).abs() < 1e-12);
        assert!((w[1] - (2.0 * 2.0 + 12.0) / 3.0).abs() < 1e-12);
        assert!((w[3] - simple.values()[3]).abs() > 0.1);
    }

    #[test]
    fn smoothing_parses_from_config_names() {
        assert_eq!("Wilder".parse::<AtrSmoothing>().unwrap(), AtrSmoothing::Wilder);
        assert_eq!("simple".parse::<AtrSmoothing>().unwrap(), AtrSmoothing::Simple);
        assert!("ema".parse::<AtrSmoothing>().is_err());
    }
}
