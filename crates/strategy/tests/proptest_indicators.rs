use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use common::{Bar, Frequency};
use replay::synthetic_bars;
use strategy::indicators::{atr, sma, AtrSmoothing, Indicator, IndicatorSet};
use strategy::{Phase, SeriesWindow, StateBook};

fn window(closes: &[f64]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    synthetic_bars("PROP", Frequency::Day, start, closes)
}

fn smoothing() -> impl Strategy<Value = AtrSmoothing> {
    prop_oneof![Just(AtrSmoothing::Wilder), Just(AtrSmoothing::Simple)]
}

proptest! {
    /// Windows no longer than the period never produce values.
    #[test]
    fn short_windows_give_empty_series(
        closes in prop::collection::vec(1.0f64..10_000.0, 0..40),
        extra in 0usize..20,
        smoothing in smoothing(),
    ) {
        let period = closes.len().max(1) + extra;
        let bars = window(&closes);
        prop_assert!(sma(&bars, period).unwrap().is_empty());
        prop_assert!(atr(&bars, period, smoothing).unwrap().is_empty());
    }

    /// A window longer than the period yields one value per full window.
    #[test]
    fn series_length_matches_window_positions(
        closes in prop::collection::vec(1.0f64..10_000.0, 2..120),
        period_seed in 1usize..100,
        smoothing in smoothing(),
    ) {
        let period = 1 + period_seed % (closes.len() - 1);
        let bars = window(&closes);
        prop_assert_eq!(sma(&bars, period).unwrap().len(), closes.len() - period + 1);
        prop_assert_eq!(atr(&bars, period, smoothing).unwrap().len(), closes.len() - period + 1);
    }

    /// Constant closes average to themselves.
    #[test]
    fn sma_of_constant_series_is_constant(
        value in -1_000_000.0f64..1_000_000.0,
        len in 2usize..100,
        period_seed in 1usize..100,
    ) {
        let period = 1 + period_seed % (len - 1);
        let series = sma(&window(&vec![value; len]), period).unwrap();
        let tolerance = 1e-9 * value.abs().max(1.0);
        for v in series.values() {
            prop_assert!((v - value).abs() <= tolerance, "{} vs {}", v, value);
        }
    }

    /// SMA values match the closed-form mean of each window.
    #[test]
    fn sma_matches_closed_form(
        closes in prop::collection::vec(-500.0f64..500.0, 2..60),
        period_seed in 1usize..60,
    ) {
        let period = 1 + period_seed % (closes.len() - 1);
        let series = sma(&window(&closes), period).unwrap();
        for (i, v) in series.values().iter().enumerate() {
            let expected: f64 = closes[i..i + period].iter().sum::<f64>() / period as f64;
            prop_assert!((v - expected).abs() < 1e-9);
        }
    }

    /// ATR is never negative and is bounded by the largest true range.
    #[test]
    fn atr_is_bounded_by_true_range(
        closes in prop::collection::vec(1.0f64..1_000.0, 2..80),
        period_seed in 1usize..80,
        smoothing in smoothing(),
    ) {
        let period = 1 + period_seed % (closes.len() - 1);
        let bars = window(&closes);
        let max_tr = strategy::indicators::true_range(&bars)
            .into_iter()
            .fold(0.0f64, f64::max);
        for v in atr(&bars, period, smoothing).unwrap().values() {
            prop_assert!(*v >= 0.0);
            prop_assert!(*v <= max_tr + 1e-9);
        }
    }

    /// A symbol becomes Ready exactly when the window covers every indicator.
    #[test]
    fn ready_only_when_every_indicator_has_a_value(
        len in 1usize..40,
        short in 1usize..20,
        long in 1usize..30,
    ) {
        let set = IndicatorSet::new(
            vec![Indicator::Sma(short), Indicator::Atr(long)],
            AtrSmoothing::Wilder,
        ).unwrap();
        let bars = window(&vec![100.0; len]);
        let bar = bars[bars.len() - 1].clone();
        let w = SeriesWindow::new("PROP", Frequency::Day, bars).unwrap();

        let mut book = StateBook::new();
        let result = book.apply(&bar, Some(&w), &set, Utc::now());

        let all_ready = len > short && len > long;
        prop_assert_eq!(result.is_ok(), all_ready);
        let expected = if all_ready { Phase::Ready } else { Phase::Warm };
        prop_assert_eq!(book.phase("PROP"), expected);
    }
}
