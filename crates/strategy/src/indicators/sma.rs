use common::Bar;

use super::{IndicatorError, IndicatorSeries};

/// Simple moving average of the close price.
///
/// One value per full window of `period` bars, aligned to the tail of
/// `window`. Returns an empty series unless `window.len() > period`.
pub fn sma(window: &[Bar], period: usize) -> Result<IndicatorSeries, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    if window.len() <= period {
        return Ok(IndicatorSeries::empty());
    }

    let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
    Ok(rolling_mean(&closes, period).into())
}

/// Mean of every `period`-long slice of `values`. Caller guarantees
/// `values.len() >= period > 0`.
pub(crate) fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::bars;

    #[test]
    fn sma_is_empty_until_window_exceeds_period() {
        assert!(sma(&bars(&[1.0, 2.0, 3.0]), 3).unwrap().is_empty());
        assert!(sma(&[], 1).unwrap().is_empty());
        assert_eq!(sma(&bars(&[1.0, 2.0, 3.0, 4.0]), 3).unwrap().len(), 2);
    }

    #[test]
    fn sma_rejects_zero_period() {
        assert_eq!(sma(&bars(&[1.0, 2.0]), 0), Err(IndicatorError::ZeroPeriod));
    }

    #[test]
    fn sma_known_values() {
        let series = sma(&bars(&[2.0, 4.0, 6.0, 8.0, 10.0]), 2).unwrap();
        assert_eq!(series.values(), &[3.0, 5.0, 7.0, 9.0]);
        assert_eq!(series.latest(), Some(9.0));
    }

    #[test]
    fn sma_uses_close_not_high_or_low() {
        let mut window = bars(&[10.0, 20.0, 30.0]);
        for bar in &mut window {
            bar.high = 1_000.0;
            bar.low = 0.0;
        }
        let series = sma(&window, 2).unwrap();
        assert_eq!(series.values(), &[15.0, 25.0]);
    }
}
