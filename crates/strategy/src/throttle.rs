use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::state::{Phase, SymbolState};

/// A price move large enough to notify about.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub symbol: String,
    pub price: f64,
    pub previous: f64,
    pub at: DateTime<Utc>,
}

impl PriceAlert {
    pub const TITLE: &'static str = "price alert";

    pub fn message(&self) -> String {
        format!(
            "price changed: {} {:.2} <- {:.2}",
            self.symbol, self.price, self.previous
        )
    }
}

/// Event-driven alert policy: notify when the price has moved more than
/// `threshold` since the last notification for that symbol.
#[derive(Debug, Clone, Copy)]
pub struct PriceAlertThrottle {
    threshold: f64,
}

impl PriceAlertThrottle {
    pub fn new(threshold: f64) -> Self {
        assert!(
            threshold.is_finite() && threshold >= 0.0,
            "alert threshold must be a finite non-negative number"
        );
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Feed the latest price of a `Ready` symbol through the policy.
    ///
    /// The first observation only seeds the reference price. Returns an
    /// alert, and moves the reference to `price`, only on a strictly larger
    /// move than the threshold.
    pub fn observe(
        &self,
        symbol: &str,
        state: &mut SymbolState,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<PriceAlert> {
        if state.phase != Phase::Ready {
            return None;
        }

        let Some(previous) = state.last_notified_price else {
            state.last_notified_price = Some(price);
            return None;
        };

        if (price - previous).abs() > self.threshold {
            state.last_notified_price = Some(price);
            state.last_notification = Some(now);
            Some(PriceAlert {
                symbol: symbol.to_string(),
                price,
                previous,
                at: now,
            })
        } else {
            None
        }
    }
}

/// Rate limiter for verbose logging: at most one pass per `period`.
/// Runs on its own clock, independent of the alert and digest clocks.
#[derive(Debug, Clone)]
pub struct Cooldown {
    period: Duration,
    last: Option<DateTime<Utc>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// True the first time, then only once more than `period` has elapsed
    /// since the last `true`. A clock that went backwards never passes.
    pub fn ready(&mut self, now: DateTime<Utc>) -> bool {
        let passed = match self.last {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed > self.period)
                .unwrap_or(false),
        };
        if passed {
            self.last = Some(now);
        }
        passed
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ready_state() -> SymbolState {
        SymbolState {
            phase: Phase::Ready,
            ..Default::default()
        }
    }

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    #[test]
    fn seeds_then_alerts_once_on_large_move() {
        let throttle = PriceAlertThrottle::new(5.5);
        let mut state = ready_state();

        assert_eq!(throttle.observe("XAU", &mut state, 100.0, t(0)), None);
        assert_eq!(state.last_notified_price, Some(100.0));
        assert_eq!(state.last_notification, None);

        assert_eq!(throttle.observe("XAU", &mut state, 100.0, t(1)), None);

        let alert = throttle.observe("XAU", &mut state, 106.0, t(2)).unwrap();
        assert_eq!(alert.previous, 100.0);
        assert_eq!(alert.price, 106.0);
        assert_eq!(alert.message(), "price changed: XAU 106.00 <- 100.00");
        assert_eq!(state.last_notified_price, Some(106.0));
        assert_eq!(state.last_notification, Some(t(2)));
    }

    #[test]
    fn move_equal_to_threshold_does_not_alert() {
        let throttle = PriceAlertThrottle::new(4.5);
        let mut state = ready_state();
        throttle.observe("XAU", &mut state, 100.0, t(0));
        assert_eq!(throttle.observe("XAU", &mut state, 95.5, t(1)), None);
        assert!(throttle.observe("XAU", &mut state, 95.4, t(2)).is_some());
    }

    #[test]
    fn reference_only_moves_on_alert() {
        let throttle = PriceAlertThrottle::new(5.0);
        let mut state = ready_state();
        throttle.observe("XAU", &mut state, 100.0, t(0));
        // Drift in small steps: each step is under the threshold, the total is not.
        assert_eq!(throttle.observe("XAU", &mut state, 103.0, t(1)), None);
        assert!(throttle.observe("XAU", &mut state, 106.0, t(2)).is_some());
    }

    #[test]
    fn ignores_symbols_that_are_not_ready() {
        let throttle = PriceAlertThrottle::new(1.0);
        let mut state = SymbolState {
            phase: Phase::Warm,
            ..Default::default()
        };
        assert_eq!(throttle.observe("XAU", &mut state, 100.0, t(0)), None);
        assert_eq!(state.last_notified_price, None);
    }

    #[test]
    #[should_panic(expected = "alert threshold")]
    fn negative_threshold_is_rejected() {
        PriceAlertThrottle::new(-1.0);
    }

    #[test]
    fn cooldown_passes_first_then_waits_for_period() {
        let mut cooldown = Cooldown::new(Duration::from_secs(3 * 60 * 60));
        assert!(cooldown.ready(t(0)));
        assert!(!cooldown.ready(t(60)));
        assert!(!cooldown.ready(t(180))); // exactly the period is not enough
        assert!(cooldown.ready(t(181)));
        assert!(!cooldown.ready(t(200)));
    }

    #[test]
    fn cooldown_ignores_clock_going_backwards() {
        let mut cooldown = Cooldown::new(Duration::from_secs(60));
        assert!(cooldown.ready(t(10)));
        assert!(!cooldown.ready(t(0)));
    }
}
