use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{Alerter, Bar, Bars, Frequency};

use crate::digest::{self, DigestReport};
use crate::fetcher::SeriesFetcher;
use crate::indicators::{AtrSmoothing, Indicator, IndicatorSet};
use crate::state::StateBook;
use crate::throttle::{Cooldown, PriceAlert, PriceAlertThrottle};
use crate::Strategy;

/// Read handle to a monitor's per-symbol state, for digest readers.
pub type SharedStateBook = Arc<RwLock<StateBook>>;

/// Tunables of an `IndicatorMonitor`.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub frequency: Frequency,
    /// Bars requested from the feed per cycle.
    pub window: usize,
    pub indicators: IndicatorSet,
    /// Minimum absolute price move, since the last alert, that triggers a new one.
    pub alert_threshold: f64,
    pub digest_interval: Duration,
    pub log_cooldown: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            frequency: Frequency::Day,
            window: 64,
            indicators: IndicatorSet::new(
                vec![
                    Indicator::Sma(10),
                    Indicator::Sma(20),
                    Indicator::Sma(30),
                    Indicator::Sma(50),
                    Indicator::Atr(14),
                    Indicator::Atr(20),
                ],
                AtrSmoothing::Wilder,
            )
            .expect("default indicator set is valid"),
            alert_threshold: 5.5,
            digest_interval: Duration::from_secs(3 * 60 * 60),
            log_cooldown: Duration::from_secs(3 * 60 * 60),
        }
    }
}

/// Watches a set of symbols: on every bar it refreshes indicators from the
/// feed, alerts on large price moves, and on its timer sends a digest of the
/// latest values.
pub struct IndicatorMonitor {
    name: String,
    symbols: Vec<String>,
    settings: MonitorSettings,
    fetcher: SeriesFetcher,
    alerter: Arc<dyn Alerter>,
    throttle: PriceAlertThrottle,
    log_cooldown: Cooldown,
    book: SharedStateBook,
    bar_events: u64,
}

impl IndicatorMonitor {
    pub fn new(
        name: impl Into<String>,
        symbols: Vec<String>,
        settings: MonitorSettings,
        fetcher: SeriesFetcher,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        Self {
            name: name.into(),
            symbols,
            throttle: PriceAlertThrottle::new(settings.alert_threshold),
            log_cooldown: Cooldown::new(settings.log_cooldown),
            settings,
            fetcher,
            alerter,
            book: Arc::new(RwLock::new(StateBook::new())),
            bar_events: 0,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Shared view of the per-symbol state. Only this monitor writes to it.
    pub fn state(&self) -> SharedStateBook {
        self.book.clone()
    }

    /// One update cycle for one symbol.
    pub async fn process(&mut self, bar: &Bar, now: DateTime<Utc>) {
        let window = self
            .fetcher
            .fetch(&bar.symbol, self.settings.frequency, self.settings.window)
            .await;

        let alert = {
            let mut book = self.book.write().await;
            let snapshot =
                match book.apply(bar, window.as_ref(), &self.settings.indicators, now) {
                    Ok(snapshot) => snapshot,
                    Err(reason) => {
                        debug!(strategy = %self.name, symbol = %bar.symbol, %reason, "Skipping cycle");
                        return;
                    }
                };

            if self.log_cooldown.ready(now) {
                let values: Vec<String> = snapshot
                    .indicators
                    .iter()
                    .map(|(indicator, value)| format!("{indicator}={value:.2}"))
                    .collect();
                info!(
                    strategy = %self.name,
                    symbol = %bar.symbol,
                    bar_time = %snapshot.bar_time,
                    close = snapshot.close,
                    events = self.bar_events,
                    indicators = %values.join(" "),
                    "Indicator state"
                );
            }

            book.get_mut(&bar.symbol)
                .and_then(|state| self.throttle.observe(&bar.symbol, state, bar.close, now))
        };

        if let Some(alert) = alert {
            self.send_price_alert(&alert).await;
        }
    }

    /// Render and send the digest. Skipped with a log line when no symbol is ready.
    pub async fn send_digest(&self, now: DateTime<Utc>) -> DigestReport {
        let report = digest::render(&*self.book.read().await, now);
        match &report {
            DigestReport::NoData => {
                info!(strategy = %self.name, "Digest skipped: no data");
            }
            DigestReport::Ready { title, body } => {
                if let Err(e) = self.alerter.alert(title, body).await {
                    warn!(strategy = %self.name, error = %e, "Failed to deliver digest");
                }
            }
        }
        report
    }

    async fn send_price_alert(&self, alert: &PriceAlert) {
        let message = alert.message();
        info!(strategy = %self.name, symbol = %alert.symbol, "{message}");
        if let Err(e) = self.alerter.alert(PriceAlert::TITLE, &message).await {
            warn!(strategy = %self.name, symbol = %alert.symbol, error = %e, "Failed to deliver price alert");
        }
    }

    fn tracks(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }
}

#[async_trait]
impl Strategy for IndicatorMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    async fn on_start(&mut self) {
        let indicators: Vec<String> = self
            .settings
            .indicators
            .indicators()
            .iter()
            .map(|i| i.to_string())
            .collect();
        info!(
            strategy = %self.name,
            symbols = ?self.symbols,
            frequency = %self.settings.frequency,
            indicators = %indicators.join(","),
            smoothing = ?self.settings.indicators.smoothing(),
            threshold = self.settings.alert_threshold,
            "Indicator monitor started"
        );
    }

    async fn on_bars(&mut self, bars: &Bars) {
        self.bar_events += 1;
        let now = Utc::now();
        let tracked: Vec<Bar> = bars
            .bars
            .values()
            .filter(|bar| self.tracks(&bar.symbol))
            .cloned()
            .collect();
        for bar in &tracked {
            self.process(bar, now).await;
        }
    }

    async fn on_finish(&mut self) {
        let book = self.book.read().await;
        info!(
            strategy = %self.name,
            events = self.bar_events,
            symbols = book.len(),
            ready = book.ready().count(),
            "Indicator monitor finished"
        );
    }

    fn timer_interval(&self) -> Option<Duration> {
        Some(self.settings.digest_interval)
    }

    async fn on_timer(&mut self) {
        self.send_digest(Utc::now()).await;
    }
}
