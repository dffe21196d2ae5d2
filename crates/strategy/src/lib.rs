pub mod config;
pub mod counter;
pub mod digest;
pub mod fetcher;
pub mod indicators;
pub mod monitor;
pub mod registry;
pub mod state;
pub mod throttle;

pub use config::{ConfigError, StrategyConfig, StrategyFileConfig};
pub use counter::{BarCounter, PersistentCounter};
pub use digest::DigestReport;
pub use fetcher::{SeriesFetcher, SeriesWindow};
pub use indicators::{AtrSmoothing, Indicator, IndicatorSeries, IndicatorSet};
pub use monitor::{IndicatorMonitor, MonitorSettings, SharedStateBook};
pub use registry::{StrategyDeps, StrategyRegistry};
pub use state::{Phase, SkipReason, StateBook, SymbolState};
pub use throttle::{Cooldown, PriceAlert, PriceAlertThrottle};

use std::time::Duration;

use async_trait::async_trait;

use common::Bars;

/// Callbacks a strategy exposes to the host.
///
/// The host invokes them one at a time per strategy; implementations never
/// see overlapping calls and need no internal synchronization for that.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// Symbols this strategy wants bar events for.
    fn symbols(&self) -> &[String];

    async fn on_start(&mut self) {}

    /// A new set of bars arrived. Symbols outside `symbols()` may be present
    /// and should be ignored.
    async fn on_bars(&mut self, bars: &Bars);

    /// Called when the host has no pending events.
    async fn on_idle(&mut self) {}

    async fn on_finish(&mut self) {}

    /// Period of the strategy's wall-clock timer, if it wants one.
    fn timer_interval(&self) -> Option<Duration> {
        None
    }

    /// Fired every `timer_interval()`, independent of bar arrival.
    async fn on_timer(&mut self) {}
}
