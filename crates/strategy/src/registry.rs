use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use common::{Alerter, BarFeed, Bars, KvStore};

use crate::config::{ConfigError, StrategyConfig, StrategyFileConfig};
use crate::counter::BarCounter;
use crate::fetcher::SeriesFetcher;
use crate::monitor::{IndicatorMonitor, SharedStateBook};
use crate::Strategy;

/// Host collaborators handed to every strategy built from config.
#[derive(Clone)]
pub struct StrategyDeps {
    pub feed: Arc<dyn BarFeed>,
    pub alerter: Arc<dyn Alerter>,
    pub store: Arc<dyn KvStore>,
}

/// Holds all active strategy instances and fans lifecycle events out to them.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
    /// State handles of every indicator monitor, by strategy name.
    books: Vec<(String, SharedStateBook)>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from config. Fails on the first invalid entry.
    pub fn from_config(
        file_cfg: &StrategyFileConfig,
        deps: &StrategyDeps,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();

        for cfg in &file_cfg.strategies {
            match cfg.strategy_type.as_str() {
                "indicator_monitor" => {
                    let monitor = build_monitor(cfg, deps)?;
                    registry.books.push((cfg.name.clone(), monitor.state()));
                    registry.register(Box::new(monitor));
                }
                "bar_counter" => {
                    let key = cfg
                        .param_str("key")?
                        .unwrap_or_else(|| BarCounter::DEFAULT_KEY.to_string());
                    registry.register(Box::new(BarCounter::new(
                        cfg.name.clone(),
                        cfg.symbols.clone(),
                        key,
                        deps.store.clone(),
                    )));
                }
                other => {
                    return Err(ConfigError::UnknownType {
                        name: cfg.name.clone(),
                        strategy_type: other.to_string(),
                    })
                }
            }
        }

        Ok(registry)
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        info!(name = %strategy.name(), symbols = ?strategy.symbols(), "Registered strategy");
        self.strategies.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// State handles of every indicator monitor, for digest readers.
    pub fn state_books(&self) -> Vec<(String, SharedStateBook)> {
        self.books.clone()
    }

    /// Every distinct symbol any strategy subscribes to, in first-seen order.
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for symbol in self.strategies.iter().flat_map(|s| s.symbols()) {
            if !out.contains(symbol) {
                out.push(symbol.clone());
            }
        }
        out
    }

    /// `(strategy index, period)` for every strategy that wants a timer.
    pub fn timer_intervals(&self) -> Vec<(usize, Duration)> {
        self.strategies
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.timer_interval().map(|d| (i, d)))
            .filter(|(i, d)| {
                if d.is_zero() {
                    warn!(name = %self.strategies[*i].name(), "Ignoring zero timer interval");
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    pub async fn start_all(&mut self) {
        for s in &mut self.strategies {
            s.on_start().await;
        }
    }

    /// Deliver one bar event to every strategy subscribed to any of its symbols.
    pub async fn dispatch(&mut self, bars: &Bars) {
        for s in &mut self.strategies {
            if bars.symbols().any(|sym| s.symbols().iter().any(|t| t == sym)) {
                s.on_bars(bars).await;
            }
        }
    }

    pub async fn idle_all(&mut self) {
        for s in &mut self.strategies {
            s.on_idle().await;
        }
    }

    pub async fn fire_timer(&mut self, index: usize) {
        match self.strategies.get_mut(index) {
            Some(s) => s.on_timer().await,
            None => warn!(index, "Timer fired for unknown strategy"),
        }
    }

    pub async fn finish_all(&mut self) {
        for s in &mut self.strategies {
            s.on_finish().await;
        }
    }
}

fn build_monitor(cfg: &StrategyConfig, deps: &StrategyDeps) -> Result<IndicatorMonitor, ConfigError> {
    let settings = cfg.monitor_settings()?;
    Ok(IndicatorMonitor::new(
        cfg.name.clone(),
        cfg.symbols.clone(),
        settings,
        SeriesFetcher::new(deps.feed.clone()),
        deps.alerter.clone(),
    ))
}
