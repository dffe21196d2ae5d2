use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::Frequency;

use crate::indicators::{AtrSmoothing, Indicator, IndicatorError, IndicatorSet};
use crate::monitor::MonitorSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read strategy config at '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse strategy config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("strategy '{name}': unknown type '{strategy_type}'")]
    UnknownType { name: String, strategy_type: String },

    #[error("strategy '{name}': invalid param '{key}': {reason}")]
    InvalidParam {
        name: String,
        key: String,
        reason: String,
    },

    #[error("strategy '{name}': {source}")]
    Indicator {
        name: String,
        #[source]
        source: IndicatorError,
    },
}

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "indicator_monitor"
/// name = "BTC daily"
/// symbols = ["BTCUSDT"]
///
/// [strategy.params]
/// frequency = "1d"
/// window = 64
/// indicators = ["sma10", "sma20", "atr14"]
/// atr_smoothing = "wilder"
/// alert_threshold = 5.5
/// digest_interval_secs = 10800
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier: "indicator_monitor" or "bar_counter".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Human-readable name shown in logs and alerts.
    pub name: String,
    /// Symbols to subscribe to, e.g. ["BTCUSDT"].
    pub symbols: Vec<String>,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl StrategyFileConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Every distinct symbol across all strategies, in first-seen order.
    pub fn symbols(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.strategies
            .iter()
            .flat_map(|s| s.symbols.iter())
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }

    /// Distinct `(symbol, frequency)` pairs the host must stream bars for.
    pub fn subscriptions(&self) -> Result<Vec<(String, Frequency)>, ConfigError> {
        let mut out: Vec<(String, Frequency)> = Vec::new();
        for cfg in &self.strategies {
            let frequency = cfg.frequency()?;
            for symbol in &cfg.symbols {
                let pair = (symbol.clone(), frequency);
                if !out.contains(&pair) {
                    out.push(pair);
                }
            }
        }
        Ok(out)
    }
}

impl StrategyConfig {
    /// Bar frequency from the `frequency` param; daily when absent.
    pub fn frequency(&self) -> Result<Frequency, ConfigError> {
        match self.param_str("frequency")? {
            Some(raw) => raw
                .parse::<Frequency>()
                .map_err(|reason| self.invalid("frequency", reason)),
            None => Ok(MonitorSettings::default().frequency),
        }
    }

    /// Build monitor settings from `params`, falling back to the defaults of
    /// `MonitorSettings` for anything absent.
    pub fn monitor_settings(&self) -> Result<MonitorSettings, ConfigError> {
        let defaults = MonitorSettings::default();

        let frequency = self.frequency()?;

        let smoothing = match self.param_str("atr_smoothing")? {
            Some(raw) => raw
                .parse::<AtrSmoothing>()
                .map_err(|reason| self.invalid("atr_smoothing", reason))?,
            None => defaults.indicators.smoothing(),
        };

        let indicators = match self.param_str_list("indicators")? {
            Some(names) => names
                .iter()
                .map(|n| n.parse::<Indicator>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| self.indicator_error(source))?,
            None => defaults.indicators.indicators().to_vec(),
        };
        let indicators =
            IndicatorSet::new(indicators, smoothing).map_err(|source| self.indicator_error(source))?;

        let window = self.param_usize("window")?.unwrap_or(defaults.window);
        if window < indicators.min_bars() {
            return Err(self.invalid(
                "window",
                format!(
                    "{window} bars can never satisfy the indicator set (needs {})",
                    indicators.min_bars()
                ),
            ));
        }

        let alert_threshold = self
            .param_f64("alert_threshold")?
            .unwrap_or(defaults.alert_threshold);
        if !alert_threshold.is_finite() || alert_threshold < 0.0 {
            return Err(self.invalid("alert_threshold", "must be a non-negative number"));
        }

        Ok(MonitorSettings {
            frequency,
            window,
            indicators,
            alert_threshold,
            digest_interval: self
                .param_secs("digest_interval_secs")?
                .unwrap_or(defaults.digest_interval),
            log_cooldown: self
                .param_secs("log_cooldown_secs")?
                .unwrap_or(defaults.log_cooldown),
        })
    }

    pub fn param_str(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {}", other.type_str()))),
        }
    }

    pub fn param_f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::Float(f)) => Ok(Some(*f)),
            Some(toml::Value::Integer(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(self.invalid(key, format!("expected a number, got {}", other.type_str()))),
        }
    }

    pub fn param_usize(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(i)) if *i > 0 => Ok(Some(*i as usize)),
            Some(other) => Err(self.invalid(key, format!("expected a positive integer, got {other}"))),
        }
    }

    fn param_secs(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.param_usize(key)?.map(|s| Duration::from_secs(s as u64)))
    }

    fn param_str_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(key, format!("expected strings, got {v}")))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(self.invalid(key, format!("expected an array, got {}", other.type_str()))),
        }
    }

    fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidParam {
            name: self.name.clone(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    fn indicator_error(&self, source: IndicatorError) -> ConfigError {
        ConfigError::Indicator {
            name: self.name.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[strategy]]
        type = "indicator_monitor"
        name = "gold"
        symbols = ["XAUUSD", "XAGUSD"]

        [strategy.params]
        frequency = "4h"
        window = 40
        indicators = ["sma10", "atr14"]
        atr_smoothing = "simple"
        alert_threshold = 4.5
        digest_interval_secs = 14400

        [[strategy]]
        type = "bar_counter"
        name = "count"
        symbols = ["XAUUSD"]
    "#;

    #[test]
    fn parses_sample_file() {
        let file = StrategyFileConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(file.strategies.len(), 2);
        assert_eq!(file.symbols(), vec!["XAUUSD".to_string(), "XAGUSD".to_string()]);

        let settings = file.strategies[0].monitor_settings().unwrap();
        assert_eq!(settings.frequency, Frequency::Hour4);
        assert_eq!(settings.window, 40);
        assert_eq!(
            settings.indicators.indicators(),
            &[Indicator::Sma(10), Indicator::Atr(14)]
        );
        assert_eq!(settings.indicators.smoothing(), AtrSmoothing::Simple);
        assert_eq!(settings.alert_threshold, 4.5);
        assert_eq!(settings.digest_interval, Duration::from_secs(14_400));
        assert_eq!(settings.log_cooldown, Duration::from_secs(10_800));
    }

    #[test]
    fn subscriptions_pair_symbols_with_their_frequency() {
        let file = StrategyFileConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            file.subscriptions().unwrap(),
            vec![
                ("XAUUSD".to_string(), Frequency::Hour4),
                ("XAGUSD".to_string(), Frequency::Hour4),
                ("XAUUSD".to_string(), Frequency::Day),
            ]
        );
    }

    #[test]
    fn missing_params_fall_back_to_defaults() {
        let file = StrategyFileConfig::from_toml_str(
            r#"
            [[strategy]]
            type = "indicator_monitor"
            name = "plain"
            symbols = ["BTCUSDT"]
            "#,
        )
        .unwrap();
        let settings = file.strategies[0].monitor_settings().unwrap();
        assert_eq!(settings.window, 64);
        assert_eq!(settings.alert_threshold, 5.5);
        assert_eq!(settings.indicators.smoothing(), AtrSmoothing::Wilder);
    }

    #[test]
    fn integer_threshold_is_accepted() {
        let file = StrategyFileConfig::from_toml_str(
            r#"
            [[strategy]]
            type = "indicator_monitor"
            name = "int"
            symbols = ["BTCUSDT"]
            [strategy.params]
            alert_threshold = 5
            "#,
        )
        .unwrap();
        assert_eq!(file.strategies[0].monitor_settings().unwrap().alert_threshold, 5.0);
    }

    #[test]
    fn window_too_short_for_indicators_is_rejected() {
        let file = StrategyFileConfig::from_toml_str(
            r#"
            [[strategy]]
            type = "indicator_monitor"
            name = "short"
            symbols = ["BTCUSDT"]
            [strategy.params]
            window = 20
            indicators = ["sma20"]
            "#,
        )
        .unwrap();
        let err = file.strategies[0].monitor_settings().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParam { ref key, .. } if key == "window"));
    }

    #[test]
    fn bad_indicator_name_is_reported() {
        let file = StrategyFileConfig::from_toml_str(
            r#"
            [[strategy]]
            type = "indicator_monitor"
            name = "bad"
            symbols = ["BTCUSDT"]
            [strategy.params]
            indicators = ["rsi14"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            file.strategies[0].monitor_settings(),
            Err(ConfigError::Indicator { .. })
        ));
    }

    #[test]
    fn wrongly_typed_param_is_reported() {
        let file = StrategyFileConfig::from_toml_str(
            r#"
            [[strategy]]
            type = "indicator_monitor"
            name = "typed"
            symbols = ["BTCUSDT"]
            [strategy.params]
            frequency = 1
            "#,
        )
        .unwrap();
        let err = file.strategies[0].monitor_settings().unwrap_err();
        assert!(err.to_string().contains("frequency"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            StrategyFileConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
