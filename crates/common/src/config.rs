use std::time::Duration;

/// All process configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Key-value store
    pub database_url: String,

    // Strategy config file path
    pub strategy_config_path: String,

    // Host engine
    pub idle_interval: Duration,

    // Market data endpoints
    pub binance_rest_url: String,
    pub binance_ws_url: String,

    // Telegram (optional; alerts fall back to the log when unset)
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_ids: Vec<i64>,
}

impl Config {
    pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 1_000;

    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let telegram = match (optional_env("TELEGRAM_TOKEN"), optional_env("TELEGRAM_CHAT_IDS")) {
            (Some(token), Some(ids)) => Some(TelegramConfig {
                token,
                chat_ids: parse_chat_ids(&ids),
            }),
            (Some(_), None) => panic!(
                "TELEGRAM_TOKEN is set but TELEGRAM_CHAT_IDS is not. Check your .env file."
            ),
            _ => None,
        };

        Config {
            database_url: required_env("DATABASE_URL"),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            idle_interval: Duration::from_millis(
                optional_env("IDLE_INTERVAL_MS")
                    .and_then(|v| v.parse().ok())
                    .filter(|&ms: &u64| ms > 0)
                    .unwrap_or(Self::DEFAULT_IDLE_INTERVAL_MS),
            ),
            binance_rest_url: optional_env("BINANCE_REST_URL")
                .unwrap_or_else(|| "https://api.binance.com".to_string()),
            binance_ws_url: optional_env("BINANCE_WS_URL")
                .unwrap_or_else(|| "wss://stream.binance.com:9443/ws".to_string()),
            telegram,
        }
    }
}

/// Parse a comma-separated list of numeric Telegram chat IDs.
/// Panics on a non-numeric entry.
pub fn parse_chat_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().unwrap_or_else(|_| {
                panic!("TELEGRAM_CHAT_IDS contains non-numeric ID: '{s}'")
            })
        })
        .collect()
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

/// Unset and empty variables are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
