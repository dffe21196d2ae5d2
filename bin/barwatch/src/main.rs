use std::collections::HashSet;
use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Alerter, BarFeed, Config, EngineCommand, KvStore};
use engine::{BinanceFeed, BinanceStream, Engine, LogAlerter, SqliteKvStore};
use strategy::{StrategyDeps, StrategyFileConfig, StrategyRegistry};
use telegram_alert::{start_bot, BotDeps, TelegramAlerter};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(strategies = %cfg.strategy_config_path, "barwatch starting");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .unwrap_or_else(|e| panic!("Invalid strategy config: {e}"));
    let subscriptions = strategy_file
        .subscriptions()
        .unwrap_or_else(|e| panic!("Invalid strategy config: {e}"));

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePool::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    engine::kv::migrate(&db)
        .await
        .unwrap_or_else(|e| panic!("Database migration failed: {e}"));
    info!("Database ready");

    // ── Host collaborators ────────────────────────────────────────────────────
    let feed: Arc<dyn BarFeed> = Arc::new(
        BinanceFeed::new(&cfg.binance_rest_url)
            .unwrap_or_else(|e| panic!("Failed to build HTTP client: {e}")),
    );
    let alerter: Arc<dyn Alerter> = match &cfg.telegram {
        Some(tg) => {
            info!(chats = tg.chat_ids.len(), "Alerts go to Telegram");
            Arc::new(TelegramAlerter::new(tg.token.clone(), &tg.chat_ids))
        }
        None => {
            info!("TELEGRAM_TOKEN not set, alerts go to the log");
            Arc::new(LogAlerter)
        }
    };
    let store: Arc<dyn KvStore> = Arc::new(SqliteKvStore::new(db.clone()));

    // ── Strategies ────────────────────────────────────────────────────────────
    let deps = StrategyDeps { feed, alerter, store };
    let registry = StrategyRegistry::from_config(&strategy_file, &deps)
        .unwrap_or_else(|e| panic!("Invalid strategy config: {e}"));
    let books = registry.state_books();

    // ── Engine ────────────────────────────────────────────────────────────────
    let (engine, engine_handle) = Engine::new(registry, cfg.idle_interval);

    // ── Bar streams ───────────────────────────────────────────────────────────
    let mut streamed = HashSet::new();
    for (symbol, frequency) in subscriptions {
        if !streamed.insert(symbol.clone()) {
            // Bars carry no frequency, so a second stream would mix series.
            warn!(%symbol, %frequency, "Symbol already streamed at another frequency, skipping");
            continue;
        }
        let stream = BinanceStream::new(
            symbol,
            frequency,
            cfg.binance_ws_url.clone(),
            engine_handle.publisher(),
        );
        tokio::spawn(stream.run());
    }

    // ── Telegram commands ─────────────────────────────────────────────────────
    if let Some(tg) = &cfg.telegram {
        let bot_deps = BotDeps {
            engine_state: engine_handle.state_handle(),
            books: Arc::new(books),
            allowed_chat_ids: Arc::new(tg.chat_ids.clone()),
        };
        tokio::spawn(start_bot(tg.token.clone(), bot_deps));
    }

    // ── Run until Ctrl-C ──────────────────────────────────────────────────────
    let engine_task = tokio::spawn(engine.run());
    info!("All subsystems started. Waiting for shutdown signal.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    }
    info!("Shutdown signal received");
    engine_handle.send(EngineCommand::Shutdown).await;
    if let Err(e) = engine_task.await {
        warn!(error = %e, "Engine task ended abnormally");
    }
    db.close().await;
    info!("Exiting");
}
