use std::sync::Arc;

use chrono::Utc;
use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tokio::sync::RwLock;
use tracing::{info, warn};

use common::EngineState;
use strategy::digest::{self, DigestReport};
use strategy::{Phase, SharedStateBook};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub engine_state: Arc<RwLock<EngineState>>,
    /// State of every indicator monitor, by strategy name.
    pub books: Arc<Vec<(String, SharedStateBook)>>,
    pub allowed_chat_ids: Arc<Vec<i64>>,
}

/// Telegram bot commands exposed to the operator.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "barwatch commands:")]
pub enum Command {
    #[command(description = "Show this help")]
    Help,
    #[command(description = "Show engine state and per-symbol readiness")]
    Status,
    #[command(description = "Send the current indicator digest")]
    Digest,
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(token: String, deps: BotDeps) {
    let bot = Bot::new(token);
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(handle_help))
        .branch(case![Command::Status].endpoint(handle_status))
        .branch(case![Command::Digest].endpoint(handle_digest));

    Update::filter_message()
        .filter_map(|msg: Message| Some(msg.chat.id))
        .filter_async(auth_filter)
        .branch(command_handler)
}

/// Silently drop messages from chats not in the allowed list.
async fn auth_filter(chat_id: ChatId, deps: Arc<BotDeps>) -> bool {
    let allowed = deps.allowed_chat_ids.contains(&chat_id.0);
    if !allowed {
        warn!(chat_id = chat_id.0, "Unauthorized Telegram access attempt");
    }
    allowed
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn handle_status(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    let mut phases = Vec::new();
    for (name, book) in deps.books.iter() {
        let book = book.read().await;
        let symbols: Vec<(String, Phase)> = book
            .symbols()
            .map(|s| (s.to_string(), book.phase(s)))
            .collect();
        phases.push((name.clone(), symbols));
    }
    bot.send_message(msg.chat.id, status_text(state, &phases))
        .await?;
    Ok(())
}

async fn handle_digest(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let now = Utc::now();
    let mut reports = Vec::new();
    for (name, book) in deps.books.iter() {
        reports.push((name.clone(), digest::render(&*book.read().await, now)));
    }
    for text in digest_texts(&reports) {
        bot.send_message(msg.chat.id, text).await?;
    }
    Ok(())
}

fn status_text(state: EngineState, phases: &[(String, Vec<(String, Phase)>)]) -> String {
    let mut text = format!("barwatch status\nEngine: {state}");
    for (name, symbols) in phases {
        text.push_str(&format!("\n\n{name}"));
        if symbols.is_empty() {
            text.push_str("\n  no data yet");
        }
        for (symbol, phase) in symbols {
            text.push_str(&format!("\n  {symbol}: {phase}"));
        }
    }
    text
}

/// One message per monitor with data, or a single notice when none has any.
fn digest_texts(reports: &[(String, DigestReport)]) -> Vec<String> {
    let texts: Vec<String> = reports
        .iter()
        .filter_map(|(name, report)| match report {
            DigestReport::Ready { title, body } => Some(format!("{title} ({name})\n{body}")),
            DigestReport::NoData => None,
        })
        .collect();
    if texts.is_empty() {
        vec!["No symbol has enough history yet.".to_string()]
    } else {
        texts
    }
}
