use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::warn;

use common::{Alerter, Error, Result};

/// Delivers alerts as Telegram messages to every configured chat.
#[derive(Clone)]
pub struct TelegramAlerter {
    bot: Bot,
    chat_ids: Vec<ChatId>,
}

impl TelegramAlerter {
    pub fn new(token: impl Into<String>, chat_ids: &[i64]) -> Self {
        Self {
            bot: Bot::new(token),
            chat_ids: chat_ids.iter().map(|&id| ChatId(id)).collect(),
        }
    }
}

#[async_trait]
impl Alerter for TelegramAlerter {
    async fn alert(&self, title: &str, message: &str) -> Result<()> {
        let text = compose(title, message);
        let mut failed = 0;
        for &chat_id in &self.chat_ids {
            if let Err(e) = self.bot.send_message(chat_id, text.as_str()).await {
                warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram alert");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(Error::Alert(format!(
                "{failed} of {} chats unreachable",
                self.chat_ids.len()
            )));
        }
        Ok(())
    }
}

fn compose(title: &str, message: &str) -> String {
    format!("{title}\n\n{message}")
}
