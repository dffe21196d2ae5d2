pub mod alerter;
pub mod commands;

pub use alerter::TelegramAlerter;
pub use commands::{start_bot, BotDeps};
