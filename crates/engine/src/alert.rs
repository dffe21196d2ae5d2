use async_trait::async_trait;
use tracing::info;

use common::{Alerter, Result};

/// Alert channel that only writes to the log. Used when no Telegram
/// credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn alert(&self, title: &str, message: &str) -> Result<()> {
        info!(title, "ALERT\n{message}");
        Ok(())
    }
}
