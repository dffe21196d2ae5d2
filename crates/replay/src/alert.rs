use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use common::{Alerter, Error, Result};

/// Alerter that keeps every `(title, message)` it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingAlerter {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl RecordingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    /// An alerter that records nothing and reports every delivery as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn alerts(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn alert(&self, title: &str, message: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Alert("replay alerter configured to fail".into()));
        }
        debug!(title, "Recorded alert");
        self.sent
            .lock()
            .await
            .push((title.to_string(), message.to_string()));
        Ok(())
    }
}
