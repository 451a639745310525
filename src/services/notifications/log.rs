use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::AlertHost;

/// Dev-mode alert host: permission always granted, alerts only logged.
pub struct LogAlertHost;

#[async_trait]
impl AlertHost for LogAlertHost {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn cancel_all(&self) -> anyhow::Result<()> {
        tracing::debug!("cleared alerts (log provider)");
        Ok(())
    }

    async fn schedule(
        &self,
        trigger_at: &NaiveDateTime,
        title: &str,
        body: &str,
        correlation_id: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(
            trigger_at = %trigger_at,
            title = %title,
            body = %body,
            correlation_id = %correlation_id,
            "alert scheduled (log provider)"
        );
        Ok(())
    }
}
