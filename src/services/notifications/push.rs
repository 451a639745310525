use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::AlertHost;

/// Alert host backed by an HTTP push gateway. The gateway owns delivery;
/// this side only registers and clears timed alerts.
pub struct PushAlertHost {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl PushAlertHost {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertHost for PushAlertHost {
    async fn request_permission(&self) -> bool {
        if self.base_url.is_empty() {
            return false;
        }

        let url = format!("{}/status", self.base_url);
        match self.client.get(&url).bearer_auth(&self.token).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "alert gateway refused status probe");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "alert gateway unreachable");
                false
            }
        }
    }

    async fn cancel_all(&self) -> anyhow::Result<()> {
        let url = format!("{}/alerts", self.base_url);
        self.client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("failed to clear alerts on gateway")?
            .error_for_status()
            .context("alert gateway rejected cancel-all")?;
        Ok(())
    }

    async fn schedule(
        &self,
        trigger_at: &NaiveDateTime,
        title: &str,
        body: &str,
        correlation_id: &str,
    ) -> anyhow::Result<()> {
        let url = format!("{}/alerts", self.base_url);
        self.client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "trigger_at": trigger_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                "title": title,
                "body": body,
                "correlation_id": correlation_id,
            }))
            .send()
            .await
            .context("failed to register alert with gateway")?
            .error_for_status()
            .context("alert gateway rejected alert")?;
        Ok(())
    }
}
