use async_trait::async_trait;

use super::{EmailChannel, TextChannel};

/// Dev-mode channels: log the outbound message and report success.
pub struct LogTextChannel;

#[async_trait]
impl TextChannel for LogTextChannel {
    async fn send_text(&self, to: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, body = %body, "text (log provider)");
        Ok(())
    }
}

pub struct LogEmailChannel;

#[async_trait]
impl EmailChannel for LogEmailChannel {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, subject = %subject, body = %body, "email (log provider)");
        Ok(())
    }
}
