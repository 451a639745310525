pub mod log;
pub mod mailgun;
pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait TextChannel: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}
