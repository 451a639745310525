pub mod log;
pub mod push;

use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Host facility for operator-facing local alerts. Alerts are registered
/// with a trigger time and a correlation id (the appointment id) so a
/// later refresh can replace the whole set.
#[async_trait]
pub trait AlertHost: Send + Sync {
    /// Asked once at startup; when this returns false the reminder run
    /// skips alert scheduling entirely.
    async fn request_permission(&self) -> bool;

    async fn cancel_all(&self) -> anyhow::Result<()>;

    async fn schedule(
        &self,
        trigger_at: &NaiveDateTime,
        title: &str,
        body: &str,
        correlation_id: &str,
    ) -> anyhow::Result<()>;
}
