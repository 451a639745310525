use crate::services::notifications::AlertHost;
use crate::services::reminder_plan::PlanEntry;

/// Replace the host's entire alert set with the given plan entries.
///
/// This is a wholesale resync, not a diff: cancel everything, then register
/// the desired set recomputed from the current appointment snapshot. A
/// registration that fails is logged and skipped; the rest still go in.
/// Returns how many alerts were actually registered.
pub async fn replace_all(host: &dyn AlertHost, entries: &[PlanEntry]) -> usize {
    if let Err(e) = host.cancel_all().await {
        tracing::warn!(error = %e, "failed to clear existing alerts, continuing with registration");
    }

    let mut registered = 0;
    for entry in entries {
        match host
            .schedule(&entry.trigger_at, &entry.title, &entry.body, &entry.appointment_id)
            .await
        {
            Ok(()) => registered += 1,
            Err(e) => {
                tracing::warn!(
                    appointment_id = %entry.appointment_id,
                    trigger_at = %entry.trigger_at,
                    error = %e,
                    "failed to register alert"
                );
            }
        }
    }

    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::reminder_plan::MessageKind;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use std::sync::Mutex;

    struct RecordingHost {
        scheduled: Mutex<Vec<String>>,
        cancel_calls: Mutex<usize>,
        fail_on: Option<String>,
    }

    impl RecordingHost {
        fn new(fail_on: Option<&str>) -> Self {
            Self {
                scheduled: Mutex::new(vec![]),
                cancel_calls: Mutex::new(0),
                fail_on: fail_on.map(|s| s.to_string()),
            }
        }
    }

    #[async_trait]
    impl AlertHost for RecordingHost {
        async fn request_permission(&self) -> bool {
            true
        }

        async fn cancel_all(&self) -> anyhow::Result<()> {
            *self.cancel_calls.lock().unwrap() += 1;
            Ok(())
        }

        async fn schedule(
            &self,
            _trigger_at: &NaiveDateTime,
            _title: &str,
            _body: &str,
            correlation_id: &str,
        ) -> anyhow::Result<()> {
            if self.fail_on.as_deref() == Some(correlation_id) {
                anyhow::bail!("gateway rejected alert");
            }
            self.scheduled.lock().unwrap().push(correlation_id.to_string());
            Ok(())
        }
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn entry(id: &str) -> PlanEntry {
        PlanEntry {
            appointment_id: id.to_string(),
            trigger_at: dt("2025-06-17 09:00"),
            kind: MessageKind::DayBefore,
            title: "Appointment tomorrow".to_string(),
            body: "Scheduled for Wed Jun 18 at 10:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cancels_then_registers_everything() {
        let host = RecordingHost::new(None);
        let entries = vec![entry("a"), entry("b")];

        let registered = replace_all(&host, &entries).await;

        assert_eq!(registered, 2);
        assert_eq!(*host.cancel_calls.lock().unwrap(), 1);
        assert_eq!(*host.scheduled.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_one_failed_registration_does_not_block_the_rest() {
        let host = RecordingHost::new(Some("b"));
        let entries = vec![entry("a"), entry("b"), entry("c")];

        let registered = replace_all(&host, &entries).await;

        assert_eq!(registered, 2);
        assert_eq!(*host.scheduled.lock().unwrap(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_empty_plan_still_clears() {
        let host = RecordingHost::new(None);

        let registered = replace_all(&host, &[]).await;

        assert_eq!(registered, 0);
        assert_eq!(*host.cancel_calls.lock().unwrap(), 1);
    }
}
