use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::db::queries;
use crate::models::ActivityEvent;

/// Sink the reminder job writes its audit lines to. Appends must never
/// fail the job, so implementations swallow and log their own errors.
pub trait ActivitySink: Send + Sync {
    fn append(&self, now: &NaiveDateTime, line: &str);
}

/// Append-only audit trail, partitioned by calendar day, with a broadcast
/// feed for live SSE subscribers.
pub struct ActivityLog {
    db: Arc<Mutex<Connection>>,
    tx: broadcast::Sender<ActivityEvent>,
}

impl ActivityLog {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { db, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }
}

impl ActivitySink for ActivityLog {
    fn append(&self, now: &NaiveDateTime, line: &str) {
        let day = now.format("%Y-%m-%d").to_string();

        let event_id = {
            let db = self.db.lock().unwrap();
            queries::append_activity(&db, &day, line, now)
        };

        match event_id {
            Ok(id) => {
                let event = ActivityEvent {
                    id,
                    day,
                    line: line.to_string(),
                    created_at: now.format("%Y-%m-%d %H:%M:%S").to_string(),
                };
                // Broadcast to SSE subscribers; ignore if no receivers
                let _ = self.tx.send(event);
            }
            Err(e) => {
                tracing::error!(error = %e, line = %line, "failed to record activity");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_append_partitions_by_day_and_broadcasts() {
        let conn = db::init_db(":memory:").unwrap();
        let db = Arc::new(Mutex::new(conn));
        let log = ActivityLog::new(Arc::clone(&db));
        let mut rx = log.subscribe();

        log.append(&dt("2025-06-16 09:30"), "reminder text sent to +15551110000");
        log.append(&dt("2025-06-17 10:00"), "next day line");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.day, "2025-06-16");
        assert!(event.line.contains("+15551110000"));

        let stored = {
            let db = db.lock().unwrap();
            queries::list_activity_for_day(&db, "2025-06-16").unwrap()
        };
        assert_eq!(stored.len(), 1);
    }
}
