use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Appointment, AppointmentStatus, Client};

/// The slice of the record store the reminder job depends on. The job never
/// talks to the database directly; production binds this to SQLite, tests
/// bind an in-memory fake.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn list_upcoming(&self, now: &NaiveDateTime) -> anyhow::Result<Vec<Appointment>>;

    async fn list_overdue_scheduled(
        &self,
        now: &NaiveDateTime,
    ) -> anyhow::Result<Vec<Appointment>>;

    async fn get_client(&self, client_id: &str) -> anyhow::Result<Option<Client>>;

    async fn set_reminder_sent(&self, appointment_id: &str) -> anyhow::Result<()>;

    async fn set_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AppointmentStore for SqliteStore {
    async fn list_upcoming(&self, now: &NaiveDateTime) -> anyhow::Result<Vec<Appointment>> {
        let db = self.db.lock().unwrap();
        queries::list_upcoming(&db, now)
    }

    async fn list_overdue_scheduled(
        &self,
        now: &NaiveDateTime,
    ) -> anyhow::Result<Vec<Appointment>> {
        let db = self.db.lock().unwrap();
        queries::list_overdue_scheduled(&db, now)
    }

    async fn get_client(&self, client_id: &str) -> anyhow::Result<Option<Client>> {
        let db = self.db.lock().unwrap();
        queries::get_client(&db, client_id)
    }

    async fn set_reminder_sent(&self, appointment_id: &str) -> anyhow::Result<()> {
        let db = self.db.lock().unwrap();
        queries::set_reminder_sent(&db, appointment_id)?;
        Ok(())
    }

    async fn set_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> anyhow::Result<()> {
        let db = self.db.lock().unwrap();
        queries::update_appointment_status(&db, appointment_id, &status)?;
        Ok(())
    }
}
