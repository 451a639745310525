use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::activity::ActivityLog;
use crate::services::host::PeriodicHost;
use crate::services::messaging::{EmailChannel, TextChannel};
use crate::services::notifications::AlertHost;
use crate::services::run::RunGuard;
use crate::services::store::AppointmentStore;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub store: Arc<dyn AppointmentStore>,
    pub text: Box<dyn TextChannel>,
    pub email: Box<dyn EmailChannel>,
    pub alerts: Box<dyn AlertHost>,
    pub alerts_granted: bool,
    pub activity: ActivityLog,
    pub host: PeriodicHost,
    pub run_guard: RunGuard,
}
