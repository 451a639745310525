use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::models::AppointmentStatus;
use crate::services::activity::ActivitySink;
use crate::services::alerts;
use crate::services::dispatch;
use crate::services::messaging::{EmailChannel, TextChannel};
use crate::services::notifications::AlertHost;
use crate::services::reminder_plan;
use crate::services::store::AppointmentStore;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub alerts_scheduled: usize,
    pub reminders_sent: usize,
    pub overdue_resolved: usize,
}

/// Tri-state result the periodic host sees for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    NewData(RunSummary),
    NoData,
    Failed,
}

/// What a manual trigger gets back: either the run happened, or another
/// run already held the guard and this trigger was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResult {
    Busy,
    Completed(RunOutcome),
}

/// Process-local single-flight guard. The permit clears the flag on drop,
/// so every exit path (return, error, panic unwind) releases it.
pub struct RunGuard(AtomicBool);

impl RunGuard {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| RunPermit(&self.0))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for RunGuard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RunPermit<'a>(&'a AtomicBool);

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything one run needs, borrowed for its duration.
pub struct ReminderDeps<'a> {
    pub store: &'a dyn AppointmentStore,
    pub alerts: &'a dyn AlertHost,
    pub alerts_granted: bool,
    pub text: &'a dyn TextChannel,
    pub email: &'a dyn EmailChannel,
    pub activity: &'a dyn ActivitySink,
    pub business_name: &'a str,
}

/// One pass of the reminder job. Safe to invoke repeatedly: re-running
/// re-sends nothing (the persisted flag gates dispatch), re-transitions
/// nothing, and rebuilds the same alert set.
pub async fn run_once(deps: &ReminderDeps<'_>, now: &NaiveDateTime) -> RunOutcome {
    match run_steps(deps, now).await {
        Ok(summary) => {
            tracing::info!(
                alerts_scheduled = summary.alerts_scheduled,
                reminders_sent = summary.reminders_sent,
                overdue_resolved = summary.overdue_resolved,
                "reminder run complete"
            );
            if summary.alerts_scheduled > 0
                || summary.reminders_sent > 0
                || summary.overdue_resolved > 0
            {
                RunOutcome::NewData(summary)
            } else {
                RunOutcome::NoData
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "reminder run failed");
            RunOutcome::Failed
        }
    }
}

async fn run_steps(deps: &ReminderDeps<'_>, now: &NaiveDateTime) -> anyhow::Result<RunSummary> {
    let mut summary = RunSummary::default();

    // Snapshot of everything still ahead of us
    let upcoming = deps
        .store
        .list_upcoming(now)
        .await
        .context("fetching upcoming appointments")?;

    // Rebuild the full alert set from the snapshot. Replace, not diff:
    // a second run lands on the exact same set.
    if deps.alerts_granted {
        let entries: Vec<_> = upcoming
            .iter()
            .flat_map(|a| reminder_plan::build_plan(a, now))
            .collect();
        summary.alerts_scheduled = alerts::replace_all(deps.alerts, &entries).await;
    }

    // Client-facing reminders go out the day before, once per appointment.
    let tomorrow = now.date() + Duration::days(1);
    for appointment in upcoming.iter().filter(|a| {
        a.scheduled_at.date() == tomorrow
            && a.status != AppointmentStatus::Canceled
            && !a.reminder_sent
    }) {
        let client = match deps.store.get_client(&appointment.client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                tracing::warn!(
                    appointment_id = %appointment.id,
                    client_id = %appointment.client_id,
                    "client not found, skipping reminder"
                );
                continue;
            }
            Err(e) => {
                tracing::error!(
                    appointment_id = %appointment.id,
                    error = %e,
                    "client lookup failed, skipping reminder"
                );
                continue;
            }
        };

        let report = dispatch::dispatch(
            deps.text,
            deps.email,
            appointment,
            &client,
            deps.business_name,
        )
        .await;

        if report.sent() {
            if let Err(e) = deps.store.set_reminder_sent(&appointment.id).await {
                // The send went out but the flag didn't stick; a later run
                // will retry the send. Accepted over silently dropping it.
                tracing::error!(
                    appointment_id = %appointment.id,
                    error = %e,
                    "failed to persist reminder flag"
                );
                continue;
            }
            summary.reminders_sent += 1;

            if report.text == Some(true) {
                if let Some(phone) = client.phone.as_deref() {
                    deps.activity.append(
                        now,
                        &format!(
                            "reminder text sent to {phone} for appointment {}",
                            appointment.id
                        ),
                    );
                }
            }
            if report.email == Some(true) {
                if let Some(address) = client.email.as_deref() {
                    deps.activity.append(
                        now,
                        &format!(
                            "reminder email sent to {address} for appointment {}",
                            appointment.id
                        ),
                    );
                }
            }
        } else {
            tracing::warn!(
                appointment_id = %appointment.id,
                client_id = %client.id,
                "reminder not delivered on any channel, will retry next run"
            );
        }
    }

    // Bookings whose start time passed while still marked `scheduled`
    let overdue = deps
        .store
        .list_overdue_scheduled(now)
        .await
        .context("fetching overdue appointments")?;
    for appointment in overdue {
        match deps
            .store
            .set_status(&appointment.id, AppointmentStatus::NoShow)
            .await
        {
            Ok(()) => {
                summary.overdue_resolved += 1;
                tracing::info!(
                    appointment_id = %appointment.id,
                    scheduled_at = %appointment.scheduled_at,
                    "marked overdue appointment as no-show"
                );
            }
            Err(e) => {
                tracing::error!(
                    appointment_id = %appointment.id,
                    error = %e,
                    "failed to resolve overdue appointment"
                );
            }
        }
    }

    Ok(summary)
}

/// Entry point for both the manual trigger and the periodic host tick.
/// Guarded: a second caller while a run is in flight gets `Busy` and
/// causes no store or channel traffic.
pub async fn trigger_run(state: &Arc<AppState>) -> TriggerResult {
    let Some(_permit) = state.run_guard.try_acquire() else {
        tracing::debug!("reminder run already in progress, skipping trigger");
        return TriggerResult::Busy;
    };

    let now = chrono::Local::now().naive_local();
    let deps = ReminderDeps {
        store: state.store.as_ref(),
        alerts: state.alerts.as_ref(),
        alerts_granted: state.alerts_granted,
        text: state.text.as_ref(),
        email: state.email.as_ref(),
        activity: &state.activity,
        business_name: &state.config.business_name,
    };

    TriggerResult::Completed(run_once(&deps, &now).await)
}
