use chrono::{Duration, NaiveDateTime};

use crate::models::Appointment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    DayBefore,
    TwoHoursBefore,
}

/// One operator alert to register with the host facility. Carries the
/// appointment id so a later refresh can correlate and cancel it.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub appointment_id: String,
    pub trigger_at: NaiveDateTime,
    pub kind: MessageKind,
    pub title: String,
    pub body: String,
}

/// Compute the alert triggers for one appointment, relative to `now`.
///
/// Appointments happening today or tomorrow get no day-before alert (the
/// 09:00 slot would be stale or gone); every appointment gets a two-hours-
/// before alert while that moment is still ahead. Canceled and no-show
/// appointments are filtered out before this is called.
pub fn build_plan(appointment: &Appointment, now: &NaiveDateTime) -> Vec<PlanEntry> {
    let mut entries = Vec::new();

    let appointment_date = appointment.scheduled_at.date();
    let today = now.date();
    let tomorrow = today + Duration::days(1);

    if appointment_date != today && appointment_date != tomorrow {
        let trigger_at = (appointment_date - Duration::days(1))
            .and_hms_opt(9, 0, 0)
            .unwrap_or(appointment.scheduled_at);
        if trigger_at > *now {
            entries.push(entry(appointment, trigger_at, MessageKind::DayBefore));
        }
    }

    let two_hours_before = appointment.scheduled_at - Duration::hours(2);
    if two_hours_before > *now {
        entries.push(entry(appointment, two_hours_before, MessageKind::TwoHoursBefore));
    }

    entries
}

fn entry(appointment: &Appointment, trigger_at: NaiveDateTime, kind: MessageKind) -> PlanEntry {
    let title = match kind {
        MessageKind::DayBefore => "Appointment tomorrow".to_string(),
        MessageKind::TwoHoursBefore => "Appointment in 2 hours".to_string(),
    };

    let mut body = format!(
        "Scheduled for {}",
        appointment.scheduled_at.format("%a %b %d at %H:%M")
    );
    if appointment.home_visit {
        if let Some(location) = appointment.location.as_deref() {
            body.push_str(&format!(" (home visit: {location})"));
        } else {
            body.push_str(" (home visit)");
        }
    }

    PlanEntry {
        appointment_id: appointment.id.clone(),
        trigger_at,
        kind,
        title,
        body,
    }
}
