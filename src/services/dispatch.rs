use crate::models::{Appointment, Client};
use crate::services::messaging::{EmailChannel, TextChannel};

/// Per-channel outcome of one dispatch attempt. `None` means the channel
/// was never tried (no contact on file).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub text: Option<bool>,
    pub email: Option<bool>,
}

impl DispatchReport {
    /// True when at least one channel got the reminder through.
    pub fn sent(&self) -> bool {
        self.text == Some(true) || self.email == Some(true)
    }
}

pub fn reminder_subject(business_name: &str) -> String {
    format!("Appointment reminder from {business_name}")
}

pub fn reminder_message(appointment: &Appointment, client: &Client, business_name: &str) -> String {
    let mut message = format!(
        "Hi {}, a reminder from {}: your appointment is tomorrow at {}.",
        client.name,
        business_name,
        appointment.scheduled_at.format("%H:%M"),
    );
    if appointment.home_visit {
        match appointment.location.as_deref() {
            Some(location) => message.push_str(&format!(" We'll come to you at {location}.")),
            None => message.push_str(" We'll come to you."),
        }
    }
    message
}

/// Try every channel the client has a contact for. Channel failures are
/// caught and logged here; one channel failing never stops the other. No
/// retry within a call — a failed send is picked up by a later run because
/// the caller leaves the reminder flag unset.
pub async fn dispatch(
    text: &dyn TextChannel,
    email: &dyn EmailChannel,
    appointment: &Appointment,
    client: &Client,
    business_name: &str,
) -> DispatchReport {
    let message = reminder_message(appointment, client, business_name);
    let mut report = DispatchReport::default();

    if let Some(phone) = client.phone.as_deref().filter(|p| !p.is_empty()) {
        match text.send_text(phone, &message).await {
            Ok(()) => report.text = Some(true),
            Err(e) => {
                report.text = Some(false);
                tracing::warn!(
                    appointment_id = %appointment.id,
                    error = %e,
                    "text reminder failed"
                );
            }
        }
    }

    if let Some(address) = client.email.as_deref().filter(|a| !a.is_empty()) {
        let subject = reminder_subject(business_name);
        match email.send_email(address, &subject, &message).await {
            Ok(()) => report.email = Some(true),
            Err(e) => {
                report.email = Some(false);
                tracing::warn!(
                    appointment_id = %appointment.id,
                    error = %e,
                    "email reminder failed"
                );
            }
        }
    }

    report
}
