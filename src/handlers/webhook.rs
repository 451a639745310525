use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::services::activity::ActivitySink;
use crate::state::AppState;

/// Delivery-status callback from the text gateway. Purely diagnostic:
/// failures land in the activity log, nothing is retried from here.
#[derive(Deserialize)]
#[allow(dead_code)]
pub struct DeliveryStatusForm {
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
    #[serde(rename = "MessageStatus")]
    pub message_status: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "ErrorCode")]
    pub error_code: Option<String>,
}

fn validate_gateway_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &[(&str, &str)],
) -> bool {
    // Data to sign: URL + params concatenated in key order
    let mut data = url.to_string();
    let mut sorted_params = params.to_vec();
    sorted_params.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in &sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let result = mac.finalize().into_bytes();
    let expected = base64::engine::general_purpose::STANDARD.encode(result);

    expected == signature
}

pub async fn delivery_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<DeliveryStatusForm>,
) -> Response {
    // Validate gateway signature (skip if auth token is empty — dev mode)
    if !state.config.twilio_auth_token.is_empty() {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing X-Twilio-Signature header");
            return (StatusCode::FORBIDDEN, "Missing signature").into_response();
        }

        // Reconstruct webhook URL — use X-Forwarded-Proto/Host if behind proxy
        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("https");
        let host = headers
            .get("x-forwarded-host")
            .or_else(|| headers.get("host"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let url = format!("{proto}://{host}/webhook/delivery-status");

        let params = [
            ("MessageSid", form.message_sid.as_deref().unwrap_or("")),
            ("MessageStatus", form.message_status.as_str()),
            ("To", form.to.as_str()),
            ("ErrorCode", form.error_code.as_deref().unwrap_or("")),
        ];

        if !validate_gateway_signature(&state.config.twilio_auth_token, signature, &url, &params) {
            tracing::warn!("invalid gateway signature on delivery status");
            return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    match form.message_status.as_str() {
        "failed" | "undelivered" => {
            let now = chrono::Local::now().naive_local();
            let error_code = form.error_code.as_deref().unwrap_or("none");
            state.activity.append(
                &now,
                &format!(
                    "text to {} reported {} (error code {})",
                    form.to, form.message_status, error_code
                ),
            );
            tracing::warn!(
                to = %form.to,
                status = %form.message_status,
                error_code = %error_code,
                "text delivery failed"
            );
        }
        _ => {
            tracing::debug!(to = %form.to, status = %form.message_status, "text delivery status");
        }
    }

    StatusCode::OK.into_response()
}
