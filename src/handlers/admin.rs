use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::ActivityEvent;
use crate::services::host::HostStatus;
use crate::services::run::{self, RunOutcome, RunSummary, TriggerResult};
use crate::state::AppState;

use super::check_auth;

// GET /api/admin/status
#[derive(Serialize)]
pub struct StatusResponse {
    run_in_progress: bool,
    periodic_host: HostStatus,
    alerts_granted: bool,
    upcoming_appointments: i64,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = chrono::Local::now().naive_local();
    let upcoming_appointments = {
        let db = state.db.lock().unwrap();
        queries::count_upcoming(&db, &now)?
    };

    Ok(Json(StatusResponse {
        run_in_progress: state.run_guard.is_busy(),
        periodic_host: state.host.status(),
        alerts_granted: state.alerts_granted,
        upcoming_appointments,
    }))
}

// POST /api/admin/reminders/run
#[derive(Serialize)]
pub struct RunResponse {
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<RunSummary>,
}

pub async fn trigger_reminder_run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RunResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let response = match run::trigger_run(&state).await {
        TriggerResult::Busy => RunResponse {
            outcome: "busy",
            summary: None,
        },
        TriggerResult::Completed(RunOutcome::NewData(summary)) => RunResponse {
            outcome: "new-data",
            summary: Some(summary),
        },
        TriggerResult::Completed(RunOutcome::NoData) => RunResponse {
            outcome: "no-data",
            summary: Some(RunSummary::default()),
        },
        TriggerResult::Completed(RunOutcome::Failed) => RunResponse {
            outcome: "failed",
            summary: None,
        },
    };

    Ok(Json(response))
}

// GET /api/admin/activity
#[derive(Deserialize)]
pub struct ActivityQuery {
    pub day: Option<String>,
}

pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEvent>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let day = match query.day {
        Some(day) => {
            NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .map_err(|_| AppError::Invalid(format!("invalid day: {day}")))?;
            day
        }
        None => chrono::Local::now().format("%Y-%m-%d").to_string(),
    };

    let events = {
        let db = state.db.lock().unwrap();
        queries::list_activity_for_day(&db, &day)?
    };

    Ok(Json(events))
}

// GET /api/admin/activity/events — SSE stream
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
    pub last_id: Option<i64>,
}

pub async fn activity_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, Response> {
    // Auth via query param (EventSource can't set headers)
    let token = query.token.as_deref().unwrap_or("");
    if token != state.config.admin_token {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response());
    }

    let last_id = query.last_id.unwrap_or(0);

    // Catch up on missed lines from DB
    let catchup_events = {
        let db = state.db.lock().unwrap();
        queries::get_activity_since(&db, last_id).unwrap_or_default()
    };

    let rx = state.activity.subscribe();

    let catchup_stream = tokio_stream::iter(catchup_events.into_iter().map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, Infallible>(Event::default().data(data).event("activity"))
    }));

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("activity")))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let combined = catchup_stream.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}
