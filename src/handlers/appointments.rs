use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus};
use crate::services::availability;
use crate::state::AppState;

use super::check_auth;

fn parse_datetime(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .map_err(|_| AppError::Invalid(format!("invalid datetime: {s}")))
}

// POST /api/appointments
#[derive(Deserialize)]
pub struct CreateAppointmentRequest {
    pub client_id: String,
    pub vehicle_id: Option<String>,
    pub scheduled_at: String,
    pub duration_minutes: i32,
    pub home_visit: Option<bool>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let scheduled_at = parse_datetime(&body.scheduled_at)?;
    if body.duration_minutes <= 0 {
        return Err(AppError::Invalid("duration_minutes must be positive".to_string()));
    }

    let appointment = {
        // Availability check and insert under one lock so two bookings
        // can't both see the slot as free.
        let db = state.db.lock().unwrap();

        if queries::get_client(&db, &body.client_id)?.is_none() {
            return Err(AppError::NotFound(format!("client {}", body.client_id)));
        }

        if let Some(vehicle_id) = body.vehicle_id.as_deref() {
            let vehicle = queries::get_vehicle(&db, vehicle_id)?
                .ok_or_else(|| AppError::NotFound(format!("vehicle {vehicle_id}")))?;
            if vehicle.client_id != body.client_id {
                return Err(AppError::Invalid(
                    "vehicle belongs to a different client".to_string(),
                ));
            }
        }

        if !availability::is_available(&db, &scheduled_at, body.duration_minutes, None)? {
            return Err(AppError::Conflict("time slot is already booked".to_string()));
        }

        let now = Utc::now().naive_utc();
        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            client_id: body.client_id,
            vehicle_id: body.vehicle_id,
            scheduled_at,
            duration_minutes: body.duration_minutes,
            status: AppointmentStatus::Scheduled,
            home_visit: body.home_visit.unwrap_or(false),
            location: body.location,
            notes: body.notes,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        };
        queries::create_appointment(&db, &appointment)?;
        appointment
    };

    tracing::info!(
        appointment_id = %appointment.id,
        scheduled_at = %appointment.scheduled_at,
        "appointment booked"
    );
    Ok(Json(appointment))
}

// GET /api/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50);
    let appointments = {
        let db = state.db.lock().unwrap();
        queries::get_all_appointments(&db, query.status.as_deref(), limit)?
    };

    Ok(Json(appointments))
}

// POST /api/appointments/:id/cancel
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let updated = {
        let db = state.db.lock().unwrap();
        queries::update_appointment_status(&db, &id, &AppointmentStatus::Canceled)?
    };

    if !updated {
        return Err(AppError::NotFound(format!("appointment {id}")));
    }

    tracing::info!(appointment_id = %id, "appointment canceled");
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub start: String,
    pub duration_minutes: i32,
    pub exclude: Option<String>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
}

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let start = parse_datetime(&query.start)?;
    if query.duration_minutes <= 0 {
        return Err(AppError::Invalid("duration_minutes must be positive".to_string()));
    }

    let available = {
        let db = state.db.lock().unwrap();
        availability::is_available(&db, &start, query.duration_minutes, query.exclude.as_deref())?
    };

    Ok(Json(AvailabilityResponse { available }))
}
