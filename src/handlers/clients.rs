use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Client, Vehicle};
use crate::state::AppState;

use super::check_auth;

// POST /api/clients
#[derive(Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub async fn create_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateClientRequest>,
) -> Result<Json<Client>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Invalid("name is required".to_string()));
    }

    let client = Client {
        id: Uuid::new_v4().to_string(),
        name,
        phone: body.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        email: body.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db.lock().unwrap();
        queries::create_client(&db, &client)?;
    }

    tracing::info!(client_id = %client.id, "client created");
    Ok(Json(client))
}

// GET /api/clients
#[derive(Deserialize)]
pub struct ClientsQuery {
    pub limit: Option<i64>,
}

pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ClientsQuery>,
) -> Result<Json<Vec<Client>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(100);
    let clients = {
        let db = state.db.lock().unwrap();
        queries::list_clients(&db, limit)?
    };

    Ok(Json(clients))
}

// POST /api/vehicles
#[derive(Deserialize)]
pub struct CreateVehicleRequest {
    pub client_id: String,
    pub make: String,
    pub model: String,
    pub plate: Option<String>,
}

pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateVehicleRequest>,
) -> Result<Json<Vehicle>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let make = body.make.trim().to_string();
    let model = body.model.trim().to_string();
    if make.is_empty() || model.is_empty() {
        return Err(AppError::Invalid("make and model are required".to_string()));
    }

    let vehicle = {
        let db = state.db.lock().unwrap();

        if queries::get_client(&db, &body.client_id)?.is_none() {
            return Err(AppError::NotFound(format!("client {}", body.client_id)));
        }

        let vehicle = Vehicle {
            id: Uuid::new_v4().to_string(),
            client_id: body.client_id,
            make,
            model,
            plate: body.plate.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            created_at: Utc::now().naive_utc(),
        };
        queries::create_vehicle(&db, &vehicle)?;
        vehicle
    };

    tracing::info!(vehicle_id = %vehicle.id, vehicle = %vehicle.label(), "vehicle added");
    Ok(Json(vehicle))
}
