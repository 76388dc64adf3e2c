use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::rest::auth::AuthUser;
use crate::error::AppError;
use crate::models::user::{Role, User};
use crate::models::vehicle::{Vehicle, VehicleType};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register))
        .route("/users/:id", get(get_profile))
        .route("/vehicles", post(create_vehicle).get(list_my_vehicles))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub company_name: Option<String>,
    pub country: String,
    pub role: Role,
}

#[derive(Serialize)]
struct RegisterResponse {
    user: User,
    token: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    if !payload.email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }

    let email_taken = state
        .users
        .iter()
        .any(|entry| entry.value().email.eq_ignore_ascii_case(&payload.email));
    if email_taken {
        return Err(AppError::Conflict("email already registered".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        company_name: payload.company_name,
        country: payload.country.to_uppercase(),
        role: payload.role,
        verified: false,
        rating: 0.0,
        total_ratings: 0,
        completed_trips: 0,
        created_at: Utc::now(),
    };

    let token = Uuid::new_v4().simple().to_string();
    state.sessions.insert(token.clone(), user.id);
    state.users.insert(user.id, user.clone());

    Ok((StatusCode::CREATED, Json(RegisterResponse { user, token })))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = state
        .users
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

    Ok(Json(json!({
        "id": user.id,
        "name": user.name,
        "company_name": user.company_name,
        "country": user.country,
        "role": user.role,
        "verified": user.verified,
        "rating": user.rating,
        "total_ratings": user.total_ratings,
        "completed_trips": user.completed_trips,
    })))
}

#[derive(Deserialize)]
pub struct CreateVehicleRequest {
    pub plate: String,
    pub vehicle_type: VehicleType,
    pub capacity_kg: f64,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    if actor.role != Role::Carrier {
        return Err(AppError::Forbidden(
            "only carriers can register vehicles".to_string(),
        ));
    }

    if payload.plate.trim().is_empty() {
        return Err(AppError::Validation("plate cannot be empty".to_string()));
    }

    if !payload.capacity_kg.is_finite() || payload.capacity_kg <= 0.0 {
        return Err(AppError::Validation(
            "capacity_kg must be positive".to_string(),
        ));
    }

    let vehicle = Vehicle {
        id: Uuid::new_v4(),
        owner_id: actor.id,
        plate: payload.plate,
        vehicle_type: payload.vehicle_type,
        capacity_kg: payload.capacity_kg,
        is_active: true,
        is_available: payload.is_available,
        created_at: Utc::now(),
    };

    state.vehicles.insert(vehicle.id, vehicle.clone());
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn list_my_vehicles(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
) -> Json<Vec<Vehicle>> {
    let vehicles = state
        .vehicles
        .iter()
        .filter(|entry| entry.value().owner_id == actor.id)
        .map(|entry| entry.value().clone())
        .collect();

    Json(vehicles)
}
