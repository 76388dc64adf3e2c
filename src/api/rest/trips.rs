use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::AuthUser;
use crate::error::AppError;
use crate::lifecycle::trip as trip_lifecycle;
use crate::lifecycle::trip::{CompleteTrip, NewPing, StartTrip};
use crate::models::trip::{LocationPing, Trip};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/start", patch(start_trip))
        .route("/trips/:id/complete", patch(complete_trip))
        .route("/trips/:id/cancel", patch(cancel_trip))
        .route("/trips/:id/location", post(record_location))
        .route("/trips/:id/locations", get(list_locations))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(trip_lifecycle::get(&state, id)?))
}

async fn start_trip(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(command): Json<StartTrip>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(trip_lifecycle::start(&state, &actor, id, command)?))
}

async fn complete_trip(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(command): Json<CompleteTrip>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(trip_lifecycle::complete(&state, &actor, id, command)?))
}

async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(trip_lifecycle::cancel(&state, &actor, id)?))
}

async fn record_location(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(ping): Json<NewPing>,
) -> Result<(StatusCode, Json<LocationPing>), AppError> {
    let record = trip_lifecycle::record_location(&state, &actor, id, ping)?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Deserialize)]
struct LocationsQuery {
    limit: Option<usize>,
}

async fn list_locations(
    State(state): State<Arc<AppState>>,
    AuthUser(_actor): AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LocationsQuery>,
) -> Result<Json<Vec<LocationPing>>, AppError> {
    let limit = query.limit.unwrap_or(100);
    Ok(Json(trip_lifecycle::locations(&state, id, limit)?))
}
