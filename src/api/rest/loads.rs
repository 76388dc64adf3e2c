use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::auth::AuthUser;
use crate::error::AppError;
use crate::lifecycle::load as load_lifecycle;
use crate::lifecycle::load::{LoadDraft, LoadFilter};
use crate::models::load::Load;
use crate::models::offer::Offer;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/loads", post(create_load).get(list_loads))
        .route("/loads/:id", get(get_load).put(update_load))
        .route("/loads/:id", delete(delete_load))
        .route("/loads/:id/publish", patch(publish_load))
        .route("/loads/:id/cancel", patch(cancel_load))
        .route("/loads/:id/offers", get(list_load_offers))
}

/// Best-effort address resolution: fill missing coordinates, then estimate
/// the route when both ends are known.
async fn resolve_route(state: &AppState, draft: &mut LoadDraft) {
    for stop in [&mut draft.origin, &mut draft.dest] {
        if stop.coords.is_none() {
            let address = format!("{}, {}, {}", stop.address, stop.city, stop.country);
            stop.coords = state.geocoder.geocode(&address).await;
        }
    }

    if let (Some(origin), Some(dest)) = (draft.origin.coords, draft.dest.coords) {
        let estimate = state.geocoder.route(&origin, &dest).await;
        draft.distance_km = Some(estimate.distance_km);
        draft.duration_min = Some(estimate.duration_min);
    }
}

async fn create_load(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(mut draft): Json<LoadDraft>,
) -> Result<(StatusCode, Json<Load>), AppError> {
    resolve_route(&state, &mut draft).await;
    let load = load_lifecycle::create(&state, &actor, draft)?;
    Ok((StatusCode::CREATED, Json(load)))
}

async fn list_loads(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<LoadFilter>,
) -> Json<Vec<Load>> {
    Json(load_lifecycle::list(&state, &filter))
}

async fn get_load(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(load_lifecycle::get(&state, id)?))
}

async fn update_load(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(mut draft): Json<LoadDraft>,
) -> Result<Json<Load>, AppError> {
    resolve_route(&state, &mut draft).await;
    Ok(Json(load_lifecycle::update(&state, &actor, id, draft)?))
}

async fn publish_load(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(load_lifecycle::publish(&state, &actor, id)?))
}

async fn cancel_load(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Load>, AppError> {
    Ok(Json(load_lifecycle::cancel(&state, &actor, id)?))
}

async fn delete_load(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    load_lifecycle::delete(&state, &actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_load_offers(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Offer>>, AppError> {
    Ok(Json(load_lifecycle::pending_offers(&state, &actor, id)?))
}
