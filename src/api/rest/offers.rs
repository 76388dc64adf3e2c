use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, patch, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::auth::AuthUser;
use crate::error::AppError;
use crate::lifecycle::offer as offer_lifecycle;
use crate::lifecycle::offer::{AcceptOutcome, NewOffer};
use crate::models::offer::Offer;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/offers", post(create_offer))
        .route("/offers/:id/accept", patch(accept_offer))
        .route("/offers/:id/reject", patch(reject_offer))
        .route("/offers/:id", delete(cancel_offer))
}

async fn create_offer(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<NewOffer>,
) -> Result<(StatusCode, Json<Offer>), AppError> {
    let offer = offer_lifecycle::create(&state, &actor, payload)?;
    Ok((StatusCode::CREATED, Json(offer)))
}

async fn accept_offer(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AcceptOutcome>, AppError> {
    Ok(Json(offer_lifecycle::accept(&state, &actor, id)?))
}

async fn reject_offer(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Offer>, AppError> {
    Ok(Json(offer_lifecycle::reject(&state, &actor, id)?))
}

async fn cancel_offer(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Offer>, AppError> {
    Ok(Json(offer_lifecycle::cancel(&state, &actor, id)?))
}
