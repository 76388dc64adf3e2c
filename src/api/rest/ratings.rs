use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::auth::AuthUser;
use crate::error::AppError;
use crate::lifecycle::rating as rating_lifecycle;
use crate::lifecycle::rating::{NewRating, RatingUpdate};
use crate::models::rating::Rating;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ratings", post(create_rating))
        .route("/ratings/:id", put(update_rating).delete(delete_rating))
        .route("/ratings/user/:id", get(list_user_ratings))
}

async fn create_rating(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<NewRating>,
) -> Result<(StatusCode, Json<Rating>), AppError> {
    let rating = rating_lifecycle::create(&state, &actor, payload)?;
    Ok((StatusCode::CREATED, Json(rating)))
}

async fn update_rating(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatingUpdate>,
) -> Result<Json<Rating>, AppError> {
    Ok(Json(rating_lifecycle::update(&state, &actor, id, payload)?))
}

async fn delete_rating(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    rating_lifecycle::delete(&state, &actor, id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_user_ratings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Rating>> {
    Json(rating_lifecycle::list_for_user(&state, id))
}
