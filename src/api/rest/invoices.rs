use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::api::rest::auth::AuthUser;
use crate::billing;
use crate::billing::{NewInvoice, PayInvoice};
use crate::error::AppError;
use crate::models::invoice::Invoice;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/invoices", post(create_invoice))
        .route("/invoices/:id", get(get_invoice))
        .route("/invoices/:id/pay", post(pay_invoice))
        .route("/invoices/:id/cancel", patch(cancel_invoice))
}

async fn create_invoice(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Json(payload): Json<NewInvoice>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let invoice = billing::create(&state, &actor, payload)?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

async fn get_invoice(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(billing::get(&state, &actor, id)?))
}

async fn pay_invoice(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<PayInvoice>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(billing::pay(&state, &actor, id, payload).await?))
}

async fn cancel_invoice(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(billing::cancel(&state, &actor, id)?))
}
