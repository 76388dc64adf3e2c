use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::pricing::{self, PriceBreakdown, PriceRange, QuoteParams};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/pricing/quote", post(quote))
}

#[derive(Serialize)]
struct QuoteResponse {
    breakdown: PriceBreakdown,
    range: PriceRange,
}

async fn quote(
    State(state): State<Arc<AppState>>,
    Json(params): Json<QuoteParams>,
) -> Result<Json<QuoteResponse>, AppError> {
    let breakdown = pricing::price_breakdown(&params, &state.config.vat)?;
    let range = pricing::suggested_range(&params)?;

    Ok(Json(QuoteResponse { breakdown, range }))
}
