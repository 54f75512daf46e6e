//! Product query endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::AppState;

/// Most products one alternatives query returns
const ALTERNATIVES_LIMIT: u32 = 10;

const DEFAULT_MIN_SCORE: u8 = 50;

/// GET /api/products/alternatives query parameters
#[derive(Debug, Deserialize)]
pub struct AlternativesParams {
    /// Strict lower bound on health score
    pub min_score: Option<u8>,
}

/// GET /api/products/alternatives?min_score=N
///
/// Up to ten stored products scoring strictly above the bound (default 50),
/// best first.
pub async fn healthier_alternatives(
    State(state): State<AppState>,
    Query(params): Query<AlternativesParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let min_score = params.min_score.unwrap_or(DEFAULT_MIN_SCORE);
    let products = state
        .resolver
        .alternatives(min_score, ALTERNATIVES_LIMIT)
        .await?;

    tracing::debug!(min_score, count = products.len(), "Alternatives query");
    Ok(Json(json!({ "products": products })))
}

/// Build product query routes
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/api/products/alternatives", get(healthier_alternatives))
}
