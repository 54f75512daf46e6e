//! Scan endpoints
//!
//! POST /api/scan/barcode and POST /api/scan/image. Both run the resolution
//! chain and share one response shape: `{ "product": …, "warnings": […] }`
//! on a hit, 404 `{ "not_found": true, "timed_out": … }` on a definitive
//! miss.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::types::{Resolution, ScanInput};
use crate::AppState;

/// POST /api/scan/barcode request
#[derive(Debug, Deserialize)]
pub struct BarcodeScanRequest {
    pub barcode: String,
}

/// POST /api/scan/barcode
pub async fn scan_barcode(
    State(state): State<AppState>,
    Json(request): Json<BarcodeScanRequest>,
) -> ApiResult<Response> {
    let resolution = run_scan(&state, ScanInput::Barcode(request.barcode)).await?;
    Ok(resolution_response(resolution))
}

/// POST /api/scan/image
///
/// Body is the raw image bytes; the image format is sniffed downstream, not
/// taken from the request headers.
pub async fn scan_image(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let resolution = run_scan(&state, ScanInput::Image(body.to_vec())).await?;
    Ok(resolution_response(resolution))
}

/// Run one resolution, recording hard failures for the health endpoint
async fn run_scan(state: &AppState, input: ScanInput) -> ApiResult<Resolution> {
    match state.resolver.resolve(input).await {
        Ok(resolution) => Ok(resolution),
        Err(err) => {
            *state.last_error.write().await = Some(err.to_string());
            Err(err.into())
        }
    }
}

fn resolution_response(resolution: Resolution) -> Response {
    match resolution {
        Resolution::Resolved { product, warnings } => Json(json!({
            "product": product,
            "warnings": warnings,
        }))
        .into_response(),
        Resolution::NotFound { timed_out } => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "not_found": true,
                "timed_out": timed_out,
            })),
        )
            .into_response(),
    }
}

/// Build scan routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/api/scan/barcode", post(scan_barcode))
        .route("/api/scan/image", post(scan_image))
}
