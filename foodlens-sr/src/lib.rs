//! foodlens-sr library interface
//!
//! Exposes the resolver, its service clients and the HTTP surface for
//! integration testing. The binary in `main.rs` wires real clients; tests
//! assemble a `Resolver` from stubs and drive the router directly.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod resolver;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::resolver::Resolver;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolution orchestrator
    pub resolver: Arc<Resolver>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last resolution failure, surfaced by the health endpoint
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self {
            resolver,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::scan_routes())
        .merge(api::product_routes())
        .merge(api::health_routes())
        .with_state(state)
        // CORS open for local app development
        .layer(CorsLayer::permissive())
}
