//! HTTP API handlers for foodlens-sr
//!
//! Scan endpoints drive the resolution chain; product and health endpoints
//! are read-only.

pub mod health;
pub mod products;
pub mod scan;

pub use health::health_routes;
pub use products::product_routes;
pub use scan::scan_routes;
