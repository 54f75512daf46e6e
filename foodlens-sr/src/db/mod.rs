//! Database access for foodlens-sr
//!
//! One SQLite database holding the resolved-product cache. Tables are
//! created idempotently at startup.

pub mod store;

pub use store::SqliteProductStore;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the products table and its indexes if they don't exist
///
/// Public so integration tests can prepare in-memory pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            guid TEXT PRIMARY KEY,
            cache_key TEXT NOT NULL UNIQUE,
            barcode TEXT,
            name TEXT NOT NULL,
            brand TEXT NOT NULL,
            nutrition TEXT NOT NULL,
            ingredients_text TEXT,
            image_url TEXT,
            health_score INTEGER NOT NULL,
            source TEXT NOT NULL,
            resolved_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_barcode ON products(barcode)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_products_health_score ON products(health_score)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (products)");

    Ok(())
}
