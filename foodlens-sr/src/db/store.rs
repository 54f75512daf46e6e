//! SQLite-backed product store
//!
//! Rows are complete products only: every column a `Product` needs is
//! NOT NULL (or genuinely optional on the model), so a row is never visible
//! half-written. Concurrent creates of the same cache key resolve inside
//! `upsert` with a single read-after-conflict retry.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use foodlens_common::{Error, Nutrition, Product, Result, Source};

use crate::types::{ProductStore, ResolutionKey};

/// Product cache store on the service's SQLite database
pub struct SqliteProductStore {
    db: SqlitePool,
}

impl SqliteProductStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn row_to_product(row: &SqliteRow) -> Result<Product> {
    let guid_str: String = row.get("guid");
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?;

    let nutrition_json: String = row.get("nutrition");
    let nutrition: Nutrition = serde_json::from_str(&nutrition_json)
        .map_err(|e| Error::Internal(format!("Failed to deserialize nutrition: {}", e)))?;

    let source_str: String = row.get("source");
    let source = Source::parse(&source_str)
        .ok_or_else(|| Error::Internal(format!("Unknown source in database: {}", source_str)))?;

    let resolved_at_str: String = row.get("resolved_at");
    let resolved_at = DateTime::parse_from_rfc3339(&resolved_at_str)
        .map_err(|e| Error::Internal(format!("Failed to parse resolved_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let health_score: i64 = row.get("health_score");

    Ok(Product {
        guid,
        barcode: row.get("barcode"),
        name: row.get("name"),
        brand: row.get("brand"),
        nutrition,
        ingredients_text: row.get("ingredients_text"),
        image_url: row.get("image_url"),
        health_score: health_score.clamp(0, 100) as u8,
        source,
        resolved_at,
    })
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn get(&self, key: &ResolutionKey) -> Result<Option<Product>> {
        let cache_key = key.as_cache_key();

        let row = sqlx::query(
            r#"
            SELECT guid, cache_key, barcode, name, brand, nutrition,
                   ingredients_text, image_url, health_score, source, resolved_at
            FROM products
            WHERE cache_key = ?
            "#,
        )
        .bind(&cache_key)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                tracing::debug!(cache_key = %cache_key, "Product cache hit");
                Ok(Some(row_to_product(&row)?))
            }
            None => {
                tracing::debug!(cache_key = %cache_key, "Product cache miss");
                Ok(None)
            }
        }
    }

    async fn upsert(&self, key: &ResolutionKey, product: &Product) -> Result<Product> {
        // Prepare all data before touching the database
        let cache_key = key.as_cache_key();
        let guid = product.guid.to_string();
        let nutrition = serde_json::to_string(&product.nutrition)
            .map_err(|e| Error::Internal(format!("Failed to serialize nutrition: {}", e)))?;
        let resolved_at = product.resolved_at.to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                guid, cache_key, barcode, name, brand, nutrition,
                ingredients_text, image_url, health_score, source, resolved_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO NOTHING
            "#,
        )
        .bind(&guid)
        .bind(&cache_key)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&nutrition)
        .bind(&product.ingredients_text)
        .bind(&product.image_url)
        .bind(product.health_score as i64)
        .bind(product.source.as_str())
        .bind(&resolved_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 1 {
            tracing::info!(
                cache_key = %cache_key,
                health_score = product.health_score,
                source = product.source.as_str(),
                "Persisted resolved product"
            );
            return Ok(product.clone());
        }

        // Lost a create race: another resolution committed this key first.
        // One retry read returns the committed record.
        tracing::debug!(cache_key = %cache_key, "Upsert conflict, returning committed record");
        match self.get(key).await? {
            Some(existing) => Ok(existing),
            None => Err(Error::Internal(format!(
                "Upsert conflict on {} but no committed row found",
                cache_key
            ))),
        }
    }

    async fn healthier_than(&self, min_score: u8, limit: u32) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, cache_key, barcode, name, brand, nutrition,
                   ingredients_text, image_url, health_score, source, resolved_at
            FROM products
            WHERE health_score > ?
            ORDER BY health_score DESC
            LIMIT ?
            "#,
        )
        .bind(min_score as i64)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_product).collect()
    }
}
