//! Canonical product model for FoodLens
//!
//! Three shapes move through the resolution pipeline:
//! - **`RawProduct`** - transient, source-specific output of a lookup client
//!   (registry, text search, vision). Everything optional.
//! - **`NormalizedProduct`** - schema-complete intermediate produced by the
//!   normalizer. Name/brand defaulted, nutrition fully populated.
//! - **`Product`** - canonical resolved entity held in the cache store and
//!   returned to callers. Never mutated after persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder name for products whose source data carries no usable name
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

/// Placeholder brand for products whose source data carries no usable brand
pub const UNKNOWN_BRAND: &str = "Unknown Brand";

// ============================================================================
// Resolution source
// ============================================================================

/// Which stage of the fallback chain produced a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Served from the cache store without touching any upstream
    Cache,
    /// Barcode registry lookup (direct or via an OCR-extracted code)
    Registry,
    /// Text search over OCR-extracted packaging text
    TextSearch,
    /// AI vision identification of the packaging photo
    VisionFallback,
}

impl Source {
    /// Stable string form used in the database `source` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Registry => "registry",
            Source::TextSearch => "text_search",
            Source::VisionFallback => "vision_fallback",
        }
    }

    /// Parse the database string form back into the enum
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cache" => Some(Source::Cache),
            "registry" => Some(Source::Registry),
            "text_search" => Some(Source::TextSearch),
            "vision_fallback" => Some(Source::VisionFallback),
            _ => None,
        }
    }
}

// ============================================================================
// Nutrition facts
// ============================================================================

/// Per-100g nutrition facts, schema-complete after normalization
///
/// All mass fields are grams per 100 g (including sodium and salt); energy is
/// kilocalories per 100 g. Fields the source omitted are `0.0`, never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Nutrition {
    pub energy_kcal_100g: f64,
    pub fat_100g: f64,
    pub saturated_fat_100g: f64,
    pub sugars_100g: f64,
    pub proteins_100g: f64,
    pub carbohydrates_100g: f64,
    pub fiber_100g: f64,
    pub sodium_100g: f64,
    pub salt_100g: f64,
}

/// Heterogeneous upstream nutrient fields, prior to normalization
///
/// Mirrors the union of shapes the lookup clients produce: both kcal and kJ
/// energy variants, both salt and sodium, everything optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawNutrients {
    /// Energy in kcal per 100 g, when the source reports kcal directly
    pub energy_kcal_100g: Option<f64>,
    /// Energy in kJ per 100 g, reported by sources without a kcal field
    pub energy_kj_100g: Option<f64>,
    pub fat_100g: Option<f64>,
    pub saturated_fat_100g: Option<f64>,
    pub sugars_100g: Option<f64>,
    pub proteins_100g: Option<f64>,
    pub carbohydrates_100g: Option<f64>,
    pub fiber_100g: Option<f64>,
    pub sodium_100g: Option<f64>,
    pub salt_100g: Option<f64>,
}

// ============================================================================
// Raw product (client output)
// ============================================================================

/// Source-specific product shape returned by lookup clients
///
/// Short-lived: exists only between a client returning a hit and the
/// normalizer consuming it. Vendor-supplied health scores are deliberately
/// not representable here; scores are always derived locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawProduct {
    /// Barcode as reported by the source (may differ from the scanned code)
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub nutrients: RawNutrients,
    pub ingredients_text: Option<String>,
    pub image_url: Option<String>,
    /// Vendor-supplied advisory strings (e.g. vision model warnings)
    pub warnings: Vec<String>,
}

// ============================================================================
// Normalized product (pipeline intermediate)
// ============================================================================

/// Schema-complete product awaiting score derivation and persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProduct {
    pub barcode: Option<String>,
    pub name: String,
    pub brand: String,
    pub nutrition: Nutrition,
    pub ingredients_text: Option<String>,
    pub image_url: Option<String>,
    /// Vendor warnings carried through from the raw product
    pub warnings: Vec<String>,
}

impl NormalizedProduct {
    /// Finalize into a canonical `Product` with a fresh guid and timestamp
    pub fn into_product(self, source: Source, health_score: u8) -> Product {
        Product {
            guid: Uuid::new_v4(),
            barcode: self.barcode,
            name: self.name,
            brand: self.brand,
            nutrition: self.nutrition,
            ingredients_text: self.ingredients_text,
            image_url: self.image_url,
            health_score,
            source,
            resolved_at: Utc::now(),
        }
    }
}

// ============================================================================
// Canonical product
// ============================================================================

/// Canonical resolved product entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Record identity in the cache store
    pub guid: Uuid,
    /// Unique per stored product when present
    pub barcode: Option<String>,
    pub name: String,
    pub brand: String,
    pub nutrition: Nutrition,
    pub ingredients_text: Option<String>,
    pub image_url: Option<String>,
    /// Derived 0-100 score; never copied from an upstream source
    pub health_score: u8,
    pub source: Source,
    /// When the resolution that produced this record completed
    pub resolved_at: DateTime<Utc>,
}

impl Product {
    /// Copy of this record re-labeled as a cache hit
    pub fn as_cache_hit(&self) -> Product {
        Product {
            source: Source::Cache,
            ..self.clone()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
