//! Core types and trait definitions for the scan resolver
//!
//! The resolution pipeline depends on capability traits only; concrete
//! clients live in `services/` and the SQLite store in `db/`. Tests swap in
//! stub implementations of these traits.

use async_trait::async_trait;
use foodlens_common::{Product, RawProduct, Result};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============================================================================
// Scan input and resolution outcome
// ============================================================================

/// What a caller scanned: exactly one of a barcode or a packaging photo
#[derive(Debug, Clone)]
pub enum ScanInput {
    Barcode(String),
    Image(Vec<u8>),
}

/// Outcome of a resolution
///
/// `NotFound` is a valid negative result, not an error: every stage ran (or
/// the budget expired) without producing a product.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved {
        product: Product,
        /// Scorer warnings plus any vendor advisories from the winning stage
        warnings: Vec<String>,
    },
    NotFound {
        /// True when the overall request budget expired before the chain
        /// could finish
        timed_out: bool,
    },
}

// ============================================================================
// Resolution keys
// ============================================================================

/// Identity of a resolution for caching and in-flight deduplication
///
/// Barcode scans are keyed by the code itself; image scans without a barcode
/// are keyed by the SHA-256 of the image bytes, so the same photo resolves
/// once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionKey {
    Barcode(String),
    ImageHash(String),
}

impl ResolutionKey {
    pub fn for_barcode(code: &str) -> Self {
        ResolutionKey::Barcode(code.trim().to_string())
    }

    pub fn for_image(image: &[u8]) -> Self {
        ResolutionKey::ImageHash(format!("{:x}", Sha256::digest(image)))
    }

    /// Stable string form used as the store's unique cache key
    pub fn as_cache_key(&self) -> String {
        match self {
            ResolutionKey::Barcode(code) => format!("barcode:{}", code),
            ResolutionKey::ImageHash(hash) => format!("image:{}", hash),
        }
    }
}

// ============================================================================
// Stage-level errors
// ============================================================================

/// Soft failure from an upstream lookup
///
/// The pipeline logs these and moves to the next stage; they never surface
/// past the orchestrator.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Request exceeded its stage timeout
    #[error("Lookup timed out")]
    Timeout,

    /// Network failure or upstream 5xx
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// 2xx response whose body could not be decoded
    #[error("Response decode error: {0}")]
    Decode(String),
}

/// OCR engine failure
///
/// Absorbed by the extractor, which degrades to an empty extraction.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Engine binary missing or not executable
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// Engine ran but produced no usable output
    #[error("OCR failed: {0}")]
    Failed(String),
}

// ============================================================================
// Capability traits
// ============================================================================

/// Barcode registry lookup (stage 2 of the chain)
///
/// `Ok(Some)` is a hit, `Ok(None)` means the registry does not know the code,
/// `Err` is a soft upstream failure.
#[async_trait]
pub trait BarcodeRegistry: Send + Sync {
    async fn lookup(&self, barcode: &str) -> std::result::Result<Option<RawProduct>, LookupError>;
}

/// Free-text product search (stage 4, image path only)
#[async_trait]
pub trait TextSearch: Send + Sync {
    async fn search(&self, query: &str) -> std::result::Result<Option<RawProduct>, LookupError>;
}

/// Text recognition over raw image bytes
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> std::result::Result<String, OcrError>;
}

/// AI vision identification of a packaging photo (last resort stage)
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn identify(&self, image: &[u8]) -> std::result::Result<Option<RawProduct>, LookupError>;
}

/// Persistent product cache
///
/// `upsert` must tolerate concurrent creates of the same key: on a unique
/// conflict it re-reads and returns the committed record instead of failing.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get(&self, key: &ResolutionKey) -> Result<Option<Product>>;

    async fn upsert(&self, key: &ResolutionKey, product: &Product) -> Result<Product>;

    /// Stored products with `health_score` strictly above `min_score`,
    /// best first
    async fn healthier_than(&self, min_score: u8, limit: u32) -> Result<Vec<Product>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barcode_key_trims_input() {
        let key = ResolutionKey::for_barcode(" 4006381333931 ");
        assert_eq!(key, ResolutionKey::Barcode("4006381333931".to_string()));
        assert_eq!(key.as_cache_key(), "barcode:4006381333931");
    }

    #[test]
    fn test_image_key_is_content_addressed() {
        let a = ResolutionKey::for_image(b"same bytes");
        let b = ResolutionKey::for_image(b"same bytes");
        let c = ResolutionKey::for_image(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_image_key_is_hex_sha256() {
        let key = ResolutionKey::for_image(b"test content");
        match &key {
            ResolutionKey::ImageHash(hash) => {
                assert_eq!(hash.len(), 64);
                let expected = format!("{:x}", Sha256::digest(b"test content"));
                assert_eq!(hash, &expected);
            }
            _ => panic!("Expected ImageHash, got {:?}", key),
        }
        assert!(key.as_cache_key().starts_with("image:"));
    }
}
