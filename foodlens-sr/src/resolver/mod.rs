//! Resolution orchestrator
//!
//! `Resolver` owns the chain components and the in-flight map, validates
//! scan input, and exposes the entry points the API layer calls.

mod inflight;
mod pipeline;

pub use pipeline::StageTimeouts;

use std::sync::Arc;

use foodlens_common::{Error, Product, Result};

use crate::services::ocr::OcrExtractor;
use crate::types::{
    BarcodeRegistry, OcrEngine, ProductStore, Resolution, ResolutionKey, ScanInput, TextSearch,
    VisionModel,
};
use inflight::InflightMap;
use pipeline::Chain;

pub struct Resolver {
    store: Arc<dyn ProductStore>,
    registry: Arc<dyn BarcodeRegistry>,
    search: Arc<dyn TextSearch>,
    ocr: OcrExtractor,
    vision: Arc<dyn VisionModel>,
    timeouts: StageTimeouts,
    inflight: InflightMap,
}

impl Resolver {
    pub fn new(
        store: Arc<dyn ProductStore>,
        registry: Arc<dyn BarcodeRegistry>,
        search: Arc<dyn TextSearch>,
        ocr_engine: Arc<dyn OcrEngine>,
        vision: Arc<dyn VisionModel>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            store,
            registry,
            search,
            ocr: OcrExtractor::new(ocr_engine),
            vision,
            timeouts,
            inflight: InflightMap::new(),
        }
    }

    /// Resolve one scan to a product or a definitive not-found
    ///
    /// Concurrent calls for the same barcode or the same image bytes share a
    /// single chain run. `NotFound` is a successful negative outcome; `Err`
    /// means the resolution itself broke (bad input, store failure).
    pub async fn resolve(&self, input: ScanInput) -> Result<Resolution> {
        let key = match &input {
            ScanInput::Barcode(code) => {
                if code.trim().is_empty() {
                    return Err(Error::InvalidInput(
                        "Barcode must not be empty".to_string(),
                    ));
                }
                ResolutionKey::for_barcode(code)
            }
            ScanInput::Image(bytes) => {
                if bytes.is_empty() {
                    return Err(Error::InvalidInput("Image must not be empty".to_string()));
                }
                ResolutionKey::for_image(bytes)
            }
        };

        self.inflight
            .run(key, || async {
                let chain = Chain {
                    store: self.store.as_ref(),
                    registry: self.registry.as_ref(),
                    search: self.search.as_ref(),
                    ocr: &self.ocr,
                    vision: self.vision.as_ref(),
                    timeouts: &self.timeouts,
                };
                match &input {
                    ScanInput::Barcode(code) => chain.resolve_barcode(code.trim()).await,
                    ScanInput::Image(bytes) => chain.resolve_image(bytes).await,
                }
            })
            .await
    }

    /// Stored products scoring strictly above `min_score`, best first
    pub async fn alternatives(&self, min_score: u8, limit: u32) -> Result<Vec<Product>> {
        self.store.healthier_than(min_score, limit).await
    }
}

// ============================================================================
// Tests
// ============================================================================
