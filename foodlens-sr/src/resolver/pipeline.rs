//! Staged resolution chain
//!
//! Runs the fallback stages in fixed order and commits the first hit:
//! - barcode scans: cache, then barcode registry
//! - image scans: cache by image content, then OCR-extracted barcode
//!   candidates (cache probe before registry each), then free-text search
//!   over the OCR text, then the vision model
//!
//! Upstream stages run under `min(stage timeout, remaining budget)`; local
//! cache probes are not budgeted. A stage failure is logged and the chain
//! falls through to the next stage.

use std::future::Future;
use std::time::{Duration, Instant};

use foodlens_common::normalize::normalize;
use foodlens_common::score::score;
use foodlens_common::{Product, RawProduct, Result, Source};

use crate::config::Config;
use crate::services::ocr::{OcrExtraction, OcrExtractor};
use crate::types::{
    BarcodeRegistry, LookupError, ProductStore, Resolution, ResolutionKey, TextSearch, VisionModel,
};

/// Most OCR barcode candidates tried against the registry per scan
const MAX_BARCODE_CANDIDATES: usize = 3;

/// Per-stage timeouts and the overall per-resolution budget
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    pub registry: Duration,
    pub search: Duration,
    pub ocr: Duration,
    pub vision: Duration,
    pub request_budget: Duration,
}

impl StageTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            registry: config.registry_timeout,
            search: config.search_timeout,
            ocr: config.ocr_timeout,
            vision: config.vision_timeout,
            request_budget: config.request_budget,
        }
    }
}

/// Remaining time of one resolution across all its stages
struct Budget {
    deadline: Instant,
}

impl Budget {
    fn new(total: Duration) -> Self {
        Self {
            deadline: Instant::now() + total,
        }
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn exhausted(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Time a stage may spend: its own timeout, shrunk to what is left
    fn stage(&self, stage_timeout: Duration) -> Duration {
        stage_timeout.min(self.remaining())
    }
}

/// One resolution run over borrowed components
pub(crate) struct Chain<'a> {
    pub store: &'a dyn ProductStore,
    pub registry: &'a dyn BarcodeRegistry,
    pub search: &'a dyn TextSearch,
    pub ocr: &'a OcrExtractor,
    pub vision: &'a dyn VisionModel,
    pub timeouts: &'a StageTimeouts,
}

impl Chain<'_> {
    /// Resolve a scanned barcode: cache, then registry
    pub async fn resolve_barcode(&self, code: &str) -> Result<Resolution> {
        let key = ResolutionKey::for_barcode(code);
        let budget = Budget::new(self.timeouts.request_budget);

        if let Some(stored) = self.store.get(&key).await? {
            return Ok(cache_hit(stored));
        }

        match bounded(&budget, self.timeouts.registry, self.registry.lookup(code)).await {
            Ok(Some(raw)) => return self.commit(raw, Some(code), Source::Registry, &key).await,
            Ok(None) => {}
            Err(e) => stage_failure("registry", &e),
        }

        Ok(Resolution::NotFound {
            timed_out: budget.exhausted(),
        })
    }

    /// Resolve a packaging photo through the full fallback chain
    pub async fn resolve_image(&self, image: &[u8]) -> Result<Resolution> {
        let image_key = ResolutionKey::for_image(image);
        let budget = Budget::new(self.timeouts.request_budget);

        if let Some(stored) = self.store.get(&image_key).await? {
            return Ok(cache_hit(stored));
        }

        let extraction = self.extract_text(&budget, image).await;
        if !extraction.is_empty() {
            let candidates = distinct_candidates(&extraction, MAX_BARCODE_CANDIDATES);
            tracing::debug!(
                candidates = candidates.len(),
                chars = extraction.raw_text.len(),
                "OCR produced text"
            );

            for code in &candidates {
                if budget.exhausted() {
                    return Ok(Resolution::NotFound { timed_out: true });
                }

                // A code resolved by an earlier scan makes the registry
                // round-trip unnecessary
                let candidate_key = ResolutionKey::for_barcode(code);
                if let Some(stored) = self.store.get(&candidate_key).await? {
                    return Ok(cache_hit(stored));
                }

                match bounded(&budget, self.timeouts.registry, self.registry.lookup(code)).await {
                    Ok(Some(raw)) => {
                        return self.commit(raw, Some(code), Source::Registry, &image_key).await
                    }
                    Ok(None) => {}
                    Err(e) => stage_failure("registry", &e),
                }
            }

            if budget.exhausted() {
                return Ok(Resolution::NotFound { timed_out: true });
            }

            match bounded(
                &budget,
                self.timeouts.search,
                self.search.search(&extraction.raw_text),
            )
            .await
            {
                Ok(Some(raw)) => {
                    return self.commit(raw, None, Source::TextSearch, &image_key).await
                }
                Ok(None) => {}
                Err(e) => stage_failure("text search", &e),
            }
        }

        if budget.exhausted() {
            return Ok(Resolution::NotFound { timed_out: true });
        }

        match bounded(&budget, self.timeouts.vision, self.vision.identify(image)).await {
            Ok(Some(raw)) => {
                return self
                    .commit(raw, None, Source::VisionFallback, &image_key)
                    .await
            }
            Ok(None) => {}
            Err(e) => stage_failure("vision", &e),
        }

        Ok(Resolution::NotFound {
            timed_out: budget.exhausted(),
        })
    }

    /// Run OCR under its slice of the budget; any failure means no text
    async fn extract_text(&self, budget: &Budget, image: &[u8]) -> OcrExtraction {
        let allowed = budget.stage(self.timeouts.ocr);
        if allowed.is_zero() {
            return OcrExtraction::default();
        }
        match tokio::time::timeout(allowed, self.ocr.extract(image)).await {
            Ok(extraction) => extraction,
            Err(_) => {
                tracing::warn!("OCR timed out, continuing without text");
                OcrExtraction::default()
            }
        }
    }

    /// Normalize, score, persist and report a raw hit
    ///
    /// Persists under the product's barcode when one is known, else under
    /// the scan's own key. The record the store committed wins over the one
    /// built here, so concurrent creates agree on a single product.
    async fn commit(
        &self,
        raw: RawProduct,
        barcode_hint: Option<&str>,
        source: Source,
        scan_key: &ResolutionKey,
    ) -> Result<Resolution> {
        let normalized = normalize(raw, barcode_hint);
        let vendor_warnings = normalized.warnings.clone();
        let health = score(&normalized.nutrition);

        let persist_key = match &normalized.barcode {
            Some(code) => ResolutionKey::for_barcode(code),
            None => scan_key.clone(),
        };

        let product = normalized.into_product(source, health.value);
        let stored = self.store.upsert(&persist_key, &product).await?;

        let mut warnings = score(&stored.nutrition).warnings;
        warnings.extend(vendor_warnings);

        tracing::info!(
            cache_key = %persist_key.as_cache_key(),
            source = source.as_str(),
            health_score = stored.health_score,
            name = %stored.name,
            "Product resolved"
        );

        Ok(Resolution::Resolved {
            product: stored,
            warnings,
        })
    }
}

/// Serve a stored record as a cache hit, warnings rederived from its facts
fn cache_hit(stored: Product) -> Resolution {
    let warnings = score(&stored.nutrition).warnings;
    tracing::info!(
        name = %stored.name,
        health_score = stored.health_score,
        "Cache hit"
    );
    Resolution::Resolved {
        product: stored.as_cache_hit(),
        warnings,
    }
}

/// Run one upstream lookup under the stage's share of the budget
async fn bounded<T, F>(
    budget: &Budget,
    stage_timeout: Duration,
    lookup: F,
) -> std::result::Result<Option<T>, LookupError>
where
    F: Future<Output = std::result::Result<Option<T>, LookupError>>,
{
    let allowed = budget.stage(stage_timeout);
    if allowed.is_zero() {
        return Err(LookupError::Timeout);
    }
    match tokio::time::timeout(allowed, lookup).await {
        Ok(result) => result,
        Err(_) => Err(LookupError::Timeout),
    }
}

fn stage_failure(stage: &str, err: &LookupError) {
    tracing::warn!(stage, error = %err, "Stage failed, falling through");
}

/// First `cap` distinct barcode candidates in reading order
fn distinct_candidates(extraction: &OcrExtraction, cap: usize) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    for candidate in extraction.barcode_candidates() {
        if candidates.iter().any(|seen| seen == candidate) {
            continue;
        }
        candidates.push(candidate.to_string());
        if candidates.len() == cap {
            break;
        }
    }
    candidates
}

// ============================================================================
// Tests
// ============================================================================
