//! Shared stubs and fixtures for foodlens-sr integration tests
//!
//! Scripted implementations of the lookup traits pin each stage's behavior
//! and count upstream calls; the store is always a real SQLite in-memory
//! pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use foodlens_common::{RawNutrients, RawProduct};
use foodlens_sr::db::SqliteProductStore;
use foodlens_sr::resolver::{Resolver, StageTimeouts};
use foodlens_sr::types::{
    BarcodeRegistry, LookupError, OcrEngine, OcrError, TextSearch, VisionModel,
};

// ============================================================================
// Stage scripting
// ============================================================================

/// Canned behavior for one lookup stage
#[derive(Clone)]
pub enum StageScript {
    Hit(RawProduct),
    Miss,
    Fail(String),
}

impl StageScript {
    fn into_outcome(self) -> Result<Option<RawProduct>, LookupError> {
        match self {
            StageScript::Hit(raw) => Ok(Some(raw)),
            StageScript::Miss => Ok(None),
            StageScript::Fail(message) => Err(LookupError::Upstream(message)),
        }
    }
}

/// Registry stub: per-barcode catalog or a fixed script, with a call counter
pub struct ScriptedRegistry {
    calls: AtomicUsize,
    catalog: Vec<RawProduct>,
    script: Option<StageScript>,
    delay: Duration,
}

impl ScriptedRegistry {
    pub fn scripted(script: StageScript) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            catalog: Vec::new(),
            script: Some(script),
            delay: Duration::ZERO,
        }
    }

    /// Answer lookups from a catalog matched by barcode
    pub fn with_catalog(catalog: Vec<RawProduct>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            catalog,
            script: None,
            delay: Duration::ZERO,
        }
    }

    /// Scripted response delivered only after `delay`
    pub fn slow(script: StageScript, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::scripted(script)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BarcodeRegistry for ScriptedRegistry {
    async fn lookup(&self, barcode: &str) -> Result<Option<RawProduct>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(script) = &self.script {
            return script.clone().into_outcome();
        }
        Ok(self
            .catalog
            .iter()
            .find(|raw| raw.barcode.as_deref() == Some(barcode))
            .cloned())
    }
}

pub struct ScriptedSearch {
    calls: AtomicUsize,
    script: StageScript,
}

impl ScriptedSearch {
    pub fn new(script: StageScript) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextSearch for ScriptedSearch {
    async fn search(&self, _query: &str) -> Result<Option<RawProduct>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.clone().into_outcome()
    }
}

pub struct ScriptedVision {
    calls: AtomicUsize,
    script: StageScript,
}

impl ScriptedVision {
    pub fn new(script: StageScript) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    async fn identify(&self, _image: &[u8]) -> Result<Option<RawProduct>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.clone().into_outcome()
    }
}

/// OCR stub yielding fixed text, or failing when none is scripted
pub struct ScriptedOcr {
    calls: AtomicUsize,
    text: Option<String>,
}

impl ScriptedOcr {
    pub fn reading(text: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            text: None,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => Err(OcrError::Failed("scripted OCR failure".to_string())),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Moderately sugary product: derived score 70, one scorer warning
pub fn sugary_snack(barcode: Option<&str>) -> RawProduct {
    RawProduct {
        barcode: barcode.map(str::to_string),
        name: Some("Choco Crunch Bar".to_string()),
        brand: Some("Snackwell".to_string()),
        nutrients: RawNutrients {
            energy_kcal_100g: Some(140.0),
            sugars_100g: Some(39.0),
            ..Default::default()
        },
        ingredients_text: Some("sugar, cocoa, milk powder".to_string()),
        image_url: None,
        warnings: vec![],
    }
}

pub fn raw_named(name: &str, barcode: Option<&str>, nutrients: RawNutrients) -> RawProduct {
    RawProduct {
        barcode: barcode.map(str::to_string),
        name: Some(name.to_string()),
        brand: Some("Test Brand".to_string()),
        nutrients,
        ingredients_text: None,
        image_url: None,
        warnings: vec![],
    }
}

// ============================================================================
// Harness assembly
// ============================================================================

/// Fresh in-memory product store with tables created
pub async fn memory_store() -> SqliteProductStore {
    let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
    foodlens_sr::db::init_tables(&pool).await.unwrap();
    SqliteProductStore::new(pool)
}

/// Generous stage timeouts so only scripted behavior decides outcomes
pub fn test_timeouts() -> StageTimeouts {
    StageTimeouts {
        registry: Duration::from_millis(500),
        search: Duration::from_millis(500),
        ocr: Duration::from_millis(500),
        vision: Duration::from_millis(500),
        request_budget: Duration::from_secs(5),
    }
}

pub async fn build_resolver(
    registry: &Arc<ScriptedRegistry>,
    search: &Arc<ScriptedSearch>,
    ocr: &Arc<ScriptedOcr>,
    vision: &Arc<ScriptedVision>,
    timeouts: StageTimeouts,
) -> Resolver {
    Resolver::new(
        Arc::new(memory_store().await),
        Arc::clone(registry) as Arc<dyn BarcodeRegistry>,
        Arc::clone(search) as Arc<dyn TextSearch>,
        Arc::clone(ocr) as Arc<dyn OcrEngine>,
        Arc::clone(vision) as Arc<dyn VisionModel>,
        timeouts,
    )
}
