//! Integration tests for the resolution chain
//!
//! Drive a real `Resolver` over an in-memory store with scripted lookup
//! stages, covering the fallback order, caching, fall-through on stage
//! failures, budget exhaustion and concurrent deduplication.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use foodlens_common::{RawNutrients, Source};
use foodlens_sr::types::{Resolution, ScanInput};
use helpers::*;

fn resolved(resolution: Resolution) -> (foodlens_common::Product, Vec<String>) {
    match resolution {
        Resolution::Resolved { product, warnings } => (product, warnings),
        other => panic!("Expected Resolved, got {:?}", other),
    }
}

// ============================================================================
// Barcode path
// ============================================================================

#[tokio::test]
async fn test_barcode_scan_resolves_then_serves_from_cache() {
    let registry = Arc::new(ScriptedRegistry::scripted(StageScript::Hit(sugary_snack(
        Some("1234567890123"),
    ))));
    let search = Arc::new(ScriptedSearch::new(StageScript::Miss));
    let ocr = Arc::new(ScriptedOcr::failing());
    let vision = Arc::new(ScriptedVision::new(StageScript::Miss));
    let resolver = build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await;

    let (product, warnings) = resolved(
        resolver
            .resolve(ScanInput::Barcode("1234567890123".to_string()))
            .await
            .unwrap(),
    );
    assert_eq!(product.source, Source::Registry);
    assert_eq!(product.name, "Choco Crunch Bar");
    assert_eq!(product.barcode.as_deref(), Some("1234567890123"));
    assert_eq!(product.health_score, 70);
    assert_eq!(warnings, vec!["High Sugar Content".to_string()]);

    // Repeat scan is served from the cache, upstream untouched
    let (cached, cached_warnings) = resolved(
        resolver
            .resolve(ScanInput::Barcode("1234567890123".to_string()))
            .await
            .unwrap(),
    );
    assert_eq!(cached.source, Source::Cache);
    assert_eq!(cached.guid, product.guid);
    assert_eq!(cached_warnings, vec!["High Sugar Content".to_string()]);

    // Whitespace around the code maps to the same key
    let (padded, _) = resolved(
        resolver
            .resolve(ScanInput::Barcode("  1234567890123  ".to_string()))
            .await
            .unwrap(),
    );
    assert_eq!(padded.guid, product.guid);

    assert_eq!(registry.call_count(), 1);
}

#[tokio::test]
async fn test_unknown_barcode_is_not_found_and_not_cached() {
    let registry = Arc::new(ScriptedRegistry::scripted(StageScript::Miss));
    let search = Arc::new(ScriptedSearch::new(StageScript::Miss));
    let ocr = Arc::new(ScriptedOcr::failing());
    let vision = Arc::new(ScriptedVision::new(StageScript::Miss));
    let resolver = build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await;

    for _ in 0..2 {
        let resolution = resolver
            .resolve(ScanInput::Barcode("9999999999999".to_string()))
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::NotFound { timed_out: false });
    }
    // Negative results are never cached, so the registry is asked each time
    assert_eq!(registry.call_count(), 2);
}

#[tokio::test]
async fn test_registry_failure_on_barcode_path_degrades_to_not_found() {
    let registry = Arc::new(ScriptedRegistry::scripted(StageScript::Fail(
        "upstream 500".to_string(),
    )));
    let search = Arc::new(ScriptedSearch::new(StageScript::Miss));
    let ocr = Arc::new(ScriptedOcr::failing());
    let vision = Arc::new(ScriptedVision::new(StageScript::Miss));
    let resolver = build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await;

    let resolution = resolver
        .resolve(ScanInput::Barcode("4006381333931".to_string()))
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::NotFound { timed_out: false });
}

// ============================================================================
// Image path
// ============================================================================

#[tokio::test]
async fn test_image_resolves_via_ocr_extracted_barcode() {
    let registry = Arc::new(ScriptedRegistry::with_catalog(vec![sugary_snack(Some(
        "4006381333931",
    ))]));
    let search = Arc::new(ScriptedSearch::new(StageScript::Miss));
    let ocr = Arc::new(ScriptedOcr::reading(
        "NUTRITION FACTS\n4006381333931\nbest before 2027",
    ));
    let vision = Arc::new(ScriptedVision::new(StageScript::Miss));
    let resolver = build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await;

    let (product, _) = resolved(
        resolver
            .resolve(ScanInput::Image(b"photo-one".to_vec()))
            .await
            .unwrap(),
    );
    assert_eq!(product.source, Source::Registry);
    assert_eq!(product.barcode.as_deref(), Some("4006381333931"));
    assert_eq!(registry.call_count(), 1);

    // The record was keyed by barcode, so a direct barcode scan cache-hits
    let (by_code, _) = resolved(
        resolver
            .resolve(ScanInput::Barcode("4006381333931".to_string()))
            .await
            .unwrap(),
    );
    assert_eq!(by_code.source, Source::Cache);
    assert_eq!(by_code.guid, product.guid);
    assert_eq!(registry.call_count(), 1);

    // A different photo of the same pack re-runs OCR but the candidate
    // probe finds the stored record before any registry call
    let (second_photo, _) = resolved(
        resolver
            .resolve(ScanInput::Image(b"photo-two".to_vec()))
            .await
            .unwrap(),
    );
    assert_eq!(second_photo.source, Source::Cache);
    assert_eq!(second_photo.guid, product.guid);
    assert_eq!(registry.call_count(), 1);
    assert_eq!(ocr.call_count(), 2);
}

#[tokio::test]
async fn test_image_without_digits_falls_back_to_text_search() {
    let registry = Arc::new(ScriptedRegistry::scripted(StageScript::Miss));
    let search = Arc::new(ScriptedSearch::new(StageScript::Hit(raw_named(
        "Wholegrain Oat Flakes",
        None,
        RawNutrients {
            proteins_100g: Some(12.0),
            fiber_100g: Some(6.0),
            ..Default::default()
        },
    ))));
    let ocr = Arc::new(ScriptedOcr::reading("Wholegrain Oat Flakes 500g"));
    let vision = Arc::new(ScriptedVision::new(StageScript::Miss));
    let resolver = build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await;

    let (product, warnings) = resolved(
        resolver
            .resolve(ScanInput::Image(b"oat-box".to_vec()))
            .await
            .unwrap(),
    );
    assert_eq!(product.source, Source::TextSearch);
    assert_eq!(product.name, "Wholegrain Oat Flakes");
    assert_eq!(product.health_score, 100);
    assert!(warnings.is_empty());
    // No barcode-shaped digits, so the registry stage never ran
    assert_eq!(registry.call_count(), 0);

    // Barcode-less products are cached under the image content hash
    let (cached, _) = resolved(
        resolver
            .resolve(ScanInput::Image(b"oat-box".to_vec()))
            .await
            .unwrap(),
    );
    assert_eq!(cached.source, Source::Cache);
    assert_eq!(cached.guid, product.guid);
    assert_eq!(search.call_count(), 1);
}

#[tokio::test]
async fn test_failed_ocr_skips_to_vision_and_carries_vendor_warnings() {
    let mut identified = raw_named(
        "Mystery Snack",
        None,
        RawNutrients {
            sugars_100g: Some(29.0),
            ..Default::default()
        },
    );
    identified.warnings = vec!["May contain traces of nuts".to_string()];

    let registry = Arc::new(ScriptedRegistry::scripted(StageScript::Miss));
    let search = Arc::new(ScriptedSearch::new(StageScript::Miss));
    let ocr = Arc::new(ScriptedOcr::failing());
    let vision = Arc::new(ScriptedVision::new(StageScript::Hit(identified)));
    let resolver = build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await;

    let (product, warnings) = resolved(
        resolver
            .resolve(ScanInput::Image(b"mystery-snack".to_vec()))
            .await
            .unwrap(),
    );
    assert_eq!(product.source, Source::VisionFallback);
    assert_eq!(product.health_score, 90);
    // Scorer warnings first, vendor advisories after
    assert_eq!(
        warnings,
        vec![
            "High Sugar Content".to_string(),
            "May contain traces of nuts".to_string(),
        ]
    );
    // Without OCR text there is nothing to search with
    assert_eq!(search.call_count(), 0);

    // Cache hits rederive scorer warnings only; vendor advisories were a
    // property of the original resolution
    let (cached, cached_warnings) = resolved(
        resolver
            .resolve(ScanInput::Image(b"mystery-snack".to_vec()))
            .await
            .unwrap(),
    );
    assert_eq!(cached.source, Source::Cache);
    assert_eq!(cached_warnings, vec!["High Sugar Content".to_string()]);
    assert_eq!(vision.call_count(), 1);
}

#[tokio::test]
async fn test_image_with_no_signal_anywhere_is_not_found() {
    let registry = Arc::new(ScriptedRegistry::scripted(StageScript::Miss));
    let search = Arc::new(ScriptedSearch::new(StageScript::Miss));
    let ocr = Arc::new(ScriptedOcr::reading("ingredients listed elsewhere"));
    let vision = Arc::new(ScriptedVision::new(StageScript::Miss));
    let resolver = build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await;

    for round in 1..=2 {
        let resolution = resolver
            .resolve(ScanInput::Image(b"blurry-photo".to_vec()))
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::NotFound { timed_out: false });
        // Nothing was persisted, so every stage runs again next time
        assert_eq!(ocr.call_count(), round);
        assert_eq!(search.call_count(), round);
        assert_eq!(vision.call_count(), round);
    }
    // The OCR text had no barcode-shaped digits
    assert_eq!(registry.call_count(), 0);
}

#[tokio::test]
async fn test_stage_failures_fall_through_to_vision() {
    let registry = Arc::new(ScriptedRegistry::scripted(StageScript::Fail(
        "registry 503".to_string(),
    )));
    let search = Arc::new(ScriptedSearch::new(StageScript::Fail(
        "search unavailable".to_string(),
    )));
    let ocr = Arc::new(ScriptedOcr::reading("Choco 4006381333931 Crunch"));
    let vision = Arc::new(ScriptedVision::new(StageScript::Hit(raw_named(
        "Choco Crunch Bar",
        None,
        RawNutrients::default(),
    ))));
    let resolver = build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await;

    let (product, _) = resolved(
        resolver
            .resolve(ScanInput::Image(b"glare-photo".to_vec()))
            .await
            .unwrap(),
    );
    assert_eq!(product.source, Source::VisionFallback);
    assert_eq!(registry.call_count(), 1);
    assert_eq!(search.call_count(), 1);
    assert_eq!(vision.call_count(), 1);
}

// ============================================================================
// Budget and concurrency
// ============================================================================

#[tokio::test]
async fn test_exhausted_budget_reports_timed_out_not_found() {
    let registry = Arc::new(ScriptedRegistry::scripted(StageScript::Hit(sugary_snack(
        Some("4006381333931"),
    ))));
    let search = Arc::new(ScriptedSearch::new(StageScript::Miss));
    let ocr = Arc::new(ScriptedOcr::failing());
    let vision = Arc::new(ScriptedVision::new(StageScript::Miss));

    let mut timeouts = test_timeouts();
    timeouts.request_budget = Duration::ZERO;
    let resolver = build_resolver(&registry, &search, &ocr, &vision, timeouts).await;

    let resolution = resolver
        .resolve(ScanInput::Barcode("4006381333931".to_string()))
        .await
        .unwrap();
    assert_eq!(resolution, Resolution::NotFound { timed_out: true });
    // The lookup future was never polled
    assert_eq!(registry.call_count(), 0);
}

#[tokio::test]
async fn test_concurrent_scans_of_one_barcode_hit_registry_once() {
    let registry = Arc::new(ScriptedRegistry::slow(
        StageScript::Hit(sugary_snack(Some("4006381333931"))),
        Duration::from_millis(100),
    ));
    let search = Arc::new(ScriptedSearch::new(StageScript::Miss));
    let ocr = Arc::new(ScriptedOcr::failing());
    let vision = Arc::new(ScriptedVision::new(StageScript::Miss));
    let resolver = Arc::new(build_resolver(&registry, &search, &ocr, &vision, test_timeouts()).await);

    let mut join_set = JoinSet::new();
    for _ in 0..8 {
        let resolver = Arc::clone(&resolver);
        join_set.spawn(async move {
            resolver
                .resolve(ScanInput::Barcode("4006381333931".to_string()))
                .await
        });
    }

    let mut guids = HashSet::new();
    let mut resolutions = 0;
    while let Some(joined) = join_set.join_next().await {
        let (product, _) = resolved(joined.unwrap().unwrap());
        guids.insert(product.guid);
        resolutions += 1;
    }

    assert_eq!(resolutions, 8);
    // Every caller saw the same record, produced by a single chain run
    assert_eq!(guids.len(), 1);
    assert_eq!(registry.call_count(), 1);
}
