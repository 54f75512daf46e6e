//! Raw-to-canonical schema normalization
//!
//! Maps the heterogeneous shapes returned by lookup clients onto the fixed
//! `Nutrition` schema. Deterministic and total: any `RawProduct` input yields
//! a schema-complete `NormalizedProduct`.
//!
//! Field rules:
//! - Name and brand are trimmed; empty values become the `UNKNOWN_PRODUCT` /
//!   `UNKNOWN_BRAND` sentinels.
//! - Energy precedence: a positive kcal field wins; otherwise a positive kJ
//!   field divided by 4.184; otherwise 0. A zero kcal value falls through to
//!   the kJ field rather than shadowing it.
//! - Salt and sodium derive from each other when only one is present
//!   (salt = sodium x 2.5).
//! - Absent, non-finite, or negative nutrient values become 0.

use crate::product::{
    NormalizedProduct, Nutrition, RawProduct, UNKNOWN_BRAND, UNKNOWN_PRODUCT,
};

/// Kilojoules per kilocalorie, for sources that only report kJ energy
const KJ_PER_KCAL: f64 = 4.184;

/// Grams of salt per gram of sodium
const SALT_PER_SODIUM: f64 = 2.5;

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn grams(value: Option<f64>) -> f64 {
    positive(value).unwrap_or(0.0)
}

fn text_or(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => fallback.to_string(),
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Normalize a raw lookup result into the canonical schema
///
/// `barcode_hint` is the code the caller scanned or extracted; it takes
/// precedence over whatever code the source reported for the match.
pub fn normalize(raw: RawProduct, barcode_hint: Option<&str>) -> NormalizedProduct {
    let n = &raw.nutrients;

    let energy_kcal_100g = positive(n.energy_kcal_100g)
        .or_else(|| positive(n.energy_kj_100g).map(|kj| kj / KJ_PER_KCAL))
        .unwrap_or(0.0);

    let salt_100g = positive(n.salt_100g)
        .or_else(|| positive(n.sodium_100g).map(|sodium| sodium * SALT_PER_SODIUM))
        .unwrap_or(0.0);

    let sodium_100g = positive(n.sodium_100g)
        .or_else(|| positive(n.salt_100g).map(|salt| salt / SALT_PER_SODIUM))
        .unwrap_or(0.0);

    let nutrition = Nutrition {
        energy_kcal_100g,
        fat_100g: grams(n.fat_100g),
        saturated_fat_100g: grams(n.saturated_fat_100g),
        sugars_100g: grams(n.sugars_100g),
        proteins_100g: grams(n.proteins_100g),
        carbohydrates_100g: grams(n.carbohydrates_100g),
        fiber_100g: grams(n.fiber_100g),
        sodium_100g,
        salt_100g,
    };

    let barcode = trimmed(barcode_hint).or_else(|| trimmed(raw.barcode.as_deref()));

    NormalizedProduct {
        barcode,
        name: text_or(raw.name.as_deref(), UNKNOWN_PRODUCT),
        brand: text_or(raw.brand.as_deref(), UNKNOWN_BRAND),
        nutrition,
        ingredients_text: trimmed(raw.ingredients_text.as_deref()),
        image_url: trimmed(raw.image_url.as_deref()),
        warnings: raw.warnings,
    }
}
