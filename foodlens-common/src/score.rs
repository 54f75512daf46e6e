//! Health score derivation
//!
//! Derives a 0-100 score from per-100g nutrition facts using independent,
//! individually capped adjustments against a baseline of 100. The score is
//! always computed locally; upstream-supplied scores are discarded before
//! this layer. Pure and deterministic: same nutrition, same score, same
//! warnings in the same order.

use serde::{Deserialize, Serialize};

use crate::product::Nutrition;

/// Sugar penalty applies above this many grams per 100 g
const SUGAR_THRESHOLD_G: f64 = 25.0;
/// Calorie penalty applies above this many kcal per 100 g
const CALORIE_THRESHOLD_KCAL: f64 = 300.0;
/// Sodium penalty applies above this many milligrams per 100 g
const SODIUM_THRESHOLD_MG: f64 = 500.0;
/// Protein bonus applies above this many grams per 100 g
const PROTEIN_THRESHOLD_G: f64 = 5.0;
/// Fiber bonus applies above this many grams per 100 g
const FIBER_THRESHOLD_G: f64 = 3.0;

const SUGAR_PENALTY_PER_G: f64 = 2.5;
const SUGAR_PENALTY_CAP: f64 = 30.0;
const CALORIE_PENALTY_PER_KCAL: f64 = 0.05;
const CALORIE_PENALTY_CAP: f64 = 20.0;
const SODIUM_PENALTY_PER_MG: f64 = 0.02;
const SODIUM_PENALTY_CAP: f64 = 15.0;
const PROTEIN_BONUS_PER_G: f64 = 2.0;
const PROTEIN_BONUS_CAP: f64 = 15.0;
const FIBER_BONUS_PER_G: f64 = 3.0;
const FIBER_BONUS_CAP: f64 = 10.0;

/// Qualitative bucket for a derived score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    /// Score 80-100
    Excellent,
    /// Score 60-79
    Good,
    /// Score 40-59
    Moderate,
    /// Score 0-39
    Poor,
}

impl Rating {
    /// Bucket for a clamped integer score
    pub fn for_value(value: u8) -> Self {
        match value {
            80..=u8::MAX => Rating::Excellent,
            60..=79 => Rating::Good,
            40..=59 => Rating::Moderate,
            _ => Rating::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Moderate => "moderate",
            Rating::Poor => "poor",
        }
    }
}

/// Derived health score with its qualitative rating and trigger warnings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthScore {
    /// Clamped, rounded score in [0, 100]
    pub value: u8,
    pub rating: Rating,
    /// One entry per penalty whose threshold was crossed, in penalty order
    pub warnings: Vec<String>,
}

/// Compute the health score for a normalized nutrition record
///
/// Nutrition values are expected non-negative (the normalizer guarantees
/// this); sodium is taken in grams and converted to milligrams for the
/// threshold comparison. Each adjustment is independent and capped, so the
/// score is monotone in every single nutrient with the others held fixed.
pub fn score(nutrition: &Nutrition) -> HealthScore {
    let mut value: f64 = 100.0;
    let mut warnings = Vec::new();

    if nutrition.sugars_100g > SUGAR_THRESHOLD_G {
        let over = nutrition.sugars_100g - SUGAR_THRESHOLD_G;
        value -= (over * SUGAR_PENALTY_PER_G).min(SUGAR_PENALTY_CAP);
        warnings.push("High Sugar Content".to_string());
    }

    if nutrition.energy_kcal_100g > CALORIE_THRESHOLD_KCAL {
        let over = nutrition.energy_kcal_100g - CALORIE_THRESHOLD_KCAL;
        value -= (over * CALORIE_PENALTY_PER_KCAL).min(CALORIE_PENALTY_CAP);
        warnings.push("High Calorie Density".to_string());
    }

    let sodium_mg = nutrition.sodium_100g * 1000.0;
    if sodium_mg > SODIUM_THRESHOLD_MG {
        let over = sodium_mg - SODIUM_THRESHOLD_MG;
        value -= (over * SODIUM_PENALTY_PER_MG).min(SODIUM_PENALTY_CAP);
        warnings.push("High Sodium Content".to_string());
    }

    if nutrition.proteins_100g > PROTEIN_THRESHOLD_G {
        let over = nutrition.proteins_100g - PROTEIN_THRESHOLD_G;
        value += (over * PROTEIN_BONUS_PER_G).min(PROTEIN_BONUS_CAP);
    }

    if nutrition.fiber_100g > FIBER_THRESHOLD_G {
        let over = nutrition.fiber_100g - FIBER_THRESHOLD_G;
        value += (over * FIBER_BONUS_PER_G).min(FIBER_BONUS_CAP);
    }

    let value = value.clamp(0.0, 100.0).round() as u8;

    HealthScore {
        value,
        rating: Rating::for_value(value),
        warnings,
    }
}
