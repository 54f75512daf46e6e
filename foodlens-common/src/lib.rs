//! # FoodLens Common Library
//!
//! Shared code for the FoodLens services including:
//! - Canonical product and nutrition model
//! - Raw-to-canonical schema normalization
//! - Health score derivation
//! - Error taxonomy

pub mod error;
pub mod normalize;
pub mod product;
pub mod score;

pub use error::{Error, Result};
pub use product::{NormalizedProduct, Nutrition, Product, RawNutrients, RawProduct, Source};
pub use score::{HealthScore, Rating};
