//! OpenFoodFacts barcode registry client
//!
//! Queries the v2 product-by-barcode endpoint. Status semantics:
//! - 2xx with a product payload: hit
//! - 2xx with `status: 0` or no product, or any 4xx: the registry does not
//!   know the code (`Ok(None)`)
//! - 5xx, network failure, timeout, undecodable 2xx: soft `LookupError`

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use foodlens_common::{RawNutrients, RawProduct};

use crate::types::{BarcodeRegistry, LookupError};

/// Barcode registry client backed by the OpenFoodFacts product API
pub struct OpenFoodFactsRegistry {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenFoodFactsRegistry {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Upstream(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl BarcodeRegistry for OpenFoodFactsRegistry {
    async fn lookup(&self, barcode: &str) -> Result<Option<RawProduct>, LookupError> {
        if !barcode_format_is_plausible(barcode) {
            // Forwarded anyway: the registry resolves unknown formats to a miss
            tracing::debug!(barcode = %barcode, "Unusual barcode format");
        }

        let url = format!("{}/api/v2/product/{}.json", self.base_url, barcode);
        tracing::debug!(barcode = %barcode, url = %url, "Querying barcode registry");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();

        if status.is_client_error() {
            tracing::debug!(barcode = %barcode, status = %status, "Registry does not know this barcode");
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::Upstream(format!(
                "registry returned {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await.map_err(map_transport_error)?;
        let raw = parse_registry_payload(&body)?;

        match &raw {
            Some(product) => tracing::info!(
                barcode = %barcode,
                name = %product.name.as_deref().unwrap_or("<unnamed>"),
                "Registry hit"
            ),
            None => tracing::debug!(barcode = %barcode, "Registry miss"),
        }

        Ok(raw)
    }
}

/// 8-13 digits is the expected retail barcode range (EAN-8 through EAN-13)
pub(crate) fn barcode_format_is_plausible(barcode: &str) -> bool {
    (8..=13).contains(&barcode.len()) && barcode.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn map_transport_error(err: reqwest::Error) -> LookupError {
    if err.is_timeout() {
        LookupError::Timeout
    } else {
        LookupError::Upstream(err.to_string())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    status: Option<i64>,
    product: Option<OffProduct>,
}

/// Product shape shared by the v2 lookup and the legacy search endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct OffProduct {
    pub(crate) code: Option<String>,
    pub(crate) product_name: Option<String>,
    pub(crate) brands: Option<String>,
    pub(crate) ingredients_text: Option<String>,
    pub(crate) image_url: Option<String>,
    #[serde(default)]
    pub(crate) nutriments: OffNutriments,
}

/// Upstream nutriment keys, including the hyphenated variants
///
/// `energy_100g` is the kilojoule field; the kcal variant carries its unit in
/// the key. Values are occasionally strings upstream, so every field parses
/// leniently.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OffNutriments {
    #[serde(rename = "energy-kcal_100g", default, deserialize_with = "lenient_f64")]
    pub(crate) energy_kcal_100g: Option<f64>,
    #[serde(rename = "energy_100g", default, deserialize_with = "lenient_f64")]
    pub(crate) energy_kj_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub(crate) fat_100g: Option<f64>,
    #[serde(rename = "saturated-fat_100g", default, deserialize_with = "lenient_f64")]
    pub(crate) saturated_fat_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub(crate) sugars_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub(crate) proteins_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub(crate) carbohydrates_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub(crate) fiber_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub(crate) sodium_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub(crate) salt_100g: Option<f64>,
}

/// Accept numbers, numeric strings, or anything else as absent
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

impl OffProduct {
    pub(crate) fn into_raw(self) -> RawProduct {
        let n = self.nutriments;
        RawProduct {
            barcode: self.code,
            name: self.product_name,
            brand: self.brands,
            nutrients: RawNutrients {
                energy_kcal_100g: n.energy_kcal_100g,
                energy_kj_100g: n.energy_kj_100g,
                fat_100g: n.fat_100g,
                saturated_fat_100g: n.saturated_fat_100g,
                sugars_100g: n.sugars_100g,
                proteins_100g: n.proteins_100g,
                carbohydrates_100g: n.carbohydrates_100g,
                fiber_100g: n.fiber_100g,
                sodium_100g: n.sodium_100g,
                salt_100g: n.salt_100g,
            },
            ingredients_text: self.ingredients_text,
            image_url: self.image_url,
            warnings: Vec::new(),
        }
    }
}

/// Decode a 2xx registry body into a hit or a miss
fn parse_registry_payload(body: &str) -> Result<Option<RawProduct>, LookupError> {
    let payload: RegistryResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Decode(e.to_string()))?;

    if payload.status == Some(0) {
        return Ok(None);
    }

    Ok(payload.product.map(OffProduct::into_raw))
}

// ============================================================================
// Tests
// ============================================================================
