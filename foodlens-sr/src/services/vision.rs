//! Vision model fallback client (Gemini)
//!
//! Last-resort identification for images no other stage could resolve. The
//! model is prompted for a single JSON object; anything else it replies is
//! treated as "not identified". The model's own health estimate and category
//! are discarded, scoring is always local.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use std::time::Duration;

use foodlens_common::product::{RawNutrients, RawProduct};

use crate::services::registry::map_transport_error;
use crate::types::{LookupError, VisionModel};

const VISION_PROMPT: &str = "Identify the food product in this image and reply with exactly one JSON object, no prose and no markdown, in this shape: \
{\"name\": string, \"brand\": string, \"calories\": number (kcal per 100g), \"fat\": number (g per 100g), \"sugar\": number (g per 100g), \"protein\": number (g per 100g), \"carbs\": number (g per 100g), \"category\": string, \"healthScore\": number 0-100, \"ingredients\": [string], \"warnings\": [string]}. \
If the product cannot be identified, reply with null.";

/// Client for the Gemini `generateContent` endpoint
pub struct GeminiVisionClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiVisionClient {
    /// Create a client; `api_key` of `None` makes every lookup fail soft
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Upstream(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl VisionModel for GeminiVisionClient {
    async fn identify(&self, image: &[u8]) -> Result<Option<RawProduct>, LookupError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LookupError::Upstream("Vision API key not configured".to_string()))?;

        let mime_type = infer::get(image)
            .map(|kind| kind.mime_type())
            .unwrap_or("image/jpeg");

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": VISION_PROMPT },
                    {
                        "inline_data": {
                            "mime_type": mime_type,
                            "data": base64::engine::general_purpose::STANDARD.encode(image),
                        }
                    }
                ]
            }]
        });

        tracing::debug!(model = %self.model, mime_type, bytes = image.len(), "Querying vision model");

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LookupError::Upstream(format!(
                "Vision model returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let payload = response
            .text()
            .await
            .map_err(|e| LookupError::Upstream(format!("Failed to read response body: {}", e)))?;

        parse_vision_payload(&payload)
    }
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<ResponseCandidate>>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ContentPart>>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

/// Product JSON the model is prompted for
///
/// `category` and `healthScore` are intentionally absent, they are never
/// carried into a resolution.
#[derive(Debug, Deserialize)]
struct VisionProduct {
    name: Option<String>,
    brand: Option<String>,
    calories: Option<f64>,
    fat: Option<f64>,
    sugar: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    ingredients: Option<Vec<String>>,
    warnings: Option<Vec<String>>,
}

/// Parse a `generateContent` response body
///
/// An undecodable envelope is a `Decode` error; a decodable envelope whose
/// model text is missing or is not product JSON is a clean miss.
pub(crate) fn parse_vision_payload(body: &str) -> Result<Option<RawProduct>, LookupError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| LookupError::Decode(format!("Invalid vision response: {}", e)))?;

    let Some(text) = extract_model_text(response) else {
        tracing::debug!("Vision response carried no model text");
        return Ok(None);
    };

    // Models wrap JSON in markdown fences despite the prompt
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    match serde_json::from_str::<Option<VisionProduct>>(cleaned) {
        Ok(Some(product)) => Ok(Some(into_raw(product))),
        Ok(None) => Ok(None),
        Err(e) => {
            tracing::debug!(error = %e, "Vision model text was not product JSON");
            Ok(None)
        }
    }
}

fn extract_model_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates?
        .into_iter()
        .next()?
        .content?
        .parts?
        .into_iter()
        .next()?
        .text
}

fn into_raw(product: VisionProduct) -> RawProduct {
    RawProduct {
        barcode: None,
        name: product.name,
        brand: product.brand,
        ingredients_text: product
            .ingredients
            .filter(|list| !list.is_empty())
            .map(|list| list.join(", ")),
        image_url: None,
        nutrients: RawNutrients {
            energy_kcal_100g: product.calories,
            fat_100g: product.fat,
            sugars_100g: product.sugar,
            proteins_100g: product.protein,
            carbohydrates_100g: product.carbs,
            ..RawNutrients::default()
        },
        warnings: product.warnings.unwrap_or_default(),
    }
}

// ============================================================================
// Tests
// ============================================================================
