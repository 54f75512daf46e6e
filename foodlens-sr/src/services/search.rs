//! OpenFoodFacts free-text search client
//!
//! Drives the legacy `cgi/search.pl` endpoint with `page_size=1` and keeps
//! only the best-ranked match. Queries are collapsed to single spaces and
//! capped at 50 characters; anything shorter than 2 characters short-circuits
//! to a miss without a network call.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use foodlens_common::RawProduct;

use crate::services::registry::{map_transport_error, OffProduct};
use crate::types::{LookupError, TextSearch};

const MIN_QUERY_CHARS: usize = 2;
const MAX_QUERY_CHARS: usize = 50;

/// Text search client backed by the OpenFoodFacts search API
pub struct OpenFoodFactsSearch {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenFoodFactsSearch {
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
impl TextSearch for OpenFoodFactsSearch {
    async fn search(&self, query: &str) -> Result<Option<RawProduct>, LookupError> {
        let query = match sanitize_query(query) {
            Some(q) => q,
            None => {
                tracing::debug!("Search query too short, skipping text search");
                return Ok(None);
            }
        };

        let url = format!("{}/cgi/search.pl", self.base_url);
        tracing::debug!(query = %query, "Querying text search");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("search_terms", query.as_str()),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", "1"),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();

        if status.is_client_error() {
            tracing::debug!(query = %query, status = %status, "Text search rejected the query");
            return Ok(None);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::Upstream(format!(
                "search returned {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await.map_err(map_transport_error)?;
        let raw = parse_search_payload(&body, &query)?;

        match &raw {
            Some(product) => tracing::info!(
                query = %query,
                name = %product.name.as_deref().unwrap_or("<unnamed>"),
                "Text search hit"
            ),
            None => tracing::debug!(query = %query, "Text search returned no products"),
        }

        Ok(raw)
    }
}

/// Collapse whitespace, cap the length, and require at least 2 characters
pub(crate) fn sanitize_query(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_QUERY_CHARS).collect();
    let capped = capped.trim_end().to_string();

    if capped.chars().count() < MIN_QUERY_CHARS {
        None
    } else {
        Some(capped)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    products: Option<Vec<OffProduct>>,
}

/// Decode a 2xx search body into the best match, if any
///
/// A match without a usable name takes the query text as its name, which is
/// the closest label the caller has for what was scanned.
fn parse_search_payload(body: &str, query: &str) -> Result<Option<RawProduct>, LookupError> {
    let payload: SearchResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Decode(e.to_string()))?;

    let first = match payload.products.and_then(|mut p| {
        if p.is_empty() {
            None
        } else {
            Some(p.remove(0))
        }
    }) {
        Some(product) => product,
        None => return Ok(None),
    };

    let mut raw = first.into_raw();
    let has_name = raw
        .name
        .as_deref()
        .map(str::trim)
        .is_some_and(|n| !n.is_empty());
    if !has_name {
        raw.name = Some(query.to_string());
    }

    Ok(Some(raw))
}

// ============================================================================
// Tests
// ============================================================================
