//! Places text-search geodata provider implementation.
//!
//! This module provides the cascade's grid-search layer through a
//! Google-Places-style Text Search API:
//! - Free-form queries like "bairros de {name} {country}"
//! - Cursor pagination via `next_page_token`, which needs a short settle
//!   delay before it becomes valid server-side
//! - Status strings inside 200 responses (OK, ZERO_RESULTS, OVER_QUERY_LIMIT)
//!
//! Requires an API key.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::DiscoveryError;
use crate::models::{Candidate, QueryContext, SourceProvider};
use crate::provider::{
    is_discoverable_area, radius_for_tags, GeoDataProvider, Page, PageSource, PageToken, Pacing,
    Pager, ProviderCapabilities,
};
use crate::ratelimit::{RateBudget, RateLimiter};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
const PROVIDER_ID: &str = "PLACES_TEXT";

/// The API serves at most three pages of 20 results per query.
const MAX_PAGES: usize = 3;

/// Advised wait after an OVER_QUERY_LIMIT response.
const QUOTA_RETRY: Duration = Duration::from_secs(120);

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TextSearchEnvelope {
    #[serde(default)]
    results: Vec<PlaceRow>,
    status: String,
    error_message: Option<String>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceRow {
    name: String,
    geometry: Geometry,
    /// Place types, most specific first
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

// ============================================================================
// PlacesTextProvider
// ============================================================================

/// Places text-search geodata provider.
///
/// Last resort before the proximity grid; only consulted when the earlier
/// layers leave the pool nearly empty.
pub struct PlacesTextProvider {
    client: Client,
    api_key: String,
    limiter: Arc<RateLimiter>,
    pacing: Pacing,
}

impl PlacesTextProvider {
    pub fn new(api_key: String, limiter: Arc<RateLimiter>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            limiter,
            pacing: Pacing::default(),
        }
    }

    /// Override the pacing policy (tests inject zero delays).
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    async fn fetch(&self, params: &[(&str, String)]) -> Result<TextSearchEnvelope, DiscoveryError> {
        let provider_id = Cow::Borrowed(PROVIDER_ID);
        let decision = self.limiter.check(&provider_id);
        if !decision.allowed {
            return Err(DiscoveryError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                retry_after: decision.wait,
            });
        }

        let url = format!("{}/textsearch/json", BASE_URL);
        let mut request = self.client.get(&url).query(&[("key", &self.api_key)]);
        for (key, value) in params {
            request = request.query(&[(key, value)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                DiscoveryError::Http {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("Request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Http {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {} - {}", status, body),
            });
        }

        let text = response.text().await.map_err(|e| DiscoveryError::Http {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to read response: {}", e),
        })?;

        let envelope: TextSearchEnvelope =
            serde_json::from_str(&text).map_err(|e| DiscoveryError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;
        check_envelope_status(&envelope)?;

        self.limiter.record(&provider_id);
        Ok(envelope)
    }

    fn normalize_row(&self, row: &PlaceRow) -> Option<Candidate> {
        if !is_discoverable_area(&row.types) {
            return None;
        }

        let candidate = Candidate::new(
            row.name.clone(),
            row.geometry.location.lat,
            row.geometry.location.lng,
            radius_for_tags(&row.types),
            SourceProvider::GridSearch,
            row.types.clone(),
        );
        if !candidate.has_valid_geometry() {
            warn!("PlacesText: invalid geometry for '{}'", row.name);
            return None;
        }
        Some(candidate)
    }
}

/// Cursor-paginated text-search pages for one query string.
struct TextSearchPages<'a> {
    provider: &'a PlacesTextProvider,
    query: String,
}

#[async_trait]
impl PageSource for TextSearchPages<'_> {
    type Item = Candidate;

    async fn fetch_page(
        &self,
        token: Option<&PageToken>,
    ) -> Result<Page<Candidate>, DiscoveryError> {
        let params: Vec<(&str, String)> = match token {
            Some(PageToken::Cursor(cursor)) => vec![("pagetoken", cursor.clone())],
            Some(PageToken::Offset(_)) | None => vec![("query", self.query.clone())],
        };

        let envelope = self.provider.fetch(&params).await?;

        let items: Vec<Candidate> = envelope
            .results
            .iter()
            .filter_map(|row| self.provider.normalize_row(row))
            .collect();
        let next = envelope.next_page_token.map(PageToken::Cursor);

        Ok(Page { items, next })
    }
}

// ============================================================================
// GeoDataProvider Implementation
// ============================================================================

#[async_trait]
impl GeoDataProvider for PlacesTextProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_areas: true,
            supports_states: false,
            supports_cities: false,
        }
    }

    fn rate_budget(&self) -> RateBudget {
        RateBudget {
            window: Duration::from_secs(3600),
            max_requests: 1000,
        }
    }

    async fn query(&self, context: &QueryContext) -> Result<Vec<Candidate>, DiscoveryError> {
        let entity = &context.entity;
        let query = match entity.language_code() {
            "pt" => format!("bairros de {} {}", entity.name, entity.country_code),
            "es" => format!("barrios de {} {}", entity.name, entity.country_code),
            _ => format!("neighborhoods of {} {}", entity.name, entity.country_code),
        };

        debug!("PlacesText: searching '{}'", query);

        let source = TextSearchPages {
            provider: self,
            query,
        };
        // Follow-up tokens are rejected until they settle server-side
        let pager = Pager::new(
            &source,
            MAX_PAGES,
            self.pacing.token_settle,
            context.cancel.clone(),
        );
        let candidates = pager.collect().await?;

        debug!(
            "PlacesText: {} candidates for '{}'",
            candidates.len(),
            entity.name
        );
        Ok(candidates)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Map the envelope's status string to an error. OK and ZERO_RESULTS are
/// both success; ZERO_RESULTS simply carries no rows.
fn check_envelope_status(envelope: &TextSearchEnvelope) -> Result<(), DiscoveryError> {
    match envelope.status.as_str() {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" => Err(DiscoveryError::RateLimited {
            provider: PROVIDER_ID.to_string(),
            retry_after: QUOTA_RETRY,
        }),
        other => Err(DiscoveryError::Http {
            provider: PROVIDER_ID.to_string(),
            message: format!(
                "{}: {}",
                other,
                envelope.error_message.as_deref().unwrap_or("no detail")
            ),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
