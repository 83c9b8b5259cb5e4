//! Places nearby-search geodata provider implementation.
//!
//! This module provides the cascade's proximity-grid layer through a
//! Google-Places-style Nearby Search API. Instead of a text query, it
//! fans a fixed 3x3 grid of search points out from the entity's center
//! and runs one radius-bounded nearby search per cell, collecting
//! neighborhood-typed results from all nine.
//!
//! Requires an API key. Cells are paced and the fan-out stops at the
//! first cancellation.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::DiscoveryError;
use crate::models::{Candidate, QueryContext, SourceProvider};
use crate::provider::{
    is_discoverable_area, radius_for_tags, GeoDataProvider, Pacing, ProviderCapabilities,
};
use crate::ratelimit::{RateBudget, RateLimiter};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
const PROVIDER_ID: &str = "PLACES_NEARBY";

/// Search radius for each grid cell, meters.
const CELL_RADIUS_M: u32 = 2000;

/// Grid spacing in degrees, roughly 2.2 km at the equator so that
/// adjacent cell circles overlap slightly.
const GRID_STEP_DEG: f64 = 0.02;

/// Cell offsets from center: the center itself, then the four cardinal
/// and four diagonal neighbors.
const GRID_OFFSETS: [(f64, f64); 9] = [
    (0.0, 0.0),
    (GRID_STEP_DEG, 0.0),
    (-GRID_STEP_DEG, 0.0),
    (0.0, GRID_STEP_DEG),
    (0.0, -GRID_STEP_DEG),
    (GRID_STEP_DEG, GRID_STEP_DEG),
    (GRID_STEP_DEG, -GRID_STEP_DEG),
    (-GRID_STEP_DEG, GRID_STEP_DEG),
    (-GRID_STEP_DEG, -GRID_STEP_DEG),
];

/// Advised wait after an OVER_QUERY_LIMIT response.
const QUOTA_RETRY: Duration = Duration::from_secs(120);

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct NearbyEnvelope {
    #[serde(default)]
    results: Vec<NearbyRow>,
    status: String,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyRow {
    name: String,
    geometry: Geometry,
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
// PlacesNearbyProvider
// ============================================================================

/// Places nearby-search geodata provider.
///
/// The final real-provider layer; nine requests per entity, so it only
/// runs when every cheaper layer has come up nearly empty.
pub struct PlacesNearbyProvider {
    client: Client,
    api_key: String,
    limiter: Arc<RateLimiter>,
    pacing: Pacing,
}

impl PlacesNearbyProvider {
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

    async fn fetch_cell(&self, lat: f64, lng: f64) -> Result<Vec<NearbyRow>, DiscoveryError> {
        let provider_id = Cow::Borrowed(PROVIDER_ID);
        let decision = self.limiter.check(&provider_id);
        if !decision.allowed {
            return Err(DiscoveryError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                retry_after: decision.wait,
            });
        }

        let url = format!("{}/nearbysearch/json", BASE_URL);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("location", &format!("{},{}", lat, lng)),
                ("radius", &CELL_RADIUS_M.to_string()),
                ("type", "neighborhood"),
            ])
            .send()
            .await
            .map_err(|e| {
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

        let envelope: NearbyEnvelope =
            serde_json::from_str(&text).map_err(|e| DiscoveryError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;
        check_envelope_status(&envelope)?;

        self.limiter.record(&provider_id);
        Ok(envelope.results)
    }

    fn normalize_row(&self, row: &NearbyRow) -> Option<Candidate> {
        if !is_discoverable_area(&row.types) {
            return None;
        }

        let candidate = Candidate::new(
            row.name.clone(),
            row.geometry.location.lat,
            row.geometry.location.lng,
            radius_for_tags(&row.types),
            SourceProvider::ProximityGrid,
            row.types.clone(),
        );
        if !candidate.has_valid_geometry() {
            warn!("PlacesNearby: invalid geometry for '{}'", row.name);
            return None;
        }
        Some(candidate)
    }
}

// ============================================================================
// GeoDataProvider Implementation
// ============================================================================

#[async_trait]
impl GeoDataProvider for PlacesNearbyProvider {
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
        debug!(
            "PlacesNearby: {}-cell grid fan-out around ({}, {})",
            GRID_OFFSETS.len(),
            entity.lat,
            entity.lng
        );

        let mut candidates: Vec<Candidate> = Vec::new();
        for (i, (dlat, dlng)) in GRID_OFFSETS.iter().enumerate() {
            if context.cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }
            if i > 0 && !self.pacing.inter_page.is_zero() {
                sleep(self.pacing.inter_page).await;
            }

            let rows = self
                .fetch_cell(entity.lat + dlat, entity.lng + dlng)
                .await?;
            for row in &rows {
                let Some(candidate) = self.normalize_row(row) else {
                    continue;
                };
                // Adjacent cells overlap; drop exact repeats here and leave
                // fuzzy matching to the deduplicator
                let seen = candidates.iter().any(|c| {
                    c.name.eq_ignore_ascii_case(&candidate.name)
                        && c.center_lat == candidate.center_lat
                        && c.center_lng == candidate.center_lng
                });
                if !seen {
                    candidates.push(candidate);
                }
            }
        }

        debug!(
            "PlacesNearby: {} candidates for '{}'",
            candidates.len(),
            entity.name
        );
        Ok(candidates)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn check_envelope_status(envelope: &NearbyEnvelope) -> Result<(), DiscoveryError> {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> PlacesNearbyProvider {
        PlacesNearbyProvider::new("test-key".to_string(), Arc::new(RateLimiter::new()))
            .with_pacing(Pacing::none())
    }

    #[test]
    fn test_provider_id_and_capabilities() {
        let p = provider();
        assert_eq!(p.id(), "PLACES_NEARBY");
        assert!(p.capabilities().supports_areas);
        assert!(!p.capabilities().supports_cities);
    }

    #[test]
    fn test_grid_covers_center_and_eight_neighbors() {
        assert_eq!(GRID_OFFSETS.len(), 9);
        assert_eq!(GRID_OFFSETS[0], (0.0, 0.0));

        let distinct: std::collections::HashSet<String> = GRID_OFFSETS
            .iter()
            .map(|(a, b)| format!("{:.3},{:.3}", a, b))
            .collect();
        assert_eq!(distinct.len(), 9);
    }

    #[test]
    fn test_envelope_parsing() {
        let json = r#"{
            "results": [
                {
                    "name": "Vila Madalena",
                    "geometry": { "location": { "lat": -23.5544, "lng": -46.6922 } },
                    "types": ["neighborhood", "political"]
                }
            ],
            "status": "OK"
        }"#;

        let envelope: NearbyEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.results.len(), 1);
        assert!(check_envelope_status(&envelope).is_ok());
    }

    #[test]
    fn test_over_query_limit_maps_to_rate_limited() {
        let envelope = NearbyEnvelope {
            results: vec![],
            status: "OVER_QUERY_LIMIT".to_string(),
            error_message: None,
        };
        let err = check_envelope_status(&envelope).unwrap_err();
        assert!(matches!(err, DiscoveryError::RateLimited { .. }));
    }

    #[test]
    fn test_normalize_row_tags_source_as_proximity_grid() {
        let p = provider();
        let row = NearbyRow {
            name: "Vila Madalena".to_string(),
            geometry: Geometry {
                location: LatLng {
                    lat: -23.5544,
                    lng: -46.6922,
                },
            },
            types: vec!["neighborhood".to_string(), "political".to_string()],
        };

        let candidate = p.normalize_row(&row).unwrap();
        assert_eq!(candidate.source, SourceProvider::ProximityGrid);
        assert_eq!(candidate.primary_tag(), Some("neighborhood"));
    }

    #[test]
    fn test_normalize_row_drops_excluded_types() {
        let p = provider();
        let row = NearbyRow {
            name: "Congonhas Airport".to_string(),
            geometry: Geometry {
                location: LatLng {
                    lat: -23.6261,
                    lng: -46.6564,
                },
            },
            types: vec!["airport".to_string(), "establishment".to_string()],
        };
        assert!(p.normalize_row(&row).is_none());
    }
}
