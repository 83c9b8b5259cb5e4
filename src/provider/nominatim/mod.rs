//! Nominatim (OpenStreetMap) geodata provider implementation.
//!
//! This module provides administrative-boundary lookups from the public
//! Nominatim API:
//! - Broad free-form search ("{name} {country}") for the first boundary layer
//! - Narrow structured search (city + countrycodes) for the second
//!
//! The public instance requires a descriptive User-Agent and asks for at
//! most one request per second, which the cascade's inter-layer pacing
//! satisfies. Responses are bare JSON arrays in the jsonv2 format.
//! API documentation: https://nominatim.org/release-docs/latest/api/Search/

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::DiscoveryError;
use crate::models::{Candidate, QueryContext, QueryShape, SourceProvider};
use crate::provider::{
    is_discoverable_area, radius_for_tags, GeoDataProvider, ProviderCapabilities,
};
use crate::ratelimit::{RateBudget, RateLimiter};
use crate::similarity::haversine_distance_m;

const BASE_URL: &str = "https://nominatim.openstreetmap.org";
const PROVIDER_ID: &str = "NOMINATIM";

/// Identifies this client to the public instance, per usage policy.
const USER_AGENT: &str = "geoscout/0.1 (area discovery; contact: ops@geoscout.dev)";

/// Result cap for the broad free-form search.
const BROAD_LIMIT: usize = 30;

/// Result cap for the narrow structured search.
const NARROW_LIMIT: usize = 20;

/// Bounds on the radius derived from a result's bounding box, meters.
const RADIUS_FLOOR_M: u32 = 500;
const RADIUS_CEIL_M: u32 = 30_000;

// ============================================================================
// API Response Structures
// ============================================================================

/// One jsonv2 search result. The response body is a bare array of these.
#[derive(Debug, Deserialize)]
struct NominatimRow {
    /// Short name; falls back to display_name when absent
    name: Option<String>,
    display_name: Option<String>,
    lat: String,
    lon: String,
    /// OSM value (suburb, neighbourhood, administrative, ...)
    #[serde(rename = "type")]
    osm_type: Option<String>,
    /// OSM key (place, boundary, ...)
    category: Option<String>,
    /// Address-level classification (suburb, city_district, ...)
    addresstype: Option<String>,
    /// [south, north, west, east] as strings
    #[serde(default)]
    boundingbox: Vec<String>,
}

// ============================================================================
// NominatimProvider
// ============================================================================

/// Nominatim geodata provider.
///
/// Backs the two administrative-boundary layers of the cascade. Has no
/// states or bulk-city support.
pub struct NominatimProvider {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl NominatimProvider {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, limiter }
    }

    async fn fetch(&self, params: &[(&str, String)]) -> Result<Vec<NominatimRow>, DiscoveryError> {
        let provider_id = Cow::Borrowed(PROVIDER_ID);
        let decision = self.limiter.check(&provider_id);
        if !decision.allowed {
            return Err(DiscoveryError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                retry_after: decision.wait,
            });
        }

        let url = format!("{}/search", BASE_URL);
        let mut request = self.client.get(&url).query(&[("format", "jsonv2")]);
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
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DiscoveryError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                retry_after: Duration::from_secs(60),
            });
        }
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

        let rows: Vec<NominatimRow> =
            serde_json::from_str(&text).map_err(|e| DiscoveryError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;

        self.limiter.record(&provider_id);
        Ok(rows)
    }

    fn normalize_row(&self, row: &NominatimRow) -> Option<Candidate> {
        let (Ok(lat), Ok(lng)) = (row.lat.parse::<f64>(), row.lon.parse::<f64>()) else {
            warn!("Nominatim: unparseable coordinates in result");
            return None;
        };

        // display_name is the full comma-separated address chain; keep only
        // the local part when no short name is available
        let name = row
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| {
                row.display_name
                    .as_deref()
                    .and_then(|d| d.split(',').next())
                    .map(|s| s.trim().to_string())
            })?;

        let mut tags = Vec::new();
        if let Some(addresstype) = &row.addresstype {
            tags.push(addresstype.clone());
        }
        if let Some(osm_type) = &row.osm_type {
            tags.push(osm_type.clone());
        }
        if let Some(category) = &row.category {
            tags.push(category.clone());
        }

        if !is_discoverable_area(&tags) {
            return None;
        }

        let radius = bounding_box_radius_m(&row.boundingbox)
            .unwrap_or_else(|| radius_for_tags(&tags));

        let candidate = Candidate::new(name, lat, lng, radius, SourceProvider::AdminBoundary, tags);
        candidate.has_valid_geometry().then_some(candidate)
    }
}

// ============================================================================
// GeoDataProvider Implementation
// ============================================================================

#[async_trait]
impl GeoDataProvider for NominatimProvider {
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
        if context.cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        let entity = &context.entity;
        let params: Vec<(&str, String)> = match context.shape {
            QueryShape::BoundaryNarrow => vec![
                ("city", entity.name.clone()),
                ("countrycodes", entity.country_code.to_lowercase()),
                ("limit", NARROW_LIMIT.to_string()),
            ],
            _ => vec![
                ("q", format!("{} {}", entity.name, entity.country_code)),
                ("limit", BROAD_LIMIT.to_string()),
            ],
        };

        debug!(
            "Nominatim: {:?} search for '{}'",
            context.shape, entity.name
        );

        let rows = self.fetch(&params).await?;
        let candidates: Vec<Candidate> = rows
            .iter()
            .filter_map(|row| self.normalize_row(row))
            .collect();

        debug!(
            "Nominatim: {} candidates for '{}'",
            candidates.len(),
            entity.name
        );
        Ok(candidates)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Approximate a result's radius as half the diagonal of its bounding box,
/// clamped to sane bounds. Returns `None` when the box is absent or
/// unparseable.
fn bounding_box_radius_m(boundingbox: &[String]) -> Option<u32> {
    if boundingbox.len() != 4 {
        return None;
    }
    let south = boundingbox[0].parse::<f64>().ok()?;
    let north = boundingbox[1].parse::<f64>().ok()?;
    let west = boundingbox[2].parse::<f64>().ok()?;
    let east = boundingbox[3].parse::<f64>().ok()?;

    let diagonal = haversine_distance_m(south, west, north, east);
    let radius = (diagonal / 2.0) as u32;
    Some(radius.clamp(RADIUS_FLOOR_M, RADIUS_CEIL_M))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> NominatimProvider {
        NominatimProvider::new(Arc::new(RateLimiter::new()))
    }

    #[test]
    fn test_provider_id_and_capabilities() {
        let p = provider();
        assert_eq!(p.id(), "NOMINATIM");
        assert!(p.capabilities().supports_areas);
        assert!(!p.capabilities().supports_states);
        assert!(!p.capabilities().supports_cities);
    }

    #[test]
    fn test_row_parsing() {
        let json = r#"[
            {
                "name": "Copacabana",
                "display_name": "Copacabana, Rio de Janeiro, Brazil",
                "lat": "-22.9711",
                "lon": "-43.1822",
                "type": "suburb",
                "category": "place",
                "addresstype": "suburb",
                "boundingbox": ["-22.9906", "-22.9519", "-43.1986", "-43.1700"]
            }
        ]"#;

        let rows: Vec<NominatimRow> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name.as_deref(), Some("Copacabana"));
        assert_eq!(rows[0].boundingbox.len(), 4);
    }

    #[test]
    fn test_normalize_row_derives_radius_from_bounding_box() {
        let p = provider();
        let row = NominatimRow {
            name: Some("Copacabana".to_string()),
            display_name: None,
            lat: "-22.9711".to_string(),
            lon: "-43.1822".to_string(),
            osm_type: Some("suburb".to_string()),
            category: Some("place".to_string()),
            addresstype: Some("suburb".to_string()),
            boundingbox: vec![
                "-22.9906".to_string(),
                "-22.9519".to_string(),
                "-43.1986".to_string(),
                "-43.1700".to_string(),
            ],
        };

        let candidate = p.normalize_row(&row).unwrap();
        assert_eq!(candidate.source, SourceProvider::AdminBoundary);
        // Box diagonal is roughly 5.2 km, so the radius lands near 2.6 km
        assert!(candidate.radius_m > 2_000 && candidate.radius_m < 3_500);
    }

    #[test]
    fn test_normalize_row_falls_back_to_display_name_prefix() {
        let p = provider();
        let row = NominatimRow {
            name: None,
            display_name: Some("Lapa, Rio de Janeiro, Brazil".to_string()),
            lat: "-22.9133".to_string(),
            lon: "-43.1800".to_string(),
            osm_type: Some("neighbourhood".to_string()),
            category: Some("place".to_string()),
            addresstype: Some("neighbourhood".to_string()),
            boundingbox: vec![],
        };

        let candidate = p.normalize_row(&row).unwrap();
        assert_eq!(candidate.name, "Lapa");
        // No box, so the radius comes from the tag heuristic
        assert_eq!(candidate.radius_m, 2000);
    }

    #[test]
    fn test_normalize_row_drops_city_level_results() {
        let p = provider();
        let row = NominatimRow {
            name: Some("Rio de Janeiro".to_string()),
            display_name: None,
            lat: "-22.9068".to_string(),
            lon: "-43.1729".to_string(),
            osm_type: Some("administrative".to_string()),
            category: Some("boundary".to_string()),
            addresstype: Some("city".to_string()),
            boundingbox: vec![],
        };
        assert!(p.normalize_row(&row).is_none());
    }

    #[test]
    fn test_bounding_box_radius_clamps() {
        // Degenerate box collapses to the floor
        let tiny = vec![
            "-22.9711".to_string(),
            "-22.9711".to_string(),
            "-43.1822".to_string(),
            "-43.1822".to_string(),
        ];
        assert_eq!(bounding_box_radius_m(&tiny), Some(RADIUS_FLOOR_M));

        // Country-sized box hits the ceiling
        let huge = vec![
            "-33.0".to_string(),
            "5.0".to_string(),
            "-74.0".to_string(),
            "-34.0".to_string(),
        ];
        assert_eq!(bounding_box_radius_m(&huge), Some(RADIUS_CEIL_M));

        assert_eq!(bounding_box_radius_m(&[]), None);
    }
}
