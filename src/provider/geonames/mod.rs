//! GeoNames geodata provider implementation.
//!
//! This module provides place data from the GeoNames API:
//! - Populated-place search via /searchJSON (the cascade's primary layer)
//! - First-level administrative divisions via /countryInfoJSON + /childrenJSON
//! - Paginated bulk city search via /searchJSON with population buckets
//!
//! GeoNames returns latitude/longitude as strings and reports quota errors
//! inside a 200 response through a `status` envelope. Free accounts are
//! limited to 1000 credits per hour.
//! API documentation: https://www.geonames.org/export/web-services.html

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::DiscoveryError;
use crate::models::{
    Candidate, CityFilter, CityPage, CityRecord, QueryContext, SourceProvider,
};
use crate::provider::{
    is_discoverable_area, radius_for_tags, GeoDataProvider, Page, PageSource, PageToken, Pacing,
    Pager, ProviderCapabilities,
};
use crate::ratelimit::{RateBudget, RateLimiter};

const BASE_URL: &str = "http://api.geonames.org";
const PROVIDER_ID: &str = "GEONAMES";

/// Rows per search page (GeoNames caps free accounts well above this).
const PAGE_SIZE: usize = 50;

/// Page cap for the neighborhood search, bounding latency and fan-out.
const MAX_SEARCH_PAGES: usize = 3;

/// Radius recorded for ADM1 rows returned by the states operation, meters.
const STATE_RADIUS_M: u32 = 50_000;

/// Advised wait when GeoNames reports its own quota exhaustion.
const QUOTA_RETRY: Duration = Duration::from_secs(3600);

// ============================================================================
// API Response Structures
// ============================================================================

/// Envelope shared by /searchJSON and /childrenJSON
#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    /// Result rows
    #[serde(default)]
    geonames: Vec<GeoNameRow>,
    /// Total matching rows across all pages
    #[serde(rename = "totalResultsCount")]
    total_results_count: Option<i64>,
    /// Error payload; present only on failure
    status: Option<StatusPayload>,
}

/// One GeoNames result row. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct GeoNameRow {
    name: String,
    lat: String,
    lng: String,
    /// Feature code (PPL, PPLX, ADM1, ...)
    fcode: Option<String>,
    /// Feature class (P, A, ...)
    fcl: Option<String>,
    #[serde(default)]
    population: Option<i64>,
    #[serde(rename = "adminName1")]
    admin_name1: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

/// Envelope from /countryInfoJSON
#[derive(Debug, Deserialize)]
struct CountryInfoEnvelope {
    #[serde(default)]
    geonames: Vec<CountryInfoRow>,
    status: Option<StatusPayload>,
}

#[derive(Debug, Deserialize)]
struct CountryInfoRow {
    #[serde(rename = "geonameId")]
    geoname_id: i64,
}

/// API-reported error, delivered inside a 200 response
#[derive(Debug, Deserialize)]
struct StatusPayload {
    message: Option<String>,
    value: Option<i32>,
}

// ============================================================================
// GeoNamesProvider
// ============================================================================

/// GeoNames geodata provider.
///
/// The cascade's primary population-place source, and the only provider
/// backing the states and bulk-city operations. Authenticates with a
/// registered username.
pub struct GeoNamesProvider {
    client: Client,
    username: String,
    limiter: Arc<RateLimiter>,
    pacing: Pacing,
}

impl GeoNamesProvider {
    /// Create a new GeoNames provider with the given username.
    pub fn new(username: String, limiter: Arc<RateLimiter>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            username,
            limiter,
            pacing: Pacing::default(),
        }
    }

    /// Override the pacing policy (tests inject zero delays).
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Make a GET request to the GeoNames API.
    ///
    /// Checks the shared limiter first and records the call against the
    /// budget only after it succeeds.
    async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, DiscoveryError> {
        let provider_id = Cow::Borrowed(PROVIDER_ID);
        let decision = self.limiter.check(&provider_id);
        if !decision.allowed {
            return Err(DiscoveryError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                retry_after: decision.wait,
            });
        }

        let url = format!("{}{}", BASE_URL, endpoint);
        let mut request = self.client.get(&url).query(&[("username", &self.username)]);
        for (key, value) in params {
            request = request.query(&[(key, value)]);
        }

        debug!("GeoNames request: {} with {} params", endpoint, params.len());

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
                retry_after: QUOTA_RETRY,
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

        self.limiter.record(&provider_id);
        Ok(text)
    }

    /// Map a GeoNames status payload to an error, if one is present.
    fn check_status(&self, status: Option<StatusPayload>) -> Result<(), DiscoveryError> {
        let Some(status) = status else {
            return Ok(());
        };

        let message = status.message.unwrap_or_else(|| "unknown error".to_string());
        // 18/19/20 are the daily/hourly/weekly credit limits
        if matches!(status.value, Some(18) | Some(19) | Some(20)) {
            return Err(DiscoveryError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                retry_after: QUOTA_RETRY,
            });
        }

        Err(DiscoveryError::Http {
            provider: PROVIDER_ID.to_string(),
            message,
        })
    }

    /// Parse a search-style envelope out of a response body.
    fn parse_envelope(&self, text: &str) -> Result<SearchEnvelope, DiscoveryError> {
        let envelope: SearchEnvelope =
            serde_json::from_str(text).map_err(|e| DiscoveryError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse envelope: {}", e),
            })?;
        Ok(envelope)
    }

    /// Normalize a GeoNames row into a candidate, or `None` when the row
    /// fails coordinate parsing or the type filter.
    fn normalize_row(&self, row: &GeoNameRow, source: SourceProvider) -> Option<Candidate> {
        let (Ok(lat), Ok(lng)) = (row.lat.parse::<f64>(), row.lng.parse::<f64>()) else {
            warn!("GeoNames: unparseable coordinates for '{}'", row.name);
            return None;
        };

        let mut tags = Vec::new();
        if let Some(fcode) = &row.fcode {
            tags.push(fcode.clone());
        }
        if let Some(fcl) = &row.fcl {
            tags.push(fcl.clone());
        }

        if !is_discoverable_area(&tags) {
            return None;
        }

        let candidate = Candidate::new(
            row.name.clone(),
            lat,
            lng,
            radius_for_tags(&tags),
            source,
            tags,
        );
        candidate.has_valid_geometry().then_some(candidate)
    }

    /// Look up the country's geonameId, needed to list its children.
    async fn country_geoname_id(&self, country_code: &str) -> Result<i64, DiscoveryError> {
        let params = [("country", country_code.to_string())];
        let text = self.fetch("/countryInfoJSON", &params).await?;

        let envelope: CountryInfoEnvelope =
            serde_json::from_str(&text).map_err(|e| DiscoveryError::Malformed {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse countryInfo response: {}", e),
            })?;
        self.check_status(envelope.status)?;

        envelope
            .geonames
            .first()
            .map(|row| row.geoname_id)
            .ok_or_else(|| DiscoveryError::Http {
                provider: PROVIDER_ID.to_string(),
                message: format!("Unknown country code: {}", country_code),
            })
    }
}

/// Offset-paginated /searchJSON pages for one neighborhood query.
struct SearchPages<'a> {
    provider: &'a GeoNamesProvider,
    context: &'a QueryContext,
}

#[async_trait]
impl PageSource for SearchPages<'_> {
    type Item = Candidate;

    async fn fetch_page(
        &self,
        token: Option<&PageToken>,
    ) -> Result<Page<Candidate>, DiscoveryError> {
        let offset = match token {
            Some(PageToken::Offset(o)) => *o,
            Some(PageToken::Cursor(_)) | None => 0,
        };

        let entity = &self.context.entity;
        let params = [
            ("q", entity.name.clone()),
            ("country", entity.country_code.to_uppercase()),
            ("featureClass", "P".to_string()),
            ("lang", entity.language_code().to_string()),
            ("maxRows", PAGE_SIZE.to_string()),
            ("startRow", offset.to_string()),
        ];

        let text = self.provider.fetch("/searchJSON", &params).await?;
        let envelope = self.provider.parse_envelope(&text)?;
        self.provider.check_status(envelope.status)?;

        let raw_count = envelope.geonames.len();
        let items: Vec<Candidate> = envelope
            .geonames
            .iter()
            .filter_map(|row| self.provider.normalize_row(row, SourceProvider::PrimaryPlaces))
            .collect();

        // A short page means the source is exhausted
        let next = (raw_count == PAGE_SIZE).then_some(PageToken::Offset(offset + PAGE_SIZE));

        Ok(Page { items, next })
    }
}

// ============================================================================
// GeoDataProvider Implementation
// ============================================================================

#[async_trait]
impl GeoDataProvider for GeoNamesProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_areas: true,
            supports_states: true,
            supports_cities: true,
        }
    }

    fn rate_budget(&self) -> RateBudget {
        RateBudget {
            window: Duration::from_secs(3600),
            max_requests: 1000, // Free-tier hourly credit limit
        }
    }

    async fn query(&self, context: &QueryContext) -> Result<Vec<Candidate>, DiscoveryError> {
        debug!(
            "GeoNames: searching populated places for '{}' ({:?})",
            context.entity.name, context.shape
        );

        let source = SearchPages {
            provider: self,
            context,
        };
        let pager = Pager::new(
            &source,
            MAX_SEARCH_PAGES,
            self.pacing.inter_page,
            context.cancel.clone(),
        );
        let candidates = pager.collect().await?;

        debug!(
            "GeoNames: {} candidates for '{}'",
            candidates.len(),
            context.entity.name
        );
        Ok(candidates)
    }

    async fn states(&self, country_code: &str) -> Result<Vec<Candidate>, DiscoveryError> {
        let geoname_id = self.country_geoname_id(country_code).await?;

        let params = [("geonameId", geoname_id.to_string())];
        let text = self.fetch("/childrenJSON", &params).await?;
        let envelope = self.parse_envelope(&text)?;
        self.check_status(envelope.status)?;

        let states: Vec<Candidate> = envelope
            .geonames
            .iter()
            .filter(|row| row.fcode.as_deref() == Some("ADM1"))
            .filter_map(|row| {
                let (Ok(lat), Ok(lng)) = (row.lat.parse::<f64>(), row.lng.parse::<f64>()) else {
                    warn!("GeoNames: unparseable coordinates for state '{}'", row.name);
                    return None;
                };
                let tags = vec!["ADM1".to_string()];
                let candidate = Candidate::new(
                    row.name.clone(),
                    lat,
                    lng,
                    STATE_RADIUS_M,
                    SourceProvider::PrimaryPlaces,
                    tags,
                );
                candidate.has_valid_geometry().then_some(candidate)
            })
            .collect();

        debug!("GeoNames: {} states for {}", states.len(), country_code);
        Ok(states)
    }

    async fn cities(&self, filter: &CityFilter) -> Result<CityPage, DiscoveryError> {
        let params = [
            ("country", filter.country_code.to_uppercase()),
            ("featureClass", "P".to_string()),
            ("cities", population_bucket(filter.population_min).to_string()),
            ("orderby", "population".to_string()),
            ("maxRows", filter.batch_size.to_string()),
            ("startRow", filter.start_offset.to_string()),
        ];

        let text = self.fetch("/searchJSON", &params).await?;
        let envelope = self.parse_envelope(&text)?;
        self.check_status(envelope.status)?;

        let raw_count = envelope.geonames.len();
        let cities: Vec<CityRecord> = envelope
            .geonames
            .iter()
            .filter(|row| row.population.unwrap_or(0) >= filter.population_min)
            .filter_map(|row| {
                let (Ok(lat), Ok(lng)) = (row.lat.parse::<f64>(), row.lng.parse::<f64>()) else {
                    warn!("GeoNames: unparseable coordinates for city '{}'", row.name);
                    return None;
                };
                Some(CityRecord {
                    name: row.name.clone(),
                    lat,
                    lng,
                    population: row.population,
                    admin_name: row.admin_name1.clone(),
                    country_code: row
                        .country_code
                        .clone()
                        .unwrap_or_else(|| filter.country_code.to_uppercase()),
                })
            })
            .collect();

        let total = envelope.total_results_count.unwrap_or(0);
        let next_offset = filter.start_offset + raw_count;
        let has_more = (total as usize) > next_offset && raw_count > 0;

        debug!(
            "GeoNames: {} cities (offset {}, total {})",
            cities.len(),
            filter.start_offset,
            total
        );

        Ok(CityPage {
            cities,
            has_more,
            next_offset,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Map a population floor to the coarsest GeoNames city bucket that still
/// contains it; finer filtering happens client-side.
fn population_bucket(population_min: i64) -> &'static str {
    if population_min >= 15_000 {
        "cities15000"
    } else if population_min >= 5_000 {
        "cities5000"
    } else {
        "cities1000"
    }
}

// ============================================================================
// Tests
// ============================================================================
