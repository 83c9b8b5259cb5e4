//! Geodata provider trait definition.
//!
//! This module defines the core `GeoDataProvider` trait that all
//! geodata source adapters must implement.

use async_trait::async_trait;

use crate::errors::DiscoveryError;
use crate::models::{Candidate, CityFilter, CityPage, QueryContext};
use crate::ratelimit::RateBudget;

use super::capabilities::ProviderCapabilities;

/// Trait for geodata providers.
///
/// Implement this trait to add support for a new external source. Adapters
/// receive the shared rate limiter at construction, check it before every
/// outbound request, and record only successful calls against the budget.
///
/// An empty result set is `Ok(vec![])`, never an error - the orchestrator
/// treats it as "this layer contributed nothing" and moves on.
#[async_trait]
pub trait GeoDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "GEONAMES", "NOMINATIM", etc.
    /// Used for logging, rate-limiter keys, and layer binding.
    fn id(&self) -> &'static str;

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Request budget for the shared sliding-window limiter.
    fn rate_budget(&self) -> RateBudget;

    /// Query the source for area candidates.
    ///
    /// # Arguments
    ///
    /// * `context` - The entity, the layer's query shape, and the caller's
    ///   cancellation signal
    ///
    /// # Returns
    ///
    /// Normalized candidates with the type filter and radius heuristic
    /// already applied, or a `DiscoveryError` on failure.
    async fn query(&self, context: &QueryContext) -> Result<Vec<Candidate>, DiscoveryError>;

    /// List first-level administrative divisions of a country.
    ///
    /// Default implementation returns `Unsupported`.
    async fn states(&self, country_code: &str) -> Result<Vec<Candidate>, DiscoveryError> {
        let _ = country_code;
        Err(DiscoveryError::Unsupported {
            operation: "states".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Paginated bulk city search.
    ///
    /// Default implementation returns `Unsupported`.
    async fn cities(&self, filter: &CityFilter) -> Result<CityPage, DiscoveryError> {
        let _ = filter;
        Err(DiscoveryError::Unsupported {
            operation: "cities".to_string(),
            provider: self.id().to_string(),
        })
    }
}
