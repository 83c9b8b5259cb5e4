//! Multi-source geospatial area discovery.
//!
//! Given a political entity (a city, state, or country reference), this
//! crate queries several independent, rate-limited geodata providers in a
//! defined fallback order, merges their results, removes duplicates with
//! combined name-similarity and spatial-proximity heuristics, and falls
//! back to deterministic synthetic geometry when no provider yields
//! usable data.
//!
//! ```text
//!                 +------------------------+
//!  PlaceRef ----> | DiscoveryOrchestrator  | ----> DiscoveryResult
//!                 |  (layer plan cascade)  |
//!                 +-----------+------------+
//!                             |
//!          +---------+--------+--------+----------+
//!          v         v                 v          v
//!      GeoNames  Nominatim      Places text  Places nearby
//!          |         |                 |          |
//!          +---------+--------+--------+----------+
//!                             v
//!                  RateLimiter (shared budget)
//! ```
//!
//! Every provider failure degrades to an empty layer; only invalid input
//! coordinates or cancellation abort a discovery run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use geoscout::{DiscoveryOrchestrator, PlaceRef, RateLimiter};
//! use geoscout::provider::geonames::GeoNamesProvider;
//!
//! # async fn run() -> Result<(), geoscout::DiscoveryError> {
//! let limiter = Arc::new(RateLimiter::new());
//! let mut orchestrator = DiscoveryOrchestrator::new(limiter.clone());
//! orchestrator.register(Arc::new(GeoNamesProvider::new(
//!     "demo".to_string(),
//!     limiter,
//! )));
//!
//! let entity = PlaceRef::new("Sobral", "BR", -3.6880, -40.3497);
//! let result = orchestrator
//!     .discover_neighborhoods(&entity, &CancellationToken::new())
//!     .await?;
//! println!("{} areas found", result.len());
//! # Ok(())
//! # }
//! ```

pub mod dedup;
pub mod errors;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod provider;
pub mod ratelimit;
pub mod similarity;

pub use dedup::Deduplicator;
pub use errors::{DiscoveryError, LayerPolicy};
pub use models::{
    Candidate, CityFilter, CityPage, CityRecord, DiscoveryResult, PlaceRef, ProviderId,
    QueryContext, QueryShape, SourceProvider,
};
pub use persistence::{MemoryGateway, PersistenceError, PersistenceGateway, UpsertOutcome};
pub use pipeline::{default_plan, synthetic_grid, DiscoveryOrchestrator, LayerSpec};
pub use provider::{GeoDataProvider, Pacing, ProviderCapabilities};
pub use ratelimit::{RateBudget, RateDecision, RateLimiter, UsageStats};
