//! Discovery data models
//!
//! This module contains the core data types for discovery operations:
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `candidate` - Normalized discovered-area records (Candidate, SourceProvider)
//! - `entity` - Political entity references (PlaceRef) and locale derivation
//! - `query` - Request context for provider queries (QueryContext, QueryShape)
//! - `result` - Pipeline output (DiscoveryResult) with per-layer stats
//! - `city` - Bulk city-search records (CityRecord, CityPage, CityFilter)

mod candidate;
mod city;
mod entity;
mod query;
mod result;
mod types;

pub use candidate::{Candidate, SourceProvider};
pub use city::{CityFilter, CityPage, CityRecord};
pub use entity::{language_for_country, PlaceRef};
pub use query::{QueryContext, QueryShape};
pub use result::DiscoveryResult;
pub use types::ProviderId;
