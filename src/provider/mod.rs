//! Geodata provider abstractions and implementations.
//!
//! This module contains:
//! - The `GeoDataProvider` trait that all providers implement
//! - Provider capabilities and pacing configuration
//! - The bounded page iterator used for paginated sources
//! - The shared type filter and radius heuristic
//! - Concrete provider adapters (GeoNames, Nominatim, places text/nearby)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: the pipeline only sees normalized [`Candidate`]s
//! - **Extensible**: new sources are added by implementing `GeoDataProvider`
//! - **Resilient**: every adapter consults the shared rate limiter and maps
//!   provider failures into the common error taxonomy
//!
//! Heterogeneous response shapes (string coordinates, nested geometry,
//! differing category taxonomies) are decoded into strict serde structs per
//! provider and normalized into the single [`Candidate`] type at the adapter
//! boundary; provider-specific shapes never leak past it.
//!
//! [`Candidate`]: crate::models::Candidate

mod capabilities;
mod filter;
mod pager;
mod traits;

pub mod geonames;
pub mod nominatim;
pub mod places_nearby;
pub mod places_text;

pub use capabilities::{Pacing, ProviderCapabilities};
pub use filter::{is_discoverable_area, radius_for_tags};
pub use pager::{Page, PageSource, PageToken, Pager};
pub use traits::GeoDataProvider;
