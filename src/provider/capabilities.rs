//! Provider capabilities and pacing configuration.

use std::time::Duration;

/// Describes the operations a geodata provider supports.
///
/// Used by the orchestrator to pick providers for the states and bulk-city
/// operations; the neighborhood cascade is driven by the layer plan instead.
#[derive(Clone, Copy, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider answers area (neighborhood) queries.
    pub supports_areas: bool,

    /// Whether the provider can list first-level administrative divisions.
    pub supports_states: bool,

    /// Whether the provider supports the paginated bulk city search.
    pub supports_cities: bool,
}

/// Fixed sleep intervals between calls.
///
/// These are scheduling parameters, not backoff: providers document minimum
/// intervals (and token-settle requirements) that the pipeline must honor.
/// Tests inject [`Pacing::none`] so nothing sleeps.
#[derive(Clone, Copy, Debug)]
pub struct Pacing {
    /// Delay between consecutive pipeline layers.
    pub inter_layer: Duration,

    /// Delay between consecutive pages or grid cells of one provider.
    pub inter_page: Duration,

    /// Delay before a continuation token becomes valid on token-paginated
    /// sources (the token is handed out before it is usable server-side).
    pub token_settle: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            inter_layer: Duration::from_secs(1),
            inter_page: Duration::from_secs(1),
            token_settle: Duration::from_secs(2),
        }
    }
}

impl Pacing {
    /// Zero-delay pacing for tests.
    pub fn none() -> Self {
        Self {
            inter_layer: Duration::ZERO,
            inter_page: Duration::ZERO,
            token_settle: Duration::ZERO,
        }
    }
}
