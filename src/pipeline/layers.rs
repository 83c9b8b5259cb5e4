//! Declarative layer plan for the discovery cascade.
//!
//! Each layer names a provider and the conditions under which it runs.
//! The orchestrator consumes the plan in order with one generic loop, so
//! reordering the cascade or tuning a threshold is a data change.

use crate::models::QueryShape;

/// One provider layer in the cascade.
#[derive(Debug, Clone)]
pub struct LayerSpec {
    /// Stable name, used as the `layer_stats` key
    pub name: &'static str,
    /// Provider consulted by this layer
    pub provider: &'static str,
    /// Skip the layer unless the accumulated count is below this.
    /// `None` means the layer always runs.
    pub run_below: Option<usize>,
    /// Query shape handed to the provider
    pub shape: QueryShape,
    /// Reject results farther than this from the entity center, meters.
    /// Guards against whole-region results masquerading as local areas.
    pub max_distance_m: Option<f64>,
}

impl LayerSpec {
    /// Whether the layer should run given the accumulated candidate count.
    pub fn should_run(&self, accumulated: usize) -> bool {
        match self.run_below {
            Some(threshold) => accumulated < threshold,
            None => true,
        }
    }
}

/// Name used for the generator layer in `layer_stats`. Not a provider, so
/// it has no `LayerSpec`.
pub const SYNTHETIC_LAYER: &str = "synthetic-grid";

/// The default cascade, cheapest and most precise sources first.
pub fn default_plan() -> Vec<LayerSpec> {
    vec![
        LayerSpec {
            name: "primary",
            provider: "GEONAMES",
            run_below: None,
            shape: QueryShape::Primary,
            max_distance_m: None,
        },
        LayerSpec {
            name: "admin-boundary-broad",
            provider: "NOMINATIM",
            run_below: Some(20),
            shape: QueryShape::BoundaryBroad,
            max_distance_m: Some(30_000.0),
        },
        LayerSpec {
            name: "admin-boundary-narrow",
            provider: "NOMINATIM",
            run_below: Some(15),
            shape: QueryShape::BoundaryNarrow,
            max_distance_m: None,
        },
        LayerSpec {
            name: "grid-search",
            provider: "PLACES_TEXT",
            run_below: Some(5),
            shape: QueryShape::Grid,
            max_distance_m: None,
        },
        LayerSpec {
            name: "proximity-grid",
            provider: "PLACES_NEARBY",
            run_below: Some(5),
            shape: QueryShape::Grid,
            max_distance_m: None,
        },
    ]
}
