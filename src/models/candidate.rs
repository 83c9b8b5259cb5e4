use serde::{Deserialize, Serialize};

/// Which source contributed a candidate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SourceProvider {
    /// Primary population-place search source
    PrimaryPlaces,
    /// Administrative-boundary search source
    AdminBoundary,
    /// Grid/text place-search source
    GridSearch,
    /// Proximity-grid (nearby) search source
    ProximityGrid,
    /// Deterministic synthetic-grid fallback generator
    SyntheticGrid,
}

/// A normalized, not-yet-deduplicated discovered area record.
///
/// Candidates are created per orchestrator run and are ephemeral: never
/// mutated after creation, only filtered or kept. Provider-specific response
/// shapes are normalized into this type at the adapter boundary and never
/// leak past it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candidate {
    /// Area name as reported by the source
    pub name: String,

    /// Latitude of the area center, degrees in [-90, 90]
    pub center_lat: f64,

    /// Longitude of the area center, degrees in [-180, 180]
    pub center_lng: f64,

    /// Search radius assigned by the tag heuristic, meters, always > 0.
    /// Used downstream only as metadata, never as a filter.
    pub radius_m: u32,

    /// Which source contributed this candidate
    pub source: SourceProvider,

    /// Raw category tags from the source. The first entry is the provider's
    /// primary category tag; the type filter inspects only that one.
    pub tags: Vec<String>,
}

impl Candidate {
    /// Create a new candidate.
    pub fn new(
        name: impl Into<String>,
        center_lat: f64,
        center_lng: f64,
        radius_m: u32,
        source: SourceProvider,
        tags: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            center_lat,
            center_lng,
            radius_m,
            source,
            tags,
        }
    }

    /// Whether the candidate's coordinates and radius satisfy the model
    /// invariants. Adapters drop rows that fail this check.
    pub fn has_valid_geometry(&self) -> bool {
        (-90.0..=90.0).contains(&self.center_lat)
            && (-180.0..=180.0).contains(&self.center_lng)
            && self.radius_m > 0
    }

    /// The provider's primary category tag, if any.
    pub fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }
}
