use serde::{Deserialize, Serialize};

/// A city row from the bulk city search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CityRecord {
    /// City name
    pub name: String,

    /// Center latitude, degrees
    pub lat: f64,

    /// Center longitude, degrees
    pub lng: f64,

    /// Reported population, when the source carries one
    pub population: Option<i64>,

    /// First-level administrative division name (state/province)
    pub admin_name: Option<String>,

    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,
}

/// Constraints for a bulk city search.
#[derive(Clone, Debug)]
pub struct CityFilter {
    /// ISO country code to search within
    pub country_code: String,

    /// Minimum population floor
    pub population_min: i64,

    /// Maximum rows per call. The backing provider enforces small per-call
    /// row caps, which is why the bulk operation is paginated.
    pub batch_size: usize,

    /// Row offset to start from
    pub start_offset: usize,
}

/// One page of a bulk city search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CityPage {
    /// Cities found in this page, after the population floor
    pub cities: Vec<CityRecord>,

    /// Whether the source reports more rows past this page
    pub has_more: bool,

    /// Offset to pass as `start_offset` for the next page
    pub next_offset: usize,
}
