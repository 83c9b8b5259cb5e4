//! Shared type filter and radius heuristic.
//!
//! Providers report category tags from incompatible taxonomies (GeoNames
//! feature codes, OSM class/type pairs, places API type lists). The filter
//! and the radius heuristic work over the union of those vocabularies so
//! every adapter applies the same policy.

use std::collections::HashSet;

use lazy_static::lazy_static;

/// Smallest search radius, assigned when no tag says otherwise, meters.
pub const RADIUS_DEFAULT_M: u32 = 1200;

/// Radius for explicit neighborhood-level tags, meters.
pub const RADIUS_NEIGHBORHOOD_M: u32 = 2000;

/// Radius for large-area tags (districts, sublocalities), meters.
pub const RADIUS_DISTRICT_M: u32 = 3000;

lazy_static! {
    /// Primary tags that mark a non-neighborhood entity: countries, regions,
    /// the locality itself, streets, routes, airports.
    static ref EXCLUDED_PRIMARY_TAGS: HashSet<&'static str> = [
        // Common / places-API vocabulary
        "country",
        "region",
        "state",
        "administrative_area_level_1",
        "administrative_area_level_2",
        "locality",
        "street_address",
        "street",
        "route",
        "airport",
        // OSM vocabulary
        "city",
        "town",
        "highway",
        "aerodrome",
        // GeoNames feature codes
        "PCLI",
        "ADM1",
        "ADM2",
        "PPLC",
        "PPLA",
    ]
    .iter()
    .copied()
    .collect();

    /// Tags that indicate a district-sized area.
    static ref DISTRICT_TAGS: HashSet<&'static str> = [
        "sublocality",
        "city_district",
        "borough",
        "district",
        "ADM3",
        "ADM4",
    ]
    .iter()
    .copied()
    .collect();

    /// Tags that indicate an explicit neighborhood.
    static ref NEIGHBORHOOD_TAGS: HashSet<&'static str> = [
        "neighborhood",
        "neighbourhood",
        "sublocality_level_1",
        "suburb",
        "quarter",
        "PPLX",
    ]
    .iter()
    .copied()
    .collect();
}

/// Whether a candidate's tags describe a discoverable area.
///
/// Only the primary (first) tag is inspected; secondary tags are ignored to
/// avoid over-rejecting compound-tagged results (a neighborhood that is also
/// tagged "political", for instance).
pub fn is_discoverable_area(tags: &[String]) -> bool {
    match tags.first() {
        Some(primary) => !EXCLUDED_PRIMARY_TAGS.contains(primary.as_str()),
        None => true,
    }
}

/// Assign a search radius from the candidate's tags.
///
/// The most specific recognized tag wins: an explicit neighborhood tag
/// beats a generic district tag, since sources that emit both (Google's
/// `sublocality_level_1` always rides with `sublocality`) mean the
/// narrower one. Anything unrecognized gets the smallest radius. Any tag
/// position counts here, unlike the exclusion filter.
pub fn radius_for_tags(tags: &[String]) -> u32 {
    if tags.iter().any(|t| NEIGHBORHOOD_TAGS.contains(t.as_str())) {
        RADIUS_NEIGHBORHOOD_M
    } else if tags.iter().any(|t| DISTRICT_TAGS.contains(t.as_str())) {
        RADIUS_DISTRICT_M
    } else {
        RADIUS_DEFAULT_M
    }
}
