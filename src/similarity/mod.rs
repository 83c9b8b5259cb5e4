//! String and spatial similarity primitives for duplicate detection.
//!
//! Two scorers back the deduplicator:
//! - [`string_similarity`]: normalized Levenshtein edit distance in [0, 1]
//! - [`haversine_distance_m`]: great-circle distance in meters

/// Mean Earth radius used by the Haversine formula, meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Name similarity in [0, 1]: `1 - editDistance(a, b) / max(len(a), len(b))`.
///
/// Input is case-normalized before comparison; edit distance is classic
/// Levenshtein with unit substitution/insertion/deletion cost. Two empty
/// strings compare as identical.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Great-circle distance between two points, meters.
pub fn haversine_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}
