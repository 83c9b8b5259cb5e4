//! Synthetic grid generator.
//!
//! The cascade's guarantee of a non-empty result: when every provider
//! layer contributes nothing, nine deterministic candidates are generated
//! around the entity's declared center. One sits at the exact center and
//! the other eight at fixed cardinal and diagonal offsets.

use crate::models::{Candidate, PlaceRef, SourceProvider};

/// Cardinal offset, roughly 5 km of latitude.
const STEP_LAT_DEG: f64 = 0.045;

/// Cardinal offset in longitude, shrunk so east/west cells sit at a
/// comparable ground distance at mid latitudes.
const STEP_LNG_DEG: f64 = 0.032;

/// Radius of the center cell, meters.
const CENTER_RADIUS_M: u32 = 2000;

/// Radius of the eight outer cells, meters.
const OUTER_RADIUS_M: u32 = 2500;

/// Localized direction names per cell, keyed by language code.
/// Order: center, N, S, E, W, NE, NW, SE, SW.
fn cell_names(language: &str) -> [&'static str; 9] {
    match language {
        "pt" => [
            "Centro", "Zona Norte", "Zona Sul", "Zona Leste", "Zona Oeste", "Nordeste",
            "Noroeste", "Sudeste", "Sudoeste",
        ],
        "es" => [
            "Centro", "Zona Norte", "Zona Sur", "Zona Este", "Zona Oeste", "Noreste",
            "Noroeste", "Sureste", "Suroeste",
        ],
        _ => [
            "Central District",
            "North District",
            "South District",
            "East District",
            "West District",
            "Northeast District",
            "Northwest District",
            "Southeast District",
            "Southwest District",
        ],
    }
}

const CELL_OFFSETS: [(f64, f64); 9] = [
    (0.0, 0.0),
    (STEP_LAT_DEG, 0.0),
    (-STEP_LAT_DEG, 0.0),
    (0.0, STEP_LNG_DEG),
    (0.0, -STEP_LNG_DEG),
    (STEP_LAT_DEG, STEP_LNG_DEG),
    (STEP_LAT_DEG, -STEP_LNG_DEG),
    (-STEP_LAT_DEG, STEP_LNG_DEG),
    (-STEP_LAT_DEG, -STEP_LNG_DEG),
];

/// Generate the nine-cell synthetic grid around an entity's center.
///
/// Deterministic for a given entity. Cells pushed past the coordinate
/// range by an extreme center are dropped, so a caller near the poles may
/// receive fewer than nine.
pub fn synthetic_grid(entity: &PlaceRef) -> Vec<Candidate> {
    let names = cell_names(entity.language_code());

    CELL_OFFSETS
        .iter()
        .zip(names.iter())
        .filter_map(|((dlat, dlng), name)| {
            let radius = if *dlat == 0.0 && *dlng == 0.0 {
                CENTER_RADIUS_M
            } else {
                OUTER_RADIUS_M
            };
            let candidate = Candidate::new(
                (*name).to_string(),
                entity.lat + dlat,
                entity.lng + dlng,
                radius,
                SourceProvider::SyntheticGrid,
                vec!["synthetic".to_string()],
            );
            candidate.has_valid_geometry().then_some(candidate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> PlaceRef {
        PlaceRef::new("Sobral", "BR", -3.6880, -40.3497)
    }

    #[test]
    fn test_generates_nine_cells_with_center_first() {
        let grid = synthetic_grid(&entity());
        assert_eq!(grid.len(), 9);

        let center = &grid[0];
        assert_eq!(center.name, "Centro");
        assert_eq!(center.center_lat, -3.6880);
        assert_eq!(center.center_lng, -40.3497);
        assert_eq!(center.radius_m, 2000);
        assert!(grid[1..].iter().all(|c| c.radius_m == 2500));
    }

    #[test]
    fn test_all_cells_tagged_synthetic() {
        let grid = synthetic_grid(&entity());
        assert!(grid
            .iter()
            .all(|c| c.source == SourceProvider::SyntheticGrid));
        assert!(grid.iter().all(|c| c.primary_tag() == Some("synthetic")));
    }

    #[test]
    fn test_deterministic() {
        let a = synthetic_grid(&entity());
        let b = synthetic_grid(&entity());
        let names_a: Vec<&str> = a.iter().map(|c| c.name.as_str()).collect();
        let names_b: Vec<&str> = b.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_locale_names() {
        let spanish = PlaceRef::new("Salta", "AR", -24.7821, -65.4232);
        let grid = synthetic_grid(&spanish);
        assert_eq!(grid[2].name, "Zona Sur");

        let english = PlaceRef::new("Austin", "US", 30.2672, -97.7431);
        let grid = synthetic_grid(&english);
        assert_eq!(grid[0].name, "Central District");
    }

    #[test]
    fn test_cells_past_the_pole_are_dropped() {
        let polar = PlaceRef::new("Alert", "CA", 89.99, -62.34);
        let grid = synthetic_grid(&polar);
        assert!(grid.len() < 9);
        assert!(grid.iter().all(|c| c.has_valid_geometry()));
    }
}
