use serde::{Deserialize, Serialize};

/// A political entity (city, state) whose areas should be discovered.
///
/// Callers resolve the entity through their own persistence layer; this
/// crate only needs its name, declared center, and locale hints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceRef {
    /// Display name (e.g. "Fortaleza")
    pub name: String,

    /// ISO 3166-1 alpha-2 country code (e.g. "BR")
    pub country_code: String,

    /// Declared center latitude, degrees
    pub lat: f64,

    /// Declared center longitude, degrees
    pub lng: f64,

    /// Explicit locale override for provider queries.
    /// When absent, the language is derived from the country code.
    pub language: Option<String>,
}

impl PlaceRef {
    /// Create a new entity reference.
    pub fn new(
        name: impl Into<String>,
        country_code: impl Into<String>,
        lat: f64,
        lng: f64,
    ) -> Self {
        Self {
            name: name.into(),
            country_code: country_code.into(),
            lat,
            lng,
            language: None,
        }
    }

    /// Set an explicit locale for provider queries.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Whether the declared center lies inside valid coordinate ranges.
    /// Entities failing this check cannot seed even the synthetic grid.
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// The language to send to providers: the explicit override when set,
    /// otherwise derived from the country code.
    pub fn language_code(&self) -> &str {
        self.language
            .as_deref()
            .unwrap_or_else(|| language_for_country(&self.country_code))
    }
}

/// Derive a provider locale parameter from an ISO country code.
///
/// Only the countries the original deployment actually serves are mapped;
/// everything else falls back to English.
pub fn language_for_country(country_code: &str) -> &'static str {
    match country_code.to_uppercase().as_str() {
        "BR" | "PT" => "pt",
        "AR" | "CL" | "CO" | "ES" | "MX" | "PE" | "UY" => "es",
        "FR" => "fr",
        "DE" | "AT" => "de",
        "IT" => "it",
        _ => "en",
    }
}
