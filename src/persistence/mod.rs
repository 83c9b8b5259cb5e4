//! Persistence gateway for discovered entities.
//!
//! The pipeline does not own storage; it hands finished candidates to a
//! [`PersistenceGateway`] collaborator. Writes are idempotent upserts keyed
//! by `(parent_key, lowercased name)`, so re-running discovery for an
//! entity updates geometry in place instead of duplicating rows.
//!
//! [`MemoryGateway`] is the in-process implementation used by tests and by
//! callers that only want the discovery result itself.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use log::warn;
use thiserror::Error;

use crate::models::{Candidate, CityRecord};

/// Storage-side failure. Kept separate from [`crate::errors::DiscoveryError`]
/// because persistence problems abort the write, not the discovery.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Rejected write for '{key}': {reason}")]
    Rejected { key: String, reason: String },
}

/// Outcome of an upsert: the stored row's id and whether it was created
/// by this call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: u64,
    pub is_new: bool,
}

/// Write-side collaborator the orchestrator hands results to.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Upsert one discovered area under its parent entity. The natural key
    /// is `(parent_key, lowercase(candidate.name))`.
    async fn upsert_area(
        &self,
        parent_key: &str,
        candidate: &Candidate,
    ) -> Result<UpsertOutcome, PersistenceError>;

    /// Upsert one city under its country.
    async fn upsert_city(&self, city: &CityRecord) -> Result<UpsertOutcome, PersistenceError>;
}

// ============================================================================
// MemoryGateway
// ============================================================================

#[derive(Debug, Clone)]
struct StoredArea {
    id: u64,
    candidate: Candidate,
}

#[derive(Default)]
struct MemoryState {
    areas: HashMap<(String, String), StoredArea>,
    cities: HashMap<(String, String), u64>,
    next_id: u64,
}

/// In-memory gateway. Natural-key collisions update geometry in place.
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Memory gateway mutex poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Number of stored areas, across all parents.
    pub fn area_count(&self) -> usize {
        self.lock_state().areas.len()
    }

    /// Fetch a stored area's geometry by natural key.
    pub fn area(&self, parent_key: &str, name: &str) -> Option<Candidate> {
        self.lock_state()
            .areas
            .get(&(parent_key.to_string(), name.to_lowercase()))
            .map(|stored| stored.candidate.clone())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn upsert_area(
        &self,
        parent_key: &str,
        candidate: &Candidate,
    ) -> Result<UpsertOutcome, PersistenceError> {
        let key = (parent_key.to_string(), candidate.name.to_lowercase());
        let mut state = self.lock_state();

        if let Some(stored) = state.areas.get_mut(&key) {
            stored.candidate = candidate.clone();
            return Ok(UpsertOutcome {
                id: stored.id,
                is_new: false,
            });
        }

        state.next_id += 1;
        let id = state.next_id;
        state.areas.insert(
            key,
            StoredArea {
                id,
                candidate: candidate.clone(),
            },
        );
        Ok(UpsertOutcome { id, is_new: true })
    }

    async fn upsert_city(&self, city: &CityRecord) -> Result<UpsertOutcome, PersistenceError> {
        let key = (city.country_code.to_uppercase(), city.name.to_lowercase());
        let mut state = self.lock_state();

        if let Some(&id) = state.cities.get(&key) {
            return Ok(UpsertOutcome { id, is_new: false });
        }

        state.next_id += 1;
        let id = state.next_id;
        state.cities.insert(key, id);
        Ok(UpsertOutcome { id, is_new: true })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceProvider;

    fn candidate(name: &str, lat: f64) -> Candidate {
        Candidate::new(
            name.to_string(),
            lat,
            -46.63,
            2000,
            SourceProvider::PrimaryPlaces,
            vec!["PPLX".to_string()],
        )
    }

    #[tokio::test]
    async fn test_upsert_area_inserts_then_updates() {
        let gateway = MemoryGateway::new();

        let first = gateway
            .upsert_area("br:sp:sao-paulo", &candidate("Pinheiros", -23.56))
            .await
            .unwrap();
        assert!(first.is_new);

        // Same natural key, fresher geometry
        let second = gateway
            .upsert_area("br:sp:sao-paulo", &candidate("PINHEIROS", -23.57))
            .await
            .unwrap();
        assert!(!second.is_new);
        assert_eq!(second.id, first.id);

        assert_eq!(gateway.area_count(), 1);
        let stored = gateway.area("br:sp:sao-paulo", "Pinheiros").unwrap();
        assert_eq!(stored.center_lat, -23.57);
    }

    #[tokio::test]
    async fn test_same_name_under_different_parents_is_two_rows() {
        let gateway = MemoryGateway::new();

        gateway
            .upsert_area("br:sp:sao-paulo", &candidate("Centro", -23.55))
            .await
            .unwrap();
        gateway
            .upsert_area("br:rj:rio-de-janeiro", &candidate("Centro", -22.90))
            .await
            .unwrap();

        assert_eq!(gateway.area_count(), 2);
    }

    #[tokio::test]
    async fn test_upsert_city_is_idempotent() {
        let gateway = MemoryGateway::new();
        let city = CityRecord {
            name: "Fortaleza".to_string(),
            lat: -3.71722,
            lng: -38.54306,
            population: Some(2_400_000),
            admin_name: Some("Ceara".to_string()),
            country_code: "BR".to_string(),
        };

        let first = gateway.upsert_city(&city).await.unwrap();
        let second = gateway.upsert_city(&city).await.unwrap();
        assert!(first.is_new);
        assert!(!second.is_new);
        assert_eq!(first.id, second.id);
    }
}
