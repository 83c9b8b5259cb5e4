//! Discovery pipeline orchestration.
//!
//! The orchestrator walks a declarative layer plan: each layer names a
//! provider, a threshold below which it runs, and an optional distance
//! filter. Provider failures never abort the cascade; a failed layer
//! simply contributes nothing and the next one runs. When every provider
//! layer comes up empty, the synthetic grid guarantees a non-empty result
//! for any entity with valid coordinates.
//!
//! Layers run strictly sequentially, paced by the injected [`Pacing`]
//! policy, and check the cancellation token before every provider call.

mod layers;
mod synthetic;

pub use layers::{default_plan, LayerSpec, SYNTHETIC_LAYER};
pub use synthetic::synthetic_grid;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::dedup::Deduplicator;
use crate::errors::{DiscoveryError, LayerPolicy};
use crate::models::{Candidate, CityFilter, CityPage, DiscoveryResult, PlaceRef, QueryContext};
use crate::provider::{GeoDataProvider, Pacing};
use crate::ratelimit::RateLimiter;
use crate::similarity::haversine_distance_m;

/// Multi-provider discovery orchestrator.
///
/// Holds the provider registry, the shared rate limiter, and the layer
/// plan. One instance serves any number of entities; the limiter budget
/// is global across them.
pub struct DiscoveryOrchestrator {
    providers: HashMap<String, Arc<dyn GeoDataProvider>>,
    limiter: Arc<RateLimiter>,
    dedup: Deduplicator,
    plan: Vec<LayerSpec>,
    pacing: Pacing,
}

impl DiscoveryOrchestrator {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            providers: HashMap::new(),
            limiter,
            dedup: Deduplicator::new(),
            plan: default_plan(),
            pacing: Pacing::default(),
        }
    }

    /// Register a provider and configure its budget on the shared limiter.
    pub fn register(&mut self, provider: Arc<dyn GeoDataProvider>) {
        let id = provider.id();
        self.limiter
            .configure(&std::borrow::Cow::Borrowed(id), provider.rate_budget());
        debug!("Registered provider: {}", id);
        self.providers.insert(id.to_string(), provider);
    }

    /// Replace the layer plan (tests reorder or shrink the cascade).
    pub fn with_plan(mut self, plan: Vec<LayerSpec>) -> Self {
        self.plan = plan;
        self
    }

    /// Override the pacing policy (tests inject zero delays).
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Shared limiter handle, for callers that surface usage stats.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Discover sub-city areas for one entity by walking the cascade.
    ///
    /// Fails fast with `NoCandidatesFound` when the entity's own
    /// coordinates are out of range, since the synthetic fallback has
    /// nothing to anchor on. Every other failure mode degrades to a
    /// skipped layer.
    pub async fn discover_neighborhoods(
        &self,
        entity: &PlaceRef,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        if !entity.has_valid_coordinates() {
            return Err(DiscoveryError::NoCandidatesFound {
                entity: entity.name.clone(),
            });
        }

        let layer_names: Vec<&str> = self
            .plan
            .iter()
            .map(|l| l.name)
            .chain(std::iter::once(SYNTHETIC_LAYER))
            .collect();
        let mut result = DiscoveryResult::with_layers(layer_names);

        info!(
            "Discovering areas for '{}' ({})",
            entity.name, entity.country_code
        );

        let mut ran_before = false;
        for layer in &self.plan {
            if cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }
            if !layer.should_run(result.len()) {
                debug!(
                    "Layer {} skipped: {} candidates already accumulated",
                    layer.name,
                    result.len()
                );
                continue;
            }

            let Some(provider) = self.providers.get(layer.provider) else {
                warn!(
                    "Layer {} skipped: provider {} not registered",
                    layer.name, layer.provider
                );
                continue;
            };

            if ran_before && !self.pacing.inter_layer.is_zero() {
                sleep(self.pacing.inter_layer).await;
            }
            ran_before = true;

            let context =
                QueryContext::new(entity.clone(), layer.shape).with_cancel(cancel.clone());

            match provider.query(&context).await {
                Ok(batch) => {
                    let batch = self.apply_distance_filter(layer, entity, batch);
                    let fresh = self.dedup.merge(&result.candidates, batch);
                    debug!("Layer {}: {} net-new candidates", layer.name, fresh.len());
                    result.absorb(layer.name, fresh);
                }
                Err(e) => match e.layer_policy() {
                    LayerPolicy::Fatal => return Err(e),
                    LayerPolicy::SkipLayer => {
                        if let DiscoveryError::RateLimited { retry_after, .. } = &e {
                            warn!(
                                "Layer {} rate limited; usable again in {}s",
                                layer.name,
                                retry_after.as_secs()
                            );
                        } else {
                            error!("Layer {} failed: {}", layer.name, e);
                        }
                    }
                },
            }
        }

        if result.is_empty() {
            info!(
                "All provider layers empty for '{}'; generating synthetic grid",
                entity.name
            );
            result.absorb(SYNTHETIC_LAYER, synthetic_grid(entity));
        }

        if result.is_empty() {
            return Err(DiscoveryError::NoCandidatesFound {
                entity: entity.name.clone(),
            });
        }

        info!(
            "Discovery for '{}' finished with {} candidates",
            entity.name,
            result.len()
        );
        Ok(result)
    }

    /// List a country's first-level administrative divisions.
    pub async fn discover_states(
        &self,
        country_code: &str,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryResult, DiscoveryError> {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        let provider = self.provider_supporting(|c| c.supports_states, "states")?;
        let states = provider.states(country_code).await?;

        let mut result = DiscoveryResult::with_layers(["states"]);
        result.absorb("states", states);
        Ok(result)
    }

    /// Fetch one page of a country's cities above a population floor.
    /// Callers drive pagination with the returned `next_offset`.
    pub async fn discover_cities_bulk(
        &self,
        country_code: &str,
        population_min: i64,
        batch_size: usize,
        start_offset: usize,
        cancel: &CancellationToken,
    ) -> Result<CityPage, DiscoveryError> {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Cancelled);
        }

        let provider = self.provider_supporting(|c| c.supports_cities, "cities")?;
        let filter = CityFilter {
            country_code: country_code.to_string(),
            population_min,
            batch_size,
            start_offset,
        };
        provider.cities(&filter).await
    }

    /// First registered provider whose capabilities pass the predicate,
    /// in plan order so lookup is deterministic.
    fn provider_supporting(
        &self,
        pred: impl Fn(&crate::provider::ProviderCapabilities) -> bool,
        operation: &str,
    ) -> Result<&Arc<dyn GeoDataProvider>, DiscoveryError> {
        self.plan
            .iter()
            .filter_map(|layer| self.providers.get(layer.provider))
            .find(|p| pred(&p.capabilities()))
            .ok_or_else(|| DiscoveryError::Unsupported {
                operation: operation.to_string(),
                provider: "any".to_string(),
            })
    }

    fn apply_distance_filter(
        &self,
        layer: &LayerSpec,
        entity: &PlaceRef,
        batch: Vec<Candidate>,
    ) -> Vec<Candidate> {
        let Some(max_distance) = layer.max_distance_m else {
            return batch;
        };

        let before = batch.len();
        let kept: Vec<Candidate> = batch
            .into_iter()
            .filter(|c| {
                haversine_distance_m(entity.lat, entity.lng, c.center_lat, c.center_lng)
                    <= max_distance
            })
            .collect();
        if kept.len() < before {
            debug!(
                "Layer {}: {} candidates beyond {:.0} m dropped",
                layer.name,
                before - kept.len(),
                max_distance
            );
        }
        kept
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::models::SourceProvider;
    use crate::provider::ProviderCapabilities;
    use crate::ratelimit::RateBudget;

    #[derive(Clone)]
    enum MockReply {
        Areas(Vec<Candidate>),
        RateLimited,
        HttpError,
    }

    struct MockProvider {
        id: &'static str,
        reply: MockReply,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: &'static str, reply: MockReply) -> Arc<Self> {
            Arc::new(Self {
                id,
                reply,
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeoDataProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                supports_areas: true,
                supports_states: true,
                supports_cities: true,
            }
        }

        fn rate_budget(&self) -> RateBudget {
            RateBudget::default()
        }

        async fn query(&self, _context: &QueryContext) -> Result<Vec<Candidate>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                MockReply::Areas(candidates) => Ok(candidates.clone()),
                MockReply::RateLimited => Err(DiscoveryError::RateLimited {
                    provider: self.id.to_string(),
                    retry_after: Duration::from_secs(600),
                }),
                MockReply::HttpError => Err(DiscoveryError::Http {
                    provider: self.id.to_string(),
                    message: "HTTP 500 - boom".to_string(),
                }),
            }
        }

        async fn states(&self, _country_code: &str) -> Result<Vec<Candidate>, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                MockReply::Areas(candidates) => Ok(candidates.clone()),
                _ => Err(DiscoveryError::Http {
                    provider: self.id.to_string(),
                    message: "HTTP 500 - boom".to_string(),
                }),
            }
        }

        async fn cities(&self, filter: &CityFilter) -> Result<CityPage, DiscoveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CityPage {
                cities: vec![],
                has_more: false,
                next_offset: filter.start_offset,
            })
        }
    }

    fn entity() -> PlaceRef {
        PlaceRef::new("Sobral", "BR", -3.6880, -40.3497)
    }

    fn area(name: &str, lat: f64, lng: f64) -> Candidate {
        Candidate::new(
            name.to_string(),
            lat,
            lng,
            2000,
            SourceProvider::PrimaryPlaces,
            vec!["PPLX".to_string()],
        )
    }

    /// Fixture areas spaced so no pair trips the duplicate rule: names
    /// differ in two characters and neighbors sit about 670 m apart.
    fn many_areas(count: usize) -> Vec<Candidate> {
        assert!(count <= 25);
        (0..count)
            .map(|i| {
                let letter = (b'A' + i as u8) as char;
                area(
                    &format!("Vila {}{}", letter, letter),
                    -3.6880 + 0.006 * i as f64,
                    -40.3497,
                )
            })
            .collect()
    }

    fn orchestrator(
        providers: Vec<Arc<MockProvider>>,
    ) -> DiscoveryOrchestrator {
        let mut orch = DiscoveryOrchestrator::new(Arc::new(RateLimiter::new()))
            .with_pacing(Pacing::none());
        for p in providers {
            orch.register(p);
        }
        orch
    }

    #[tokio::test]
    async fn test_all_empty_yields_exactly_nine_synthetic_candidates() {
        let mocks: Vec<Arc<MockProvider>> = ["GEONAMES", "NOMINATIM", "PLACES_TEXT", "PLACES_NEARBY"]
            .into_iter()
            .map(|id| MockProvider::new(id, MockReply::Areas(vec![])))
            .collect();
        let orch = orchestrator(mocks);

        let result = orch
            .discover_neighborhoods(&entity(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.len(), 9);
        assert!(result
            .candidates
            .iter()
            .all(|c| c.source == SourceProvider::SyntheticGrid));
        assert_eq!(result.layer_stats[SYNTHETIC_LAYER], 9);
        assert_eq!(result.layer_stats["primary"], 0);

        let center = result
            .candidates
            .iter()
            .find(|c| c.name == "Centro")
            .unwrap();
        assert_eq!(center.center_lat, -3.6880);
        assert_eq!(center.center_lng, -40.3497);
    }

    #[tokio::test]
    async fn test_rich_primary_short_circuits_later_layers() {
        let primary = MockProvider::new("GEONAMES", MockReply::Areas(many_areas(25)));
        let boundary = MockProvider::new("NOMINATIM", MockReply::Areas(many_areas(10)));
        let grid = MockProvider::new("PLACES_TEXT", MockReply::Areas(many_areas(10)));
        let nearby = MockProvider::new("PLACES_NEARBY", MockReply::Areas(many_areas(10)));
        let orch = orchestrator(vec![
            primary.clone(),
            boundary.clone(),
            grid.clone(),
            nearby.clone(),
        ]);

        let result = orch
            .discover_neighborhoods(&entity(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.len(), 25);
        assert_eq!(result.layer_stats["primary"], 25);
        assert_eq!(primary.call_count(), 1);
        assert_eq!(boundary.call_count(), 0);
        assert_eq!(grid.call_count(), 0);
        assert_eq!(nearby.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_downgrades_to_empty_layer() {
        let primary = MockProvider::new("GEONAMES", MockReply::HttpError);
        let boundary = MockProvider::new("NOMINATIM", MockReply::Areas(many_areas(18)));
        let orch = orchestrator(vec![primary.clone(), boundary.clone()]);

        let result = orch
            .discover_neighborhoods(&entity(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.layer_stats["primary"], 0);
        // Broad boundary ran (0 < 20) and seeded the set past the narrow
        // threshold, so only the broad call happened
        assert_eq!(result.layer_stats["admin-boundary-broad"], 18);
        assert_eq!(boundary.call_count(), 1);
        assert_eq!(result.len(), 18);
    }

    #[tokio::test]
    async fn test_rate_limited_layer_is_skipped_not_fatal() {
        let primary = MockProvider::new("GEONAMES", MockReply::RateLimited);
        let boundary = MockProvider::new("NOMINATIM", MockReply::Areas(many_areas(3)));
        let orch = orchestrator(vec![primary, boundary]);

        let result = orch
            .discover_neighborhoods(&entity(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.layer_stats["primary"], 0);
        assert!(result.len() >= 3);
    }

    #[tokio::test]
    async fn test_invalid_coordinates_fail_fast() {
        let primary = MockProvider::new("GEONAMES", MockReply::Areas(many_areas(5)));
        let orch = orchestrator(vec![primary.clone()]);

        let broken = PlaceRef::new("Nowhere", "BR", -95.0, -40.0);
        let err = orch
            .discover_neighborhoods(&broken, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DiscoveryError::NoCandidatesFound { .. }));
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_is_fatal() {
        let primary = MockProvider::new("GEONAMES", MockReply::Areas(many_areas(5)));
        let orch = orchestrator(vec![primary.clone()]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orch
            .discover_neighborhoods(&entity(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DiscoveryError::Cancelled));
        assert_eq!(primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_broad_boundary_layer_drops_distant_results() {
        let primary = MockProvider::new("GEONAMES", MockReply::Areas(vec![]));
        // One local hit and one result a few hundred km away
        let boundary = MockProvider::new(
            "NOMINATIM",
            MockReply::Areas(vec![
                area("Centro Histórico", -3.6900, -40.3500),
                area("Sobradinho", -12.8330, -39.1000),
            ]),
        );
        let orch = orchestrator(vec![primary, boundary]);

        let result = orch
            .discover_neighborhoods(&entity(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.layer_stats["admin-boundary-broad"], 1);
        assert!(result.candidates.iter().any(|c| c.name == "Centro Histórico"));
        assert!(!result.candidates.iter().any(|c| c.name == "Sobradinho"));
    }

    #[tokio::test]
    async fn test_cross_layer_duplicates_are_not_recounted() {
        let primary = MockProvider::new(
            "GEONAMES",
            MockReply::Areas(vec![area("Dom Expedito", -3.6950, -40.3550)]),
        );
        // Same place again, plus one genuinely new area
        let boundary = MockProvider::new(
            "NOMINATIM",
            MockReply::Areas(vec![
                area("Dom Expedito", -3.6951, -40.3551),
                area("Junco", -3.6700, -40.3400),
            ]),
        );
        let orch = orchestrator(vec![primary, boundary]);

        let result = orch
            .discover_neighborhoods(&entity(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.layer_stats["primary"], 1);
        assert_eq!(result.layer_stats["admin-boundary-broad"], 1);
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_discover_states_uses_capable_provider() {
        let primary = MockProvider::new(
            "GEONAMES",
            MockReply::Areas(vec![area("Ceará", -5.0, -39.6)]),
        );
        let orch = orchestrator(vec![primary.clone()]);

        let result = orch
            .discover_states("BR", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.layer_stats["states"], 1);
        assert_eq!(primary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_discover_states_without_provider_is_unsupported() {
        let orch = orchestrator(vec![]);
        let err = orch
            .discover_states("BR", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_discover_cities_bulk_passes_filter_through() {
        let primary = MockProvider::new("GEONAMES", MockReply::Areas(vec![]));
        let orch = orchestrator(vec![primary.clone()]);

        let page = orch
            .discover_cities_bulk("BR", 50_000, 100, 200, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.next_offset, 200);
        assert!(!page.has_more);
        assert_eq!(primary.call_count(), 1);
    }
}
