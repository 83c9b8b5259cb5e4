use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::candidate::Candidate;

/// Output of a discovery run.
///
/// The candidate sequence is ordered by layer (earlier layers first) and is
/// unique under the deduplicator's combined name/proximity rule. The stats
/// map records how many net-new candidates each layer contributed after
/// deduplication; layers that were skipped or contributed nothing appear
/// with a count of zero.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiscoveryResult {
    /// Deduplicated candidates in layer order
    pub candidates: Vec<Candidate>,

    /// Net-new contribution per layer, keyed by layer name
    pub layer_stats: HashMap<String, usize>,
}

impl DiscoveryResult {
    /// Create an empty result with every layer name pre-seeded to zero,
    /// so skipped layers are visible in the stats.
    pub fn with_layers<'a>(layer_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            candidates: Vec::new(),
            layer_stats: layer_names.into_iter().map(|n| (n.to_string(), 0)).collect(),
        }
    }

    /// Record a layer's net-new contribution and absorb the candidates.
    pub fn absorb(&mut self, layer: &str, fresh: Vec<Candidate>) {
        *self.layer_stats.entry(layer.to_string()).or_insert(0) += fresh.len();
        self.candidates.extend(fresh);
    }

    /// Total candidate count.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether no layer contributed anything.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceProvider;

    #[test]
    fn test_layers_preseeded_to_zero() {
        let result = DiscoveryResult::with_layers(["primary", "grid-search"]);
        assert_eq!(result.layer_stats["primary"], 0);
        assert_eq!(result.layer_stats["grid-search"], 0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_absorb_counts_net_new() {
        let mut result = DiscoveryResult::with_layers(["primary"]);
        let batch = vec![
            Candidate::new("A", 0.0, 0.0, 1000, SourceProvider::PrimaryPlaces, vec![]),
            Candidate::new("B", 0.1, 0.1, 1000, SourceProvider::PrimaryPlaces, vec![]),
        ];
        result.absorb("primary", batch);
        assert_eq!(result.layer_stats["primary"], 2);
        assert_eq!(result.len(), 2);
    }
}
