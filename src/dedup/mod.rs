//! Candidate deduplication.
//!
//! Merges a new candidate batch against an accumulated result set using
//! combined name-similarity and spatial-proximity heuristics.

use crate::models::Candidate;
use crate::similarity::{haversine_distance_m, string_similarity};

/// Name similarity above which two candidates are duplicates regardless of
/// where they sit.
pub const NAME_DUP_THRESHOLD: f64 = 0.8;

/// Name similarity above which two candidates are duplicates when they are
/// also spatially colocated.
pub const NAME_NEAR_THRESHOLD: f64 = 0.6;

/// Distance below which moderately-similar names count as colocated, meters.
pub const PROXIMITY_DUP_METERS: f64 = 500.0;

/// Merges candidate batches against an accumulated set.
///
/// The pairwise rule is an asymmetric double threshold: near-identical names
/// are duplicates anywhere, but moderately-similar names only when they are
/// also within [`PROXIMITY_DUP_METERS`] of each other. This avoids merging
/// two genuinely distinct but similarly-named areas on opposite sides of a
/// city.
#[derive(Clone, Debug)]
pub struct Deduplicator {
    name_dup: f64,
    name_near: f64,
    proximity_m: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            name_dup: NAME_DUP_THRESHOLD,
            name_near: NAME_NEAR_THRESHOLD,
            proximity_m: PROXIMITY_DUP_METERS,
        }
    }
}

impl Deduplicator {
    /// Create a deduplicator with the standard thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return only the net-new, non-duplicate members of `batch`.
    ///
    /// A batch member is disqualified by any match in `existing` or in the
    /// batch members already accepted during this merge; the check
    /// short-circuits on the first match since the rule is existential -
    /// membership does not depend on which matching entry is found first.
    pub fn merge(&self, existing: &[Candidate], batch: Vec<Candidate>) -> Vec<Candidate> {
        let mut fresh: Vec<Candidate> = Vec::with_capacity(batch.len());

        for candidate in batch {
            let duplicate = existing
                .iter()
                .chain(fresh.iter())
                .any(|kept| self.is_duplicate(&candidate, kept));

            if !duplicate {
                fresh.push(candidate);
            }
        }

        fresh
    }

    /// Pairwise duplicate rule.
    fn is_duplicate(&self, candidate: &Candidate, kept: &Candidate) -> bool {
        let similarity = string_similarity(&candidate.name, &kept.name);

        if similarity > self.name_dup {
            return true;
        }

        similarity > self.name_near
            && haversine_distance_m(
                candidate.center_lat,
                candidate.center_lng,
                kept.center_lat,
                kept.center_lng,
            ) < self.proximity_m
    }
}
