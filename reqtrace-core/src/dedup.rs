//! Near-duplicate collapsing by embedding similarity

use tracing::debug;

use crate::embedding::{cosine_similarity, Embedder};
use crate::errors::Result;
use crate::models::RequirementCandidate;

/// Collapses candidates whose embeddings are closer than a threshold.
///
/// Single greedy pass in input order. A candidate not yet subsumed becomes a
/// seed and subsumes every later candidate whose similarity to that seed
/// exceeds the threshold. Only the seed is compared, so subsumption is not
/// transitive.
pub struct Deduplicator<'a> {
    embedder: &'a dyn Embedder,
    threshold: f64,
}

impl<'a> Deduplicator<'a> {
    pub fn new(embedder: &'a dyn Embedder, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
        }
    }

    /// Returns the seeds in first-seen order
    pub fn dedup(&self, candidates: Vec<RequirementCandidate>) -> Result<Vec<RequirementCandidate>> {
        if candidates.len() < 2 {
            return Ok(candidates);
        }

        let texts: Vec<&str> = candidates.iter().map(|c| c.cleaned_text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        let keep = seed_mask(&vectors, self.threshold);

        let before = candidates.len();
        let seeds: Vec<RequirementCandidate> = candidates
            .into_iter()
            .zip(keep)
            .filter_map(|(candidate, keep)| keep.then_some(candidate))
            .collect();
        debug!(before, after = seeds.len(), "Deduplicated candidates");
        Ok(seeds)
    }
}

/// Marks which vectors survive greedy seed-only clustering
pub fn seed_mask(vectors: &[Vec<f32>], threshold: f64) -> Vec<bool> {
    let mut subsumed = vec![false; vectors.len()];
    for i in 0..vectors.len() {
        if subsumed[i] {
            continue;
        }
        for j in (i + 1)..vectors.len() {
            if !subsumed[j] && cosine_similarity(&vectors[i], &vectors[j]) > threshold {
                subsumed[j] = true;
            }
        }
    }
    subsumed.into_iter().map(|s| !s).collect()
}
