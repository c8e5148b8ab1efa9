//! Text embedding
//!
//! The engines take any [`Embedder`]. [`HashingEmbedder`] is the built-in
//! model: deterministic feature hashing of unigrams and bigrams with blake3,
//! L2-normalized so cosine similarity reduces to a dot product.

use crate::errors::{Result, TraceError};

/// Maps text to a fixed-width vector
pub trait Embedder: Send + Sync {
    /// Identifier recorded alongside persisted vectors
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "be", "to", "of", "and", "in", "that", "it", "for", "on", "with", "as",
    "at", "this", "by", "from", "or", "is", "are", "was", "were", "been", "being", "its",
    "their", "shall", "must", "should", "will", "may", "can", "could", "would",
];

/// Deterministic feature-hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut slot = [0u8; 8];
        slot.copy_from_slice(&bytes[..8]);
        let index = (u64::from_le_bytes(slot) % self.dimensions as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "blake3-hashing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimensions];

        for token in &tokens {
            self.accumulate(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        normalize(&mut vector);
        Ok(vector)
    }
}

/// Lowercased alphanumeric tokens without stop words
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .filter(|s| !STOP_WORDS.contains(s))
        .map(str::to_string)
        .collect()
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity in [-1, 1]; 0.0 when either vector has no magnitude
/// or the widths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Cosine distance in [0, 2]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

/// Checks a vector against the width an index or engine expects
pub fn check_dimensions(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(TraceError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("The system shall export monthly reports.").unwrap();
        let b = embedder.embed("The system shall export monthly reports.").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_modal_wording_does_not_change_embedding() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("The system shall export reports").unwrap();
        let b = embedder.embed("The system must export reports.").unwrap();
        assert!(cosine_similarity(&a, &b) > 0.99);
    }

    #[test]
    fn test_unrelated_texts_are_dissimilar() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("The system shall allow users to log in.").unwrap();
        let b = embedder.embed("The system must encrypt passwords.").unwrap();
        assert!(cosine_similarity(&a, &b) < 0.85);
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("  ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&v, &v), 0.0);
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-9);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(2, &[0.0, 1.0]).is_ok());
        assert!(matches!(
            check_dimensions(3, &[0.0]),
            Err(TraceError::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }
}
