//! Deterministic, file-free collaborators for offline runs and tests.

use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use cdss_core::traits::{Embedder, PairScorer};

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

/// Bag-of-tokens embedding: each token lands in an xxhash bucket, the vector
/// is L2-normalized. Text without tokens embeds to the zero vector, and a
/// zero `dim` embeds everything to an empty vector.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 {
            return v;
        }
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign * (0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Fraction of distinct query tokens present in the passage.
pub struct OverlapScorer;

impl PairScorer for OverlapScorer {
    fn score(&self, query: &str, passage: &str) -> Result<f32> {
        let query_tokens: BTreeSet<String> = tokens(query).collect();
        if query_tokens.is_empty() {
            return Ok(0.0);
        }
        let passage_tokens: BTreeSet<String> = tokens(passage).collect();
        let hits = query_tokens.iter().filter(|t| passage_tokens.contains(*t)).count();
        Ok(hits as f32 / query_tokens.len() as f32)
    }
}

/// Stands in for an embedding model that failed to load.
pub struct UnavailableEmbedder {
    reason: String,
}

impl UnavailableEmbedder {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Embedder for UnavailableEmbedder {
    fn dim(&self) -> usize {
        0
    }

    fn max_len(&self) -> usize {
        0
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding model unavailable: {}", self.reason)
    }
}

/// Stands in for a reranker model that failed to load.
pub struct UnavailableScorer {
    reason: String,
}

impl UnavailableScorer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl PairScorer for UnavailableScorer {
    fn score(&self, _query: &str, _passage: &str) -> Result<f32> {
        bail!("reranker model unavailable: {}", self.reason)
    }
}
