use crate::error::Result;
use crate::types::RankedList;

/// Text → fixed-length vector. Must be deterministic for identical input.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Pairwise (query, passage) relevance model. Higher is more relevant;
/// scores are only comparable within one invocation.
pub trait PairScorer: Send + Sync {
    fn score(&self, query: &str, passage: &str) -> anyhow::Result<f32>;

    /// One model invocation for the whole batch. Implementations that support
    /// batched inference override this; the default scores pair by pair.
    fn score_batch(&self, query: &str, passages: &[&str]) -> anyhow::Result<Vec<f32>> {
        passages.iter().map(|p| self.score(query, p)).collect()
    }
}

/// A built, read-only index that ranks chunks for a query.
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;
    fn retrieve(&self, query: &str, k: usize) -> Result<RankedList>;
}
