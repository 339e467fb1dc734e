use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use cdss_core::config::validate_top_k;
use cdss_core::error::Result;
use cdss_core::traits::PairScorer;
use cdss_core::types::Chunk;

/// Reorders fused candidates with a pairwise relevance model.
///
/// All candidates go to the scorer in one batch. If scoring fails the fused
/// order is kept, so the caller always gets evidence when there is some.
pub struct Reranker {
    scorer: Arc<dyn PairScorer>,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn PairScorer>) -> Self {
        Self { scorer }
    }

    /// Best-first, at most `top_k` and at most `candidates.len()` chunks.
    pub fn rerank(&self, query: &str, candidates: &[Chunk], top_k: usize) -> Result<Vec<Chunk>> {
        validate_top_k(top_k)?;
        Ok(self.order(query, candidates, top_k).into_iter().map(|i| candidates[i].clone()).collect())
    }

    /// Candidate positions in output order.
    fn order(&self, query: &str, candidates: &[Chunk], top_k: usize) -> Vec<usize> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let start = Instant::now();
        let passages: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
        let scores = match self.scorer.score_batch(query, &passages) {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                warn!(expected = candidates.len(), got = scores.len(), "reranker returned a partial batch, keeping fused order");
                return (0..candidates.len().min(top_k)).collect();
            }
            Err(e) => {
                warn!("reranker failed, keeping fused order: {:#}", e);
                return (0..candidates.len().min(top_k)).collect();
            }
        };
        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .map(|s| if s.is_nan() { f32::NEG_INFINITY } else { s })
            .enumerate()
            .collect();
        // Stable: equal scores keep input order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_k);
        debug!(candidates = candidates.len(), kept = ranked.len(), elapsed_ms = start.elapsed().as_millis() as u64, "reranked");
        ranked.into_iter().map(|(i, _)| i).collect()
    }
}
