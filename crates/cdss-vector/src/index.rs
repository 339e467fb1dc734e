use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use cdss_core::error::{Error, Result};
use cdss_core::traits::{Embedder, Retriever};
use cdss_core::types::{Chunk, RankedList, SourceKind};

use crate::cache::{hash_content, EmbeddingCache};

fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::EmbeddingUnavailable(e.to_string())
}

/// Brute-force cosine retriever over an immutable chunk snapshot.
///
/// Vectors are stored row-major with their norms precomputed. Chunks whose
/// embedding is the zero vector never match.
pub struct VectorIndex {
    chunks: Arc<[Chunk]>,
    embedder: Arc<dyn Embedder>,
    dim: usize,
    vectors: Vec<f32>,
    norms: Vec<f32>,
    embedded: usize,
}

impl VectorIndex {
    pub const NAME: &'static str = "vector";

    /// Embed every chunk once, `batch_size` distinct contents per embedder
    /// call. Any embedder failure aborts the build.
    pub fn build(chunks: Arc<[Chunk]>, embedder: Arc<dyn Embedder>, batch_size: usize, show_progress: bool) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("embedding batch_size must be positive".into()));
        }
        let start = Instant::now();
        let pb = if show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let hashes: Vec<String> = chunks.iter().map(|c| hash_content(&c.content)).collect();
        let mut cache = EmbeddingCache::new();
        let mut dim: Option<usize> = None;

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let offset = batch_no * batch_size;
            let mut texts = Vec::new();
            let mut miss_hashes = Vec::new();
            for (i, c) in batch.iter().enumerate() {
                let h = &hashes[offset + i];
                if !cache.contains(h) && !miss_hashes.contains(h) {
                    texts.push(c.content.clone());
                    miss_hashes.push(h.clone());
                }
            }
            if !texts.is_empty() {
                let embs = embedder.embed_batch(&texts).map_err(unavailable)?;
                if embs.len() != texts.len() {
                    return Err(unavailable(format!("embedder returned {} vectors for {} texts", embs.len(), texts.len())));
                }
                for (h, v) in miss_hashes.into_iter().zip(embs) {
                    let expected = *dim.get_or_insert(v.len());
                    if v.is_empty() || v.len() != expected {
                        return Err(unavailable(format!("dim mismatch: got {} expected {}", v.len(), expected)));
                    }
                    if v.iter().any(|x| !x.is_finite()) {
                        return Err(unavailable("embedder returned a non-finite component"));
                    }
                    cache.put(h, v);
                }
            }
            pb.inc(batch.len() as u64);
        }

        let dim = match dim {
            Some(d) => d,
            None => return Err(unavailable("no chunk was embedded")),
        };
        if embedder.dim() != dim {
            return Err(unavailable(format!("embedder reports dim {} but produced {}", embedder.dim(), dim)));
        }

        let mut vectors = Vec::with_capacity(chunks.len() * dim);
        let mut norms = Vec::with_capacity(chunks.len());
        for h in &hashes {
            let v = cache.get(h).ok_or_else(|| unavailable("chunk vector missing from cache"))?;
            norms.push(l2_norm(v));
            vectors.extend_from_slice(v);
        }
        pb.finish_with_message("done");

        let embedded = cache.len();
        info!(
            chunks = chunks.len(),
            embedded,
            reused = chunks.len() - embedded,
            dim,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "vector index built"
        );
        Ok(Self { chunks, embedder, dim, vectors, norms, embedded })
    }

    pub fn len(&self) -> usize {
        self.norms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Distinct chunk contents sent to the embedder.
    pub fn embedded(&self) -> usize {
        self.embedded
    }

    /// Top `k` chunks by cosine similarity to the embedded query.
    pub fn query(&self, text: &str, k: usize) -> Result<RankedList> {
        if k == 0 {
            return Err(Error::InvalidConfig("vector k must be positive".into()));
        }
        let q = self
            .embedder
            .embed_batch(&[text.to_string()])
            .map_err(|e| Error::retrieval(Self::NAME, e))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::retrieval(Self::NAME, "embedder returned no query vector"))?;
        if q.len() != self.dim {
            return Err(Error::retrieval(Self::NAME, format!("query dim {} does not match index dim {}", q.len(), self.dim)));
        }
        let q_norm = l2_norm(&q);
        if q_norm == 0.0 || !q_norm.is_finite() {
            debug!("query embedded to a zero vector");
            return Ok(RankedList::empty());
        }
        let scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dim)
            .zip(&self.norms)
            .enumerate()
            .filter(|(_, (_, n))| **n > 0.0)
            .map(|(ordinal, (v, n))| (ordinal, dot(&q, v) / (q_norm * n)))
            .collect();
        debug!(candidates = scored.len(), "vector query");
        Ok(RankedList::from_scored(SourceKind::Vector, &self.chunks, scored, k))
    }
}

impl Retriever for VectorIndex {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn retrieve(&self, query: &str, k: usize) -> Result<RankedList> {
        self.query(query, k)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
