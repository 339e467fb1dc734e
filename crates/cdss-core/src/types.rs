//! Domain types shared by the chunker, both indexes, fusion and reranking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, String>;

/// An ingested source record. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Meta,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: Meta::new() }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A window of a source document that is independently indexed.
///
/// - `id`: `"{doc_id}:{chunk_index}"`, unique within a corpus
/// - `doc_id`: lineage back to the source `Document`
/// - `metadata`: copied verbatim from the source document
/// - `start`/`end`: character offsets of the window in the document content
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub content: String,
    pub metadata: Meta,
    pub start: usize,
    pub end: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl Chunk {
    /// Length in characters, the unit `chunk_size` is measured in.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Indicates which stage produced a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Text,
    Vector,
    Fused,
}

/// One candidate from a retrieval stage.
///
/// `ordinal` is the chunk's position in the corpus snapshot (insertion
/// order) and is the tie-break key. `score` is stage-specific; higher is
/// better, and scores from different `source`s are never compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub ordinal: usize,
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// Candidates ordered best-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    hits: Vec<SearchHit>,
}

impl RankedList {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort `(ordinal, score)` pairs descending by score, ties by ordinal,
    /// and keep the first `k`.
    pub fn from_scored(source: SourceKind, chunks: &[Chunk], mut scored: Vec<(usize, f32)>, k: usize) -> Self {
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        let hits = scored
            .into_iter()
            .filter_map(|(ordinal, score)| {
                chunks.get(ordinal).map(|c| SearchHit { ordinal, id: c.id.clone(), score, source })
            })
            .collect();
        Self { hits }
    }

    /// Wrap hits that the caller has already put in final order.
    pub fn from_ordered(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchHit> {
        self.hits.iter()
    }

    pub fn ordinals(&self) -> Vec<usize> {
        self.hits.iter().map(|h| h.ordinal).collect()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }

    pub fn into_hits(self) -> Vec<SearchHit> {
        self.hits
    }
}

impl<'a> IntoIterator for &'a RankedList {
    type Item = &'a SearchHit;
    type IntoIter = std::slice::Iter<'a, SearchHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}
