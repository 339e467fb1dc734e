#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cdss_core::chunker::split;
use cdss_core::error::{Error, Result};
use cdss_core::traits::{Embedder, PairScorer, Retriever};
use cdss_core::types::{Chunk, Document, RankedList, SearchHit, SourceKind};
use cdss_embed::HashEmbedder;

pub const EHR: [&str; 3] = ["Type 2 Diabetes diagnosed 2020", "Metformin 500mg BID", "HbA1c 7.5% last month"];

pub fn documents(texts: &[&str]) -> Vec<Document> {
    texts.iter().enumerate().map(|(i, t)| Document::new(format!("doc{i}"), *t)).collect()
}

pub fn chunks(texts: &[&str]) -> Vec<Chunk> {
    split(&documents(texts), 500, 50).expect("split")
}

/// Hits with ids `c{ordinal}` in the given order.
pub fn list(source: SourceKind, hits: &[(usize, f32)]) -> RankedList {
    RankedList::from_ordered(hits.iter().map(|&(ordinal, score)| SearchHit { ordinal, id: format!("c{ordinal}"), score, source }).collect())
}

/// Returns a canned list for any query.
pub struct Fixed {
    pub name: &'static str,
    pub list: RankedList,
}

impl Fixed {
    pub fn arc(name: &'static str, source: SourceKind, hits: &[(usize, f32)]) -> Arc<dyn Retriever> {
        Arc::new(Self { name, list: list(source, hits) })
    }
}

impl Retriever for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    fn retrieve(&self, _query: &str, k: usize) -> Result<RankedList> {
        let mut hits = self.list.clone().into_hits();
        hits.truncate(k);
        Ok(RankedList::from_ordered(hits))
    }
}

pub struct Failing(pub &'static str);

impl Retriever for Failing {
    fn name(&self) -> &str {
        self.0
    }

    fn retrieve(&self, _query: &str, _k: usize) -> Result<RankedList> {
        Err(Error::retrieval(self.0, "index offline"))
    }
}

/// Every chunk embeds to the zero vector.
pub struct ZeroEmbedder;

impl Embedder for ZeroEmbedder {
    fn dim(&self) -> usize {
        8
    }
    fn max_len(&self) -> usize {
        512
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
    }
}

pub struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn dim(&self) -> usize {
        8
    }
    fn max_len(&self) -> usize {
        512
    }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding service unreachable")
    }
}

/// Serves `budget` calls, then fails every call.
pub struct FailsAfter {
    pub inner: HashEmbedder,
    pub budget: AtomicUsize,
}

impl FailsAfter {
    pub fn new(budget: usize) -> Self {
        Self { inner: HashEmbedder::new(64), budget: AtomicUsize::new(budget) }
    }
}

impl Embedder for FailsAfter {
    fn dim(&self) -> usize {
        self.inner.dim()
    }
    fn max_len(&self) -> usize {
        self.inner.max_len()
    }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if self.budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_err() {
            anyhow::bail!("embedding service unreachable");
        }
        self.inner.embed_batch(texts)
    }
}

/// Scores passages from a lookup table (default 0) and records every batch.
#[derive(Default)]
pub struct TableScorer {
    pub scores: HashMap<String, f32>,
    pub batches: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
    pub fail: bool,
    pub short: bool,
}

impl TableScorer {
    pub fn new(scores: &[(&str, f32)]) -> Self {
        Self { scores: scores.iter().map(|(p, s)| (p.to_string(), *s)).collect(), ..Default::default() }
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl PairScorer for TableScorer {
    fn score(&self, _query: &str, passage: &str) -> anyhow::Result<f32> {
        Ok(self.scores.get(passage).copied().unwrap_or(0.0))
    }

    fn score_batch(&self, query: &str, passages: &[&str]) -> anyhow::Result<Vec<f32>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            anyhow::bail!("CUDA out of memory");
        }
        let mut out: Vec<f32> = passages.iter().map(|p| self.score(query, p)).collect::<anyhow::Result<_>>()?;
        if self.short {
            out.pop();
        }
        Ok(out)
    }
}
