//! Pipeline lifecycle: build both indexes once, then serve queries.
//!
//! `UNINITIALIZED -> INDEX_BUILDING -> READY`, with `QUERYING` reported while
//! queries are in flight and `DEGRADED` after a failed build. Queries issued
//! during a build wait for it to finish.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use cdss_core::chunker::Chunker;
use cdss_core::config::{validate_top_k, Settings};
use cdss_core::corpus::{load_documents, seed_mock_if_missing};
use cdss_core::error::Result;
use cdss_core::traits::{Embedder, PairScorer};
use cdss_core::types::{Chunk, Document};
use cdss_text::LexicalIndex;
use cdss_vector::VectorIndex;

use crate::expand::{self, QueryExpander};
use crate::fusion::FusionRetriever;
use crate::rerank::Reranker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Uninitialized,
    IndexBuilding,
    Ready,
    Querying,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct DegradedState {
    pub reason: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub lexical_docs: usize,
    pub vectors: usize,
    /// Distinct chunk contents sent to the embedder.
    pub embedded: usize,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

struct Indexes {
    chunks: Arc<[Chunk]>,
    fusion: FusionRetriever,
}

enum Stage {
    Uninitialized,
    Ready(Arc<Indexes>),
    Degraded(DegradedState),
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Pipeline {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    reranker: Reranker,
    expander: Box<dyn QueryExpander>,
    stage: RwLock<Stage>,
    building: AtomicBool,
    in_flight: AtomicUsize,
}

impl Pipeline {
    pub fn new(settings: Settings, embedder: Arc<dyn Embedder>, scorer: Arc<dyn PairScorer>) -> Result<Self> {
        settings.validate()?;
        let expander = expand::from_settings(&settings.query);
        Ok(Self {
            settings,
            embedder,
            reranker: Reranker::new(scorer),
            expander,
            stage: RwLock::new(Stage::Uninitialized),
            building: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        })
    }

    pub fn with_expander(mut self, expander: Box<dyn QueryExpander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> PipelineState {
        if self.building.load(Ordering::SeqCst) {
            return PipelineState::IndexBuilding;
        }
        let stage = match self.stage.try_read() {
            Ok(stage) => stage,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => return PipelineState::IndexBuilding,
        };
        match &*stage {
            Stage::Uninitialized => PipelineState::Uninitialized,
            Stage::Degraded(_) => PipelineState::Degraded,
            Stage::Ready(_) if self.in_flight.load(Ordering::SeqCst) > 0 => PipelineState::Querying,
            Stage::Ready(_) => PipelineState::Ready,
        }
    }

    pub fn degraded(&self) -> Option<DegradedState> {
        match &*self.stage.read().unwrap_or_else(PoisonError::into_inner) {
            Stage::Degraded(d) => Some(d.clone()),
            _ => None,
        }
    }

    /// Chunk `documents` and build both indexes. A failure leaves the
    /// pipeline DEGRADED and is returned to the caller.
    pub fn build(&self, documents: &[Document]) -> Result<BuildReport> {
        self.run_build(|| Ok(documents))
    }

    /// Load the configured corpus (seeding the mock EHR if asked to) and build.
    /// `base` resolves a relative corpus path.
    pub fn build_from_corpus(&self, base: &Path) -> Result<BuildReport> {
        let corpus = &self.settings.corpus;
        self.run_build(|| {
            let path = corpus.resolved_path(base);
            if corpus.seed_mock && seed_mock_if_missing(&path)? {
                info!("seeded mock EHR at {}", path.display());
            }
            load_documents(&path)
        })
    }

    fn run_build<D, F>(&self, load: F) -> Result<BuildReport>
    where
        D: AsRef<[Document]>,
        F: FnOnce() -> Result<D>,
    {
        let mut stage = self.stage.write().unwrap_or_else(PoisonError::into_inner);
        self.building.store(true, Ordering::SeqCst);
        info!("pipeline state: INDEX_BUILDING");
        let outcome = load().and_then(|docs| self.build_indexes(docs.as_ref()));
        let result = match outcome {
            Ok((indexes, report)) => {
                *stage = Stage::Ready(Arc::new(indexes));
                info!(
                    chunks = report.chunks,
                    embedded = report.embedded,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "pipeline state: READY"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "index construction failed, pipeline state: DEGRADED");
                *stage = Stage::Degraded(DegradedState { reason: e.to_string(), since: Utc::now() });
                Err(e)
            }
        };
        self.building.store(false, Ordering::SeqCst);
        result
    }

    fn build_indexes(&self, documents: &[Document]) -> Result<(Indexes, BuildReport)> {
        let start = Instant::now();
        let chunker = Chunker::new(self.settings.chunking)?;
        let chunks: Arc<[Chunk]> = chunker.split(documents)?.into();
        let lexical = LexicalIndex::build(chunks.clone())?;
        let embedding = &self.settings.embedding;
        let vector = VectorIndex::build(chunks.clone(), self.embedder.clone(), embedding.batch_size, embedding.show_progress)?;
        let report = BuildReport {
            documents: documents.len(),
            chunks: chunks.len(),
            lexical_docs: lexical.len(),
            vectors: vector.len(),
            embedded: vector.embedded(),
            elapsed: start.elapsed(),
        };
        let fusion = FusionRetriever::new(Arc::new(lexical), Arc::new(vector), self.settings.retrieval.clone())?;
        Ok((Indexes { chunks, fusion }, report))
    }

    /// Evidence for `query` with the configured `top_k`.
    pub fn query(&self, query: &str) -> Result<Vec<Chunk>> {
        self.query_with(query, self.settings.rerank.top_k)
    }

    /// Retrieve, fuse and rerank. No evidence, a pipeline that is not built
    /// or is DEGRADED, and failing retrievers all yield an empty list; only
    /// configuration errors are returned.
    pub fn query_with(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>> {
        validate_top_k(top_k)?;
        let indexes = match &*self.stage.read().unwrap_or_else(PoisonError::into_inner) {
            Stage::Uninitialized => {
                warn!("query before any index build, returning no evidence");
                return Ok(Vec::new());
            }
            Stage::Degraded(d) => {
                debug!(reason = %d.reason, "pipeline degraded, returning no evidence");
                return Ok(Vec::new());
            }
            Stage::Ready(indexes) => indexes.clone(),
        };
        let _in_flight = InFlight::enter(&self.in_flight);

        let retrieval_query = self.expander.expand(query);
        let fused = match indexes.fusion.query(&retrieval_query, indexes.fusion.candidate_limit()) {
            Ok(fused) => fused,
            Err(e) if e.is_config() => return Err(e),
            Err(e) => {
                warn!(error = %e, "retrieval failed, returning no evidence");
                return Ok(Vec::new());
            }
        };
        let candidates: Vec<Chunk> = fused.iter().filter_map(|h| indexes.chunks.get(h.ordinal).cloned()).collect();
        let evidence = self.reranker.rerank(query, &candidates, top_k)?;
        debug!(candidates = candidates.len(), evidence = evidence.len(), "query answered");
        Ok(evidence)
    }
}
