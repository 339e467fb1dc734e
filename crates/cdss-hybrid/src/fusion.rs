//! Weighted rank fusion of the lexical and vector retrievers.
//!
//! Each source list is normalized on its own, then
//! `fused(c) = Σ weight_i × normalized_i(c)`, a chunk missing from a list
//! contributing 0 for it. The fused list is every chunk seen in either list,
//! best first; equal fused scores keep first-appearance order with the
//! lexical list enumerated before the vector list.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use cdss_core::config::{Normalization, RetrievalSettings};
use cdss_core::error::{Error, Result};
use cdss_core::traits::Retriever;
use cdss_core::types::{RankedList, SearchHit, SourceKind};

pub struct FusionRetriever {
    lexical: Arc<dyn Retriever>,
    vector: Arc<dyn Retriever>,
    settings: RetrievalSettings,
}

impl FusionRetriever {
    pub fn new(lexical: Arc<dyn Retriever>, vector: Arc<dyn Retriever>, settings: RetrievalSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { lexical, vector, settings })
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Upper bound on the fused list length: the union of both source lists.
    pub fn candidate_limit(&self) -> usize {
        self.settings.lexical_k.saturating_add(self.settings.vector_k)
    }

    /// Query both retrievers concurrently and fuse, keeping at most `k`.
    pub fn query(&self, text: &str, k: usize) -> Result<RankedList> {
        if k == 0 {
            return Err(Error::InvalidConfig("fusion k must be positive".into()));
        }
        let (lexical, vector) = thread::scope(|s| {
            let lexical = s.spawn(|| self.lexical.retrieve(text, self.settings.lexical_k));
            let vector = self.vector.retrieve(text, self.settings.vector_k);
            let lexical = lexical
                .join()
                .unwrap_or_else(|_| Err(Error::retrieval(self.lexical.name(), "retriever panicked")));
            (lexical, vector)
        });

        match (lexical, vector) {
            (Ok(l), Ok(v)) => {
                let fused = self.fuse(&l, &v, k);
                debug!(lexical = l.len(), vector = v.len(), fused = fused.len(), "fused");
                Ok(fused)
            }
            (Ok(l), Err(e)) => Ok(self.single_source(l, &e, k)),
            (Err(e), Ok(v)) => Ok(self.single_source(v, &e, k)),
            (Err(le), Err(ve)) => {
                if le.is_config() {
                    return Err(le);
                }
                if ve.is_config() {
                    return Err(ve);
                }
                Err(Error::AllRetrieversFailed(format!("{le}; {ve}")))
            }
        }
    }

    fn single_source(&self, survivor: RankedList, failure: &Error, k: usize) -> RankedList {
        warn!(error = %failure, survivor = survivor.len(), "retriever failed, ranking from the surviving source only");
        let mut hits = survivor.into_hits();
        hits.truncate(k);
        RankedList::from_ordered(hits)
    }

    fn fuse(&self, lexical: &RankedList, vector: &RankedList, k: usize) -> RankedList {
        let s = &self.settings;
        // ordinal -> (fused score, first appearance, chunk id)
        let mut acc: HashMap<usize, (f32, usize, String)> = HashMap::new();
        let mut seen = 0usize;
        for (list, weight) in [(lexical, s.lexical_weight), (vector, s.vector_weight)] {
            for (hit, norm) in list.iter().zip(normalize(list, s.normalization, s.rrf_k)) {
                let entry = acc.entry(hit.ordinal).or_insert_with(|| {
                    seen += 1;
                    (0.0, seen, hit.id.clone())
                });
                entry.0 += weight * norm;
            }
        }
        let mut fused: Vec<(usize, (f32, usize, String))> = acc.into_iter().collect();
        fused.sort_by(|a, b| b.1 .0.total_cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
        fused.truncate(k);
        RankedList::from_ordered(
            fused
                .into_iter()
                .map(|(ordinal, (score, _, id))| SearchHit { ordinal, id, score, source: SourceKind::Fused })
                .collect(),
        )
    }
}

impl Retriever for FusionRetriever {
    fn name(&self) -> &str {
        "fusion"
    }

    fn retrieve(&self, query: &str, k: usize) -> Result<RankedList> {
        self.query(query, k)
    }
}

/// Per-list scores on a common scale, in list order.
pub fn normalize(list: &RankedList, normalization: Normalization, rrf_k: f32) -> Vec<f32> {
    match normalization {
        Normalization::ReciprocalRank => (0..list.len()).map(|rank| 1.0 / (rrf_k + rank as f32 + 1.0)).collect(),
        Normalization::MinMax => {
            let Some((min, max)) = min_max(list) else {
                return Vec::new();
            };
            let range = max - min;
            list.iter()
                .map(|h| if range < f32::EPSILON { 1.0 } else { (h.score - min) / range })
                .collect()
        }
    }
}

fn min_max(list: &RankedList) -> Option<(f32, f32)> {
    if list.is_empty() {
        return None;
    }
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for h in list {
        min = min.min(h.score);
        max = max.max(h.score);
    }
    Some((min, max))
}
