use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum window length in characters.
    pub chunk_size: usize,
    /// Characters shared between neighbouring windows.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Boundary preference, strongest first.
#[derive(Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [Boundary::Paragraph, Boundary::Line, Boundary::Sentence, Boundary::Word];

impl Boundary {
    /// Whether a window may end right before `chars[end]`.
    fn matches(self, chars: &[char], end: usize) -> bool {
        let prev = chars[end - 1];
        match self {
            Boundary::Paragraph => prev == '\n' && end >= 2 && chars[end - 2] == '\n',
            Boundary::Line => prev == '\n',
            Boundary::Sentence => prev.is_whitespace() && end >= 2 && matches!(chars[end - 2], '.' | '!' | '?'),
            Boundary::Word => prev.is_whitespace(),
        }
    }
}

pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split every non-empty document into overlapping windows. The output
    /// order (documents in input order, windows left to right) is the corpus
    /// insertion order used for tie-breaking downstream.
    pub fn split(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        let mut used = 0usize;
        for doc in documents {
            if doc.content.trim().is_empty() {
                debug!(doc_id = %doc.id, "skipping document with empty content");
                continue;
            }
            let chunks = self.split_document(doc);
            debug!(doc_id = %doc.id, chunks = chunks.len(), "document chunked");
            all_chunks.extend(chunks);
            used += 1;
        }
        if all_chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        info!(documents = used, chunks = all_chunks.len(), "corpus chunked");
        Ok(all_chunks)
    }

    fn split_document(&self, doc: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = doc.content.chars().collect();
        let windows = self.windows(&chars);
        let total_chunks = windows.len();
        windows
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| Chunk {
                id: format!("{}:{}", doc.id, chunk_index),
                doc_id: doc.id.clone(),
                content: chars[start..end].iter().collect(),
                metadata: doc.metadata.clone(),
                start,
                end,
                chunk_index,
                total_chunks,
            })
            .collect()
    }

    /// Character ranges `[start, end)` of each window. Consecutive windows share
    /// exactly `chunk_overlap` characters.
    fn windows(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let ChunkingConfig { chunk_size, chunk_overlap } = self.config;
        let n = chars.len();
        let mut out = Vec::new();
        let mut start = 0usize;
        loop {
            let hard_end = (start + chunk_size).min(n);
            let end = if hard_end == n {
                n
            } else {
                // A break must leave the next window starting past `start`, and
                // should not produce windows shorter than half the budget.
                let lo = (start + chunk_overlap + 1).max(start + chunk_size / 2);
                find_break(chars, lo, hard_end)
            };
            out.push((start, end));
            if end >= n {
                break;
            }
            start = end - chunk_overlap;
        }
        out
    }

    /// Rebuild a document's content from its chunks (in `chunk_index` order)
    /// by dropping the overlapping prefix of each window.
    pub fn reassemble(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut covered = 0usize;
        for c in chunks {
            let skip = covered.saturating_sub(c.start);
            out.extend(c.content.chars().skip(skip));
            covered = covered.max(c.end);
        }
        out
    }
}

/// Latest end position in `lo..=hi` at the strongest available boundary,
/// falling back to a hard cut at `hi`.
fn find_break(chars: &[char], lo: usize, hi: usize) -> usize {
    for boundary in BOUNDARIES {
        if let Some(end) = (lo..=hi).rev().find(|&end| boundary.matches(chars, end)) {
            return end;
        }
    }
    hi
}

/// Convenience wrapper over [`Chunker`].
pub fn split(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Chunker::new(ChunkingConfig { chunk_size, chunk_overlap })?.split(documents)
}
