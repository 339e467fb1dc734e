//! Content-addressed embedding cache for one index build.
//!
//! Chunks with identical content (repeated boilerplate, overlapping records)
//! are embedded once; later occurrences reuse the stored vector.

use std::collections::HashMap;

pub fn hash_content(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}

#[derive(Default)]
pub struct EmbeddingCache {
    entries: HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, content_hash: &str) -> Option<&[f32]> {
        self.entries.get(content_hash).map(Vec::as_slice)
    }

    pub fn contains(&self, content_hash: &str) -> bool {
        self.entries.contains_key(content_hash)
    }

    pub fn put(&mut self, content_hash: String, vector: Vec<f32>) {
        self.entries.insert(content_hash, vector);
    }

    /// Distinct contents embedded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
