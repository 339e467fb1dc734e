//! cdss-text
//!
//! Lexical retrieval: an in-RAM tantivy index over the chunk snapshot, scored
//! with BM25. See `index` for the query path.

pub mod index;
pub mod tantivy_utils;

pub use index::LexicalIndex;
