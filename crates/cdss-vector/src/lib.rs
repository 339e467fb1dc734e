//! cdss-vector
//!
//! Embedding-based nearest-neighbour retrieval over chunk snapshots.

pub mod cache;
pub mod index;

pub use index::VectorIndex;
