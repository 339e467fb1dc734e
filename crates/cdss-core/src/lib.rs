//! cdss-core
//!
//! Domain types, error taxonomy, collaborator traits, the chunker, corpus
//! loading and layered configuration shared by every other crate.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::{Chunker, ChunkingConfig};
pub use error::{Error, Result};
pub use types::{Chunk, Document, Meta, RankedList, SearchHit, SourceKind};
