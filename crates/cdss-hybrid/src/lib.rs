//! cdss-hybrid
//!
//! Fusion of the lexical and vector retrievers, pairwise reranking, and the
//! pipeline controller that owns both indexes.

pub mod expand;
pub mod fusion;
pub mod pipeline;
pub mod rerank;

pub use expand::{NoExpansion, QueryExpander, SuffixExpansion};
pub use fusion::FusionRetriever;
pub use pipeline::{BuildReport, DegradedState, Pipeline, PipelineState};
pub use rerank::Reranker;
