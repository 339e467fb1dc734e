//! Query expansion applied before retrieval.
//!
//! Only the retrieval query is rewritten; reranking scores the question as
//! the user asked it.

use cdss_core::config::QuerySettings;

pub trait QueryExpander: Send + Sync {
    fn expand(&self, query: &str) -> String;
}

pub struct NoExpansion;

impl QueryExpander for NoExpansion {
    fn expand(&self, query: &str) -> String {
        query.to_string()
    }
}

/// Appends fixed context, e.g. `" (medical context)"`.
pub struct SuffixExpansion {
    suffix: String,
}

impl SuffixExpansion {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }
}

impl QueryExpander for SuffixExpansion {
    fn expand(&self, query: &str) -> String {
        format!("{}{}", query, self.suffix)
    }
}

pub fn from_settings(settings: &QuerySettings) -> Box<dyn QueryExpander> {
    match settings.expansion_suffix.as_deref() {
        Some(suffix) if !suffix.is_empty() => Box::new(SuffixExpansion::new(suffix)),
        _ => Box::new(NoExpansion),
    }
}
