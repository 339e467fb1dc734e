use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Corpus is empty: no document has non-empty content")]
    EmptyCorpus,

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Pairwise scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Retrieval failed in {retriever}: {message}")]
    Retrieval { retriever: String, message: String },

    #[error("All retrievers failed: {0}")]
    AllRetrieversFailed(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn retrieval(retriever: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Retrieval { retriever: retriever.into(), message: err.to_string() }
    }

    /// Configuration-level failures are the only errors a query surfaces.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
