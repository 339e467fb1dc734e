//! Layered configuration and path helpers.
//!
//! Figment merges built-in defaults, `config.toml`, `config.<env>.toml` and
//! `CDSS_*` env vars (`__` separates nesting, e.g. `CDSS_RERANK__TOP_K=5`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("CDSS_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed, validated view of the whole configuration.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
    pub rerank: RerankSettings,
    pub embedding: EmbeddingSettings,
    pub reranker: RerankerModelSettings,
    pub query: QuerySettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        self.rerank.validate()?;
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.fake_dim must be positive".into()));
        }
        if self.embedding.max_len == 0 || self.reranker.max_len == 0 {
            return Err(Error::InvalidConfig("model max_len must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub path: String,
    /// Write the mock EHR when `path` is missing or empty.
    pub seed_mock: bool,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self { path: "data/ehr_mock.json".to_string(), seed_mock: true }
    }
}

impl CorpusSettings {
    pub fn resolved_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.path)
    }
}

/// How a source list's scores are mapped onto a common scale before fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `1 / (rrf_k + rank)`, rank starting at 1.
    ReciprocalRank,
    /// `(score - min) / (max - min)` within the list.
    MinMax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub lexical_k: usize,
    pub vector_k: usize,
    pub lexical_weight: f32,
    pub vector_weight: f32,
    pub normalization: Normalization,
    pub rrf_k: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            lexical_k: 5,
            vector_k: 5,
            lexical_weight: 0.5,
            vector_weight: 0.5,
            normalization: Normalization::ReciprocalRank,
            rrf_k: 60.0,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        if self.lexical_k == 0 || self.vector_k == 0 {
            return Err(Error::InvalidConfig("retriever k must be positive".into()));
        }
        for (name, w) in [("lexical_weight", self.lexical_weight), ("vector_weight", self.vector_weight)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be a finite non-negative number, got {w}")));
            }
        }
        if self.lexical_weight + self.vector_weight <= 0.0 {
            return Err(Error::InvalidConfig("at least one fusion weight must be positive".into()));
        }
        if !self.rrf_k.is_finite() || self.rrf_k < 0.0 {
            return Err(Error::InvalidConfig(format!("rrf_k must be finite and non-negative, got {}", self.rrf_k)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub top_k: usize,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

impl RerankSettings {
    pub fn validate(&self) -> Result<()> {
        validate_top_k(self.top_k)
    }
}

pub fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(Error::InvalidConfig("top_k must be positive".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub batch_size: usize,
    pub max_len: usize,
    pub fake_dim: usize,
    pub show_progress: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, use_fake: false, batch_size: 32, max_len: 256, fake_dim: 384, show_progress: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerModelSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub max_len: usize,
}

impl Default for RerankerModelSettings {
    fn default() -> Self {
        Self { model_dir: None, use_fake: false, max_len: 512 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Appended to the retrieval query when set.
    pub expansion_suffix: Option<String>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
