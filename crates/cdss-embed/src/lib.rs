//! Embedding and pairwise-scoring collaborators.
//!
//! The candle models run XLM-RoBERTa checkpoints from a local directory
//! (`tokenizer.json`, `config.json`, `model.safetensors` or
//! `pytorch_model.bin`). The hash-based stand-ins in [`fake`] need no files.

use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use cdss_core::config::{expand_path, EmbeddingSettings, RerankerModelSettings};
use cdss_core::traits::{Embedder, PairScorer};

pub mod cross_encoder;
pub mod device;
pub mod fake;
pub mod pool;
pub mod tokenize;

pub use cross_encoder::CrossEncoderModel;
pub use device::{select_device, DeviceScope};
pub use fake::{HashEmbedder, OverlapScorer, UnavailableEmbedder, UnavailableScorer};
pub use pool::masked_mean_l2;

pub const FAKE_MODELS_ENV: &str = "CDSS_USE_FAKE_MODELS";
const DEFAULT_EMBED_DIR: &str = "models/bge-m3";
const DEFAULT_RERANK_DIR: &str = "models/bge-reranker-base";

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!("loading embedding model from {}", model_dir.display());
        let tokenizer = load_tokenizer(model_dir)?;
        let config: XLMRobertaConfig = load_model_config(model_dir)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        let pad_id = tokenize::pad_id(&tokenizer);
        info!(dim = config.hidden_size, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim: config.hidden_size, max_len, pad_id })
    }

    fn forward_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _scope = DeviceScope::enter(&self.device);
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let (input_ids, attention_mask) = tokenize::encode_padded(&self.tokenizer, inputs, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask.to_dtype(DType::F32)?)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        if rows.iter().any(|r| r.len() != self.dim) {
            bail!("embedding dimension mismatch: expected {}", self.dim);
        }
        Ok(rows)
    }
}

impl Embedder for EmbeddingModel {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let out = self.forward_batch(texts)?;
        debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

pub(crate) fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let path = model_dir.join("tokenizer.json");
    Tokenizer::from_file(&path).map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))
}

pub(crate) fn load_model_config(model_dir: &Path) -> Result<XLMRobertaConfig> {
    let path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&path).map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Prefer memory-mapped safetensors; fall back to a PyTorch pickle.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? };
        return Ok(vb);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if !pickle.exists() {
        bail!("no model weights in {}", model_dir.display());
    }
    let weights = candle_core::pickle::read_all(&pickle)?;
    let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}

fn fake_requested(configured: bool) -> bool {
    configured
        || std::env::var(FAKE_MODELS_ENV)
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
}

/// Configured directory, then `env_var`, then the conventional local paths.
fn resolve_model_dir(configured: Option<&str>, env_var: &str, default: &str) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() {
            return Ok(p);
        }
        bail!("configured model directory {} does not exist", p.display());
    }
    if let Ok(dir) = std::env::var(env_var) {
        let p = PathBuf::from(&dir);
        if p.exists() {
            info!("using {}: {}", env_var, p.display());
            return Ok(p);
        }
    }
    for candidate in [PathBuf::from("..").join(default), PathBuf::from(default)] {
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(anyhow!("could not locate model directory ({default})"))
}

pub fn load_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if fake_requested(settings.use_fake) {
        info!(dim = settings.fake_dim, "using HashEmbedder");
        return Ok(Arc::new(HashEmbedder::new(settings.fake_dim)));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref(), "CDSS_EMBED_MODEL_DIR", DEFAULT_EMBED_DIR)?;
    Ok(Arc::new(EmbeddingModel::load(&dir, settings.max_len)?))
}

/// Like [`load_embedder`], but a load failure yields an embedder that fails
/// every call, so index construction reports it instead of the process exiting.
pub fn embedder_or_unavailable(settings: &EmbeddingSettings) -> Arc<dyn Embedder> {
    load_embedder(settings).unwrap_or_else(|e| {
        warn!("embedding model unavailable: {:#}", e);
        Arc::new(UnavailableEmbedder::new(format!("{e:#}")))
    })
}

pub fn load_scorer(settings: &RerankerModelSettings) -> Result<Arc<dyn PairScorer>> {
    if fake_requested(settings.use_fake) {
        info!("using OverlapScorer");
        return Ok(Arc::new(OverlapScorer));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref(), "CDSS_RERANK_MODEL_DIR", DEFAULT_RERANK_DIR)?;
    Ok(Arc::new(CrossEncoderModel::load(&dir, settings.max_len)?))
}

/// A scorer load failure leaves reranking in its fail-soft mode.
pub fn scorer_or_unavailable(settings: &RerankerModelSettings) -> Arc<dyn PairScorer> {
    load_scorer(settings).unwrap_or_else(|e| {
        warn!("reranker model unavailable: {:#}", e);
        Arc::new(UnavailableScorer::new(format!("{e:#}")))
    })
}
