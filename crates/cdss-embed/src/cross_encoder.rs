use anyhow::{anyhow, bail, Result};
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device};
use candle_transformers::models::xlm_roberta::XLMRobertaForSequenceClassification;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use cdss_core::traits::PairScorer;

use crate::device::{select_device, DeviceScope};
use crate::tokenize;

/// Cross-encoder over `(query, passage)` pairs. The first logit is the score.
pub struct CrossEncoderModel {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    pad_id: u32,
}

impl CrossEncoderModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!("loading cross-encoder from {}", model_dir.display());
        let mut tokenizer = crate::load_tokenizer(model_dir)?;
        // Longest-first: the passage gives way before the query does.
        tokenizer
            .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        let config = crate::load_model_config(model_dir)?;
        let vb = crate::load_weights(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &config, vb)?;
        let pad_id = tokenize::pad_id(&tokenizer);
        info!("cross-encoder loaded");
        Ok(Self { model, tokenizer, device, max_len, pad_id })
    }
}

impl PairScorer for CrossEncoderModel {
    fn score(&self, query: &str, passage: &str) -> Result<f32> {
        let scores = self.score_batch(query, &[passage])?;
        scores.first().copied().ok_or_else(|| anyhow!("cross-encoder returned no score"))
    }

    fn score_batch(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let _scope = DeviceScope::enter(&self.device);
        let pairs: Vec<(&str, &str)> = passages.iter().map(|p| (query, *p)).collect();
        let (input_ids, attention_mask) = tokenize::encode_padded(&self.tokenizer, pairs, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let logits = self.model.forward(&input_ids, &attention_mask, &token_type_ids)?;
        let scores: Vec<f32> = logits.narrow(1, 0, 1)?.squeeze(1)?.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.to_vec1()?;
        if scores.len() != passages.len() {
            bail!("cross-encoder returned {} scores for {} passages", scores.len(), passages.len());
        }
        debug!(pairs = passages.len(), elapsed_ms = start.elapsed().as_millis() as u64, "scored batch");
        Ok(scores)
    }
}
