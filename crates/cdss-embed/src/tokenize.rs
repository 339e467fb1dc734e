use anyhow::{anyhow, bail, Result};
use candle_core::{Device, Tensor};
use tokenizers::{EncodeInput, Tokenizer};

/// Padding id used when the tokenizer does not name one (XLM-R `<pad>`).
pub const DEFAULT_PAD_ID: u32 = 1;

pub fn pad_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer.token_to_id("<pad>").unwrap_or(DEFAULT_PAD_ID)
}

/// Encode a batch (single texts or `(query, passage)` pairs) into
/// `[B,T]` id and attention-mask tensors, `T` being the longest sequence
/// capped at `max_len`. Truncation keeps the closing special token.
pub fn encode_padded<'s, E>(tokenizer: &Tokenizer, inputs: Vec<E>, max_len: usize, pad_id: u32, device: &Device) -> Result<(Tensor, Tensor)>
where
    E: Into<EncodeInput<'s>>,
{
    if inputs.is_empty() { bail!("cannot encode an empty batch"); }
    if max_len == 0 { bail!("max_len must be positive"); }
    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let enc = tokenizer.encode(input, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len {
            let last = ids[ids.len() - 1];
            ids.truncate(max_len);
            mask.truncate(max_len);
            ids[max_len - 1] = last;
        }
        rows.push((ids, mask));
    }
    let batch = rows.len();
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut flat_ids = Vec::with_capacity(batch * width);
    let mut flat_mask = Vec::with_capacity(batch * width);
    for (ids, mask) in rows {
        let pad = width - ids.len();
        flat_ids.extend(ids);
        flat_ids.extend(std::iter::repeat(pad_id).take(pad));
        flat_mask.extend(mask);
        flat_mask.extend(std::iter::repeat(0u32).take(pad));
    }
    let input_ids = Tensor::from_vec(flat_ids, (batch, width), device)?;
    let attention_mask = Tensor::from_vec(flat_mask, (batch, width), device)?;
    Ok((input_ids, attention_mask))
}
