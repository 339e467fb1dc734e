use anyhow::Result;
use candle_core::{DType, Tensor};

/// Average of the unmasked token states: `[B,T,H]` with a `[B,T]` mask gives
/// `[B,H]`. Rows with no unmasked token average to zero.
pub fn masked_mean(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    hidden.dims3()?;
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1f64, f64::MAX)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Row-wise L2 normalization of a `[B,H]` tensor.
pub fn l2_normalize(rows: &Tensor) -> Result<Tensor> {
    let eps = if rows.dtype() == DType::F16 { 1e-6 } else { 1e-12 };
    let norm = rows.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(eps, f64::MAX)?;
    Ok(rows.broadcast_div(&norm)?)
}

pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    l2_normalize(&masked_mean(hidden, attention_mask)?)
}
