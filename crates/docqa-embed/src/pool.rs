use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

fn min_norm(dtype: DType) -> f64 {
    match dtype {
        DType::F16 | DType::BF16 => 1e-6,
        _ => 1e-12,
    }
}

/// Sentence vectors from token states: the mean of the tokens the attention
/// mask keeps, scaled to unit L2 norm.
///
/// `hidden` is `[batch, tokens, width]` and `attention_mask` is `[batch, tokens]`
/// in any numeric dtype (1 for real tokens, 0 for padding). Returns
/// `[batch, width]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, width) = hidden.dims3()?;
    ensure!(
        attention_mask.dims() == [batch, tokens],
        "mask shape {:?} does not match hidden shape {:?}",
        attention_mask.dims(),
        hidden.dims()
    );
    let weights = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&weights.unsqueeze(2)?)?.sum(1)?;
    // All-padding rows divide by one and pool to zeros instead of NaN.
    let counts = weights.sum_keepdim(1)?.maximum(1f64)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(min_norm(hidden.dtype()))?;
    let pooled = mean.broadcast_div(&norms)?;
    ensure!(pooled.dims() == [batch, width], "pooled shape mismatch: {:?}", pooled.dims());
    Ok(pooled)
}
