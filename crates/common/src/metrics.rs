//! Bit/block error rates, code power and SNR unit conversions.
//!
//! Predictions are hard-decided by rounding after a clamp to \[0, 1\], so
//! both soft decoder outputs and exact bits are accepted.

use candle_core::{DType, Result, Tensor};

/// `sigma = 10^(-snr/20)`.
pub fn snr_db2sigma(snr_db: f64) -> f64 {
    10f64.powf(-snr_db / 20.0)
}

/// `snr = -20·log10(sigma)`.
pub fn snr_sigma2db(sigma: f64) -> f64 {
    -20.0 * sigma.log10()
}

/// 1.0 where the hard decision of `pred` differs from `target`, else 0.0.
fn error_mask(pred: &Tensor, target: &Tensor) -> Result<Tensor> {
    let pred_hard = pred.clamp(0f32, 1f32)?.round()?;
    let target_hard = target.clamp(0f32, 1f32)?.round()?;
    pred_hard.ne(&target_hard)?.to_dtype(DType::F32)
}

/// Fraction of bits decided wrongly.
pub fn errors_ber(pred: &Tensor, target: &Tensor) -> Result<f64> {
    let mask = error_mask(pred, target)?;
    Ok(mask.mean_all()?.to_scalar::<f32>()? as f64)
}

/// Fraction of blocks (leading axis) containing at least one wrong bit.
pub fn errors_bler(pred: &Tensor, target: &Tensor) -> Result<f64> {
    let mask = error_mask(pred, target)?;
    let per_block = mask.flatten_from(1)?.max(1)?;
    Ok(per_block.mean_all()?.to_scalar::<f32>()? as f64)
}

/// BER at every block position, averaged over batch and bits per position.
pub fn errors_ber_pos(pred: &Tensor, target: &Tensor) -> Result<Vec<f64>> {
    let mask = error_mask(pred, target)?;
    let pos = mask.mean(2)?.mean(0)?;
    Ok(pos.to_vec1::<f32>()?.into_iter().map(f64::from).collect())
}

/// Mean squared symbol magnitude at every block position of a
/// `(batch, block_len, n)` code.
pub fn code_power(code: &Tensor) -> Result<Vec<f64>> {
    let power = code.sqr()?.mean(2)?.mean(0)?;
    Ok(power.to_vec1::<f32>()?.into_iter().map(f64::from).collect())
}

/// Unbiased standard deviation over every element. Zero for fewer than two
/// elements.
pub fn tensor_std(t: &Tensor) -> Result<f64> {
    let n = t.elem_count();
    if n < 2 {
        return Ok(0.0);
    }
    let flat = t.flatten_all()?.to_dtype(DType::F32)?;
    let mean = flat.mean_all()?;
    let centred = flat.broadcast_sub(&mean)?;
    let sum_sq = centred.sqr()?.sum_all()?.to_scalar::<f32>()? as f64;
    Ok((sum_sq / (n - 1) as f64).sqrt())
}

/// Element-wise sum of two equal-length vectors, in place.
pub fn add_assign_vec(acc: &mut [f64], other: &[f64]) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a += b;
    }
}
