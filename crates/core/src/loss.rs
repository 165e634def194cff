//! Training objectives.
//!
//! Decoder-mode training always uses [`bce`]. Encoder-mode training uses
//! [`customized_loss`], which dispatches on [`LossKind`]. Every loss clamps
//! the decoder output to \[0, 1\] first.

use candle_core::{DType, Result, Tensor};

use aecode_common::{ChannelCodeConfig, LossKind};

use crate::power::power_std;

/// Keeps `log` finite at the edges of \[0, 1\].
const PROB_EPS: f64 = 1e-7;

/// Per-element binary cross entropy, same shape as `output`.
fn bce_elementwise(output: &Tensor, target: &Tensor) -> Result<Tensor> {
    let p = output.clamp(PROB_EPS, 1.0 - PROB_EPS)?;
    let log_p = p.log()?;
    let log_1mp = p.affine(-1.0, 1.0)?.log()?;
    let pos = (target * &log_p)?;
    let neg = (target.affine(-1.0, 1.0)? * &log_1mp)?;
    (pos + neg)?.neg()
}

/// Mean binary cross entropy between `output` (clamped to \[0, 1\]) and bits.
pub fn bce(output: &Tensor, target: &Tensor) -> Result<Tensor> {
    bce_elementwise(&output.clamp(0f32, 1f32)?, target)?.mean_all()
}

/// Focal loss: `α · (1 - p_t)^γ · BCE`, averaged.
fn focal(output: &Tensor, target: &Tensor, gamma: f64, alpha: f64) -> Result<Tensor> {
    let ce = bce_elementwise(output, target)?;
    let weighted = if gamma == 0.0 {
        ce
    } else {
        let pt = ce.neg()?.exp()?;
        let modulator = pt.affine(-1.0, 1.0)?.clamp(1e-12, 1.0)?.powf(gamma)?;
        (modulator * ce)?
    };
    weighted.affine(alpha, 0.0)?.mean_all()
}

/// BCE with the first and last `edge` positions of each block weighted by
/// `weight`. The mean is taken over all elements, so weights > 1 raise the
/// loss at the edges rather than renormalising.
fn bce_block(output: &Tensor, target: &Tensor, edge: usize, weight: f64) -> Result<Tensor> {
    let ce = bce_elementwise(output, target)?;
    let block_len = ce.dim(1)?;
    let w: Vec<f32> = (0..block_len)
        .map(|i| {
            if i < edge || i + edge >= block_len {
                weight as f32
            } else {
                1.0
            }
        })
        .collect();
    let w = Tensor::from_vec(w, (1, block_len, 1), ce.device())?.to_dtype(ce.dtype())?;
    ce.broadcast_mul(&w)?.mean_all()
}

/// Encoder-mode objective selected by `config.loss`.
///
/// `_noise` is the channel realisation of the batch; none of the built-in
/// losses read it. `code` is required by [`LossKind::BcePower`].
pub fn customized_loss(
    output: &Tensor,
    target: &Tensor,
    config: &ChannelCodeConfig,
    _noise: Option<&Tensor>,
    code: Option<&Tensor>,
) -> Result<Tensor> {
    let output = output.clamp(0f32, 1f32)?;
    match config.loss {
        LossKind::Bce => bce(&output, target),
        LossKind::Mse => (&output - target)?.sqr()?.mean_all(),
        LossKind::Focal => focal(&output, target, config.focal_gamma, config.focal_alpha),
        LossKind::SoftBer => (&output - target)?.abs()?.mean_all(),
        LossKind::BceBlock => bce_block(
            &output,
            target,
            config.block_edge,
            config.block_edge_weight,
        ),
        LossKind::BcePower => {
            let Some(code) = code else {
                candle_core::bail!("bce_power loss needs the transmitted code");
            };
            let drift = power_std(&code.to_dtype(DType::F32)?)?.affine(1.0, -1.0)?;
            let penalty = drift.sqr()?.affine(config.power_penalty, 0.0)?;
            bce(&output, target)? + penalty
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
