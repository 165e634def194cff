//! Convolutional encoder: message bits → power-normalised channel symbols.

use candle_core::{Result, Tensor};
use candle_nn::{conv1d, linear, Conv1d, Conv1dConfig, Linear, Module, VarBuilder};

use aecode_common::ChannelCodeConfig;

use crate::power::{normalize_power, ste_sign_scaled};

/// Stack of same-padded 1-D convolutions along the block axis.
///
/// Input and output are `(batch, block_len, channels)`; the convolutions run
/// on the transposed `(batch, channels, block_len)` layout.
pub(crate) struct ConvStack {
    convs: Vec<Conv1d>,
    out_channels: usize,
}

impl ConvStack {
    pub(crate) fn new(
        in_channels: usize,
        num_layer: usize,
        num_unit: usize,
        kernel_size: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let cfg = Conv1dConfig {
            padding: kernel_size / 2,
            ..Default::default()
        };
        let mut convs = Vec::with_capacity(num_layer);
        let mut channels = in_channels;
        for i in 0..num_layer {
            convs.push(conv1d(channels, num_unit, kernel_size, cfg, vb.pp(format!("cnn.{i}")))?);
            channels = num_unit;
        }
        Ok(Self {
            convs,
            out_channels: channels,
        })
    }

    pub(crate) fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub(crate) fn forward(&self, x: &Tensor) -> Result<Tensor> {
        if self.convs.is_empty() {
            return Ok(x.clone());
        }
        let mut h = x.transpose(1, 2)?.contiguous()?;
        for conv in &self.convs {
            h = conv.forward(&h)?.elu(1.0)?;
        }
        h.transpose(1, 2)?.contiguous()
    }
}

/// Learned encoder.
///
/// Forward path:
/// 1. Map bits {0, 1} to ±1.
/// 2. Convolution stack with ELU.
/// 3. Per-position linear projection to `code_rate_n` symbols.
/// 4. Power normalisation over the batch.
/// 5. Optional ±1 quantisation with STE.
pub struct Encoder {
    cnn: ConvStack,
    proj: Linear,
    binarize: bool,
    ste_scale: f64,
}

impl Encoder {
    pub fn new(config: &ChannelCodeConfig, vb: VarBuilder) -> Result<Self> {
        let cnn = ConvStack::new(
            config.code_rate_k,
            config.enc_num_layer,
            config.enc_num_unit,
            config.kernel_size,
            vb.pp("enc"),
        )?;
        let proj = linear(cnn.out_channels(), config.code_rate_n, vb.pp("enc_proj"))?;
        Ok(Self {
            cnn,
            proj,
            binarize: config.binarize_code,
            ste_scale: config.ste_scale,
        })
    }

    pub fn forward(&self, message: &Tensor) -> Result<Tensor> {
        let x = message.affine(2.0, -1.0)?;
        let h = self.cnn.forward(&x)?;
        let code = normalize_power(&self.proj.forward(&h)?)?;
        if self.binarize {
            ste_sign_scaled(&code, self.ste_scale)
        } else {
            Ok(code)
        }
    }
}
