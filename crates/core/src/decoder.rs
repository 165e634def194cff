//! Convolutional decoder: noisy symbols → per-bit probabilities.

use candle_core::{Result, Tensor};
use candle_nn::{linear, ops, Linear, Module, VarBuilder};

use aecode_common::ChannelCodeConfig;

use crate::encoder::ConvStack;

pub struct Decoder {
    cnn: ConvStack,
    proj: Linear,
}

impl Decoder {
    pub fn new(config: &ChannelCodeConfig, vb: VarBuilder) -> Result<Self> {
        let cnn = ConvStack::new(
            config.code_rate_n,
            config.dec_num_layer,
            config.dec_num_unit,
            config.kernel_size,
            vb.pp("dec"),
        )?;
        let proj = linear(cnn.out_channels(), config.code_rate_k, vb.pp("dec_proj"))?;
        Ok(Self { cnn, proj })
    }

    /// `(batch, block_len, n)` received symbols → `(batch, block_len, k)` in \[0, 1\].
    pub fn forward(&self, received: &Tensor) -> Result<Tensor> {
        let h = self.cnn.forward(received)?;
        ops::sigmoid(&self.proj.forward(&h)?)
    }
}
