//! Channel autoencoder: encoder → additive channel → decoder.
//!
//! Encoder and decoder are built from separate `VarBuilder`s so callers can
//! keep their parameters in separate `VarMap`s and step them with separate
//! optimisers (alternating training).

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use aecode_common::ChannelCodeConfig;

use crate::codec::{check_noise_shape, Codec};
use crate::decoder::Decoder;
use crate::encoder::Encoder;

pub struct ChannelAutoEncoder {
    enc: Encoder,
    dec: Decoder,
}

impl ChannelAutoEncoder {
    pub fn new(config: &ChannelCodeConfig, enc_vb: VarBuilder, dec_vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            enc: Encoder::new(config, enc_vb)?,
            dec: Decoder::new(config, dec_vb)?,
        })
    }

    pub fn encoder(&self) -> &Encoder {
        &self.enc
    }

    pub fn decoder(&self) -> &Decoder {
        &self.dec
    }
}

impl Codec for ChannelAutoEncoder {
    fn forward(&self, message: &Tensor, noise: &Tensor) -> Result<(Tensor, Tensor)> {
        let code = self.enc.forward(message)?;
        check_noise_shape(&code, noise)?;
        let received = (&code + noise)?;
        let decoded = self.dec.forward(&received)?;
        Ok((decoded, code))
    }

    fn encode(&self, message: &Tensor) -> Result<Tensor> {
        self.enc.forward(message)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
