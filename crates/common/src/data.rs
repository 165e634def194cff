//! Synthetic message batches.
//!
//! Messages are never persisted: every batch is drawn fresh from the caller's
//! RNG and handed straight to the codec.

use candle_core::{DType, Device, Result, Tensor};
use rand::Rng;

/// Where message bits come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageSource {
    /// Uniform random bits, fresh per batch.
    #[default]
    Random,
    /// The all-zero codeword.
    AllZeros,
    /// Every bit set.
    AllOnes,
}

impl MessageSource {
    pub fn batch<R: Rng + ?Sized>(
        self,
        shape: (usize, usize, usize),
        rng: &mut R,
        device: &Device,
    ) -> Result<Tensor> {
        match self {
            MessageSource::Random => random_message_batch(shape, rng, device),
            MessageSource::AllZeros => Tensor::zeros(shape, DType::F32, device),
            MessageSource::AllOnes => Tensor::ones(shape, DType::F32, device),
        }
    }
}

/// Uniform random bits in {0, 1} as an F32 tensor of `shape`.
pub fn random_message_batch<R: Rng + ?Sized>(
    shape: (usize, usize, usize),
    rng: &mut R,
    device: &Device,
) -> Result<Tensor> {
    let (b, l, k) = shape;
    let bits: Vec<f32> = (0..b * l * k)
        .map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 })
        .collect();
    Tensor::from_vec(bits, shape, device)
}
