//! Additive channel noise.
//!
//! Noise is drawn on the host from the caller's RNG and moved to the target
//! device in one copy. Training draws a per-symbol sigma from an SNR range;
//! testing uses one fixed SNR for the whole batch.

use anyhow::anyhow;
use candle_core::{Device, Tensor};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal, StudentT};

use crate::config::{ChannelCodeConfig, ChannelKind};
use crate::metrics::snr_db2sigma;

/// Noise level for one call to [`generate_noise`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseSnr {
    /// Per-symbol sigma drawn uniformly between the sigmas of `low` and `high` dB.
    Range { low: f64, high: f64 },
    /// Every symbol uses the sigma of this SNR (dB).
    Fixed(f64),
}

impl NoiseSnr {
    fn sigma<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            NoiseSnr::Range { low, high } => {
                let sigma_low = snr_db2sigma(low);
                let sigma_high = snr_db2sigma(high);
                (sigma_low - sigma_high) * rng.gen::<f64>() + sigma_high
            }
            NoiseSnr::Fixed(db) => snr_db2sigma(db),
        }
    }
}

/// Draw a noise tensor of `shape` for the channel selected in `config`.
///
/// `shape` must be the code shape, `(batch, block_len, code_rate_n)`.
pub fn generate_noise<R: Rng + ?Sized>(
    shape: (usize, usize, usize),
    config: &ChannelCodeConfig,
    snr: NoiseSnr,
    rng: &mut R,
    device: &Device,
) -> anyhow::Result<Tensor> {
    let (b, l, n) = shape;
    let len = b * l * n;

    let data: Vec<f32> = match config.channel {
        ChannelKind::Awgn => (0..len)
            .map(|_| {
                let z: f64 = rng.sample(StandardNormal);
                (snr.sigma(rng) * z) as f32
            })
            .collect(),
        ChannelKind::TDist => {
            let t = StudentT::new(config.vv).map_err(|e| anyhow!("t-dist channel: {e}"))?;
            let unit = ((config.vv - 2.0) / config.vv).sqrt();
            (0..len)
                .map(|_| (snr.sigma(rng) * unit * t.sample(rng)) as f32)
                .collect()
        }
        ChannelKind::Radar => (0..len)
            .map(|_| {
                let z: f64 = rng.sample(StandardNormal);
                let mut x = snr.sigma(rng) * z;
                if rng.gen_bool(config.radar_prob) {
                    let burst: f64 = rng.sample(StandardNormal);
                    x += config.radar_power * burst;
                }
                x as f32
            })
            .collect(),
    };

    Ok(Tensor::from_vec(data, shape, device)?)
}
