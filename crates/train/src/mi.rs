//! Mutual-information diagnostic between transmitted and received symbols.
//!
//! Uses the Kraskov–Stögbauer–Grassberger estimator (algorithm 1, max-norm)
//! on scalar samples. Quadratic in the number of symbols per block, so it is
//! only run on request.

use std::f64::consts::LN_2;

use anyhow::{bail, Result};
use candle_core::{DType, Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::function::gamma::digamma;

/// Blocks of the batch the estimate is averaged over.
pub const MI_SAMPLES: usize = 10;
/// Neighbour count for the KSG estimator.
pub const KSG_K: usize = 3;
/// Amplitude of the uniform jitter that breaks ties between repeated samples.
const JITTER: f64 = 1e-10;
/// Fixed so repeated estimates on the same data agree.
const JITTER_SEED: u64 = 0;

/// Estimated I(code; code + noise) in bits, averaged over the first
/// [`MI_SAMPLES`] blocks of the batch.
///
/// Every block is flattened to a set of scalar samples `(x_i, y_i)`.
pub fn compute_mi(codes: &Tensor, noise: &Tensor) -> Result<f64> {
    let codes = codes.detach().to_device(&Device::Cpu)?.to_dtype(DType::F32)?;
    let noise = noise.detach().to_device(&Device::Cpu)?.to_dtype(DType::F32)?;
    let received = (&codes + &noise)?;

    let x = codes.flatten_from(1)?.to_vec2::<f32>()?;
    let y = received.flatten_from(1)?.to_vec2::<f32>()?;

    let blocks = x.len().min(MI_SAMPLES);
    if blocks == 0 {
        bail!("mutual information needs at least one block");
    }
    let mut total = 0.0;
    for (xb, yb) in x.iter().zip(&y).take(blocks) {
        total += kraskov_mi(xb, yb, KSG_K)? / LN_2;
    }
    Ok(total / blocks as f64)
}

/// KSG estimate of I(X; Y) in nats for paired scalar samples.
///
/// Samples get a tiny deterministic jitter first, so repeated pairs (binary
/// codes over a quiet channel) never collapse the neighbour radius to zero.
pub fn kraskov_mi(x: &[f32], y: &[f32], k: usize) -> Result<f64> {
    let n = x.len();
    if n != y.len() {
        bail!("sample count mismatch: {} vs {}", n, y.len());
    }
    if k == 0 || n <= k {
        bail!("need more than k = {k} samples, got {n}");
    }

    let mut rng = StdRng::seed_from_u64(JITTER_SEED);
    let mut jittered = |v: &[f32]| -> Vec<f64> {
        v.iter()
            .map(|&a| a as f64 + JITTER * rng.gen::<f64>())
            .collect()
    };
    let x = jittered(x);
    let y = jittered(y);

    let mut dist = Vec::with_capacity(n - 1);
    let mut marginal_sum = 0.0;
    for i in 0..n {
        let (xi, yi) = (x[i], y[i]);
        dist.clear();
        dist.extend((0..n).filter(|&j| j != i).map(|j| {
            let dx = (xi - x[j]).abs();
            let dy = (yi - y[j]).abs();
            dx.max(dy)
        }));
        let (_, kth, _) = dist.select_nth_unstable_by(k - 1, f64::total_cmp);
        let eps = *kth;
        if eps <= 0.0 {
            bail!("degenerate samples: zero neighbour distance at index {i}");
        }

        let nx = (0..n)
            .filter(|&j| j != i && (xi - x[j]).abs() < eps)
            .count();
        let ny = (0..n)
            .filter(|&j| j != i && (yi - y[j]).abs() < eps)
            .count();
        marginal_sum += digamma(nx as f64 + 1.0) + digamma(ny as f64 + 1.0);
    }

    Ok(digamma(k as f64) + digamma(n as f64) - marginal_sum / n as f64)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::StandardNormal;

    fn gaussian(rng: &mut StdRng, n: usize) -> Vec<f32> {
        (0..n).map(|_| rng.sample::<f32, _>(StandardNormal)).collect()
    }

    #[test]
    fn ksg_matches_gaussian_channel_capacity() {
        let mut rng = StdRng::seed_from_u64(42);
        let x = gaussian(&mut rng, 2000);
        let z = gaussian(&mut rng, 2000);
        let y: Vec<f32> = x.iter().zip(&z).map(|(a, b)| a + b).collect();
        // I = ½ ln(1 + SNR) with SNR = 1.
        let expected = 0.5 * 2f64.ln();
        let mi = kraskov_mi(&x, &y, 3).unwrap();
        assert!((mi - expected).abs() < 0.05, "mi {mi} expected {expected}");
    }

    #[test]
    fn ksg_independent_is_near_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let x = gaussian(&mut rng, 2000);
        let y = gaussian(&mut rng, 2000);
        let mi = kraskov_mi(&x, &y, 3).unwrap();
        assert!(mi.abs() < 0.06, "mi {mi}");
    }

    #[test]
    fn binary_code_over_silent_channel_is_one_bit() {
        let x: Vec<f32> = (0..400).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let bits = kraskov_mi(&x, &x, 3).unwrap() / LN_2;
        assert!((bits - 1.0).abs() < 0.2, "bits {bits}");

        let codes = Tensor::from_vec(x, (4, 50, 2), &Device::Cpu).unwrap();
        let bits = compute_mi(&codes, &codes.zeros_like().unwrap()).unwrap();
        assert!(bits.is_finite() && bits < 1.5, "bits {bits}");
    }

    #[test]
    fn ksg_rejects_tiny_inputs() {
        assert!(kraskov_mi(&[0.1, 0.2], &[0.1, 0.2], 3).is_err());
        assert!(kraskov_mi(&[0.1, 0.2, 0.3], &[0.1], 1).is_err());
    }

    #[test]
    fn less_noise_means_more_information() {
        let dev = Device::Cpu;
        let mut rng = StdRng::seed_from_u64(3);
        let codes = Tensor::from_vec(gaussian(&mut rng, 12 * 200), (12, 100, 2), &dev).unwrap();
        let noise = Tensor::from_vec(gaussian(&mut rng, 12 * 200), (12, 100, 2), &dev).unwrap();

        let loud = compute_mi(&codes, &noise).unwrap();
        let quiet = compute_mi(&codes, &noise.affine(0.1, 0.0).unwrap()).unwrap();
        assert!(quiet > loud + 1.0, "quiet {quiet} loud {loud}");
        // Bits: ½ log2(1 + 1) = 0.5 at unit noise.
        assert!((loud - 0.5).abs() < 0.2, "loud {loud}");
    }
}
