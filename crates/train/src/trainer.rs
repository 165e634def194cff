//! Training, validation and SNR-sweep loops.
//!
//! [`Harness`] owns the run config, the compute device and the RNG every
//! batch is drawn from. Each loop draws fresh message bits and fresh channel
//! noise per batch and folds per-batch metrics into an accumulator that is
//! averaged by the same batch count it was summed over.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use candle_core::{Device, Tensor};
use candle_nn::Optimizer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use aecode_common::metrics::add_assign_vec;
use aecode_common::{
    code_power, errors_ber, errors_ber_pos, errors_bler, generate_noise, snr_db2sigma,
    snr_sigma2db, tensor_std, ChannelCodeConfig, MessageSource, NoiseSnr,
};
use aecode_core::{bce, customized_loss, Codec};

use crate::mi::compute_mi;

// ── Mode ────────────────────────────────────────────────────────────────────

/// Which half of the autoencoder an epoch optimises.
///
/// Selects both the loss and the training SNR range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainMode {
    /// `customized_loss` over `train_channel_low..train_channel_high`.
    Encoder,
    /// BCE over `train_dec_channel_low..train_dec_channel_high`.
    Decoder,
}

impl TrainMode {
    /// Noise level used while training in this mode.
    pub fn noise_snr(self, config: &ChannelCodeConfig) -> NoiseSnr {
        match self {
            TrainMode::Encoder => NoiseSnr::Range {
                low: config.train_channel_low,
                high: config.train_channel_high,
            },
            TrainMode::Decoder => NoiseSnr::Range {
                low: config.train_dec_channel_low,
                high: config.train_dec_channel_high,
            },
        }
    }
}

impl FromStr for TrainMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "encoder" | "enc" => Ok(Self::Encoder),
            "decoder" | "dec" => Ok(Self::Decoder),
            other => bail!("unknown train mode {other:?} (expected \"encoder\" or \"decoder\")"),
        }
    }
}

impl fmt::Display for TrainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainMode::Encoder => f.write_str("encoder"),
            TrainMode::Decoder => f.write_str("decoder"),
        }
    }
}

// ── Reports ─────────────────────────────────────────────────────────────────

/// Result of one training epoch.
#[derive(Debug, Clone, Serialize)]
pub struct TrainMetrics {
    pub epoch: usize,
    pub mode: TrainMode,
    pub avg_loss: f64,
    pub num_batches: usize,
    pub elapsed: Duration,
}

/// Result of one validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationMetrics {
    pub bce_loss: f64,
    pub custom_loss: f64,
    pub ber: f64,
    /// Reserved for a mutual-information estimate; never filled by
    /// [`Harness::validate`]. See [`Harness::estimate_mi`].
    pub mutual_info: Option<f64>,
}

/// Averaged test results at one SNR.
#[derive(Debug, Clone, Serialize)]
pub struct SnrPoint {
    pub snr: f64,
    pub ber: f64,
    pub bler: f64,
    /// BER per block position.
    pub positional_ber: Vec<f64>,
    /// Mean squared code symbol per block position.
    pub code_power: Vec<f64>,
}

/// Full output of [`Harness::test`].
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub points: Vec<SnrPoint>,
    /// Average std of the encoder output.
    pub encoder_power: f64,
    /// Nominal SNRs corrected for `encoder_power`.
    pub adjusted_snrs: Vec<f64>,
}

impl SweepReport {
    pub fn snrs(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.snr).collect()
    }

    pub fn ber(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.ber).collect()
    }

    pub fn bler(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.bler).collect()
    }
}

// ── Accumulators ────────────────────────────────────────────────────────────

#[derive(Default)]
struct ValidationAcc {
    bce: f64,
    custom: f64,
    ber: f64,
}

#[derive(Default)]
struct SnrAcc {
    ber: f64,
    bler: f64,
    /// `None` until the first batch captures the baseline vector.
    pos_ber: Option<Vec<f64>>,
    power: Option<Vec<f64>>,
}

fn accumulate(slot: &mut Option<Vec<f64>>, batch: Vec<f64>) {
    match slot {
        Some(acc) => add_assign_vec(acc, &batch),
        None => *slot = Some(batch),
    }
}

fn averaged(sum: Option<Vec<f64>>, count: usize) -> Vec<f64> {
    sum.unwrap_or_default()
        .into_iter()
        .map(|v| v / count as f64)
        .collect()
}

// ── SNR helpers ─────────────────────────────────────────────────────────────

/// `points` evenly spaced SNRs from `start` to `end` inclusive.
///
/// One point yields `[start]`; zero points yield an empty grid.
pub fn snr_grid(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (points - 1) as f64;
            (0..points).map(|i| start + step * i as f64).collect()
        }
    }
}

/// SNR actually seen by the decoder when the encoder transmits at std
/// `power` instead of 1.
pub fn adjusted_snr(snr: f64, power: f64) -> f64 {
    snr_sigma2db(snr_db2sigma(snr) / power)
}

// ── Harness ─────────────────────────────────────────────────────────────────

/// Runs the loops against any [`Codec`] on one device.
pub struct Harness {
    config: ChannelCodeConfig,
    device: Device,
    rng: StdRng,
    messages: MessageSource,
    verbose: bool,
}

impl Harness {
    /// The RNG is seeded from `config.seed`.
    pub fn new(config: ChannelCodeConfig, device: Device) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            device,
            rng,
            messages: MessageSource::Random,
            verbose: true,
        }
    }

    /// Replace the random message generator, e.g. with the all-zero codeword.
    pub fn with_message_source(mut self, messages: MessageSource) -> Self {
        self.messages = messages;
        self
    }

    pub fn set_message_source(&mut self, messages: MessageSource) {
        self.messages = messages;
    }

    /// Enable or disable per-epoch / per-SNR log lines.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn config(&self) -> &ChannelCodeConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ChannelCodeConfig {
        &mut self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn message_batch(&mut self) -> Result<Tensor> {
        Ok(self
            .messages
            .batch(self.config.message_shape(), &mut self.rng, &self.device)?)
    }

    fn noise_batch(&mut self, snr: NoiseSnr) -> Result<Tensor> {
        generate_noise(
            self.config.code_shape(),
            &self.config,
            snr,
            &mut self.rng,
            &self.device,
        )
    }

    /// One epoch of `floor(num_block / batch_size)` optimiser steps.
    ///
    /// Encoder mode minimises [`customized_loss`]; decoder mode minimises BCE
    /// on the clamped decoder output. Only the parameters owned by
    /// `optimizer` change.
    pub fn train<C: Codec, O: Optimizer>(
        &mut self,
        epoch: usize,
        model: &C,
        optimizer: &mut O,
        mode: TrainMode,
    ) -> Result<TrainMetrics> {
        let num_batches = self.config.num_train_batch();
        if num_batches == 0 {
            bail!(
                "num_block ({}) < batch_size ({}): no training batches",
                self.config.num_block,
                self.config.batch_size
            );
        }
        let snr = mode.noise_snr(&self.config);
        let start = Instant::now();

        let loss_sum = (0..num_batches).try_fold(0.0f64, |acc, _| -> Result<f64> {
            let message = self.message_batch()?;
            let noise = self.noise_batch(snr)?;
            let (output, code) = model.forward(&message, &noise)?;
            let loss = match mode {
                TrainMode::Encoder => {
                    customized_loss(&output, &message, &self.config, Some(&noise), Some(&code))?
                }
                TrainMode::Decoder => bce(&output.clamp(0f32, 1f32)?, &message)?,
            };
            optimizer.backward_step(&loss)?;
            Ok(acc + loss.to_scalar::<f32>()? as f64)
        })?;

        let metrics = TrainMetrics {
            epoch,
            mode,
            avg_loss: loss_sum / num_batches as f64,
            num_batches,
            elapsed: start.elapsed(),
        };
        if self.verbose {
            tracing::info!(
                epoch,
                mode = %mode,
                avg_loss = metrics.avg_loss,
                running_time_s = metrics.elapsed.as_secs_f64(),
                "====> Epoch average loss"
            );
        }
        Ok(metrics)
    }

    /// Held-out pass over `floor(num_block / batch_size * test_ratio)` fresh
    /// batches. Never touches model parameters.
    ///
    /// Noise is drawn from the encoder training range, the same range
    /// encoder-mode training uses.
    pub fn validate<C: Codec>(&mut self, model: &C) -> Result<ValidationMetrics> {
        let num_batches = self.config.num_test_batch();
        if num_batches == 0 {
            bail!("test_ratio {} leaves no validation batches", self.config.test_ratio);
        }
        let snr = TrainMode::Encoder.noise_snr(&self.config);

        let acc = (0..num_batches).try_fold(ValidationAcc::default(), |acc, _| -> Result<_> {
            let message = self.message_batch()?.detach();
            let noise = self.noise_batch(snr)?;
            let (output, code) = model.forward(&message, &noise)?;
            let output = output.clamp(0f32, 1f32)?.detach();
            let code = code.detach();

            let bce_loss = bce(&output, &message)?.to_scalar::<f32>()? as f64;
            let custom = customized_loss(&output, &message, &self.config, Some(&noise), Some(&code))?
                .to_scalar::<f32>()? as f64;
            let ber = errors_ber(&output, &message)?;
            Ok(ValidationAcc {
                bce: acc.bce + bce_loss,
                custom: acc.custom + custom,
                ber: acc.ber + ber,
            })
        })?;

        let n = num_batches as f64;
        let metrics = ValidationMetrics {
            bce_loss: acc.bce / n,
            custom_loss: acc.custom / n,
            ber: acc.ber / n,
            mutual_info: None,
        };
        if self.verbose {
            tracing::info!(
                bce_loss = metrics.bce_loss,
                custom_loss = metrics.custom_loss,
                ber = metrics.ber,
                "====> Test set"
            );
        }
        Ok(metrics)
    }

    /// BER/BLER sweep over the configured SNR grid, followed by the transmit
    /// power correction.
    pub fn test<C: Codec>(&mut self, model: &C) -> Result<SweepReport> {
        let snrs = snr_grid(
            self.config.snr_test_start,
            self.config.snr_test_end,
            self.config.snr_points,
        );
        let num_test_batch = self.config.num_test_batch();
        if num_test_batch == 0 {
            bail!("test_ratio {} leaves no test batches", self.config.test_ratio);
        }
        tracing::info!(snrs = ?snrs, "SNRS");

        let points = snrs
            .iter()
            .map(|&snr| self.test_snr_point(model, snr, num_test_batch))
            .collect::<Result<Vec<_>>>()?;

        let report_ber: Vec<f64> = points.iter().map(|p| p.ber).collect();
        let report_bler: Vec<f64> = points.iter().map(|p| p.bler).collect();
        tracing::info!(snrs = ?snrs, "final results on SNRs");
        tracing::info!(ber = ?report_ber, "BER");
        tracing::info!(bler = ?report_bler, "BLER");

        let encoder_power = self.measure_encoder_power(model, num_test_batch)?;
        let adjusted_snrs: Vec<f64> = snrs
            .iter()
            .map(|&snr| adjusted_snr(snr, encoder_power))
            .collect();
        tracing::info!(encoder_power, "encoder power");
        tracing::info!(adjusted_snrs = ?adjusted_snrs, "adjusted SNR should be");

        Ok(SweepReport {
            points,
            encoder_power,
            adjusted_snrs,
        })
    }

    fn test_snr_point<C: Codec>(
        &mut self,
        model: &C,
        snr: f64,
        num_batches: usize,
    ) -> Result<SnrPoint> {
        let acc = (0..num_batches).try_fold(SnrAcc::default(), |mut acc, _| -> Result<_> {
            let message = self.message_batch()?;
            let noise = self.noise_batch(NoiseSnr::Fixed(snr))?;
            let (decoded, code) = model.forward(&message, &noise)?;
            let decoded = decoded.detach();

            acc.ber += errors_ber(&decoded, &message)?;
            acc.bler += errors_bler(&decoded, &message)?;
            accumulate(&mut acc.pos_ber, errors_ber_pos(&decoded, &message)?);
            accumulate(&mut acc.power, code_power(&code.detach())?);
            Ok(acc)
        })?;

        let point = SnrPoint {
            snr,
            ber: acc.ber / num_batches as f64,
            bler: acc.bler / num_batches as f64,
            positional_ber: averaged(acc.pos_ber, num_batches),
            code_power: averaged(acc.power, num_batches),
        };
        if self.config.print_pos_power {
            tracing::info!(snr, code_power = ?point.code_power, "code power");
        }
        if self.config.print_pos_ber {
            tracing::info!(snr, positional_ber = ?point.positional_ber, "positional ber");
        }
        if self.verbose {
            tracing::info!(snr, ber = point.ber, bler = point.bler, "Test SNR");
        }
        Ok(point)
    }

    /// Average std of the encoder output over `num_batches` fresh batches.
    pub fn measure_encoder_power<C: Codec>(&mut self, model: &C, num_batches: usize) -> Result<f64> {
        if num_batches == 0 {
            bail!("cannot measure encoder power over zero batches");
        }
        let sum = (0..num_batches).try_fold(0.0f64, |acc, _| -> Result<f64> {
            let message = self.message_batch()?;
            let code = model.encode(&message)?.detach();
            Ok(acc + tensor_std(&code)?)
        })?;
        Ok(sum / num_batches as f64)
    }

    /// Mutual information (bits) between the code and the received signal
    /// of one fresh batch at `snr`. Expensive; not part of any loop.
    pub fn estimate_mi<C: Codec>(&mut self, model: &C, snr: f64) -> Result<f64> {
        let message = self.message_batch()?;
        let noise = self.noise_batch(NoiseSnr::Fixed(snr))?;
        let code = model.encode(&message)?;
        compute_mi(&code, &noise)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::backprop::GradStore;
    use candle_core::{DType, Var};
    use candle_nn::{ops, SGD};
    use std::cell::RefCell;

    fn config(num_block: usize, batch_size: usize) -> ChannelCodeConfig {
        ChannelCodeConfig {
            num_block,
            batch_size,
            test_ratio: 1.0,
            block_len: 6,
            code_rate_k: 1,
            code_rate_n: 2,
            snr_test_start: 0.0,
            snr_test_end: 4.0,
            snr_points: 5,
            ..Default::default()
        }
    }

    fn harness(config: ChannelCodeConfig) -> Harness {
        Harness::new(config, Device::Cpu).with_verbose(false)
    }

    // ── Stub codecs ─────────────────────────────────────────────────────────

    /// Output = code = message.
    struct IdentityCodec;

    impl Codec for IdentityCodec {
        fn forward(&self, message: &Tensor, _noise: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
            Ok((message.clone(), message.clone()))
        }

        fn encode(&self, message: &Tensor) -> candle_core::Result<Tensor> {
            Ok(message.clone())
        }
    }

    /// Decodes every bit as 0.
    struct ZeroCodec;

    impl Codec for ZeroCodec {
        fn forward(&self, message: &Tensor, noise: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
            Ok((message.zeros_like()?, noise.zeros_like()?))
        }

        fn encode(&self, message: &Tensor) -> candle_core::Result<Tensor> {
            message.zeros_like()
        }
    }

    /// Flips the bits at positions where `mask` is 1 and transmits a fixed
    /// per-position amplitude.
    struct PatternCodec {
        mask: Tensor,
        amplitude: Tensor,
    }

    impl PatternCodec {
        fn new(mask: &[f32], amplitude: &[f32]) -> Self {
            let l = mask.len();
            Self {
                mask: Tensor::from_vec(mask.to_vec(), (1, l, 1), &Device::Cpu).unwrap(),
                amplitude: Tensor::from_vec(amplitude.to_vec(), (1, l, 1), &Device::Cpu).unwrap(),
            }
        }
    }

    impl Codec for PatternCodec {
        fn forward(&self, message: &Tensor, noise: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
            let decoded = message.broadcast_sub(&self.mask)?.abs()?;
            let code = noise.zeros_like()?.broadcast_add(&self.amplitude)?;
            Ok((decoded, code))
        }

        fn encode(&self, message: &Tensor) -> candle_core::Result<Tensor> {
            message.zeros_like()?.broadcast_add(&self.amplitude)
        }
    }

    /// Uncoded BPSK with a hard-decision receiver.
    struct NoisyCodec;

    impl Codec for NoisyCodec {
        fn forward(&self, message: &Tensor, noise: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
            let code = self.encode(message)?;
            let decoded = (&code + noise)?.ge(0f32)?.to_dtype(DType::F32)?;
            Ok((decoded, code))
        }

        fn encode(&self, message: &Tensor) -> candle_core::Result<Tensor> {
            message.affine(2.0, -1.0)
        }
    }

    /// Trainable bias that records the std of every noise batch it sees.
    struct NoiseRecorder {
        inner: BiasCodec,
        noise_std: RefCell<Vec<f64>>,
    }

    impl NoiseRecorder {
        fn new() -> Self {
            Self {
                inner: BiasCodec::new(),
                noise_std: RefCell::new(Vec::new()),
            }
        }
    }

    impl Codec for NoiseRecorder {
        fn forward(&self, message: &Tensor, noise: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
            let std = tensor_std(noise)?;
            self.noise_std.borrow_mut().push(std);
            self.inner.forward(message, noise)
        }

        fn encode(&self, message: &Tensor) -> candle_core::Result<Tensor> {
            self.inner.encode(message)
        }
    }

    /// One trainable logit shared by every output bit.
    struct BiasCodec {
        bias: Var,
    }

    impl BiasCodec {
        fn new() -> Self {
            Self {
                bias: Var::zeros(1, DType::F32, &Device::Cpu).unwrap(),
            }
        }

        fn bias(&self) -> f32 {
            self.bias.as_tensor().to_vec1::<f32>().unwrap()[0]
        }
    }

    impl Codec for BiasCodec {
        fn forward(&self, message: &Tensor, noise: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
            let logits = message.zeros_like()?.broadcast_add(self.bias.as_tensor())?;
            Ok((ops::sigmoid(&logits)?, noise.zeros_like()?))
        }

        fn encode(&self, message: &Tensor) -> candle_core::Result<Tensor> {
            message.zeros_like()
        }
    }

    /// SGD that counts its steps.
    struct CountingSgd {
        inner: SGD,
        steps: usize,
    }

    impl Optimizer for CountingSgd {
        type Config = f64;

        fn new(vars: Vec<Var>, lr: f64) -> candle_core::Result<Self> {
            Ok(Self {
                inner: SGD::new(vars, lr)?,
                steps: 0,
            })
        }

        fn step(&mut self, grads: &GradStore) -> candle_core::Result<()> {
            self.steps += 1;
            self.inner.step(grads)
        }

        fn learning_rate(&self) -> f64 {
            self.inner.learning_rate()
        }

        fn set_learning_rate(&mut self, lr: f64) {
            self.inner.set_learning_rate(lr)
        }
    }

    // ── Mode ────────────────────────────────────────────────────────────────

    #[test]
    fn mode_parsing_and_ranges() {
        assert_eq!("encoder".parse::<TrainMode>().unwrap(), TrainMode::Encoder);
        assert_eq!("decoder".parse::<TrainMode>().unwrap(), TrainMode::Decoder);
        assert!("encodr".parse::<TrainMode>().is_err());

        let c = config(100, 10);
        assert_eq!(
            TrainMode::Decoder.noise_snr(&c),
            NoiseSnr::Range {
                low: c.train_dec_channel_low,
                high: c.train_dec_channel_high
            }
        );
    }

    // ── Training ────────────────────────────────────────────────────────────

    #[test]
    fn one_optimizer_step_per_batch() {
        let model = BiasCodec::new();
        let mut opt = CountingSgd::new(vec![model.bias.clone()], 0.5).unwrap();
        let mut h = harness(config(250, 100));
        let m = h.train(1, &model, &mut opt, TrainMode::Decoder).unwrap();
        assert_eq!(opt.steps, 2);
        assert_eq!(m.num_batches, 2);
        assert!(m.avg_loss.is_finite() && m.avg_loss >= 0.0);
        // BCE against balanced bits at p = 0.5 is ln 2 on the first step.
        assert!((m.avg_loss - 2f64.ln()).abs() < 0.05);
    }

    #[test]
    fn encoder_mode_uses_custom_loss() {
        let model = BiasCodec::new();
        let mut opt = CountingSgd::new(vec![model.bias.clone()], 0.1).unwrap();
        let mut c = config(40, 10);
        c.loss = aecode_common::LossKind::SoftBer;
        let mut h = harness(c);
        let m = h.train(3, &model, &mut opt, TrainMode::Encoder).unwrap();
        assert_eq!(opt.steps, 4);
        assert_eq!(m.mode, TrainMode::Encoder);
        // Soft BER of p = 0.5 against any bits is 0.5.
        assert!((m.avg_loss - 0.5).abs() < 0.05);
    }

    #[test]
    fn training_moves_parameters() {
        let model = BiasCodec::new();
        let mut opt = CountingSgd::new(vec![model.bias.clone()], 1.0).unwrap();
        let mut h = harness(config(100, 10)).with_message_source(MessageSource::AllOnes);
        h.train(1, &model, &mut opt, TrainMode::Decoder).unwrap();
        assert!(model.bias() > 1.0);
    }

    #[test]
    fn zero_batches_is_an_error() {
        let model = BiasCodec::new();
        let mut opt = CountingSgd::new(vec![model.bias.clone()], 0.1).unwrap();
        let mut h = harness(config(50, 100));
        assert!(h.train(1, &model, &mut opt, TrainMode::Decoder).is_err());
        assert_eq!(opt.steps, 0);
        assert!(h.validate(&model).is_err());
        assert!(h.test(&IdentityCodec).is_err());
    }

    /// Encoder range at 40 dB (sigma 0.01), decoder range at −10 dB (sigma ≈ 3.16).
    fn split_range_config() -> ChannelCodeConfig {
        ChannelCodeConfig {
            code_rate_n: 1,
            train_channel_low: 40.0,
            train_channel_high: 40.0,
            train_dec_channel_low: -10.0,
            train_dec_channel_high: -10.0,
            ..config(100, 10)
        }
    }

    #[test]
    fn each_mode_trains_on_its_own_snr_range() {
        for (mode, sigma) in [
            (TrainMode::Encoder, snr_db2sigma(40.0)),
            (TrainMode::Decoder, snr_db2sigma(-10.0)),
        ] {
            let model = NoiseRecorder::new();
            let mut opt = CountingSgd::new(vec![model.inner.bias.clone()], 0.1).unwrap();
            let mut h = harness(split_range_config());
            h.train(1, &model, &mut opt, mode).unwrap();
            let seen = model.noise_std.borrow();
            assert_eq!(seen.len(), 10);
            let mean = seen.iter().sum::<f64>() / seen.len() as f64;
            assert!((mean / sigma - 1.0).abs() < 0.15, "{mode}: std {mean} sigma {sigma}");
        }
    }

    // ── Validation ──────────────────────────────────────────────────────────

    #[test]
    fn validation_draws_noise_from_the_encoder_range() {
        let mut h = harness(split_range_config());
        let m = h.validate(&NoisyCodec).unwrap();
        assert_eq!(m.ber, 0.0);

        let model = NoiseRecorder::new();
        h.validate(&model).unwrap();
        let seen = model.noise_std.borrow();
        let mean = seen.iter().sum::<f64>() / seen.len() as f64;
        assert!((mean / snr_db2sigma(40.0) - 1.0).abs() < 0.15, "std {mean}");
    }

    #[test]
    fn validation_leaves_parameters_untouched() {
        let model = BiasCodec::new();
        model
            .bias
            .set(&Tensor::new(&[0.3f32], &Device::Cpu).unwrap())
            .unwrap();
        let before = model.bias();
        let mut h = harness(config(100, 10));
        let m = h.validate(&model).unwrap();
        assert_eq!(model.bias(), before);
        assert!(m.mutual_info.is_none());
        assert!(m.bce_loss > 0.0);
        // Default custom loss is BCE.
        assert!((m.bce_loss - m.custom_loss).abs() < 1e-9);
    }

    #[test]
    fn validation_of_perfect_decoder() {
        let mut c = config(100, 10);
        c.code_rate_n = 1;
        let mut h = harness(c);
        let m = h.validate(&IdentityCodec).unwrap();
        assert_eq!(m.ber, 0.0);
        assert!(m.bce_loss < 1e-5);
    }

    // ── SNR grid / power correction ─────────────────────────────────────────

    #[test]
    fn snr_grid_is_inclusive_and_even() {
        assert_eq!(snr_grid(0.0, 4.0, 5), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(snr_grid(-1.5, 4.0, 1), vec![-1.5]);
        assert!(snr_grid(0.0, 1.0, 0).is_empty());
        let g = snr_grid(-1.5, 4.0, 12);
        assert_eq!(g.len(), 12);
        assert!((g[11] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn adjusted_snr_is_identity_at_unit_power() {
        for snr in snr_grid(-1.5, 4.0, 12) {
            assert!((adjusted_snr(snr, 1.0) - snr).abs() < 1e-9);
        }
        // Doubling the amplitude buys 20·log10(2) dB.
        assert!((adjusted_snr(0.0, 2.0) - 20.0 * 2f64.log10()).abs() < 1e-9);
    }

    // ── Sweep ───────────────────────────────────────────────────────────────

    #[test]
    fn identity_codec_has_no_errors() {
        let mut c = config(50, 10);
        c.code_rate_n = 1;
        let mut h = harness(c);
        let report = h.test(&IdentityCodec).unwrap();
        assert_eq!(report.snrs(), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(report.ber().iter().all(|&b| b == 0.0));
        assert!(report.bler().iter().all(|&b| b == 0.0));
        assert_eq!(report.adjusted_snrs.len(), 5);
    }

    #[test]
    fn zero_decoder_on_all_ones_misses_every_bit() {
        let mut h = harness(config(50, 10)).with_message_source(MessageSource::AllOnes);
        let report = h.test(&ZeroCodec).unwrap();
        assert!(report.ber().iter().all(|&b| b == 1.0));
        assert!(report.bler().iter().all(|&b| b == 1.0));
    }

    #[test]
    fn positional_vectors_average_to_the_pattern() {
        let mask = [1.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        let amp = [1.0, 2.0, 0.5, 1.0, 3.0, 0.0];
        let mut c = config(70, 10);
        c.print_pos_ber = true;
        c.print_pos_power = true;
        let mut h = harness(c);
        let report = h.test(&PatternCodec::new(&mask, &amp)).unwrap();
        for point in &report.points {
            assert_eq!(point.positional_ber.len(), 6);
            for (got, want) in point.positional_ber.iter().zip(mask) {
                assert!((got - want as f64).abs() < 1e-9);
            }
            for (got, want) in point.code_power.iter().zip(amp) {
                assert!((got - (want * want) as f64).abs() < 1e-6);
            }
            assert!((point.ber - 0.5).abs() < 1e-6);
            assert_eq!(point.bler, 1.0);
        }
    }

    #[test]
    fn encoder_power_is_measured_on_the_encoder_alone() {
        // 10 × 6 symbols of ±2 with zero mean: unbiased std is sqrt(4·60/59).
        let amp = [2.0, -2.0, 2.0, -2.0, 2.0, -2.0];
        let mut h = harness(config(50, 10));
        let power = h
            .measure_encoder_power(&PatternCodec::new(&[0.0; 6], &amp), 3)
            .unwrap();
        let expected = (4.0f64 * 60.0 / 59.0).sqrt();
        assert!((power - expected).abs() < 1e-6, "power {power}");
        assert!(h.measure_encoder_power(&IdentityCodec, 0).is_err());
    }

    #[test]
    fn same_seed_same_sweep() {
        let mut c = config(50, 10);
        c.code_rate_n = 1;
        c.snr_test_start = -3.0;
        c.snr_test_end = 0.0;
        c.snr_points = 2;
        let a = harness(c.clone()).test(&NoisyCodec).unwrap();
        let b = harness(c).test(&NoisyCodec).unwrap();
        assert_eq!(a.ber(), b.ber());
        assert_eq!(a.bler(), b.bler());
        // Lower SNR, more errors.
        assert!(a.ber()[0] > a.ber()[1]);
    }
}
