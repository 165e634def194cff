//! Run configuration for learned channel codes.
//!
//! Serialised as JSON next to checkpoints. Every field has a sensible default
//! so a minimal `{}` JSON will produce a working (if slow to converge) setup.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// Hyper-parameters for data generation, channel, model, loss and driver.
///
/// Backwards-compatible: missing fields fall back to their `#[serde(default)]`
/// values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCodeConfig {
    // ── Data / batching ─────────────────────────────────────────────────────
    /// Number of message blocks drawn per training epoch.
    #[serde(default = "default_num_block")]
    pub num_block: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fraction of `num_block` used for validation and per-SNR test runs.
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    /// Message positions per block.
    #[serde(default = "default_block_len")]
    pub block_len: usize,
    /// Information bits per position (`k` in rate k/n).
    #[serde(default = "default_code_rate_k")]
    pub code_rate_k: usize,
    /// Channel symbols per position (`n` in rate k/n).
    #[serde(default = "default_code_rate_n")]
    pub code_rate_n: usize,

    // ── Channel ─────────────────────────────────────────────────────────────
    #[serde(default)]
    pub channel: ChannelKind,
    /// Degrees of freedom for the t-distributed channel.
    #[serde(default = "default_vv")]
    pub vv: f64,
    /// Probability that a symbol is hit by a radar burst.
    #[serde(default = "default_radar_prob")]
    pub radar_prob: f64,
    /// Std of the radar burst.
    #[serde(default = "default_radar_power")]
    pub radar_power: f64,

    // ── SNR ranges (dB) ─────────────────────────────────────────────────────
    #[serde(default = "default_train_channel")]
    pub train_channel_low: f64,
    #[serde(default = "default_train_channel")]
    pub train_channel_high: f64,
    #[serde(default = "default_train_dec_channel_low")]
    pub train_dec_channel_low: f64,
    #[serde(default = "default_train_dec_channel_high")]
    pub train_dec_channel_high: f64,

    // ── Test sweep ──────────────────────────────────────────────────────────
    #[serde(default = "default_snr_test_start")]
    pub snr_test_start: f64,
    #[serde(default = "default_snr_test_end")]
    pub snr_test_end: f64,
    #[serde(default = "default_snr_points")]
    pub snr_points: usize,
    /// Log the per-symbol code power at every SNR point.
    #[serde(default)]
    pub print_pos_power: bool,
    /// Log the per-position BER at every SNR point.
    #[serde(default)]
    pub print_pos_ber: bool,

    // ── Model ───────────────────────────────────────────────────────────────
    #[serde(default = "default_enc_num_layer")]
    pub enc_num_layer: usize,
    #[serde(default = "default_num_unit")]
    pub enc_num_unit: usize,
    #[serde(default = "default_dec_num_layer")]
    pub dec_num_layer: usize,
    #[serde(default = "default_num_unit")]
    pub dec_num_unit: usize,
    /// Convolution width along the block axis. Must be odd.
    #[serde(default = "default_kernel_size")]
    pub kernel_size: usize,
    /// Quantise transmitted symbols to ±1 (straight-through gradient).
    #[serde(default)]
    pub binarize_code: bool,
    /// Gradient multiplier for the straight-through estimator.
    #[serde(default = "default_ste_scale")]
    pub ste_scale: f64,

    // ── Loss ────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub loss: LossKind,
    #[serde(default)]
    pub focal_gamma: f64,
    #[serde(default = "default_focal_alpha")]
    pub focal_alpha: f64,
    /// Positions at each end of the block weighted by `block_edge_weight`.
    #[serde(default = "default_block_edge")]
    pub block_edge: usize,
    #[serde(default = "default_block_edge_weight")]
    pub block_edge_weight: f64,
    /// Weight of the `(std(code) - 1)^2` term in [`LossKind::BcePower`].
    #[serde(default = "default_power_penalty")]
    pub power_penalty: f64,

    // ── Driver ──────────────────────────────────────────────────────────────
    #[serde(default = "default_num_epoch")]
    pub num_epoch: usize,
    /// Encoder epochs per outer epoch.
    #[serde(default = "default_num_train_enc")]
    pub num_train_enc: usize,
    /// Decoder epochs per outer epoch.
    #[serde(default = "default_num_train_dec")]
    pub num_train_dec: usize,
    #[serde(default = "default_lr")]
    pub enc_lr: f64,
    #[serde(default = "default_lr")]
    pub dec_lr: f64,
    #[serde(default)]
    pub seed: u64,
}

/// Additive channel model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelKind {
    #[default]
    #[serde(rename = "awgn")]
    Awgn,
    /// Unit-variance Student-t noise with `vv` degrees of freedom.
    #[serde(rename = "t-dist")]
    TDist,
    /// AWGN plus sparse high-power bursts.
    #[serde(rename = "radar")]
    Radar,
}

/// Objective used by encoder-mode training and reported by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Bce,
    Mse,
    Focal,
    SoftBer,
    BceBlock,
    BcePower,
}

// ── Default value functions ─────────────────────────────────────────────────

fn default_num_block() -> usize {
    10_000
}
fn default_batch_size() -> usize {
    100
}
fn default_test_ratio() -> f64 {
    1.0
}
fn default_block_len() -> usize {
    100
}
fn default_code_rate_k() -> usize {
    1
}
fn default_code_rate_n() -> usize {
    3
}
fn default_vv() -> f64 {
    5.0
}
fn default_radar_prob() -> f64 {
    0.05
}
fn default_radar_power() -> f64 {
    5.0
}
fn default_train_channel() -> f64 {
    1.0
}
fn default_train_dec_channel_low() -> f64 {
    -1.5
}
fn default_train_dec_channel_high() -> f64 {
    2.0
}
fn default_snr_test_start() -> f64 {
    -1.5
}
fn default_snr_test_end() -> f64 {
    4.0
}
fn default_snr_points() -> usize {
    12
}
fn default_enc_num_layer() -> usize {
    2
}
fn default_dec_num_layer() -> usize {
    5
}
fn default_num_unit() -> usize {
    100
}
fn default_kernel_size() -> usize {
    5
}
fn default_ste_scale() -> f64 {
    1.0
}
fn default_focal_alpha() -> f64 {
    1.0
}
fn default_block_edge() -> usize {
    1
}
fn default_block_edge_weight() -> f64 {
    2.0
}
fn default_power_penalty() -> f64 {
    0.1
}
fn default_num_epoch() -> usize {
    100
}
fn default_num_train_enc() -> usize {
    1
}
fn default_num_train_dec() -> usize {
    5
}
fn default_lr() -> f64 {
    1e-4
}

// ── Impl ────────────────────────────────────────────────────────────────────

impl Default for ChannelCodeConfig {
    fn default() -> Self {
        Self {
            num_block: default_num_block(),
            batch_size: default_batch_size(),
            test_ratio: default_test_ratio(),
            block_len: default_block_len(),
            code_rate_k: default_code_rate_k(),
            code_rate_n: default_code_rate_n(),
            channel: ChannelKind::Awgn,
            vv: default_vv(),
            radar_prob: default_radar_prob(),
            radar_power: default_radar_power(),
            train_channel_low: default_train_channel(),
            train_channel_high: default_train_channel(),
            train_dec_channel_low: default_train_dec_channel_low(),
            train_dec_channel_high: default_train_dec_channel_high(),
            snr_test_start: default_snr_test_start(),
            snr_test_end: default_snr_test_end(),
            snr_points: default_snr_points(),
            print_pos_power: false,
            print_pos_ber: false,
            enc_num_layer: default_enc_num_layer(),
            enc_num_unit: default_num_unit(),
            dec_num_layer: default_dec_num_layer(),
            dec_num_unit: default_num_unit(),
            kernel_size: default_kernel_size(),
            binarize_code: false,
            ste_scale: default_ste_scale(),
            loss: LossKind::Bce,
            focal_gamma: 0.0,
            focal_alpha: default_focal_alpha(),
            block_edge: default_block_edge(),
            block_edge_weight: default_block_edge_weight(),
            power_penalty: default_power_penalty(),
            num_epoch: default_num_epoch(),
            num_train_enc: default_num_train_enc(),
            num_train_dec: default_num_train_dec(),
            enc_lr: default_lr(),
            dec_lr: default_lr(),
            seed: 0,
        }
    }
}

impl ChannelCodeConfig {
    /// Save config to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(config)
    }

    /// Shape of one message batch: `(batch_size, block_len, code_rate_k)`.
    pub fn message_shape(&self) -> (usize, usize, usize) {
        (self.batch_size, self.block_len, self.code_rate_k)
    }

    /// Shape of one code (and noise) batch: `(batch_size, block_len, code_rate_n)`.
    pub fn code_shape(&self) -> (usize, usize, usize) {
        (self.batch_size, self.block_len, self.code_rate_n)
    }

    /// Mini-batches per training epoch, `floor(num_block / batch_size)`.
    pub fn num_train_batch(&self) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        self.num_block / self.batch_size
    }

    /// Batches per validation pass and per test SNR point,
    /// `floor(num_block / batch_size * test_ratio)`.
    pub fn num_test_batch(&self) -> usize {
        if self.batch_size == 0 {
            return 0;
        }
        (self.num_block as f64 / self.batch_size as f64 * self.test_ratio).floor() as usize
    }

    /// Reject configs that cannot produce a single well-formed batch.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 || self.block_len == 0 {
            bail!("batch_size and block_len must be positive");
        }
        if self.code_rate_k == 0 || self.code_rate_n == 0 {
            bail!("code rate k/n must be positive (got {}/{})", self.code_rate_k, self.code_rate_n);
        }
        if !(self.test_ratio >= 0.0) {
            bail!("test_ratio must be a non-negative number (got {})", self.test_ratio);
        }
        if self.snr_points == 0 {
            bail!("snr_points must be at least 1");
        }
        if self.kernel_size % 2 == 0 {
            bail!("kernel_size must be odd (got {})", self.kernel_size);
        }
        if self.channel == ChannelKind::TDist && self.vv <= 2.0 {
            bail!("t-dist channel needs vv > 2 for finite variance (got {})", self.vv);
        }
        if !(0.0..=1.0).contains(&self.radar_prob) {
            bail!("radar_prob must lie in [0, 1] (got {})", self.radar_prob);
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
