//! Session: the outer epoch driver.
//!
//! Owns the autoencoder, one `VarMap` + AdamW optimiser per half, and the
//! [`Harness`]. Each outer epoch runs `num_train_enc` encoder epochs, then
//! `num_train_dec` decoder epochs, then one validation pass.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use serde::Serialize;

use aecode_common::ChannelCodeConfig;
use aecode_core::ChannelAutoEncoder;

use crate::trainer::{Harness, SweepReport, TrainMode, ValidationMetrics};

const ENCODER_FILE: &str = "encoder.safetensors";
const DECODER_FILE: &str = "decoder.safetensors";
const CONFIG_FILE: &str = "config.json";

/// Losses and validation for one outer epoch.
#[derive(Debug, Clone, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    /// Average loss of the last encoder epoch, if any ran.
    pub enc_loss: Option<f64>,
    /// Average loss of the last decoder epoch, if any ran.
    pub dec_loss: Option<f64>,
    pub validation: ValidationMetrics,
}

pub struct Session {
    pub model: ChannelAutoEncoder,
    enc_varmap: VarMap,
    dec_varmap: VarMap,
    enc_optimizer: AdamW,
    dec_optimizer: AdamW,
    harness: Harness,
    /// Outer epochs completed so far.
    pub epoch: usize,
}

impl Session {
    /// Build a freshly initialised model and its optimisers.
    pub fn new(config: ChannelCodeConfig, device: Device) -> Result<Self> {
        config.validate()?;
        let enc_varmap = VarMap::new();
        let dec_varmap = VarMap::new();
        let model = ChannelAutoEncoder::new(
            &config,
            VarBuilder::from_varmap(&enc_varmap, DType::F32, &device),
            VarBuilder::from_varmap(&dec_varmap, DType::F32, &device),
        )?;

        let enc_optimizer = adam(&enc_varmap, config.enc_lr)?;
        let dec_optimizer = adam(&dec_varmap, config.dec_lr)?;

        let num_params: usize = enc_varmap
            .all_vars()
            .iter()
            .chain(dec_varmap.all_vars().iter())
            .map(|v| v.elem_count())
            .sum();
        tracing::info!(
            num_params,
            rate = %format!("{}/{}", config.code_rate_k, config.code_rate_n),
            block_len = config.block_len,
            channel = ?config.channel,
            "Channel autoencoder"
        );

        Ok(Self {
            model,
            enc_varmap,
            dec_varmap,
            enc_optimizer,
            dec_optimizer,
            harness: Harness::new(config, device),
            epoch: 0,
        })
    }

    /// Restore a session written by [`save`](Self::save).
    ///
    /// `overrides` may adjust the stored config (e.g. the test SNR range)
    /// before the model is built.
    pub fn load(
        dir: &Path,
        device: Device,
        overrides: impl FnOnce(&mut ChannelCodeConfig),
    ) -> Result<Self> {
        let mut config = ChannelCodeConfig::load(&dir.join(CONFIG_FILE))?;
        overrides(&mut config);
        let mut session = Self::new(config, device)?;
        session
            .enc_varmap
            .load(dir.join(ENCODER_FILE))
            .with_context(|| format!("load {}", dir.join(ENCODER_FILE).display()))?;
        session
            .dec_varmap
            .load(dir.join(DECODER_FILE))
            .with_context(|| format!("load {}", dir.join(DECODER_FILE).display()))?;
        Ok(session)
    }

    pub fn config(&self) -> &ChannelCodeConfig {
        self.harness.config()
    }

    pub fn harness_mut(&mut self) -> &mut Harness {
        &mut self.harness
    }

    /// One outer epoch: encoder epochs, decoder epochs, validation.
    pub fn run_epoch(&mut self) -> Result<EpochSummary> {
        let epoch = self.epoch + 1;
        let (num_enc, num_dec) = (self.config().num_train_enc, self.config().num_train_dec);
        if num_enc == 0 && num_dec == 0 {
            bail!("num_train_enc and num_train_dec are both zero; nothing to train");
        }

        let mut enc_loss = None;
        for _ in 0..num_enc {
            let m = self.harness.train(
                epoch,
                &self.model,
                &mut self.enc_optimizer,
                TrainMode::Encoder,
            )?;
            enc_loss = Some(m.avg_loss);
        }
        let mut dec_loss = None;
        for _ in 0..num_dec {
            let m = self.harness.train(
                epoch,
                &self.model,
                &mut self.dec_optimizer,
                TrainMode::Decoder,
            )?;
            dec_loss = Some(m.avg_loss);
        }
        let validation = self.harness.validate(&self.model)?;

        self.epoch = epoch;
        Ok(EpochSummary {
            epoch,
            enc_loss,
            dec_loss,
            validation,
        })
    }

    /// Run `num_epoch` outer epochs, calling `on_epoch` after each.
    pub fn run(
        &mut self,
        num_epoch: usize,
        mut on_epoch: impl FnMut(&Self, &EpochSummary) -> Result<()>,
    ) -> Result<Vec<EpochSummary>> {
        let mut history = Vec::with_capacity(num_epoch);
        for _ in 0..num_epoch {
            let summary = self.run_epoch()?;
            on_epoch(&*self, &summary)?;
            history.push(summary);
        }
        Ok(history)
    }

    /// Final BER/BLER sweep.
    pub fn test(&mut self) -> Result<SweepReport> {
        self.harness.test(&self.model)
    }

    /// Mutual information (bits) between code and received signal at `snr`.
    pub fn mutual_info(&mut self, snr: f64) -> Result<f64> {
        self.harness.estimate_mi(&self.model, snr)
    }

    /// Write encoder/decoder weights and config into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        self.enc_varmap.save(dir.join(ENCODER_FILE))?;
        self.dec_varmap.save(dir.join(DECODER_FILE))?;
        self.config().save(&dir.join(CONFIG_FILE))?;
        Ok(dir.to_path_buf())
    }

    /// Save under `dir/checkpoint-<epoch>`.
    pub fn save_checkpoint(&self, dir: &Path) -> Result<PathBuf> {
        self.save(&dir.join(format!("checkpoint-{}", self.epoch)))
    }
}

/// Adam over every variable of `varmap` (AdamW with zero weight decay).
fn adam(varmap: &VarMap, lr: f64) -> Result<AdamW> {
    Ok(AdamW::new(
        varmap.all_vars(),
        ParamsAdamW {
            lr,
            weight_decay: 0.0,
            ..Default::default()
        },
    )?)
}

// ── Tests ───────────────────────────────────────────────────────────────────
