//! # aecode-common — Shared Primitives
//!
//! Types and utilities shared across every crate in the workspace:
//!
//! * **[`ChannelCodeConfig`]** — run hyper-parameters (serialised as JSON).
//! * **[`generate_noise`]** / **[`NoiseSnr`]** — AWGN, t-distributed and radar channels.
//! * **[`random_message_batch`]** / **[`MessageSource`]** — fresh message bits per batch.
//! * **[`metrics`]** — BER, BLER, positional BER, code power, SNR ↔ sigma.

pub mod channel;
pub mod config;
pub mod data;
pub mod metrics;

pub use channel::{generate_noise, NoiseSnr};
pub use config::{ChannelCodeConfig, ChannelKind, LossKind};
pub use data::{random_message_batch, MessageSource};
pub use metrics::{
    code_power, errors_ber, errors_ber_pos, errors_bler, snr_db2sigma, snr_sigma2db, tensor_std,
};
