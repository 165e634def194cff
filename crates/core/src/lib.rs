//! # aecode-core — The Model
//!
//! Everything needed to encode message bits into channel symbols and decode
//! them back lives in this crate:
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`codec`] | `Codec` trait: the contract the training loops depend on |
//! | [`encoder`] | convolutional `Encoder` with power constraint |
//! | [`decoder`] | convolutional `Decoder` with sigmoid output |
//! | [`model`] | `ChannelAutoEncoder` (encoder → channel → decoder) |
//! | [`power`] | power normalisation, STE binarisation |
//! | [`loss`] | BCE and the configurable encoder objective |
//!
//! Everything goes through `candle-core`/`candle-nn` and runs on CPU or CUDA.

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod loss;
pub mod model;
pub mod power;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use codec::{check_noise_shape, Codec};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use loss::{bce, customized_loss};
pub use model::ChannelAutoEncoder;
pub use power::{normalize_power, power_std, ste_sign_scaled};
