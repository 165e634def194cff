//! # aecode-train — The Control Loops
//!
//! Training, validation and evaluation for learned channel codes:
//!
//! * **[`Harness`]** — owns config, device and RNG. [`Harness::train`] runs
//!   one encoder- or decoder-mode epoch, [`Harness::validate`] a held-out
//!   pass, [`Harness::test`] the BER/BLER sweep with power correction.
//! * **[`Session`]** — the outer epoch driver: alternates encoder/decoder
//!   epochs with separate AdamW optimisers, validates, checkpoints.
//! * **[`mi`]** — optional Kraskov mutual-information diagnostic.

pub mod driver;
pub mod mi;
pub mod trainer;

pub use driver::{EpochSummary, Session};
pub use mi::{compute_mi, kraskov_mi};
pub use trainer::{
    adjusted_snr, snr_grid, Harness, SnrPoint, SweepReport, TrainMetrics, TrainMode,
    ValidationMetrics,
};
