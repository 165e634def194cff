//! Transmit power constraint and code binarisation.
//!
//! The encoder output is normalised to zero mean and unit standard deviation
//! over the whole batch before it hits the channel. Optionally the normalised
//! symbols are quantised to ±1 with a straight-through estimator so the
//! encoder still receives gradients.

use candle_core::{Result, Tensor};

/// Added to the std before dividing.
const POWER_EPS: f64 = 1e-8;

// ── Power normalisation ─────────────────────────────────────────────────────

/// `(x - mean(x)) / std(x)` with statistics taken over every element.
///
/// Uses the population std so a normalised batch has mean power exactly 1.
pub fn normalize_power(x: &Tensor) -> Result<Tensor> {
    let mean = x.mean_all()?;
    let centred = x.broadcast_sub(&mean)?;
    let std = centred.sqr()?.mean_all()?.sqrt()?.affine(1.0, POWER_EPS)?;
    centred.broadcast_div(&std)
}

/// Differentiable population std of `x`, as a scalar tensor.
pub fn power_std(x: &Tensor) -> Result<Tensor> {
    let mean = x.mean_all()?;
    x.broadcast_sub(&mean)?.sqr()?.mean_all()?.sqrt()
}

// ── Binarisation ────────────────────────────────────────────────────────────

/// Quantise the code to ±1 while passing `scale · grad` straight through.
///
/// Evaluates to `sign(x)`; the gradient comes from the zero-valued term
/// `scale · (x - detach(x))`.
pub fn ste_sign_scaled(x: &Tensor, scale: f64) -> Result<Tensor> {
    let passthrough = (x - x.detach())?.affine(scale, 0.0)?;
    x.sign()? + passthrough
}

// ── Tests ───────────────────────────────────────────────────────────────────
