//! The model contract the training and evaluation loops are written against.

use candle_core::{Result, Tensor};

/// An encoder/decoder pair composed into one callable.
///
/// Implementations must keep the code shape equal to the noise shape the
/// loops generate, `(batch, block_len, code_rate_n)`.
pub trait Codec {
    /// Encode `message`, add `noise`, decode.
    ///
    /// Returns `(decoded_output, transmitted_code)`. The decoded output is a
    /// per-bit probability in \[0, 1\] with the message's shape.
    fn forward(&self, message: &Tensor, noise: &Tensor) -> Result<(Tensor, Tensor)>;

    /// Encoder sub-path only: message bits → transmitted code.
    fn encode(&self, message: &Tensor) -> Result<Tensor>;
}

/// Error out unless the noise shape matches the code shape exactly.
pub fn check_noise_shape(code: &Tensor, noise: &Tensor) -> Result<()> {
    if code.dims() != noise.dims() {
        candle_core::bail!(
            "noise shape {:?} does not match code shape {:?}",
            noise.dims(),
            code.dims()
        );
    }
    Ok(())
}
