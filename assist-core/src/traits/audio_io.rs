use crate::models::error::{CaptureError, PlaybackError};
use crate::models::recording::PcmFormat;

/// Microphone peripheral (I2S receive path on the board).
///
/// `install` configures the driver and its DMA channel, `read` blocks until the
/// hardware has filled at least part of `buf`, `uninstall` releases everything.
/// The recorder always pairs a successful `install` with exactly one `uninstall`.
pub trait AudioInput: Send {
    fn install(&mut self, format: &PcmFormat) -> Result<(), CaptureError>;

    /// Blocking read of interleaved little-endian PCM. Returns bytes placed in `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;

    fn uninstall(&mut self);
}

/// Speaker peripheral (I2S transmit path on the board).
pub trait AudioOutput: Send {
    fn install(&mut self, format: &PcmFormat) -> Result<(), PlaybackError>;

    /// Blocking write; returns once the DMA buffer accepted some of `data`.
    /// Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, PlaybackError>;

    fn uninstall(&mut self);
}
