//! WAV container utilities.
//!
//! Generates and parses the standard 44-byte RIFF header used for every recording.

use crate::models::recording::PcmFormat;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Bytes counted by the RIFF chunk size on top of the data payload.
pub const RIFF_OVERHEAD: u32 = 36;

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    overall_size = 36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bits_per_sample / 8
/// [32-33]  block_align = channels * bits_per_sample / 8
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(format: &PcmFormat, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let overall_size = RIFF_OVERHEAD + data_size;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&overall_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes()); // PCM format size
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM format code
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Patch the data-size field at offset 40 and the RIFF chunk size at offset 4,
/// keeping `overall_size = data_size + 36`.
pub fn patch_data_size(header: &mut [u8], data_size: u32) {
    header[4..8].copy_from_slice(&(RIFF_OVERHEAD + data_size).to_le_bytes());
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
}

/// Fields decoded from a 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub overall_size: u32,
    pub format_code: u16,
    pub format: PcmFormat,
    pub byte_rate: u32,
    pub block_align: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Decode a canonical header. Returns `None` when the RIFF/WAVE/fmt/data
    /// markers are not where a 44-byte header puts them.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < WAV_HEADER_SIZE {
            return None;
        }
        if &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        Some(Self {
            overall_size: u32_at(4),
            format_code: u16_at(20),
            format: PcmFormat {
                sample_rate: u32_at(24),
                bits_per_sample: u16_at(34),
                channels: u16_at(22),
            },
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            data_size: u32_at(40),
        })
    }

    pub fn is_pcm(&self) -> bool {
        self.format_code == 1
    }
}
