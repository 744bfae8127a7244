use std::path::{Path, PathBuf};

/// Highest sample rate accepted by [`PcmFormat::validate`].
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Linear PCM stream layout shared by the microphone, the speaker and the WAV container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl PcmFormat {
    /// 16-bit mono at the given rate, the only layout the board's codec path uses.
    pub fn mono_16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            bits_per_sample: 16,
            channels: 1,
        }
    }

    pub fn bytes_per_sample(&self) -> u32 {
        u32::from(self.bits_per_sample) / 8
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> u16 {
        let align = u32::from(self.channels) * u32::from(self.bits_per_sample) / 8;
        u16::try_from(align).unwrap_or(u16::MAX)
    }

    /// Saturates at `u32::MAX` for layouts that `validate` rejects.
    pub fn byte_rate(&self) -> u32 {
        self.checked_byte_rate().unwrap_or(u32::MAX)
    }

    /// `sample_rate * channels * bits_per_sample / 8`, or `None` if it overflows.
    pub fn checked_byte_rate(&self) -> Option<u32> {
        self.sample_rate
            .checked_mul(u32::from(self.channels))?
            .checked_mul(u32::from(self.bits_per_sample))
            .map(|bits| bits / 8)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.sample_rate > MAX_SAMPLE_RATE {
            return Err(format!(
                "sample rate {} exceeds {} Hz",
                self.sample_rate, MAX_SAMPLE_RATE
            ));
        }
        if ![8, 16, 24, 32].contains(&self.bits_per_sample) {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }
}

/// One fixed-duration capture request. Lives only for the duration of `record()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSession {
    pub path: PathBuf,
    pub format: PcmFormat,
    pub duration_secs: u32,
}

impl RecordingSession {
    pub fn new(path: impl Into<PathBuf>, format: PcmFormat, duration_secs: u32) -> Self {
        Self {
            path: path.into(),
            format,
            duration_secs,
        }
    }

    /// Exact payload size: `sample_rate * duration * bytes_per_sample * channels`.
    pub fn data_size(&self) -> u64 {
        u64::from(self.format.sample_rate)
            * u64::from(self.duration_secs)
            * u64::from(self.format.bytes_per_sample())
            * u64::from(self.format.channels)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result returned when a recording completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    /// PCM payload bytes written after the header.
    pub data_size: u64,
    /// Header plus payload.
    pub file_size: u64,
}
