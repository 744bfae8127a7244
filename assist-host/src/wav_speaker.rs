//! Speaker stand-in that writes each playback to a numbered WAV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use assist_core::models::error::PlaybackError;
use assist_core::models::recording::PcmFormat;
use assist_core::traits::audio_io::AudioOutput;

type Writer = hound::WavWriter<BufWriter<File>>;

/// Every install opens `playback-NNN.wav` in the output directory; uninstall
/// finalizes it.
pub struct WavFileSpeaker {
    dir: PathBuf,
    played: u32,
    writer: Option<Writer>,
    /// Odd trailing byte waiting for its sample partner.
    carry: Option<u8>,
    last_file: Option<PathBuf>,
}

impl WavFileSpeaker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            played: 0,
            writer: None,
            carry: None,
            last_file: None,
        }
    }

    /// The most recent playback file.
    pub fn last_file(&self) -> Option<&Path> {
        self.last_file.as_deref()
    }
}

impl AudioOutput for WavFileSpeaker {
    fn install(&mut self, format: &PcmFormat) -> Result<(), PlaybackError> {
        if format.bits_per_sample != 16 {
            return Err(PlaybackError::DeviceInit(format!(
                "speaker sink only takes 16-bit PCM, got {}",
                format.bits_per_sample
            )));
        }
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| PlaybackError::DeviceInit(format!("{}: {}", self.dir.display(), e)))?;

        self.played += 1;
        let path = self.dir.join(format!("playback-{:03}.wav", self.played));
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&path, spec)
            .map_err(|e| PlaybackError::DeviceInit(format!("{}: {}", path.display(), e)))?;

        self.writer = Some(writer);
        self.carry = None;
        self.last_file = Some(path);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, PlaybackError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PlaybackError::DeviceWrite("speaker not installed".into()))?;

        let mut bytes = data;
        if let Some(low) = self.carry.take() {
            match bytes.split_first() {
                Some((&high, rest)) => {
                    write_sample(writer, i16::from_le_bytes([low, high]))?;
                    bytes = rest;
                }
                None => self.carry = Some(low),
            }
        }
        let mut pairs = bytes.chunks_exact(2);
        for pair in &mut pairs {
            write_sample(writer, i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        if let [odd] = pairs.remainder() {
            self.carry = Some(*odd);
        }
        Ok(data.len())
    }

    fn uninstall(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                log::warn!("Failed to finalize playback file: {}", e);
            } else if let Some(ref path) = self.last_file {
                log::info!("Playback written to {}", path.display());
            }
        }
    }
}

fn write_sample(writer: &mut Writer, sample: i16) -> Result<(), PlaybackError> {
    writer
        .write_sample(sample)
        .map_err(|e| PlaybackError::DeviceWrite(e.to_string()))
}
