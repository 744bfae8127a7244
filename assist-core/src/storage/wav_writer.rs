use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::recording::PcmFormat;
use crate::processing::wav_format::{self, RIFF_OVERHEAD, WAV_HEADER_SIZE};

/// Fixed-size WAV file writer.
///
/// ## File Format
/// ```text
/// [44-byte WAV header declaring data_size]
/// [raw PCM data, never more than data_size bytes]
/// ```
///
/// The header is written up front with the exact payload size of a fixed-duration
/// capture. If the capture ends early, `finish` patches the header down to the bytes
/// actually written so the container always describes its own payload.
pub struct WavFileWriter {
    file_path: PathBuf,
    file: File,
    declared_size: u32,
    data_written: u64,
}

impl WavFileWriter {
    /// Create (or truncate) the file and write the header.
    pub fn create(path: &Path, format: &PcmFormat, data_size: u64) -> Result<Self, CaptureError> {
        let declared_size = u32::try_from(data_size)
            .ok()
            .filter(|size| size.checked_add(RIFF_OVERHEAD).is_some())
            .ok_or_else(|| {
                CaptureError::InvalidFormat(format!("{data_size} bytes does not fit a WAV container"))
            })?;

        let mut file = File::create(path).map_err(|e| CaptureError::FileOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let header = wav_format::generate_wav_header(format, declared_size);
        file.write_all(&header)
            .map_err(|e| CaptureError::FileWrite(format!("header write failed: {}", e)))?;

        Ok(Self {
            file_path: path.to_path_buf(),
            file,
            declared_size,
            data_written: 0,
        })
    }

    /// Append PCM bytes. Refuses to grow the payload past the declared size.
    pub fn write(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        if data.len() as u64 > self.remaining() {
            return Err(CaptureError::FileWrite(format!(
                "{} bytes would exceed the declared {} byte payload",
                data.len(),
                self.declared_size
            )));
        }
        self.file
            .write_all(data)
            .map_err(|e| CaptureError::FileWrite(format!("write failed: {}", e)))?;
        self.data_written += data.len() as u64;
        Ok(())
    }

    /// Payload bytes still expected by the header.
    pub fn remaining(&self) -> u64 {
        u64::from(self.declared_size) - self.data_written
    }

    /// Payload bytes written so far (excluding the header).
    pub fn data_written(&self) -> u64 {
        self.data_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Flush and close. Returns the payload size the header ends up declaring.
    pub fn finish(mut self) -> Result<u64, CaptureError> {
        if self.data_written < u64::from(self.declared_size) {
            // data_written < declared_size, so it fits in u32
            let actual = self.data_written as u32;
            let mut patch = [0u8; WAV_HEADER_SIZE];
            wav_format::patch_data_size(&mut patch, actual);

            // Patch RIFF chunk size at offset 4
            self.file
                .seek(SeekFrom::Start(4))
                .and_then(|_| self.file.write_all(&patch[4..8]))
                .map_err(|e| CaptureError::FileWrite(e.to_string()))?;

            // Patch data size at offset 40
            self.file
                .seek(SeekFrom::Start(40))
                .and_then(|_| self.file.write_all(&patch[40..44]))
                .map_err(|e| CaptureError::FileWrite(e.to_string()))?;

            log::warn!(
                "{}: short capture, header patched from {} to {} bytes",
                self.file_path.display(),
                self.declared_size,
                actual
            );
        }

        self.file
            .flush()
            .map_err(|e| CaptureError::FileWrite(e.to_string()))?;
        Ok(self.data_written)
    }
}
