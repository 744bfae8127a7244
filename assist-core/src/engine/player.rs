use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::models::error::PlaybackError;
use crate::models::recording::PcmFormat;
use crate::processing::wav_format::{WavHeader, WAV_HEADER_SIZE};
use crate::traits::audio_io::AudioOutput;

/// WAV file player.
///
/// Skips the fixed 44-byte header and streams the rest to the speaker in
/// staging-buffer sized chunks. The header is checked for the RIFF/WAVE markers
/// only; the output is always driven with the configured format.
pub struct AudioPlayer<O: AudioOutput> {
    output: O,
}

impl<O: AudioOutput> AudioPlayer<O> {
    pub fn new(output: O) -> Self {
        Self { output }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Play `path` and return the number of payload bytes sent to the speaker.
    pub fn play(
        &mut self,
        path: &Path,
        format: &PcmFormat,
        buf: &mut [u8],
    ) -> Result<u64, PlaybackError> {
        if buf.is_empty() {
            return Err(PlaybackError::FileRead("empty staging buffer".into()));
        }

        let mut file = File::open(path).map_err(|e| PlaybackError::FileMissing {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut header = [0u8; WAV_HEADER_SIZE];
        let got = read_full(&mut file, &mut header)
            .map_err(|e| PlaybackError::FileRead(e.to_string()))?;
        if got < WAV_HEADER_SIZE {
            return Err(PlaybackError::InvalidHeader(format!(
                "{} is {} bytes, shorter than a {} byte header",
                path.display(),
                got,
                WAV_HEADER_SIZE
            )));
        }

        let parsed = WavHeader::parse(&header).ok_or_else(|| {
            log::warn!("{} is not a WAV container, refusing to play it", path.display());
            PlaybackError::UnsupportedFormat(format!("{} has no RIFF/WAVE header", path.display()))
        })?;
        if !parsed.is_pcm() || parsed.format != *format {
            log::warn!(
                "{}: header says {:?} (format code {}), playing as {:?}",
                path.display(),
                parsed.format,
                parsed.format_code,
                format
            );
        }

        self.output.install(format)?;
        let mut device = InstalledOutput(&mut self.output);

        let mut played = 0u64;
        loop {
            let n = match file.read(buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(PlaybackError::FileRead(e.to_string())),
            };
            write_all(&mut *device.0, &buf[..n])?;
            played += n as u64;
        }

        log::info!("Audio playback finished ({} bytes)", played);
        Ok(played)
    }
}

/// Blocks until the output has accepted all of `data`.
fn write_all<O: AudioOutput>(output: &mut O, mut data: &[u8]) -> Result<(), PlaybackError> {
    while !data.is_empty() {
        let accepted = output.write(data)?;
        if accepted == 0 {
            return Err(PlaybackError::DeviceWrite("speaker accepted no data".into()));
        }
        data = &data[accepted.min(data.len())..];
    }
    Ok(())
}

/// Like `read_exact`, but reports how much was read instead of failing on EOF.
fn read_full(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// RAII guard that uninstalls the speaker driver when dropped.
struct InstalledOutput<'a, O: AudioOutput>(&'a mut O);

impl<O: AudioOutput> Drop for InstalledOutput<'_, O> {
    fn drop(&mut self) {
        self.0.uninstall();
    }
}
