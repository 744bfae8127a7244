use crate::models::error::CaptureError;
use crate::models::recording::{RecordingResult, RecordingSession};
use crate::processing::wav_format::WAV_HEADER_SIZE;
use crate::storage::wav_writer::WavFileWriter;
use crate::traits::audio_io::AudioInput;

/// Fixed-duration microphone recorder.
///
/// ```text
/// [AudioInput] → chunk buffer → trim to remaining → [WavFileWriter]
/// ```
pub struct AudioRecorder<I: AudioInput> {
    input: I,
}

impl<I: AudioInput> AudioRecorder<I> {
    pub fn new(input: I) -> Self {
        Self { input }
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    /// Record `session.duration_secs` of audio into a WAV file at `session.path`.
    ///
    /// The payload size is fixed before the device starts; the last chunk is trimmed
    /// so the file never holds more than the header declares. Blocks on the device
    /// for the whole duration. The device is uninstalled on every exit path.
    pub fn record(
        &mut self,
        session: &RecordingSession,
        buf: &mut [u8],
    ) -> Result<RecordingResult, CaptureError> {
        session.format.validate().map_err(CaptureError::InvalidFormat)?;
        if buf.is_empty() {
            return Err(CaptureError::InvalidFormat("empty staging buffer".into()));
        }
        let data_size = session.data_size();

        self.input.install(&session.format)?;
        let mut device = InstalledInput(&mut self.input);

        let mut writer = WavFileWriter::create(session.path(), &session.format, data_size)?;
        let pumped = pump(&mut *device.0, &mut writer, buf);

        // Finalize even after a stall so the header matches what landed on disk.
        let written = writer.finish();
        drop(device);

        pumped?;
        let data_written = written?;

        log::info!(
            "Audio recorded to {} ({} bytes of PCM)",
            session.path().display(),
            data_written
        );

        Ok(RecordingResult {
            file_path: session.path.clone(),
            data_size: data_written,
            file_size: data_written + WAV_HEADER_SIZE as u64,
        })
    }
}

fn pump<I: AudioInput>(
    input: &mut I,
    writer: &mut WavFileWriter,
    buf: &mut [u8],
) -> Result<(), CaptureError> {
    while writer.remaining() > 0 {
        // A driver may over-report; never index past the staging buffer.
        let n = input.read(buf)?.min(buf.len());
        if n == 0 {
            return Err(CaptureError::DeviceRead(format!(
                "microphone stopped delivering samples with {} bytes outstanding",
                writer.remaining()
            )));
        }
        let take = n.min(usize::try_from(writer.remaining()).unwrap_or(usize::MAX));
        writer.write(&buf[..take])?;
    }
    Ok(())
}

/// RAII guard that uninstalls the microphone driver when dropped.
struct InstalledInput<'a, I: AudioInput>(&'a mut I);

impl<I: AudioInput> Drop for InstalledInput<'_, I> {
    fn drop(&mut self) {
        self.0.uninstall();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recording::PcmFormat;
    use crate::processing::wav_format::WavHeader;
    use std::fs;

    fn mono_session(path: impl Into<std::path::PathBuf>, sample_rate: u32, secs: u32) -> RecordingSession {
        RecordingSession::new(path, PcmFormat::mono_16(sample_rate), secs)
    }

    /// Microphone producing a ramp, `chunk` bytes per read, optionally stalling.
    struct RampMic {
        chunk: usize,
        produced: usize,
        stall_after: Option<usize>,
        overreport: usize,
        fail_install: bool,
        installs: usize,
        uninstalls: usize,
    }

    impl RampMic {
        fn new(chunk: usize) -> Self {
            Self {
                chunk,
                produced: 0,
                stall_after: None,
                overreport: 0,
                fail_install: false,
                installs: 0,
                uninstalls: 0,
            }
        }
    }

    impl AudioInput for RampMic {
        fn install(&mut self, _format: &PcmFormat) -> Result<(), CaptureError> {
            if self.fail_install {
                return Err(CaptureError::DeviceInit("i2s driver install failed".into()));
            }
            self.installs += 1;
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
            if let Some(limit) = self.stall_after {
                if self.produced >= limit {
                    return Ok(0);
                }
            }
            let n = self.chunk.min(buf.len());
            for byte in &mut buf[..n] {
                *byte = (self.produced % 251) as u8;
                self.produced += 1;
            }
            Ok(n + self.overreport)
        }

        fn uninstall(&mut self) {
            self.uninstalls += 1;
        }
    }

    #[test]
    fn five_seconds_16khz_mono_is_160044_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        let mut recorder = AudioRecorder::new(RampMic::new(1024));
        let mut buf = vec![0u8; 1024];

        let result = recorder.record(&mono_session(&path, 16000, 5), &mut buf).unwrap();
        assert_eq!(result.data_size, 160_000);
        assert_eq!(result.file_size, 160_044);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), 160_044);
        let header = WavHeader::parse(&file_data).unwrap();
        assert_eq!(header.data_size, 160_000);
        assert_eq!(header.overall_size, 160_036);
        assert_eq!(recorder.input().installs, 1);
        assert_eq!(recorder.input().uninstalls, 1);
    }

    #[test]
    fn last_chunk_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.wav");
        // 8000 Hz * 1 s * 2 bytes = 16000, not a multiple of 1500
        let mut recorder = AudioRecorder::new(RampMic::new(1500));
        let mut buf = vec![0u8; 1500];

        let result = recorder.record(&mono_session(&path, 8000, 1), &mut buf).unwrap();
        assert_eq!(result.data_size, 16_000);
        assert_eq!(fs::metadata(&path).unwrap().len(), 16_044);
        assert_eq!(recorder.input().produced, 16_500);
    }

    #[test]
    fn header_matches_payload_for_many_rates() {
        let dir = tempfile::tempdir().unwrap();
        for (rate, secs) in [(8000, 1), (11025, 2), (22050, 1), (44100, 1)] {
            let path = dir.path().join(format!("r{rate}.wav"));
            let mut recorder = AudioRecorder::new(RampMic::new(700));
            let mut buf = vec![0u8; 1024];
            recorder.record(&mono_session(&path, rate, secs), &mut buf).unwrap();

            let file_data = fs::read(&path).unwrap();
            let header = WavHeader::parse(&file_data).unwrap();
            assert_eq!(header.data_size as usize, file_data.len() - 44);
            assert_eq!(header.overall_size, header.data_size + 36);
        }
    }

    #[test]
    fn device_init_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.wav");
        let mut mic = RampMic::new(1024);
        mic.fail_install = true;
        let mut recorder = AudioRecorder::new(mic);
        let mut buf = vec![0u8; 1024];

        let err = recorder.record(&mono_session(&path, 16000, 1), &mut buf).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceInit(_)));
        assert!(!path.exists());
        assert_eq!(recorder.input().uninstalls, 0);
    }

    #[test]
    fn file_open_failure_releases_device() {
        let mut recorder = AudioRecorder::new(RampMic::new(1024));
        let mut buf = vec![0u8; 1024];
        let session = mono_session("/nonexistent-dir/voice.wav", 16000, 1);

        let err = recorder.record(&session, &mut buf).unwrap_err();
        assert!(matches!(err, CaptureError::FileOpen { .. }));
        assert_eq!(recorder.input().installs, 1);
        assert_eq!(recorder.input().uninstalls, 1);
    }

    #[test]
    fn stall_keeps_header_consistent_and_releases_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stall.wav");
        let mut mic = RampMic::new(1000);
        mic.stall_after = Some(3000);
        let mut recorder = AudioRecorder::new(mic);
        let mut buf = vec![0u8; 1024];

        let err = recorder.record(&mono_session(&path, 16000, 1), &mut buf).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceRead(_)));
        assert_eq!(recorder.input().uninstalls, 1);

        let file_data = fs::read(&path).unwrap();
        let header = WavHeader::parse(&file_data).unwrap();
        assert_eq!(header.data_size, 3000);
        assert_eq!(file_data.len(), 3044);
    }

    #[test]
    fn over_reported_read_is_clamped_to_the_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clamped.wav");
        let mut mic = RampMic::new(1024);
        mic.overreport = 4096;
        let mut recorder = AudioRecorder::new(mic);
        let mut buf = vec![0u8; 1024];

        let result = recorder.record(&mono_session(&path, 8000, 1), &mut buf).unwrap();
        assert_eq!(result.data_size, 16_000);
        assert_eq!(fs::metadata(&path).unwrap().len(), 16_044);
    }

    #[test]
    fn out_of_range_rate_never_installs_the_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.wav");
        let format = PcmFormat {
            sample_rate: 100_000_000,
            bits_per_sample: 32,
            channels: 2,
        };
        let mut recorder = AudioRecorder::new(RampMic::new(1024));
        let mut buf = vec![0u8; 1024];

        let err = recorder
            .record(&RecordingSession::new(&path, format, 1), &mut buf)
            .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidFormat(_)));
        assert_eq!(recorder.input().installs, 0);
        assert!(!path.exists());
    }
}
