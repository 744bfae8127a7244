//! Microphone stand-in that plays a WAV fixture into the recorder.

use std::path::Path;
use std::thread;
use std::time::Duration;

use assist_core::models::error::CaptureError;
use assist_core::models::recording::PcmFormat;
use assist_core::traits::audio_io::AudioInput;

/// Loops over the samples of a 16-bit WAV file.
///
/// With `realtime` set, each read sleeps for the audio time it returns, so a
/// five second recording takes five seconds as it would on the device.
pub struct WavFileMicrophone {
    pcm: Vec<u8>,
    format: PcmFormat,
    pos: usize,
    realtime: bool,
    installed: bool,
}

impl WavFileMicrophone {
    pub fn open(path: &Path, realtime: bool) -> Result<Self, CaptureError> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| CaptureError::DeviceInit(format!("{}: {}", path.display(), e)))?;
        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(CaptureError::InvalidFormat(format!(
                "{} is not 16-bit integer PCM",
                path.display()
            )));
        }
        let samples = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::DeviceRead(format!("{}: {}", path.display(), e)))?;

        log::info!(
            "Microphone fixture {} loaded: {} Hz, {} ch, {} samples",
            path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );
        Ok(Self::from_samples(
            &samples,
            PcmFormat {
                sample_rate: spec.sample_rate,
                bits_per_sample: 16,
                channels: spec.channels,
            },
            realtime,
        ))
    }

    pub fn from_samples(samples: &[i16], format: PcmFormat, realtime: bool) -> Self {
        let pcm = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self {
            pcm,
            format,
            pos: 0,
            realtime,
            installed: false,
        }
    }

    /// One second of silence in `format`.
    pub fn silence(format: PcmFormat) -> Self {
        let frames = format.sample_rate as usize * format.channels as usize;
        Self::from_samples(&vec![0i16; frames], format, false)
    }

    pub fn format(&self) -> &PcmFormat {
        &self.format
    }
}

impl AudioInput for WavFileMicrophone {
    fn install(&mut self, format: &PcmFormat) -> Result<(), CaptureError> {
        if *format != self.format {
            return Err(CaptureError::DeviceInit(format!(
                "fixture is {:?}, recorder asked for {:?}",
                self.format, format
            )));
        }
        if self.pcm.is_empty() {
            return Err(CaptureError::DeviceInit("microphone fixture is empty".into()));
        }
        self.installed = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        if !self.installed {
            return Err(CaptureError::DeviceRead("microphone not installed".into()));
        }
        // Whole samples only, so looping never splits one.
        let align = self.format.block_align().max(1) as usize;
        let want = buf.len() - buf.len() % align;
        let mut filled = 0;
        while filled < want {
            if self.pos == self.pcm.len() {
                self.pos = 0;
            }
            let n = (want - filled).min(self.pcm.len() - self.pos);
            buf[filled..filled + n].copy_from_slice(&self.pcm[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }

        if self.realtime && filled > 0 {
            let secs = filled as f64 / f64::from(self.format.byte_rate());
            thread::sleep(Duration::from_secs_f64(secs));
        }
        Ok(filled)
    }

    fn uninstall(&mut self) {
        self.installed = false;
    }
}
