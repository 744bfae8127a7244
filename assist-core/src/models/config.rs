use std::path::PathBuf;
use std::time::Duration;

use super::recording::PcmFormat;
use crate::processing::buffer_pool::DEFAULT_CHUNK_SIZE;
use crate::processing::multipart::Boundary;

/// Boundary token sent with every multipart request.
pub const DEFAULT_BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

/// Longest accepted poll interval, streamer interval or request timeout.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Static configuration for both tasks.
///
/// Built once at startup and shared read-only (`Arc<AssistConfig>`) with the assistant
/// loop and the image streamer. Nothing is negotiated at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistConfig {
    pub audio: AudioSettings,
    pub server: ServerSettings,
    pub paths: FilePaths,
    pub assistant: AssistantSettings,
    pub streamer: StreamerSettings,

    /// Size of every staging buffer used for file and HTTP relay (default: 1024).
    pub chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    /// Capture and playback sample rate in Hz (default: 16000).
    pub sample_rate: u32,

    /// Bit depth (default: 16).
    pub bits_per_sample: u16,

    /// Channel count (default: 1).
    pub channels: u16,

    /// Fixed recording length after the wake word (default: 5 s).
    pub record_duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Endpoint taking `audio` + `image0` and answering with synthesized audio.
    pub query_url: String,

    /// Endpoint taking one `image` part per call.
    pub image_stream_url: String,

    /// Single fixed timeout applied to each request.
    pub request_timeout: Duration,

    pub boundary: String,

    /// Sent as a `device_id` form field when set; the server otherwise keys by address.
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilePaths {
    pub recording: PathBuf,
    pub still_image: PathBuf,
    pub response: PathBuf,
    pub stream_image: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantSettings {
    /// Pause between wake-word detector polls (default: 100 ms).
    pub poll_interval: Duration,

    /// Capture a fresh still under the camera lease and send it as `image0`.
    pub attach_image: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamerSettings {
    /// Fixed sleep between iterations, after success and failure alike (default: 1 s).
    pub interval: Duration,
}

impl AssistConfig {
    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.audio.sample_rate,
            bits_per_sample: self.audio.bits_per_sample,
            channels: self.audio.channels,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.pcm_format().validate()?;
        if self.audio.record_duration_secs == 0 {
            return Err("record duration must be positive".into());
        }
        if self.server.query_url.trim().is_empty() {
            return Err("query url is empty".into());
        }
        if self.server.image_stream_url.trim().is_empty() {
            return Err("image stream url is empty".into());
        }
        check_wait("request timeout", self.server.request_timeout)?;
        Boundary::new(&self.server.boundary).map_err(|e| e.to_string())?;
        if self.chunk_size == 0 {
            return Err("chunk size must be positive".into());
        }
        check_wait("streamer interval", self.streamer.interval)?;
        if self.assistant.poll_interval > MAX_WAIT {
            return Err(format!("poll interval exceeds {}s", MAX_WAIT.as_secs()));
        }
        Ok(())
    }
}

fn check_wait(name: &str, wait: Duration) -> Result<(), String> {
    if wait.is_zero() {
        return Err(format!("{name} must be positive"));
    }
    if wait > MAX_WAIT {
        return Err(format!("{name} exceeds {}s", MAX_WAIT.as_secs()));
    }
    Ok(())
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            audio: AudioSettings {
                sample_rate: 16000,
                bits_per_sample: 16,
                channels: 1,
                record_duration_secs: 5,
            },
            server: ServerSettings {
                query_url: "http://192.168.1.100:5000/query".into(),
                image_stream_url: "http://192.168.1.100:5000/image_stream".into(),
                request_timeout: Duration::from_secs(30),
                boundary: DEFAULT_BOUNDARY.into(),
                device_id: None,
            },
            paths: FilePaths {
                recording: PathBuf::from("/spiffs/voice.wav"),
                still_image: PathBuf::from("/spiffs/img0.jpg"),
                response: PathBuf::from("/spiffs/response.wav"),
                stream_image: PathBuf::from("/spiffs/img_stream.jpg"),
            },
            assistant: AssistantSettings {
                poll_interval: Duration::from_millis(100),
                attach_image: true,
            },
            streamer: StreamerSettings {
                interval: Duration::from_secs(1),
            },
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
