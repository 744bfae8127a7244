//! Mock peripherals and a scripted HTTP server shared by the pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use assist_core::{
    AssistConfig, AudioInput, AudioOutput, CameraDriver, CameraFrame, CaptureError,
    HttpConnection, HttpTransport, Indicator, PcmFormat, PlaybackError, PostRequest,
    ResponseHead, UploadError, WakeWordDetector,
};
use parking_lot::Mutex;

pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9];

/// Config with every file under `dir` and short intervals.
pub fn config_in(dir: &Path) -> AssistConfig {
    let mut config = AssistConfig::default();
    config.paths.recording = dir.join("voice.wav");
    config.paths.still_image = dir.join("img0.jpg");
    config.paths.response = dir.join("response.wav");
    config.paths.stream_image = dir.join("img_stream.jpg");
    config.assistant.poll_interval = Duration::from_millis(1);
    config.streamer.interval = Duration::from_millis(5);
    config
}

pub struct ScriptedDetector(pub VecDeque<bool>);

impl ScriptedDetector {
    pub fn fires_once() -> Self {
        Self(VecDeque::from([true]))
    }
}

impl WakeWordDetector for ScriptedDetector {
    fn detect(&mut self) -> bool {
        self.0.pop_front().unwrap_or(false)
    }
}

/// Microphone delivering a constant sample value, one DMA-sized chunk per read.
pub struct ConstantMic {
    pub chunk: usize,
}

impl AudioInput for ConstantMic {
    fn install(&mut self, _format: &PcmFormat) -> Result<(), CaptureError> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        let n = self.chunk.min(buf.len());
        buf[..n].fill(0x40);
        Ok(n)
    }

    fn uninstall(&mut self) {}
}

#[derive(Default)]
pub struct CountingSpeaker {
    pub installs: usize,
    pub received: u64,
}

impl AudioOutput for CountingSpeaker {
    fn install(&mut self, _format: &PcmFormat) -> Result<(), PlaybackError> {
        self.installs += 1;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, PlaybackError> {
        self.received += data.len() as u64;
        Ok(data.len())
    }

    fn uninstall(&mut self) {}
}

/// Camera with one frame buffer that can be switched to busy.
pub struct FixtureCamera {
    pub busy: bool,
    pub out: bool,
    pub acquired: u64,
    pub released: u64,
}

impl FixtureCamera {
    pub fn new(busy: bool) -> Self {
        Self {
            busy,
            out: false,
            acquired: 0,
            released: 0,
        }
    }
}

impl CameraDriver for FixtureCamera {
    fn acquire_frame(&mut self) -> Option<CameraFrame> {
        if self.busy || self.out {
            return None;
        }
        self.out = true;
        self.acquired += 1;
        Some(CameraFrame::new(JPEG.to_vec(), self.acquired))
    }

    fn release_frame(&mut self, _frame: CameraFrame) {
        self.out = false;
        self.released += 1;
    }
}

pub struct NoLed;

impl Indicator for NoLed {
    fn set(&mut self, _on: bool) {}
}

/// One request as the server saw it.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub url: String,
    pub content_type: String,
    pub content_length: u64,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Reply(u16),
    RefuseConnect,
    TimeOut,
}

/// In-process server: records each request and answers with a fixed body.
pub struct ScriptedServer {
    pub requests: Arc<Mutex<Vec<Captured>>>,
    pub reply: Vec<u8>,
    pub behaviour: Behaviour,
}

impl ScriptedServer {
    pub fn replying(status: u16, reply: &[u8]) -> Self {
        Self {
            requests: Arc::default(),
            reply: reply.to_vec(),
            behaviour: Behaviour::Reply(status),
        }
    }

    pub fn failing(behaviour: Behaviour) -> Self {
        Self {
            requests: Arc::default(),
            reply: Vec::new(),
            behaviour,
        }
    }
}

struct ScriptedConnection {
    requests: Arc<Mutex<Vec<Captured>>>,
    index: usize,
    status: u16,
    reply: Vec<u8>,
    pos: usize,
    time_out: bool,
}

impl HttpTransport for ScriptedServer {
    fn open(&self, request: &PostRequest<'_>) -> Result<Box<dyn HttpConnection>, UploadError> {
        if self.behaviour == Behaviour::RefuseConnect {
            return Err(UploadError::ConnectFailed(format!("{}: connection refused", request.url)));
        }
        let mut requests = self.requests.lock();
        requests.push(Captured {
            url: request.url.to_string(),
            content_type: request.content_type.to_string(),
            content_length: request.content_length,
            body: Vec::new(),
        });
        let status = match self.behaviour {
            Behaviour::Reply(status) => status,
            _ => 0,
        };
        Ok(Box::new(ScriptedConnection {
            requests: Arc::clone(&self.requests),
            index: requests.len() - 1,
            status,
            reply: self.reply.clone(),
            pos: 0,
            time_out: self.behaviour == Behaviour::TimeOut,
        }))
    }
}

impl HttpConnection for ScriptedConnection {
    fn write_all(&mut self, data: &[u8]) -> Result<(), UploadError> {
        self.requests.lock()[self.index].body.extend_from_slice(data);
        Ok(())
    }

    fn fetch_headers(&mut self) -> Result<ResponseHead, UploadError> {
        if self.time_out {
            return Err(UploadError::Timeout);
        }
        Ok(ResponseHead {
            status: self.status,
            content_length: Some(self.reply.len() as u64),
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UploadError> {
        let n = (self.reply.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.reply[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
