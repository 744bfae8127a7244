use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::still_capture::capture_still;
use crate::engine::uploader::{MultipartUploader, ResponseSink};
use crate::models::config::AssistConfig;
use crate::models::error::{PipelineError, UploadError};
use crate::models::state::StreamerState;
use crate::processing::buffer_pool::BufferPool;
use crate::processing::multipart::{Boundary, MultipartForm};
use crate::session::arbiter::CameraArbiter;
use crate::session::shutdown::ShutdownSignal;
use crate::traits::camera::CameraDriver;
use crate::traits::delegate::StreamerDelegate;
use crate::traits::transport::HttpTransport;

/// One successful capture and upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamReport {
    pub image_bytes: u64,
    pub uploaded_bytes: u64,
    pub status: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamerStats {
    pub iterations: u64,
    pub failures: u64,
    /// Reset by every success.
    pub consecutive_failures: u64,
}

/// Periodic image uploader running beside the assistant.
///
/// ```text
/// lease → capture → release → upload → sleep(interval) → ...
/// ```
/// Every failure is logged and the loop sleeps the same fixed interval before
/// trying again. The camera lease is never held across the upload.
pub struct ImageStreamer<C: CameraDriver> {
    config: Arc<AssistConfig>,
    camera: Arc<CameraArbiter<C>>,
    uploader: MultipartUploader,
    delegate: Option<Arc<dyn StreamerDelegate>>,
    state: StreamerState,
    stats: StreamerStats,
    buffers: BufferPool,
}

impl<C: CameraDriver> ImageStreamer<C> {
    pub fn new(
        config: Arc<AssistConfig>,
        camera: Arc<CameraArbiter<C>>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let uploader = MultipartUploader::new(transport, config.server.request_timeout);
        let buffers = BufferPool::new(config.chunk_size, 1);
        Self {
            config,
            camera,
            uploader,
            delegate: None,
            state: StreamerState::Sleeping,
            stats: StreamerStats::default(),
            buffers,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn StreamerDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> StreamerState {
        self.state
    }

    pub fn stats(&self) -> StreamerStats {
        self.stats
    }

    /// One capture and upload, ending in `Sleeping` whatever happened.
    pub fn run_iteration(&mut self) -> Result<StreamReport, PipelineError> {
        let outcome = self.stream_once();

        self.stats.iterations += 1;
        match &outcome {
            Ok(report) => {
                self.stats.consecutive_failures = 0;
                log::debug!(
                    "Streamed {} byte image (HTTP {})",
                    report.image_bytes,
                    report.status
                );
            }
            Err(e) => {
                self.stats.failures += 1;
                self.stats.consecutive_failures += 1;
                log::error!(
                    "Image stream iteration failed ({} in a row): {}",
                    self.stats.consecutive_failures,
                    e
                );
            }
        }

        self.set_state(StreamerState::Sleeping);
        if let Some(ref delegate) = self.delegate {
            delegate.on_iteration_finished(&outcome);
        }
        outcome
    }

    /// Iterate until `shutdown` is triggered, sleeping the fixed interval between
    /// iterations.
    pub fn run(&mut self, shutdown: &ShutdownSignal) {
        log::info!(
            "Image streamer started ({:?} interval)",
            self.config.streamer.interval
        );
        while !shutdown.is_triggered() {
            let _ = self.run_iteration();
            if shutdown.wait_timeout(self.config.streamer.interval) {
                break;
            }
        }
        log::info!("Image streamer stopped after {} iterations", self.stats.iterations);
    }

    /// Run on a dedicated thread; the handle yields the final stats.
    pub fn spawn(mut self, shutdown: ShutdownSignal) -> io::Result<JoinHandle<StreamerStats>>
    where
        C: 'static,
    {
        thread::Builder::new()
            .name("image-streamer".into())
            .spawn(move || {
                self.run(&shutdown);
                self.stats
            })
    }

    fn stream_once(&mut self) -> Result<StreamReport, PipelineError> {
        let config = Arc::clone(&self.config);

        self.set_state(StreamerState::Capturing);
        let captured = {
            let mut lease = self.camera.acquire_camera();
            capture_still(&mut lease, &config.paths.stream_image)
        };
        let image_bytes = match captured {
            Ok(len) => len,
            Err(e) => {
                self.set_state(StreamerState::CaptureFailed);
                return Err(e.into());
            }
        };

        self.set_state(StreamerState::Uploading);
        let form = stream_form(&config)?;
        let mut buf = self.buffers.acquire();
        let sent = self.uploader.upload(
            &config.server.image_stream_url,
            &form,
            ResponseSink::Discard,
            &mut buf,
        )?;

        Ok(StreamReport {
            image_bytes,
            uploaded_bytes: sent.bytes_sent,
            status: sent.status,
        })
    }

    fn set_state(&mut self, next: StreamerState) {
        self.state = next;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(next);
        }
    }
}

fn stream_form(config: &AssistConfig) -> Result<MultipartForm, UploadError> {
    let mut form = MultipartForm::new(Boundary::new(&config.server.boundary)?);
    if let Some(ref id) = config.server.device_id {
        form = form.text("device_id", id)?;
    }
    form.file("image", "img_stream.jpg", "image/jpeg", &config.paths.stream_image)
}
