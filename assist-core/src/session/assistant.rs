use std::sync::Arc;

use crate::engine::player::AudioPlayer;
use crate::engine::recorder::AudioRecorder;
use crate::engine::still_capture::capture_still;
use crate::engine::uploader::{MultipartUploader, ResponseSink};
use crate::models::config::AssistConfig;
use crate::models::error::{PipelineError, UploadError};
use crate::models::recording::RecordingSession;
use crate::models::state::AssistantState;
use crate::processing::buffer_pool::BufferPool;
use crate::processing::multipart::{Boundary, MultipartForm};
use crate::session::arbiter::CameraArbiter;
use crate::session::shutdown::ShutdownSignal;
use crate::traits::audio_io::{AudioInput, AudioOutput};
use crate::traits::camera::CameraDriver;
use crate::traits::delegate::AssistantDelegate;
use crate::traits::transport::HttpTransport;
use crate::traits::wake_word::{Indicator, WakeWordDetector};

/// What one completed workflow moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// PCM payload bytes in the recording.
    pub recorded_bytes: u64,
    /// Size of the still sent as `image0`, if one was attached.
    pub image_bytes: Option<u64>,
    pub uploaded_bytes: u64,
    pub response_bytes: u64,
    pub played_bytes: u64,
}

/// Current state plus everything that has to follow it.
struct StatusLine {
    state: AssistantState,
    indicator: Box<dyn Indicator>,
    delegate: Option<Arc<dyn AssistantDelegate>>,
}

impl StatusLine {
    fn set(&mut self, next: AssistantState) {
        if next == self.state {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        log::debug!("assistant: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.indicator.set(next.is_busy());
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(next);
        }
    }
}

/// Wake-word assistant loop.
///
/// ```text
/// idle → listening ──(detected)──→ triggered → recording → uploading → playing → idle
/// ```
/// Runs on the primary task and is the only user of the microphone and speaker.
/// A failing stage ends the cycle and drops straight back to `Idle`; the next
/// detection is the only retry.
pub struct Assistant<W, I, O, C>
where
    W: WakeWordDetector,
    I: AudioInput,
    O: AudioOutput,
    C: CameraDriver,
{
    config: Arc<AssistConfig>,
    detector: W,
    recorder: AudioRecorder<I>,
    player: AudioPlayer<O>,
    camera: Arc<CameraArbiter<C>>,
    uploader: MultipartUploader,
    status: StatusLine,
    buffers: BufferPool,
}

impl<W, I, O, C> Assistant<W, I, O, C>
where
    W: WakeWordDetector,
    I: AudioInput,
    O: AudioOutput,
    C: CameraDriver,
{
    pub fn new(
        config: Arc<AssistConfig>,
        detector: W,
        input: I,
        output: O,
        camera: Arc<CameraArbiter<C>>,
        transport: Arc<dyn HttpTransport>,
        mut indicator: Box<dyn Indicator>,
    ) -> Self {
        indicator.set(false);
        let uploader = MultipartUploader::new(transport, config.server.request_timeout);
        let buffers = BufferPool::new(config.chunk_size, 1);
        Self {
            config,
            detector,
            recorder: AudioRecorder::new(input),
            player: AudioPlayer::new(output),
            camera,
            uploader,
            status: StatusLine {
                state: AssistantState::Idle,
                indicator,
                delegate: None,
            },
            buffers,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn AssistantDelegate>) {
        self.status.delegate = Some(delegate);
    }

    pub fn state(&self) -> AssistantState {
        self.status.state
    }

    pub fn recorder(&self) -> &AudioRecorder<I> {
        &self.recorder
    }

    pub fn player(&self) -> &AudioPlayer<O> {
        &self.player
    }

    /// Run one detector window, and the full workflow if it fired.
    ///
    /// Returns `None` when nothing was detected. Always leaves the assistant in
    /// `Listening` (no detection) or `Idle` (after a workflow).
    pub fn poll_once(&mut self) -> Option<Result<CycleReport, PipelineError>> {
        self.status.set(AssistantState::Listening);
        if !self.detector.detect() {
            return None;
        }

        log::info!("Wake word detected");
        self.status.set(AssistantState::Triggered);
        let outcome = self.run_workflow();
        match &outcome {
            Ok(report) => log::info!(
                "Assistant cycle complete: sent {} bytes, played {} bytes",
                report.uploaded_bytes,
                report.played_bytes
            ),
            Err(e) => log::error!("Assistant cycle failed: {}", e),
        }
        self.status.set(AssistantState::Idle);

        if let Some(ref delegate) = self.status.delegate {
            delegate.on_cycle_finished(&outcome);
        }
        Some(outcome)
    }

    /// Record, upload, play. Stops at the first failing stage.
    ///
    /// Callers normally go through [`poll_once`](Self::poll_once), which also
    /// handles the state before and after. Leaves the assistant in the state of
    /// the last stage reached.
    pub fn run_workflow(&mut self) -> Result<CycleReport, PipelineError> {
        let config = Arc::clone(&self.config);
        let format = config.pcm_format();
        let mut buf = self.buffers.acquire();

        self.status.set(AssistantState::Recording);
        let session = RecordingSession::new(
            &config.paths.recording,
            format,
            config.audio.record_duration_secs,
        );
        let recording = self.recorder.record(&session, &mut buf)?;

        self.status.set(AssistantState::Uploading);
        let image_bytes = if config.assistant.attach_image {
            capture_query_image(&self.camera, &config)
        } else {
            None
        };
        let form = query_form(&config, image_bytes.is_some())?;
        let sent = self.uploader.upload(
            &config.server.query_url,
            &form,
            ResponseSink::File(&config.paths.response),
            &mut buf,
        )?;

        self.status.set(AssistantState::Playing);
        let played = self.player.play(&config.paths.response, &format, &mut buf)?;

        Ok(CycleReport {
            recorded_bytes: recording.data_size,
            image_bytes,
            uploaded_bytes: sent.bytes_sent,
            response_bytes: sent.response_bytes,
            played_bytes: played,
        })
    }

    /// Poll until `shutdown` is triggered.
    pub fn run(&mut self, shutdown: &ShutdownSignal) {
        log::info!("Assistant started, listening for wake word");
        while !shutdown.is_triggered() {
            if self.poll_once().is_none()
                && shutdown.wait_timeout(self.config.assistant.poll_interval)
            {
                break;
            }
        }
        self.status.set(AssistantState::Idle);
        log::info!("Assistant stopped");
    }
}

/// Take a fresh still for the query. The lease is gone before the upload starts.
fn capture_query_image<C: CameraDriver>(
    camera: &CameraArbiter<C>,
    config: &AssistConfig,
) -> Option<u64> {
    let captured = {
        let mut lease = camera.acquire_camera();
        capture_still(&mut lease, &config.paths.still_image)
    };
    match captured {
        Ok(len) => Some(len),
        Err(e) => {
            log::warn!("Still capture failed, sending audio only: {}", e);
            None
        }
    }
}

fn query_form(config: &AssistConfig, with_image: bool) -> Result<MultipartForm, UploadError> {
    let mut form = MultipartForm::new(Boundary::new(&config.server.boundary)?);
    if let Some(ref id) = config.server.device_id {
        form = form.text("device_id", id)?;
    }
    form = form.file("audio", "voice.wav", "audio/wav", &config.paths.recording)?;
    if with_image {
        form = form.file("image0", "img0.jpg", "image/jpeg", &config.paths.still_image)?;
    }
    Ok(form)
}
