//! # assist-core
//!
//! Platform-agnostic core of a wake-word voice and vision assistant.
//!
//! Provides WAV capture and playback, exact-length multipart streaming, camera
//! arbitration and the two task loops. Peripherals and the HTTP client enter
//! through traits; the `assist-host` crate supplies desktop implementations.
//!
//! ## Architecture
//!
//! ```text
//! assist-core (this crate)
//! ├── traits/       ← AudioInput, AudioOutput, CameraDriver, WakeWordDetector, HttpTransport
//! ├── models/       ← AssistConfig, error enums, AssistantState, PcmFormat
//! ├── processing/   ← WAV header, MultipartForm, BufferPool
//! ├── storage/      ← WavFileWriter
//! ├── engine/       ← AudioRecorder, AudioPlayer, capture_still, MultipartUploader
//! └── session/      ← CameraArbiter, Assistant, ImageStreamer, ShutdownSignal
//! ```

pub mod engine;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use engine::player::AudioPlayer;
pub use engine::recorder::AudioRecorder;
pub use engine::still_capture::capture_still;
pub use engine::uploader::{MultipartUploader, ResponseSink, UploadOutcome};
pub use models::config::AssistConfig;
pub use models::error::{CaptureError, PipelineError, PlaybackError, UploadError};
pub use models::recording::{PcmFormat, RecordingResult, RecordingSession};
pub use models::state::{AssistantState, StreamerState};
pub use processing::buffer_pool::BufferPool;
pub use processing::multipart::{Boundary, MultipartForm};
pub use session::arbiter::{CameraArbiter, CameraLease};
pub use session::assistant::{Assistant, CycleReport};
pub use session::shutdown::ShutdownSignal;
pub use session::streamer::{ImageStreamer, StreamReport, StreamerStats};
pub use storage::wav_writer::WavFileWriter;
pub use traits::audio_io::{AudioInput, AudioOutput};
pub use traits::camera::{CameraDriver, CameraFrame};
pub use traits::delegate::{AssistantDelegate, StreamerDelegate};
pub use traits::transport::{HttpConnection, HttpTransport, PostRequest, ResponseHead};
pub use traits::wake_word::{Indicator, WakeWordDetector};
