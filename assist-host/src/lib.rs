//! # assist-host
//!
//! Desktop backend for assist-core.
//!
//! Provides:
//! - `ReqwestTransport`: blocking HTTP client with fixed `Content-Length` streaming
//! - `WavFileMicrophone`: microphone fed from a 16-bit WAV fixture
//! - `WavFileSpeaker`: speaker that writes each playback to a WAV file
//! - `DirectoryCamera`: camera serving JPEGs from a directory
//! - `LineWakeWord` / `LogIndicator`: console wake trigger and LED
//! - `config_file`: TOML overlay for `AssistConfig`
//!
//! ## Usage
//! ```ignore
//! use assist_core::{Assistant, CameraArbiter, ShutdownSignal};
//! use assist_host::{DirectoryCamera, ReqwestTransport};
//!
//! let camera = Arc::new(CameraArbiter::new(DirectoryCamera::open(dir)?));
//! let transport = Arc::new(ReqwestTransport::new()?);
//! ```

pub mod config_file;
pub mod console;
pub mod directory_camera;
pub mod fixture_mic;
pub mod http_client;
pub mod wav_speaker;

pub use config_file::{load_config, ConfigFileError};
pub use console::{LineWakeWord, LogIndicator};
pub use directory_camera::DirectoryCamera;
pub use fixture_mic::WavFileMicrophone;
pub use http_client::ReqwestTransport;
pub use wav_speaker::WavFileSpeaker;
