use thiserror::Error;

/// Errors raised while capturing audio or camera stills.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device init failed: {0}")]
    DeviceInit(String),

    #[error("device busy: {0}")]
    DeviceBusy(String),

    #[error("device read failed: {0}")]
    DeviceRead(String),

    #[error("failed to open {path}: {reason}")]
    FileOpen { path: String, reason: String },

    #[error("file write failed: {0}")]
    FileWrite(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Errors raised while playing a recording back through the speaker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("device init failed: {0}")]
    DeviceInit(String),

    #[error("device write failed: {0}")]
    DeviceWrite(String),

    #[error("failed to open {path}: {reason}")]
    FileMissing { path: String, reason: String },

    #[error("file read failed: {0}")]
    FileRead(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Errors raised by the multipart uploader and the HTTP transport beneath it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("network link is down")]
    LinkDown,

    #[error("invalid multipart form: {0}")]
    InvalidForm(String),

    #[error("failed to open {path}: {reason}")]
    FileMissing { path: String, reason: String },

    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("request timed out")]
    Timeout,

    /// The body would not match the declared `Content-Length`.
    #[error("declared {declared} bytes but body has {actual}")]
    ProtocolMismatch { declared: u64, actual: u64 },

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("response read failed: {0}")]
    ResponseRead(String),

    #[error("response write failed: {0}")]
    ResponseWrite(String),
}

/// Failure of one loop iteration, tagged by the stage that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("capture: {0}")]
    Capture(#[from] CaptureError),

    #[error("upload: {0}")]
    Upload(#[from] UploadError),

    #[error("playback: {0}")]
    Playback(#[from] PlaybackError),
}
