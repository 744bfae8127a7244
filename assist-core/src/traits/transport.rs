use std::time::Duration;

use crate::models::error::UploadError;

/// Everything the transport needs to open a fixed-length POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest<'a> {
    pub url: &'a str,
    pub content_type: &'a str,
    /// Sent as `Content-Length`; the body will be exactly this long.
    pub content_length: u64,
    pub timeout: Duration,
}

/// Status line and length announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub content_length: Option<u64>,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client factory.
///
/// Reentrant: each task opens and tears down its own connection per request, so
/// implementations must be safe to call from both tasks at once.
pub trait HttpTransport: Send + Sync {
    /// Network-link state; uploads are refused while the link is down.
    fn is_link_up(&self) -> bool {
        true
    }

    /// Open a connection and send the request head. No chunked encoding.
    fn open(&self, request: &PostRequest<'_>) -> Result<Box<dyn HttpConnection>, UploadError>;
}

/// One open request. Dropping it closes the connection.
pub trait HttpConnection {
    /// Write all of `data` as body bytes.
    fn write_all(&mut self, data: &[u8]) -> Result<(), UploadError>;

    /// Finish the request and wait for the response head.
    fn fetch_headers(&mut self) -> Result<ResponseHead, UploadError>;

    /// Read response body bytes; `Ok(0)` marks the end of the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UploadError>;
}
