//! `reqwest` blocking transport for the multipart uploader.
//!
//! The uploader pushes body bytes in chunks, while `reqwest` pulls the body from a
//! `Read`. Each connection bridges the two with a bounded channel: the request
//! runs on a worker thread reading from the channel, and `write_all` feeds it.
//! The body is declared with `Body::sized`, so the request goes out with a fixed
//! `Content-Length` and never uses chunked encoding. Drained chunk buffers flow
//! back to the writer on a second channel, so steady-state streaming reuses the
//! same few `Vec`s instead of allocating one per chunk.

use std::io::{self, Read};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use reqwest::blocking::{Body, Client, Response};
use reqwest::header::CONTENT_TYPE;

use assist_core::models::error::UploadError;
use assist_core::traits::transport::{HttpConnection, HttpTransport, PostRequest, ResponseHead};

/// Chunks buffered between the uploader and the request thread.
const BODY_QUEUE_DEPTH: usize = 4;

/// One shared client for both tasks; each request gets its own connection.
pub struct ReqwestTransport {
    client: Client,
    link_up: AtomicBool,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, UploadError> {
        let client = Client::builder()
            .build()
            .map_err(|e| UploadError::ConnectFailed(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            link_up: AtomicBool::new(true),
        })
    }

    /// Simulate the network link dropping or coming back.
    pub fn set_link_up(&self, up: bool) {
        self.link_up.store(up, Ordering::SeqCst);
    }
}

impl HttpTransport for ReqwestTransport {
    fn is_link_up(&self) -> bool {
        self.link_up.load(Ordering::SeqCst)
    }

    fn open(&self, request: &PostRequest<'_>) -> Result<Box<dyn HttpConnection>, UploadError> {
        let (tx, rx) = mpsc::sync_channel(BODY_QUEUE_DEPTH);
        let (recycle, spent) = mpsc::channel();
        let body = Body::sized(ChannelReader::new(rx, recycle), request.content_length);
        let pending = self
            .client
            .post(request.url)
            .header(CONTENT_TYPE, request.content_type)
            .timeout(request.timeout)
            .body(body);

        let url = request.url.to_string();
        let worker = thread::Builder::new()
            .name("http-request".into())
            .spawn(move || {
                let result = pending.send();
                if let Err(ref e) = result {
                    log::debug!("POST {} failed: {}", url, e);
                }
                result
            })
            .map_err(|e| UploadError::ConnectFailed(format!("failed to spawn request thread: {}", e)))?;

        Ok(Box::new(ReqwestConnection {
            body: Some(tx),
            spent,
            worker: Some(worker),
            response: None,
        }))
    }
}

struct ReqwestConnection {
    body: Option<SyncSender<Vec<u8>>>,
    /// Buffers the request thread has finished with.
    spent: Receiver<Vec<u8>>,
    worker: Option<JoinHandle<reqwest::Result<Response>>>,
    response: Option<Response>,
}

impl ReqwestConnection {
    /// Wait for the request thread and collect its response.
    fn join_worker(&mut self) -> Result<Response, UploadError> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| UploadError::ResponseRead("request already finished".into()))?;
        match worker.join() {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(map_send_error(&e)),
            Err(_) => Err(UploadError::WriteFailed("request thread panicked".into())),
        }
    }
}

impl HttpConnection for ReqwestConnection {
    fn write_all(&mut self, data: &[u8]) -> Result<(), UploadError> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| UploadError::WriteFailed("request body already closed".into()))?;
        let mut chunk = self.spent.try_recv().unwrap_or_default();
        chunk.clear();
        chunk.extend_from_slice(data);
        if body.send(chunk).is_ok() {
            return Ok(());
        }

        // The request thread stopped reading; find out why.
        self.body = None;
        match self.join_worker() {
            Ok(response) => Err(UploadError::WriteFailed(format!(
                "server answered {} before the body was sent",
                response.status()
            ))),
            Err(e) => Err(e),
        }
    }

    fn fetch_headers(&mut self) -> Result<ResponseHead, UploadError> {
        // Closing the channel ends the body stream.
        self.body = None;
        let response = self.join_worker()?;
        let head = ResponseHead {
            status: response.status().as_u16(),
            content_length: response.content_length(),
        };
        self.response = Some(response);
        Ok(head)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UploadError> {
        let response = self
            .response
            .as_mut()
            .ok_or_else(|| UploadError::ResponseRead("response headers not fetched".into()))?;
        loop {
            match response.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(UploadError::Timeout),
                Err(e) => return Err(UploadError::ResponseRead(e.to_string())),
            }
        }
    }
}

fn map_send_error(e: &reqwest::Error) -> UploadError {
    if e.is_timeout() {
        UploadError::Timeout
    } else if e.is_connect() {
        UploadError::ConnectFailed(e.to_string())
    } else {
        UploadError::WriteFailed(e.to_string())
    }
}

/// `Read` over the chunks sent by `write_all`. End of stream when the sender drops.
///
/// Each drained chunk is handed back on `recycle`.
struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    recycle: Sender<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    fn new(rx: Receiver<Vec<u8>>, recycle: Sender<Vec<u8>>) -> Self {
        Self {
            rx,
            recycle,
            chunk: Vec::new(),
            pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    let spent = mem::replace(&mut self.chunk, chunk);
                    if spent.capacity() > 0 {
                        // The writer may already be gone.
                        let _ = self.recycle.send(spent);
                    }
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
