use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::models::error::UploadError;
use crate::processing::multipart::{MultipartForm, PartBody};
use crate::traits::transport::{HttpConnection, HttpTransport, PostRequest};

/// Where the response body goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSink<'a> {
    /// Truncate the file, then write the body into it.
    File(&'a Path),
    /// Read and drop the body.
    Discard,
}

/// Outcome of one completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub status: u16,
    /// Body bytes sent; always equal to the declared `Content-Length`.
    pub bytes_sent: u64,
    pub response_bytes: u64,
}

/// Streams a [`MultipartForm`] with an exact `Content-Length`.
///
/// ```text
/// open files → stat check → open(content_length) → header, file chunks, ... trailer
///            → fetch headers → response chunks → sink
/// ```
/// At most one staging buffer of file or response data is resident at a time.
/// Nothing is retried; the caller's loop is the retry mechanism.
#[derive(Clone)]
pub struct MultipartUploader {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl MultipartUploader {
    pub fn new(transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn upload(
        &self,
        url: &str,
        form: &MultipartForm,
        sink: ResponseSink<'_>,
        buf: &mut [u8],
    ) -> Result<UploadOutcome, UploadError> {
        if buf.is_empty() {
            return Err(UploadError::InvalidForm("empty staging buffer".into()));
        }
        if !self.transport.is_link_up() {
            return Err(UploadError::LinkDown);
        }

        // Open every file before the connection so a missing one never leaves a
        // half-sent request behind.
        let mut files = open_parts(form)?;

        let content_length = form.content_length();
        let content_type = form.content_type();
        let request = PostRequest {
            url,
            content_type: &content_type,
            content_length,
            timeout: self.timeout,
        };
        let mut conn = self.transport.open(&request)?;
        log::debug!("POST {} ({} bytes declared)", url, content_length);

        let mut body = BodyWriter {
            conn: conn.as_mut(),
            declared: content_length,
            sent: 0,
        };
        for (part, file) in form.parts().iter().zip(files.iter_mut()) {
            body.send(&part.header)?;
            match (&part.body, file) {
                (PartBody::Text(value), _) => body.send(value)?,
                (PartBody::File { path, len }, Some(file)) => {
                    body.send_file(file, path, *len, buf)?;
                }
                (PartBody::File { path, .. }, None) => {
                    return Err(UploadError::FileMissing {
                        path: path.display().to_string(),
                        reason: "file was not opened".into(),
                    });
                }
            }
        }
        body.send(&form.trailer())?;
        body.finish()?;
        let bytes_sent = body.sent;

        let head = conn.fetch_headers()?;
        log::debug!(
            "{} answered {} (content-length {:?})",
            url,
            head.status,
            head.content_length
        );

        let response_bytes = match sink {
            ResponseSink::File(path) => {
                // Truncated on every call, even for an error status, so a stale
                // response can never be replayed.
                let mut out = File::create(path).map_err(|e| {
                    UploadError::ResponseWrite(format!("{}: {}", path.display(), e))
                })?;
                let n = relay(conn.as_mut(), Some(&mut out), buf)?;
                out.flush()
                    .map_err(|e| UploadError::ResponseWrite(e.to_string()))?;
                n
            }
            ResponseSink::Discard => relay(conn.as_mut(), None, buf)?,
        };

        if !head.is_success() {
            return Err(UploadError::Status(head.status));
        }

        Ok(UploadOutcome {
            status: head.status,
            bytes_sent,
            response_bytes,
        })
    }
}

/// Open each file part and check it still has the length the form declared.
fn open_parts(form: &MultipartForm) -> Result<Vec<Option<File>>, UploadError> {
    form.parts()
        .iter()
        .map(|part| match &part.body {
            PartBody::Text(_) => Ok(None),
            PartBody::File { path, len } => {
                let missing = |e: std::io::Error| UploadError::FileMissing {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                };
                let file = File::open(path).map_err(missing)?;
                let actual = file.metadata().map_err(missing)?.len();
                if actual != *len {
                    return Err(UploadError::ProtocolMismatch {
                        declared: form.content_length(),
                        actual: form.content_length() - len + actual,
                    });
                }
                Ok(Some(file))
            }
        })
        .collect()
}

/// Tracks body bytes against the declared length.
struct BodyWriter<'a> {
    conn: &'a mut dyn HttpConnection,
    declared: u64,
    sent: u64,
}

impl BodyWriter<'_> {
    fn send(&mut self, data: &[u8]) -> Result<(), UploadError> {
        let after = self.sent + data.len() as u64;
        if after > self.declared {
            return Err(UploadError::ProtocolMismatch {
                declared: self.declared,
                actual: after,
            });
        }
        self.conn.write_all(data)?;
        self.sent = after;
        Ok(())
    }

    /// Stream exactly `len` bytes of `file`, one buffer at a time.
    fn send_file(
        &mut self,
        file: &mut File,
        path: &Path,
        len: u64,
        buf: &mut [u8],
    ) -> Result<(), UploadError> {
        let mut remaining = len;
        while remaining > 0 {
            let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let n = read_retrying(file, &mut buf[..want])
                .map_err(|e| UploadError::WriteFailed(format!("{}: {}", path.display(), e)))?;
            if n == 0 {
                // The file shrank after it was measured.
                return Err(UploadError::ProtocolMismatch {
                    declared: self.declared,
                    actual: self.declared - remaining,
                });
            }
            self.send(&buf[..n])?;
            remaining -= n as u64;
        }

        let mut extra = [0u8; 1];
        if read_retrying(file, &mut extra).unwrap_or(0) > 0 {
            // The file grew after it was measured.
            return Err(UploadError::ProtocolMismatch {
                declared: self.declared,
                actual: self.declared + 1,
            });
        }
        Ok(())
    }

    fn finish(&self) -> Result<(), UploadError> {
        if self.sent != self.declared {
            return Err(UploadError::ProtocolMismatch {
                declared: self.declared,
                actual: self.sent,
            });
        }
        Ok(())
    }
}

/// Copy the response body into `out` until end of stream.
fn relay(
    conn: &mut dyn HttpConnection,
    mut out: Option<&mut File>,
    buf: &mut [u8],
) -> Result<u64, UploadError> {
    let mut total = 0u64;
    loop {
        let n = conn.read(buf)?;
        if n == 0 {
            return Ok(total);
        }
        if let Some(out) = out.as_deref_mut() {
            out.write_all(&buf[..n])
                .map_err(|e| UploadError::ResponseWrite(e.to_string()))?;
        }
        total += n as u64;
    }
}

fn read_retrying(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        match file.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::DEFAULT_BOUNDARY;
    use crate::processing::multipart::Boundary;
    use crate::traits::transport::ResponseHead;
    use parking_lot::Mutex;
    use std::fs;
    use std::path::PathBuf;

    /// What the fake server saw for one request.
    #[derive(Debug, Default, Clone)]
    struct Seen {
        content_length: u64,
        content_type: String,
        body: Vec<u8>,
        largest_write: usize,
    }

    struct FakeServer {
        seen: Arc<Mutex<Vec<Seen>>>,
        status: u16,
        response: Vec<u8>,
        refuse_connect: bool,
        fail_write_after: Option<usize>,
        resize_on_first_write: Option<(PathBuf, u64)>,
        link_up: bool,
    }

    impl FakeServer {
        fn new(status: u16, response: &[u8]) -> Self {
            Self {
                seen: Arc::default(),
                status,
                response: response.to_vec(),
                refuse_connect: false,
                fail_write_after: None,
                resize_on_first_write: None,
                link_up: true,
            }
        }
    }

    struct FakeConnection {
        seen: Arc<Mutex<Vec<Seen>>>,
        index: usize,
        status: u16,
        response: Vec<u8>,
        read_pos: usize,
        fail_write_after: Option<usize>,
        resize_on_first_write: Option<(PathBuf, u64)>,
    }

    impl HttpTransport for FakeServer {
        fn is_link_up(&self) -> bool {
            self.link_up
        }

        fn open(&self, request: &PostRequest<'_>) -> Result<Box<dyn HttpConnection>, UploadError> {
            if self.refuse_connect {
                return Err(UploadError::ConnectFailed("connection refused".into()));
            }
            let mut seen = self.seen.lock();
            seen.push(Seen {
                content_length: request.content_length,
                content_type: request.content_type.to_string(),
                ..Default::default()
            });
            Ok(Box::new(FakeConnection {
                seen: Arc::clone(&self.seen),
                index: seen.len() - 1,
                status: self.status,
                response: self.response.clone(),
                read_pos: 0,
                fail_write_after: self.fail_write_after,
                resize_on_first_write: self.resize_on_first_write.clone(),
            }))
        }
    }

    impl HttpConnection for FakeConnection {
        fn write_all(&mut self, data: &[u8]) -> Result<(), UploadError> {
            if let Some((path, len)) = self.resize_on_first_write.take() {
                fs::OpenOptions::new()
                    .write(true)
                    .open(path)
                    .and_then(|file| file.set_len(len))
                    .unwrap();
            }
            let mut seen = self.seen.lock();
            let entry = &mut seen[self.index];
            if let Some(limit) = self.fail_write_after {
                if entry.body.len() >= limit {
                    return Err(UploadError::WriteFailed("connection reset".into()));
                }
            }
            entry.body.extend_from_slice(data);
            entry.largest_write = entry.largest_write.max(data.len());
            Ok(())
        }

        fn fetch_headers(&mut self) -> Result<ResponseHead, UploadError> {
            Ok(ResponseHead {
                status: self.status,
                content_length: Some(self.response.len() as u64),
            })
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, UploadError> {
            let rest = &self.response[self.read_pos..];
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.read_pos += n;
            Ok(n)
        }
    }

    fn form_with(audio: &Path, image: &Path) -> MultipartForm {
        MultipartForm::new(Boundary::new(DEFAULT_BOUNDARY).unwrap())
            .file("audio", "voice.wav", "audio/wav", audio)
            .unwrap()
            .file("image0", "img0.jpg", "image/jpeg", image)
            .unwrap()
    }

    fn uploader(server: FakeServer) -> (MultipartUploader, Arc<Mutex<Vec<Seen>>>) {
        let seen = Arc::clone(&server.seen);
        (
            MultipartUploader::new(Arc::new(server), Duration::from_secs(30)),
            seen,
        )
    }

    #[test]
    fn body_matches_declared_length_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.wav");
        let image = dir.path().join("img0.jpg");
        let audio_bytes: Vec<u8> = (0..5000u32).map(|i| (i % 200) as u8).collect();
        fs::write(&audio, &audio_bytes).unwrap();
        fs::write(&image, b"\xFF\xD8jpeg\xFF\xD9").unwrap();
        let response = dir.path().join("response.wav");

        let (uploader, seen) = uploader(FakeServer::new(200, b"RIFFresponse"));
        let form = form_with(&audio, &image);
        let mut buf = vec![0u8; 1024];
        let outcome = uploader
            .upload("http://server/query", &form, ResponseSink::File(&response), &mut buf)
            .unwrap();

        let seen = seen.lock()[0].clone();
        assert_eq!(seen.content_length, form.content_length());
        assert_eq!(seen.body.len() as u64, seen.content_length);
        assert_eq!(outcome.bytes_sent, seen.content_length);
        assert!(seen.largest_write <= 1024);
        assert_eq!(seen.content_type, form.content_type());

        let mut expected = form.parts()[0].header.clone();
        expected.extend_from_slice(&audio_bytes);
        expected.extend_from_slice(&form.parts()[1].header);
        expected.extend_from_slice(b"\xFF\xD8jpeg\xFF\xD9");
        expected.extend_from_slice(&form.trailer());
        assert_eq!(seen.body, expected);

        assert_eq!(fs::read(&response).unwrap(), b"RIFFresponse");
        assert_eq!(outcome.response_bytes, 12);
    }

    #[test]
    fn empty_response_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.wav");
        let image = dir.path().join("img0.jpg");
        fs::write(&audio, [0u8; 64]).unwrap();
        fs::write(&image, [1u8; 8]).unwrap();
        let response = dir.path().join("response.wav");
        fs::write(&response, b"stale audio from last cycle").unwrap();

        let (uploader, _) = uploader(FakeServer::new(200, b""));
        let mut buf = vec![0u8; 256];
        let outcome = uploader
            .upload("http://server/query", &form_with(&audio, &image), ResponseSink::File(&response), &mut buf)
            .unwrap();

        assert_eq!(outcome.response_bytes, 0);
        assert_eq!(fs::metadata(&response).unwrap().len(), 0);
    }

    #[test]
    fn missing_file_never_opens_connection() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.wav");
        let image = dir.path().join("img0.jpg");
        fs::write(&audio, [0u8; 64]).unwrap();
        fs::write(&image, [1u8; 8]).unwrap();
        let form = form_with(&audio, &image);
        fs::remove_file(&image).unwrap();

        let (uploader, seen) = uploader(FakeServer::new(200, b""));
        let mut buf = vec![0u8; 256];
        let err = uploader
            .upload("http://server/query", &form, ResponseSink::Discard, &mut buf)
            .unwrap_err();

        assert!(matches!(err, UploadError::FileMissing { .. }));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn resized_file_is_a_protocol_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.wav");
        let image = dir.path().join("img0.jpg");
        fs::write(&audio, [0u8; 64]).unwrap();
        fs::write(&image, [1u8; 8]).unwrap();
        let form = form_with(&audio, &image);
        fs::write(&image, [1u8; 20]).unwrap();

        let (uploader, seen) = uploader(FakeServer::new(200, b""));
        let mut buf = vec![0u8; 256];
        let err = uploader
            .upload("http://server/query", &form, ResponseSink::Discard, &mut buf)
            .unwrap_err();

        assert_eq!(
            err,
            UploadError::ProtocolMismatch {
                declared: form.content_length(),
                actual: form.content_length() + 12,
            }
        );
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn file_shrinking_mid_stream_is_a_protocol_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.wav");
        let image = dir.path().join("img0.jpg");
        fs::write(&audio, vec![0u8; 5000]).unwrap();
        fs::write(&image, [1u8; 8]).unwrap();
        let response = dir.path().join("response.wav");
        fs::write(&response, b"previous answer").unwrap();
        let form = form_with(&audio, &image);

        let mut server = FakeServer::new(200, b"RIFF");
        server.resize_on_first_write = Some((audio.clone(), 10));
        let (uploader, seen) = uploader(server);
        let mut buf = vec![0u8; 1024];
        let err = uploader
            .upload("http://server/query", &form, ResponseSink::File(&response), &mut buf)
            .unwrap_err();

        let declared = form.content_length();
        assert_eq!(
            err,
            UploadError::ProtocolMismatch {
                declared,
                actual: declared - 4990,
            }
        );
        assert!((seen.lock()[0].body.len() as u64) < declared);
        assert_eq!(fs::read(&response).unwrap(), b"previous answer");
    }

    #[test]
    fn file_growing_mid_stream_is_a_protocol_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.wav");
        let image = dir.path().join("img0.jpg");
        fs::write(&audio, vec![0u8; 5000]).unwrap();
        fs::write(&image, [1u8; 8]).unwrap();
        let form = form_with(&audio, &image);

        let mut server = FakeServer::new(200, b"RIFF");
        server.resize_on_first_write = Some((audio.clone(), 6000));
        let (uploader, seen) = uploader(server);
        let mut buf = vec![0u8; 1024];
        let err = uploader
            .upload("http://server/query", &form, ResponseSink::Discard, &mut buf)
            .unwrap_err();

        let declared = form.content_length();
        assert_eq!(
            err,
            UploadError::ProtocolMismatch {
                declared,
                actual: declared + 1,
            }
        );
        assert!(seen.lock()[0].body.len() as u64 <= declared);
    }

    #[test]
    fn connect_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img.jpg");
        fs::write(&image, [1u8; 8]).unwrap();
        let form = MultipartForm::new(Boundary::new(DEFAULT_BOUNDARY).unwrap())
            .file("image", "img_stream.jpg", "image/jpeg", &image)
            .unwrap();

        let mut server = FakeServer::new(200, b"");
        server.refuse_connect = true;
        let (uploader, _) = uploader(server);
        let mut buf = vec![0u8; 256];
        let err = uploader
            .upload("http://server/image_stream", &form, ResponseSink::Discard, &mut buf)
            .unwrap_err();
        assert!(matches!(err, UploadError::ConnectFailed(_)));
    }

    #[test]
    fn mid_stream_write_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.wav");
        let image = dir.path().join("img0.jpg");
        fs::write(&audio, vec![0u8; 10_000]).unwrap();
        fs::write(&image, [1u8; 8]).unwrap();
        let response = dir.path().join("response.wav");
        fs::write(&response, b"old").unwrap();

        let mut server = FakeServer::new(200, b"new");
        server.fail_write_after = Some(2048);
        let (uploader, _) = uploader(server);
        let mut buf = vec![0u8; 1024];
        let err = uploader
            .upload("http://server/query", &form_with(&audio, &image), ResponseSink::File(&response), &mut buf)
            .unwrap_err();

        assert!(matches!(err, UploadError::WriteFailed(_)));
        // Response stage never ran.
        assert_eq!(fs::read(&response).unwrap(), b"old");
    }

    #[test]
    fn error_status_truncates_response_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.wav");
        let image = dir.path().join("img0.jpg");
        fs::write(&audio, [0u8; 64]).unwrap();
        fs::write(&image, [1u8; 8]).unwrap();
        let response = dir.path().join("response.wav");
        fs::write(&response, b"stale").unwrap();

        let (uploader, _) = uploader(FakeServer::new(400, b"No image"));
        let mut buf = vec![0u8; 256];
        let err = uploader
            .upload("http://server/query", &form_with(&audio, &image), ResponseSink::File(&response), &mut buf)
            .unwrap_err();

        assert_eq!(err, UploadError::Status(400));
        assert_ne!(fs::read(&response).unwrap(), b"stale");
    }

    #[test]
    fn link_down_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img.jpg");
        fs::write(&image, [1u8; 8]).unwrap();
        let form = MultipartForm::new(Boundary::new(DEFAULT_BOUNDARY).unwrap())
            .file("image", "img_stream.jpg", "image/jpeg", &image)
            .unwrap();

        let mut server = FakeServer::new(200, b"");
        server.link_up = false;
        let (uploader, seen) = uploader(server);
        let mut buf = vec![0u8; 256];
        let err = uploader
            .upload("http://server/image_stream", &form, ResponseSink::Discard, &mut buf)
            .unwrap_err();
        assert_eq!(err, UploadError::LinkDown);
        assert!(seen.lock().is_empty());
    }
}
