//! `multipart/form-data` body layout with an exact, precomputed length.
//!
//! The form never holds file contents: file parts keep only a path and the byte
//! length observed when the part was added. The uploader streams the files later
//! and checks every one of them against that length.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::UploadError;

const CRLF: &str = "\r\n";

/// Longest boundary RFC 2046 allows.
const MAX_BOUNDARY_LEN: usize = 70;

/// A validated boundary token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(String);

impl Boundary {
    /// Accepts 1..=70 RFC 2046 `bchars` with no trailing space.
    pub fn new(token: &str) -> Result<Self, UploadError> {
        if token.is_empty() || token.len() > MAX_BOUNDARY_LEN {
            return Err(UploadError::InvalidForm(format!(
                "boundary must be 1..={MAX_BOUNDARY_LEN} characters, got {}",
                token.len()
            )));
        }
        if let Some(bad) = token.chars().find(|c| !is_bchar(*c)) {
            return Err(UploadError::InvalidForm(format!(
                "boundary contains invalid character {bad:?}"
            )));
        }
        if token.ends_with(' ') {
            return Err(UploadError::InvalidForm("boundary ends with a space".into()));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_bchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c)
}

/// Payload of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    /// Small in-memory value (form fields).
    Text(Vec<u8>),
    /// File streamed from disk; `len` is what the declared length was computed from.
    File { path: PathBuf, len: u64 },
}

impl PartBody {
    pub fn len(&self) -> u64 {
        match self {
            Self::Text(bytes) => bytes.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One part: its header span followed by its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub header: Vec<u8>,
    pub body: PartBody,
}

impl Part {
    pub fn len(&self) -> u64 {
        self.header.len() as u64 + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered multipart body description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: Boundary,
    parts: Vec<Part>,
}

impl MultipartForm {
    pub fn new(boundary: Boundary) -> Self {
        Self {
            boundary,
            parts: Vec::new(),
        }
    }

    /// Append an in-memory form field.
    pub fn text(mut self, name: &str, value: &str) -> Result<Self, UploadError> {
        check_token("field name", name)?;
        let disposition = format!("Content-Disposition: form-data; name=\"{name}\"{CRLF}");
        let header = self.part_header(&disposition);
        self.parts.push(Part {
            name: name.to_string(),
            header,
            body: PartBody::Text(value.as_bytes().to_vec()),
        });
        Ok(self)
    }

    /// Append a file part. The file is stat'd now; `FileMissing` if it cannot be.
    pub fn file(
        mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        path: impl AsRef<Path>,
    ) -> Result<Self, UploadError> {
        check_token("field name", name)?;
        check_token("filename", filename)?;
        check_token("content type", content_type)?;

        let path = path.as_ref();
        let len = fs::metadata(path)
            .map_err(|e| UploadError::FileMissing {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .len();

        let disposition = format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"{CRLF}\
             Content-Type: {content_type}{CRLF}"
        );
        let header = self.part_header(&disposition);
        self.parts.push(Part {
            name: name.to_string(),
            header,
            body: PartBody::File {
                path: path.to_path_buf(),
                len,
            },
        });
        Ok(self)
    }

    /// `multipart/form-data; boundary=<token>`
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary.as_str())
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Closing delimiter. It carries the CRLF that ends the last part's body.
    pub fn trailer(&self) -> Vec<u8> {
        let lead = if self.parts.is_empty() { "" } else { CRLF };
        format!("{lead}--{}--{CRLF}", self.boundary.as_str()).into_bytes()
    }

    /// Exact body length: every header and body plus the trailer.
    pub fn content_length(&self) -> u64 {
        self.parts.iter().map(Part::len).sum::<u64>() + self.trailer().len() as u64
    }

    fn part_header(&self, fields: &str) -> Vec<u8> {
        // Every part after the first starts by terminating the previous body.
        let lead = if self.parts.is_empty() { "" } else { CRLF };
        format!("{lead}--{}{CRLF}{fields}{CRLF}", self.boundary.as_str()).into_bytes()
    }
}

fn check_token(what: &str, value: &str) -> Result<(), UploadError> {
    if value.is_empty() || value.contains(['"', '\r', '\n']) {
        return Err(UploadError::InvalidForm(format!("invalid {what}: {value:?}")));
    }
    Ok(())
}
