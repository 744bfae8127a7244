//! Camera stand-in that serves JPEG files from a directory in turn.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use assist_core::models::error::CaptureError;
use assist_core::traits::camera::{CameraDriver, CameraFrame};

/// Cycles through the `.jpg`/`.jpeg` files of a directory, sorted by name.
///
/// Has a single frame buffer like the board's camera: while a frame is out,
/// `acquire_frame` returns `None`.
pub struct DirectoryCamera {
    images: Vec<PathBuf>,
    next: usize,
    sequence: u64,
    frame_out: bool,
    spare: Option<Vec<u8>>,
}

impl DirectoryCamera {
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        let entries = fs::read_dir(dir)
            .map_err(|e| CaptureError::DeviceInit(format!("{}: {}", dir.display(), e)))?;
        let mut images: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_jpeg(path))
            .collect();
        images.sort();

        if images.is_empty() {
            return Err(CaptureError::DeviceInit(format!(
                "no JPEG images in {}",
                dir.display()
            )));
        }
        log::info!("Camera fixture: {} images from {}", images.len(), dir.display());

        Ok(Self {
            images,
            next: 0,
            sequence: 0,
            frame_out: false,
            spare: None,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl CameraDriver for DirectoryCamera {
    fn acquire_frame(&mut self) -> Option<CameraFrame> {
        if self.frame_out {
            log::warn!("Camera frame buffer still held");
            return None;
        }
        let path = &self.images[self.next];
        self.next = (self.next + 1) % self.images.len();

        let mut buf = self.spare.take().unwrap_or_default();
        buf.clear();
        match fs::File::open(path).and_then(|mut file| file.read_to_end(&mut buf)) {
            Ok(_) => {
                self.sequence += 1;
                self.frame_out = true;
                Some(CameraFrame::new(buf, self.sequence))
            }
            Err(e) => {
                log::warn!("Camera capture failed reading {}: {}", path.display(), e);
                self.spare = Some(buf);
                None
            }
        }
    }

    fn release_frame(&mut self, frame: CameraFrame) {
        self.frame_out = false;
        self.spare = Some(frame.into_buffer());
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}
