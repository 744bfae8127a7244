use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::models::error::CaptureError;
use crate::session::arbiter::CameraLease;
use crate::traits::camera::{CameraDriver, CameraFrame};

/// Capture one frame and write its encoded bytes verbatim to `path`.
///
/// Takes the camera through a lease, so it cannot run while the other task holds
/// the camera. The frame goes back to the driver exactly once, whether the file
/// write succeeds or not. If no frame is available the filesystem is not touched.
pub fn capture_still<C: CameraDriver>(
    lease: &mut CameraLease<'_, C>,
    path: &Path,
) -> Result<u64, CaptureError> {
    let driver: &mut C = lease;
    let frame = driver
        .acquire_frame()
        .ok_or_else(|| CaptureError::DeviceBusy("camera capture failed".into()))?;
    let held = HeldFrame {
        driver,
        frame: Some(frame),
    };

    let bytes = held.bytes();
    let mut file = File::create(path).map_err(|e| CaptureError::FileOpen {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| CaptureError::FileWrite(format!("{}: {}", path.display(), e)))?;

    let len = bytes.len() as u64;
    drop(held);
    log::info!("Image captured to {} ({} bytes)", path.display(), len);
    Ok(len)
}

/// RAII guard returning the frame to its driver when dropped.
struct HeldFrame<'a, C: CameraDriver> {
    driver: &'a mut C,
    frame: Option<CameraFrame>,
}

impl<C: CameraDriver> HeldFrame<'_, C> {
    fn bytes(&self) -> &[u8] {
        self.frame.as_ref().map(CameraFrame::bytes).unwrap_or(&[])
    }
}

impl<C: CameraDriver> Drop for HeldFrame<'_, C> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.driver.release_frame(frame);
        }
    }
}
