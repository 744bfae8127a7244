/// One encoded image owned by the camera driver.
///
/// Move-only: the only way to get rid of a frame is to hand it back through
/// [`CameraDriver::release_frame`], so a driver can recycle its buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct CameraFrame {
    buf: Vec<u8>,
    sequence: u64,
}

impl CameraFrame {
    pub fn new(buf: Vec<u8>, sequence: u64) -> Self {
        Self { buf, sequence }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Give the backing buffer back to the driver for reuse.
    pub fn into_buffer(self) -> Vec<u8> {
        self.buf
    }
}

/// Imaging peripheral.
///
/// Never called directly by the tasks: the driver lives inside the
/// `CameraArbiter` and is only reachable through a `CameraLease`.
pub trait CameraDriver: Send {
    /// Grab the next frame, or `None` when no frame buffer is available.
    fn acquire_frame(&mut self) -> Option<CameraFrame>;

    fn release_frame(&mut self, frame: CameraFrame);
}
