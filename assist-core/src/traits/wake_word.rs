/// Opaque wake-phrase detector.
///
/// Each call listens for one detection window on the microphone and blocks for
/// its duration.
pub trait WakeWordDetector: Send {
    fn detect(&mut self) -> bool;
}

/// User feedback output, e.g. the on-board LED.
pub trait Indicator: Send {
    fn set(&mut self, on: bool);
}
