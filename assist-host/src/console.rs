//! Console stand-ins for the wake-word detector and the feedback LED.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use assist_core::session::shutdown::ShutdownSignal;
use assist_core::traits::wake_word::{Indicator, WakeWordDetector};

/// Treats each input line as one utterance of the wake phrase.
///
/// A reader thread forwards lines; `detect` listens for one window. The line
/// `quit` or end of input triggers `shutdown`.
pub struct LineWakeWord {
    lines: Receiver<()>,
    window: Duration,
}

impl LineWakeWord {
    pub fn stdin(window: Duration, shutdown: ShutdownSignal) -> io::Result<Self> {
        Self::spawn(io::BufReader::new(io::stdin()), window, shutdown)
    }

    pub fn spawn<R>(reader: R, window: Duration, shutdown: ShutdownSignal) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("wake-word-input".into())
            .spawn(move || {
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    if line.trim().eq_ignore_ascii_case("quit") {
                        break;
                    }
                    if tx.send(()).is_err() {
                        return;
                    }
                }
                log::info!("Wake-word input closed, shutting down");
                shutdown.trigger();
            })?;
        Ok(Self { lines: rx, window })
    }
}

impl WakeWordDetector for LineWakeWord {
    fn detect(&mut self) -> bool {
        match self.lines.recv_timeout(self.window) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                // Input is gone; behave like a detector that hears nothing.
                thread::sleep(self.window);
                false
            }
        }
    }
}

/// Logs LED changes instead of driving a pin.
#[derive(Debug, Default)]
pub struct LogIndicator {
    lit: bool,
    toggles: u64,
}

impl LogIndicator {
    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn toggles(&self) -> u64 {
        self.toggles
    }
}

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if on == self.lit {
            return;
        }
        self.lit = on;
        self.toggles += 1;
        log::info!("LED {}", if on { "on" } else { "off" });
    }
}
