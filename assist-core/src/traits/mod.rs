pub mod audio_io;
pub mod camera;
pub mod delegate;
pub mod transport;
pub mod wake_word;
