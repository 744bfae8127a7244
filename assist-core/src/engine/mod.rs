//! The four blocking engines the task loops are built from.

pub mod player;
pub mod recorder;
pub mod still_capture;
pub mod uploader;
