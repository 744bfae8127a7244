pub mod arbiter;
pub mod assistant;
pub mod shutdown;
pub mod streamer;
