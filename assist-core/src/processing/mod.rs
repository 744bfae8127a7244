pub mod buffer_pool;
pub mod multipart;
pub mod wav_format;
