use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Staging chunk size for audio, file and HTTP relay loops.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Small pool of fixed-size byte buffers.
///
/// Each task owns its own pool; a checked-out buffer is handed to the streaming
/// loops by `&mut [u8]` and returns to the pool when the guard drops. When the pool
/// is exhausted a fresh buffer is allocated and counted as a miss.
#[derive(Debug)]
pub struct BufferPool {
    chunk_size: usize,
    capacity: usize,
    free: Mutex<Vec<Box<[u8]>>>,
    misses: AtomicU64,
}

impl BufferPool {
    pub fn new(chunk_size: usize, count: usize) -> Self {
        let free = (0..count)
            .map(|_| vec![0u8; chunk_size].into_boxed_slice())
            .collect();
        Self {
            chunk_size,
            capacity: count,
            free: Mutex::new(free),
            misses: AtomicU64::new(0),
        }
    }

    /// Check out one buffer.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = match self.free.lock().pop() {
            Some(buf) => buf,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                log::debug!("buffer pool exhausted, allocating {} bytes", self.chunk_size);
                vec![0u8; self.chunk_size].into_boxed_slice()
            }
        };
        PooledBuffer {
            buf: Some(buf),
            pool: self,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Buffers currently sitting in the pool.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Number of acquisitions that had to allocate.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn give_back(&self, buf: Box<[u8]>) {
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(buf);
        }
    }
}

/// Exclusive borrow of one pool buffer.
pub struct PooledBuffer<'a> {
    buf: Option<Box<[u8]>>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.give_back(buf);
        }
    }
}
