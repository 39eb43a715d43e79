//! Recycling pool for frame pixel buffers.
//!
//! A full-HD BGRA frame is ~8 MB, so the capture thread reuses buffers freed by
//! the callback thread instead of allocating one per frame. Dropping a
//! [`PooledBuffer`] is the single disposal point of a frame's pixels.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Default number of freed buffers kept for reuse.
pub const DEFAULT_MAX_POOLED_BUFFERS: usize = 4;

/// Pool of reusable byte buffers.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_free: usize,
    issued: AtomicU64,
    reused: AtomicU64,
    disposed: AtomicU64,
}

impl BufferPool {
    /// Create a pool keeping at most `max_free` idle buffers.
    pub fn new(max_free: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::with_capacity(max_free)),
            max_free,
            issued: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            disposed: AtomicU64::new(0),
        })
    }

    /// Take a zero-initialised buffer of exactly `len` bytes.
    pub fn take(self: &Arc<Self>, len: usize) -> PooledBuffer {
        let recycled = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let data = match recycled {
            Some(mut data) => {
                self.reused.fetch_add(1, Ordering::SeqCst);
                data.clear();
                data.resize(len, 0);
                data
            }
            None => vec![0; len],
        };
        self.issued.fetch_add(1, Ordering::SeqCst);

        PooledBuffer {
            data,
            pool: Some(Arc::clone(self)),
        }
    }

    fn give_back(&self, data: Vec<u8>) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_free {
            free.push(data);
        }
    }

    /// Buffers handed out so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Buffers served from the free list instead of a fresh allocation.
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::SeqCst)
    }

    /// Buffers returned (disposed) so far.
    pub fn disposed(&self) -> u64 {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Buffers currently owned by someone.
    pub fn outstanding(&self) -> u64 {
        self.issued().saturating_sub(self.disposed())
    }

    /// Idle buffers waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Pixel storage that returns itself to its pool on drop.
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Option<Arc<BufferPool>>,
}

impl PooledBuffer {
    /// Wrap an owned buffer that belongs to no pool.
    pub fn detached(data: Vec<u8>) -> Self {
        Self { data, pool: None }
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.give_back(std::mem::take(&mut self.data));
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.data.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}
