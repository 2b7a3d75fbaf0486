//! Bounded pool of reusable frame buffers.
//!
//! At most `max_buffers` buffers are leased at once; `acquire` blocks the
//! calling thread until one is returned. Buffers go back to the pool when
//! the [`BufferItem`] is dropped, so every exit path releases its lease.
//! Free buffers idle for longer than `idle_timeout` are discarded the next
//! time any buffer is released.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Capacity of each buffer in bytes.
    pub buffer_size: usize,
    /// Maximum number of concurrently leased buffers.
    pub max_buffers: usize,
    /// Free buffers unused for longer than this are dropped.
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            max_buffers: 32,
            idle_timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// Shared pool of reusable byte buffers.
#[derive(Clone, Debug)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    state: Mutex<PoolState>,
    released: Condvar,
    config: PoolConfig,
}

#[derive(Debug, Default)]
struct PoolState {
    free: VecDeque<IdleBuffer>,
    leased: usize,
}

#[derive(Debug)]
struct IdleBuffer {
    data: Vec<u8>,
    since: Instant,
}

impl BufferPool {
    /// Create a new buffer pool.
    #[must_use]
    pub fn new(buffer_size: usize, max_buffers: usize) -> Self {
        Self::with_config(PoolConfig {
            buffer_size,
            max_buffers,
            ..PoolConfig::default()
        })
    }

    /// Create a pool from a full configuration.
    #[must_use]
    pub fn with_config(config: PoolConfig) -> Self {
        assert!(config.buffer_size > 0, "buffer_size must be positive");
        assert!(config.max_buffers > 0, "max_buffers must be positive");

        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState::default()),
                released: Condvar::new(),
                config,
            }),
        }
    }

    /// Lease a cleared buffer, blocking while `max_buffers` are out.
    ///
    /// There is no timeout or cancellation; callers that need bounded
    /// latency must impose it themselves.
    pub fn acquire(&self) -> BufferItem {
        let mut state = self.inner.lock();
        while state.leased >= self.inner.config.max_buffers {
            trace!(leased = state.leased, "pool exhausted, waiting");
            state = self
                .inner
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.lease(state)
    }

    /// Lease a buffer if one is available without blocking.
    pub fn try_acquire(&self) -> Option<BufferItem> {
        let state = self.inner.lock();
        if state.leased >= self.inner.config.max_buffers {
            return None;
        }
        Some(self.lease(state))
    }

    fn lease(&self, mut state: MutexGuard<'_, PoolState>) -> BufferItem {
        state.leased += 1;
        let data = state
            .free
            .pop_back()
            .map_or_else(|| vec![0u8; self.inner.config.buffer_size], |idle| idle.data);
        drop(state);

        BufferItem {
            data,
            len: 0,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Buffer capacity in bytes.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.inner.config.buffer_size
    }

    /// Maximum number of concurrently leased buffers.
    #[must_use]
    pub fn max_buffers(&self) -> usize {
        self.inner.config.max_buffers
    }

    /// Buffers currently leased.
    #[must_use]
    pub fn leased(&self) -> usize {
        self.inner.lock().leased
    }

    /// Free buffers held for reuse.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.inner.lock().free.len()
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, mut data: Vec<u8>) {
        data.fill(0);
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;

        let mut state = self.lock();
        state.leased -= 1;
        let before = state.free.len();
        state
            .free
            .retain(|idle| now.duration_since(idle.since) <= idle_timeout);
        let evicted = before - state.free.len();
        if evicted > 0 {
            trace!(evicted, "dropped idle buffers");
        }
        state.free.push_back(IdleBuffer { data, since: now });
        drop(state);

        self.released.notify_one();
    }
}

/// Buffer leased from the pool, returned on drop.
#[derive(Debug)]
pub struct BufferItem {
    data: Vec<u8>,
    len: usize,
    pool: Arc<PoolInner>,
}

impl BufferItem {
    /// Reset the logical length of the buffer.
    pub fn reset(&mut self) {
        self.len = 0;
        self.data.fill(0);
    }

    /// Expose the whole buffer as a mutable slice for writes.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Expose the filled portion of the buffer as an immutable slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Current logical length of the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check whether the buffer contains no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Set the length of meaningful data within the buffer.
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.capacity(), "buffer length exceeds capacity");
        self.len = len;
    }

    /// Return the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes still writable after the logical length.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len
    }

    /// Return the buffer to its pool.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for BufferItem {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_acquire_returns_cleared_buffer() {
        let pool = BufferPool::new(16, 2);
        let mut buffer = pool.acquire();
        buffer.as_mut_slice()[..3].copy_from_slice(&[1, 2, 3]);
        buffer.set_len(3);
        assert_eq!(buffer.as_slice(), &[1, 2, 3]);
        buffer.release();

        let buffer = pool.acquire();
        assert!(buffer.is_empty());
        assert_eq!(buffer.remaining(), 16);
        assert!(buffer.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_released_buffer_is_reused() {
        let pool = BufferPool::new(16, 2);
        let first = pool.acquire();
        let ptr = first.data.as_ptr();
        drop(first);
        assert_eq!(pool.pooled(), 1);

        let second = pool.acquire();
        assert_eq!(second.data.as_ptr(), ptr);
        assert_eq!(pool.pooled(), 0);
    }

    #[test]
    fn test_live_leases_are_distinct() {
        let pool = BufferPool::new(8, 4);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_ne!(a.data.as_ptr(), b.data.as_ptr());
        assert_eq!(pool.leased(), 2);
    }

    #[test]
    fn test_try_acquire_when_exhausted() {
        let pool = BufferPool::new(8, 1);
        let held = pool.acquire();
        assert!(pool.try_acquire().is_none());
        drop(held);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let pool = BufferPool::new(8, 1);
        let held = pool.acquire();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || {
                let buffer = pool.acquire();
                tx.send(()).unwrap();
                drop(buffer);
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
        assert_eq!(pool.leased(), 0);
    }

    #[test]
    fn test_idle_buffers_evicted_on_release() {
        let pool = BufferPool::with_config(PoolConfig {
            buffer_size: 8,
            max_buffers: 4,
            idle_timeout: Duration::from_millis(20),
        });
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        assert_eq!(pool.pooled(), 1);

        thread::sleep(Duration::from_millis(50));
        drop(b);
        // the stale buffer is gone, only the one just released remains
        assert_eq!(pool.pooled(), 1);
    }

    #[test]
    fn test_concurrent_leases_never_exceed_limit() {
        let pool = BufferPool::new(8, 3);
        let peak = Arc::new(Mutex::new(0usize));
        thread::scope(|scope| {
            for _ in 0..8 {
                let pool = pool.clone();
                let peak = Arc::clone(&peak);
                scope.spawn(move || {
                    for _ in 0..50 {
                        let buffer = pool.acquire();
                        let leased = pool.leased();
                        let mut peak = peak.lock().unwrap();
                        *peak = (*peak).max(leased);
                        drop(peak);
                        drop(buffer);
                    }
                });
            }
        });
        assert!(*peak.lock().unwrap() <= 3);
        assert_eq!(pool.leased(), 0);
    }
}
