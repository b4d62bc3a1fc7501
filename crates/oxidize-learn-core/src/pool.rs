use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::dtype::Float;

/// Counters describing how a [`BufferPool`] has been used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Allocations served from a recycled block.
    pub hits: usize,
    /// Allocations that required a fresh block.
    pub misses: usize,
    /// Blocks currently waiting for reuse.
    pub cached: usize,
}

#[derive(Debug, Default)]
struct PoolState<T> {
    free: HashMap<usize, Vec<Vec<T>>>,
    hits: usize,
    misses: usize,
}

/// Recycles fixed-size float buffers between iterations of hot loops.
///
/// Blocks are keyed by their exact length. All access is serialized by a
/// mutex, so a pool can be shared across threads.
#[derive(Debug, Default)]
pub struct BufferPool<T: Float> {
    state: Mutex<PoolState<T>>,
}

impl<T: Float> BufferPool<T> {
    pub fn new() -> Self {
        BufferPool {
            state: Mutex::new(PoolState {
                free: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        // Pool contents stay consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a zeroed buffer of `size` elements, reusing a released block
    /// of the same size when one is available.
    pub fn allocate(&self, size: usize) -> PooledBuffer<'_, T> {
        let recycled = {
            let mut state = self.lock();
            let block = state.free.get_mut(&size).and_then(Vec::pop);
            if block.is_some() {
                state.hits += 1;
            } else {
                state.misses += 1;
            }
            block
        };

        let data = match recycled {
            Some(mut block) => {
                block.iter_mut().for_each(|v| *v = T::ZERO);
                block
            }
            None => {
                trace!(size, "buffer pool miss");
                vec![T::ZERO; size]
            }
        };

        PooledBuffer {
            pool: self,
            data: Some(data),
        }
    }

    /// Hands a block back for reuse under its current length.
    pub fn release(&self, buffer: Vec<T>) {
        if buffer.is_empty() {
            return;
        }
        let mut state = self.lock();
        state.free.entry(buffer.len()).or_default().push(buffer);
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            hits: state.hits,
            misses: state.misses,
            cached: state.free.values().map(Vec::len).sum(),
        }
    }

    /// Drops every cached block.
    pub fn clear(&self) {
        self.lock().free.clear();
    }
}

/// A buffer borrowed from a [`BufferPool`]; returned to it on drop.
pub struct PooledBuffer<'p, T: Float> {
    pool: &'p BufferPool<T>,
    data: Option<Vec<T>>,
}

impl<T: Float> PooledBuffer<'_, T> {
    /// Takes the buffer out of the pool's management.
    pub fn detach(mut self) -> Vec<T> {
        self.data.take().unwrap_or_default()
    }
}

impl<T: Float> Deref for PooledBuffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.data.as_deref().unwrap_or(&[])
    }
}

impl<T: Float> DerefMut for PooledBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<T: Float> Drop for PooledBuffer<'_, T> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.release(data);
        }
    }
}
