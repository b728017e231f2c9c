//! A mapping from size class to a free-list of reusable byte regions.
//!
//! Request builders and inbound-frame handoff are the hot paths this exists
//! for: encoding a `NewOrderSingle` shouldn't allocate if a same-sized
//! buffer already came back from a prior `send`. The pool is the one
//! resource every caller shares (`createOrder`, the dispatcher, the
//! session); everything else is either thread/task-affine or owned
//! exclusively by the trader.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::BytesMut;

/// Rounds a requested capacity up to a size class so a handful of distinct
/// allocation sizes get reused instead of every caller minting its own.
fn size_class(min_capacity: usize) -> usize {
    min_capacity.max(64).next_power_of_two()
}

struct Inner {
    pool: Arc<BufferPool>,
    class: usize,
    data: Mutex<BytesMut>,
    released: AtomicBool,
}

/// A reference-counted contiguous byte range drawn from a [`BufferPool`].
///
/// Acquired by a codec request builder, filled by the calling task, handed
/// to the session on `send`, and released back to the pool exactly once —
/// on success, on a send timeout, or on a transport error. `release` is
/// idempotent: the `released` bit guards against a double-free if both the
/// sender and an error path try to release the same region.
#[derive(Clone)]
pub struct BufferRegion {
    inner: Arc<Inner>,
}

impl BufferRegion {
    /// Runs `f` over the region's mutable buffer. Builders use this to
    /// encode a payload in place; the session uses it to read the bytes
    /// back out before handing them to the transport.
    pub fn with_buf<R>(&self, f: impl FnOnce(&mut BytesMut) -> R) -> R {
        let mut data = self.inner.data.lock().expect("buffer region lock poisoned");
        f(&mut data)
    }

    pub fn capacity_class(&self) -> usize {
        self.inner.class
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Returns the region's storage to its pool's free list. Safe to call
    /// more than once; only the first call does anything.
    pub fn release(&self) {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let taken = std::mem::take(&mut *self.inner.data.lock().expect("buffer region lock poisoned"));
        self.inner.pool.recycle(self.inner.class, taken);
    }
}

/// Hands out and recycles fixed-capacity byte regions, bucketed by size
/// class. Mutable from any thread; all mutation goes through an internal
/// `Mutex` over the free lists.
pub struct BufferPool {
    free_lists: Mutex<HashMap<usize, Vec<BytesMut>>>,
}

impl BufferPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            free_lists: Mutex::new(HashMap::new()),
        })
    }

    /// Returns a region whose capacity is never smaller than `min_capacity`.
    pub fn acquire(self: &Arc<Self>, min_capacity: usize) -> BufferRegion {
        let class = size_class(min_capacity);
        let mut buf = {
            let mut lists = self.free_lists.lock().expect("buffer pool lock poisoned");
            lists
                .entry(class)
                .or_default()
                .pop()
                .unwrap_or_else(|| BytesMut::with_capacity(class))
        };
        buf.clear();
        BufferRegion {
            inner: Arc::new(Inner {
                pool: self.clone(),
                class,
                data: Mutex::new(buf),
                released: AtomicBool::new(false),
            }),
        }
    }

    fn recycle(&self, class: usize, buf: BytesMut) {
        self.free_lists
            .lock()
            .expect("buffer pool lock poisoned")
            .entry(class)
            .or_default()
            .push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_never_returns_smaller_than_requested() {
        let pool = BufferPool::new();
        let region = pool.acquire(100);
        assert!(region.capacity_class() >= 100);
    }

    #[test]
    fn release_is_idempotent() {
        let pool = BufferPool::new();
        let region = pool.acquire(64);
        region.release();
        assert!(region.is_released());
        // Second release must be a no-op, not a panic or a double-free.
        region.release();
        assert!(region.is_released());
    }

    #[test]
    fn recycled_region_is_reused_for_same_size_class() {
        let pool = BufferPool::new();
        let first = pool.acquire(128);
        first.with_buf(|buf| buf.extend_from_slice(&[1, 2, 3]));
        first.release();

        let second = pool.acquire(128);
        // Freshly acquired, even if backed by recycled storage, starts empty.
        second.with_buf(|buf| assert!(buf.is_empty()));
    }
}
