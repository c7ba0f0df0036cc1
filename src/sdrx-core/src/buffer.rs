// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample buffers and the pool they are recycled through.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use num_complex::Complex;

/// Fixed-capacity sample storage with a movable length.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuf<T> {
    data: Vec<T>,
    len: usize,
}

impl<T: Copy + Default> SampleBuf<T> {
    /// A zeroed buffer whose length starts at its capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity],
            len: capacity,
        }
    }

    pub fn from_slice(samples: &[T]) -> Self {
        Self {
            data: samples.to_vec(),
            len: samples.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Change the visible length. Returns false, leaving the buffer
    /// untouched, if `len` exceeds the capacity.
    pub fn set_len(&mut self, len: usize) -> bool {
        if len > self.data.len() {
            return false;
        }
        self.len = len;
        true
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data[..self.len]
    }

    /// Copy `samples` in and set the length to match, truncating to the
    /// capacity. Returns the number of samples taken.
    pub fn fill_from(&mut self, samples: &[T]) -> usize {
        let n = samples.len().min(self.data.len());
        self.data[..n].copy_from_slice(&samples[..n]);
        self.len = n;
        n
    }

    pub fn clear(&mut self) {
        self.data.fill(T::default());
    }
}

pub type ComplexBuf = SampleBuf<Complex<f32>>;
pub type RealBuf = SampleBuf<f32>;

struct PoolInner<T> {
    capacity: usize,
    free: Mutex<Vec<SampleBuf<T>>>,
    allocated: AtomicUsize,
}

impl<T> PoolInner<T> {
    fn free(&self) -> MutexGuard<'_, Vec<SampleBuf<T>>> {
        self.free.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Hands out buffers of one capacity and takes them back when their
/// [`PooledBuf`] handle is dropped. Grows on demand.
pub struct BufferPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for BufferPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy + Default> BufferPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity,
                free: Mutex::new(Vec::new()),
                allocated: AtomicUsize::new(0),
            }),
        }
    }

    /// Pool pre-filled with `count` buffers.
    pub fn with_buffers(capacity: usize, count: usize) -> Self {
        let pool = Self::new(capacity);
        {
            let mut free = pool.inner.free();
            free.extend((0..count).map(|_| SampleBuf::new(capacity)));
        }
        pool.inner.allocated.store(count, Ordering::Relaxed);
        pool
    }

    pub fn buffer_capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Take a buffer. Its length is reset to the full capacity; contents
    /// are whatever the previous holder left.
    pub fn get(&self) -> PooledBuf<T> {
        let recycled = self.inner.free().pop();
        let mut buf = match recycled {
            Some(buf) => buf,
            None => {
                self.inner.allocated.fetch_add(1, Ordering::Relaxed);
                SampleBuf::new(self.inner.capacity)
            }
        };
        buf.len = buf.data.len();
        PooledBuf {
            buf,
            pool: Arc::clone(&self.inner),
        }
    }

    /// A buffer holding a copy of `samples` (truncated to the capacity).
    pub fn get_filled(&self, samples: &[T]) -> PooledBuf<T> {
        let mut buf = self.get();
        buf.fill_from(samples);
        buf
    }

    pub fn free_count(&self) -> usize {
        self.inner.free().len()
    }

    /// Buffers created over the pool's lifetime.
    pub fn allocated(&self) -> usize {
        self.inner.allocated.load(Ordering::Relaxed)
    }
}

/// Exclusive handle on a pooled buffer.
pub struct PooledBuf<T> {
    buf: SampleBuf<T>,
    pool: Arc<PoolInner<T>>,
}

impl<T> Deref for PooledBuf<T> {
    type Target = SampleBuf<T>;

    fn deref(&self) -> &SampleBuf<T> {
        &self.buf
    }
}

impl<T> DerefMut for PooledBuf<T> {
    fn deref_mut(&mut self) -> &mut SampleBuf<T> {
        &mut self.buf
    }
}

impl<T> Drop for PooledBuf<T> {
    fn drop(&mut self) {
        let buf = std::mem::replace(
            &mut self.buf,
            SampleBuf {
                data: Vec::new(),
                len: 0,
            },
        );
        if buf.data.len() == self.pool.capacity {
            self.pool.free().push(buf);
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PooledBuf<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf").field("buf", &self.buf).finish()
    }
}

pub type ComplexPooledBuf = PooledBuf<Complex<f32>>;
pub type RealPooledBuf = PooledBuf<f32>;
