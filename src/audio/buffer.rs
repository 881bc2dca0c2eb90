//! Wait-free ring buffer for audio frames
//!
//! A single-producer single-consumer (SPSC) ring buffer with a fixed
//! number of slots. The network receiver owns the [`Producer`], the render
//! callback owns the [`Consumer`]. Neither side ever blocks, allocates or
//! takes a lock: each operation is a bounded number of atomic loads and
//! stores, with acquire/release ordering publishing slot contents.

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::MAX_CHANNELS;

/// One multi-channel sample instant.
///
/// Samples are stored inline so frames can be copied through the ring
/// buffer without touching the allocator.
#[derive(Clone, Copy)]
pub struct AudioFrame {
    samples: [f64; MAX_CHANNELS],
    channels: u8,
}

impl AudioFrame {
    /// A frame of zeros.
    pub fn silence(channels: usize) -> Self {
        Self {
            samples: [0.0; MAX_CHANNELS],
            channels: channels.clamp(1, MAX_CHANNELS) as u8,
        }
    }

    /// Build a frame from one sample per channel.
    ///
    /// Samples past [`MAX_CHANNELS`] are ignored.
    pub fn from_samples(samples: &[f64]) -> Self {
        let channels = samples.len().clamp(1, MAX_CHANNELS);
        let mut frame = Self::silence(channels);
        let n = samples.len().min(MAX_CHANNELS);
        frame.samples[..n].copy_from_slice(&samples[..n]);
        frame
    }

    pub fn channels(&self) -> usize {
        self.channels as usize
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples[..self.channels as usize]
    }

    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples[..self.channels as usize]
    }

    /// Sample for `channel`, or silence if the frame has fewer channels.
    #[inline]
    pub fn sample(&self, channel: usize) -> f64 {
        if channel < self.channels as usize {
            self.samples[channel]
        } else {
            0.0
        }
    }
}

impl Default for AudioFrame {
    fn default() -> Self {
        Self::silence(1)
    }
}

impl PartialEq for AudioFrame {
    fn eq(&self, other: &Self) -> bool {
        self.samples() == other.samples()
    }
}

impl fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AudioFrame").field(&self.samples()).finish()
    }
}

/// Fixed-capacity SPSC ring buffer.
///
/// Indices grow monotonically and wrap on `usize` overflow; the slot for an
/// index is `index % capacity`. `tail - head` is the number of valid frames
/// and never exceeds `capacity`.
pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<T>]>,
    /// Read index, advanced only by the consumer
    head: CachePadded<AtomicUsize>,
    /// Write index, advanced only by the producer
    tail: CachePadded<AtomicUsize>,
    overflow_count: AtomicU64,
    underflow_count: AtomicU64,
}

// Safety: a slot is written only by the producer while it lies outside
// [head, tail), and read only by the consumer while inside it. The split
// handles below guarantee one producer and one consumer.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T: Copy + Default> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be > 0");

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            overflow_count: AtomicU64::new(0),
            underflow_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn try_push(&self, item: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= self.slots.len() {
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // Safe: the slot is outside [head, tail) so the consumer is not reading it
        unsafe {
            *self.slots[tail % self.slots.len()].get() = item;
        }

        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    #[inline]
    fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        if head == tail {
            self.underflow_count.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Safe: the slot is inside [head, tail) so the producer is not writing it
        let item = unsafe { *self.slots[head % self.slots.len()].get() };

        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }
}

impl<T> RingBuffer<T> {
    /// Approximate number of frames ready to pop.
    #[inline]
    fn available(&self) -> usize {
        // head first: it can only move towards tail, so the difference is never negative
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.slots.len())
    }
}

/// Create a ring buffer with `capacity` slots and return its two endpoints.
pub fn channel<T: Copy + Default>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let inner = Arc::new(RingBuffer::new(capacity));
    (
        Producer {
            inner: inner.clone(),
        },
        Consumer { inner },
    )
}

/// Writing end of the ring buffer. Not `Clone`: there is exactly one.
pub struct Producer<T> {
    inner: Arc<RingBuffer<T>>,
}

impl<T: Copy + Default> Producer<T> {
    /// Store a frame. Returns false and counts an overflow if the buffer is
    /// full; existing content is never overwritten.
    #[inline]
    pub fn try_push(&mut self, item: T) -> bool {
        self.inner.try_push(item)
    }
}

impl<T> Producer<T> {
    pub fn available_frames(&self) -> usize {
        self.inner.available()
    }

    pub fn monitor(&self) -> Monitor<T> {
        Monitor {
            inner: self.inner.clone(),
        }
    }
}

/// Reading end of the ring buffer. Not `Clone`: there is exactly one.
pub struct Consumer<T> {
    inner: Arc<RingBuffer<T>>,
}

impl<T: Copy + Default> Consumer<T> {
    /// Take the oldest frame. Returns `None` and counts an underflow if the
    /// buffer is empty.
    #[inline]
    pub fn try_pop(&mut self) -> Option<T> {
        self.inner.try_pop()
    }
}

impl<T> Consumer<T> {
    pub fn available_frames(&self) -> usize {
        self.inner.available()
    }

    pub fn monitor(&self) -> Monitor<T> {
        Monitor {
            inner: self.inner.clone(),
        }
    }
}

/// Read-only view of a ring buffer for diagnostics, usable from any thread.
pub struct Monitor<T> {
    inner: Arc<RingBuffer<T>>,
}

impl<T> Clone for Monitor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Monitor<T> {
    pub fn available_frames(&self) -> usize {
        self.inner.available()
    }

    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn overflow_count(&self) -> u64 {
        self.inner.overflow_count.load(Ordering::Relaxed)
    }

    pub fn underflow_count(&self) -> u64 {
        self.inner.underflow_count.load(Ordering::Relaxed)
    }
}

impl<T> fmt::Debug for Monitor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("capacity", &self.capacity())
            .field("available", &self.available_frames())
            .field("overflows", &self.overflow_count())
            .field("underflows", &self.underflow_count())
            .finish()
    }
}
