//! Receiver and render statistics
//!
//! Counters are plain relaxed atomics: the receiver thread and the render
//! callback update them without coordination, and reporting only needs an
//! approximate snapshot.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::audio::buffer::{AudioFrame, Monitor};

/// Shared counters for one receiver object
pub struct Statistics {
    buffer: Monitor<AudioFrame>,
    datagrams_received: AtomicU64,
    datagrams_rejected: AtomicU64,
    bytes_received: AtomicU64,
    frames_received: AtomicU64,
    blocks_rendered: AtomicU64,
    fill_sum: AtomicU64,
    fill_samples: AtomicU64,
}

impl Statistics {
    pub fn new(buffer: Monitor<AudioFrame>) -> Self {
        Self {
            buffer,
            datagrams_received: AtomicU64::new(0),
            datagrams_rejected: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            blocks_rendered: AtomicU64::new(0),
            fill_sum: AtomicU64::new(0),
            fill_samples: AtomicU64::new(0),
        }
    }

    /// A datagram of `bytes` was decoded and `frames` of its frames were accepted.
    pub fn record_datagram(&self, bytes: usize, frames: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.frames_received.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, bytes: usize) {
        self.datagrams_rejected.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Called once per render block with the fill level seen at its start.
    #[inline]
    pub fn record_block(&self, fill: usize) {
        self.blocks_rendered.fetch_add(1, Ordering::Relaxed);
        self.fill_sum.fetch_add(fill as u64, Ordering::Relaxed);
        self.fill_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn overflow_count(&self) -> u64 {
        self.buffer.overflow_count()
    }

    pub fn underflow_count(&self) -> u64 {
        self.buffer.underflow_count()
    }

    pub fn queue_size(&self) -> usize {
        self.buffer.available_frames()
    }

    pub fn datagrams_rejected(&self) -> u64 {
        self.datagrams_rejected.load(Ordering::Relaxed)
    }

    pub fn datagrams_received(&self) -> u64 {
        self.datagrams_received.load(Ordering::Relaxed)
    }

    /// Mean number of buffered frames at the start of each rendered block.
    pub fn average_fill(&self) -> f64 {
        let samples = self.fill_samples.load(Ordering::Relaxed);
        if samples == 0 {
            0.0
        } else {
            self.fill_sum.load(Ordering::Relaxed) as f64 / samples as f64
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            overflows: self.overflow_count(),
            underflows: self.underflow_count(),
            queue_size: self.queue_size(),
            capacity: self.buffer.capacity(),
            average_fill: self.average_fill(),
            datagrams_received: self.datagrams_received(),
            datagrams_rejected: self.datagrams_rejected(),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            blocks_rendered: self.blocks_rendered.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// Point-in-time copy of [`Statistics`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub overflows: u64,
    pub underflows: u64,
    pub queue_size: usize,
    pub capacity: usize,
    pub average_fill: f64,
    pub datagrams_received: u64,
    pub datagrams_rejected: u64,
    pub bytes_received: u64,
    pub frames_received: u64,
    pub blocks_rendered: u64,
}

impl StatsSnapshot {
    /// Duration of the currently buffered audio
    pub fn buffered_ms(&self, sample_rate: f64) -> f64 {
        if sample_rate <= 0.0 {
            0.0
        } else {
            self.queue_size as f64 * 1000.0 / sample_rate
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queue {}/{}, avg fill {:.1}, {} overflows, {} underflows, {} datagrams ({} rejected, {:.1} KB), {} frames, {} blocks",
            self.queue_size,
            self.capacity,
            self.average_fill,
            self.overflows,
            self.underflows,
            self.datagrams_received,
            self.datagrams_rejected,
            self.bytes_received as f64 / 1024.0,
            self.frames_received,
            self.blocks_rendered,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::channel;

    #[test]
    fn test_snapshot_combines_buffer_and_counters() {
        let (mut tx, mut rx) = channel::<AudioFrame>(4);
        let stats = Statistics::new(tx.monitor());

        for _ in 0..5 {
            tx.try_push(AudioFrame::silence(1));
        }
        stats.record_datagram(40, 4);
        stats.record_rejected(3);
        stats.record_block(4);
        rx.try_pop();
        stats.record_block(2);

        let snap = stats.snapshot();
        assert_eq!(snap.overflows, 1);
        assert_eq!(snap.underflows, 0);
        assert_eq!(snap.queue_size, 3);
        assert_eq!(snap.capacity, 4);
        assert_eq!(snap.average_fill, 3.0);
        assert_eq!(snap.datagrams_received, 1);
        assert_eq!(snap.datagrams_rejected, 1);
        assert_eq!(snap.bytes_received, 43);
        assert_eq!(snap.frames_received, 4);
        assert_eq!(snap.blocks_rendered, 2);
    }

    #[test]
    fn test_average_fill_without_blocks() {
        let (tx, _rx) = channel::<AudioFrame>(4);
        let stats = Statistics::new(tx.monitor());
        assert_eq!(stats.average_fill(), 0.0);
    }

    #[test]
    fn test_buffered_ms() {
        let (tx, _rx) = channel::<AudioFrame>(4);
        let mut snap = Statistics::new(tx.monitor()).snapshot();
        snap.queue_size = 480;
        assert!((snap.buffered_ms(48_000.0) - 10.0).abs() < 1e-9);
        assert_eq!(snap.buffered_ms(0.0), 0.0);
    }
}
