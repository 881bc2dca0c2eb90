//! Render callback
//!
//! Pulls one frame per output slot from the ring buffer and writes it to
//! planar output channels. Runs on the host's real-time thread: no
//! allocation, no locks, no I/O, no logging. An empty buffer yields silence.

use std::sync::Arc;

use crate::audio::buffer::{AudioFrame, Consumer, Monitor};
use crate::stats::Statistics;

/// Consumer side of a receiver object, owned by the host's audio thread
pub struct Renderer {
    consumer: Consumer<AudioFrame>,
    stats: Arc<Statistics>,
}

impl Renderer {
    pub fn new(consumer: Consumer<AudioFrame>, stats: Arc<Statistics>) -> Self {
        Self { consumer, stats }
    }

    /// Fill `block_size` frames of every output channel.
    ///
    /// Output channels beyond a frame's channel count are zero-padded; frame
    /// channels beyond the output count are dropped. If any output slice is
    /// shorter than `block_size`, the block is clamped to the shortest one.
    /// Returns the number of slots that were filled from the buffer.
    pub fn render(&mut self, outputs: &mut [&mut [f64]], block_size: usize) -> usize {
        let frames = outputs
            .iter()
            .map(|out| out.len())
            .min()
            .unwrap_or(0)
            .min(block_size);

        self.stats.record_block(self.consumer.available_frames());

        let mut filled = 0;
        for slot in 0..frames {
            match self.consumer.try_pop() {
                Some(frame) => {
                    for (channel, out) in outputs.iter_mut().enumerate() {
                        out[slot] = frame.sample(channel);
                    }
                    filled += 1;
                }
                None => {
                    for out in outputs.iter_mut() {
                        out[slot] = 0.0;
                    }
                }
            }
        }

        filled
    }

    pub fn available_frames(&self) -> usize {
        self.consumer.available_frames()
    }

    pub fn monitor(&self) -> Monitor<AudioFrame> {
        self.consumer.monitor()
    }

    pub fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }
}
