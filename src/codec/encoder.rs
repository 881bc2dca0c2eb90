//! Datagram encoder
//!
//! Packs frames into datagrams in the wire format the decoder accepts.
//! Used by the sender binary.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{ByteOrder, SAMPLE_SIZE};
use crate::constants::MAX_CHANNELS;

/// Encoder for raw f64 sample groups
pub struct RawEncoder {
    channels: usize,
    byte_order: ByteOrder,
    /// Encoding buffer (reused between datagrams)
    buffer: BytesMut,
    frames_per_datagram: usize,
}

impl RawEncoder {
    /// Create an encoder whose datagrams never exceed `max_datagram_size` bytes
    pub fn new(channels: usize, byte_order: ByteOrder, max_datagram_size: usize) -> Self {
        let channels = channels.clamp(1, MAX_CHANNELS);
        let group = channels * SAMPLE_SIZE;
        let frames_per_datagram = (max_datagram_size / group).max(1);

        Self {
            channels,
            byte_order,
            buffer: BytesMut::with_capacity(frames_per_datagram * group),
            frames_per_datagram,
        }
    }

    pub fn frames_per_datagram(&self) -> usize {
        self.frames_per_datagram
    }

    /// Encode interleaved samples. A trailing partial group is zero-padded.
    pub fn encode_interleaved(&mut self, samples: &[f64]) -> Bytes {
        for group in samples.chunks(self.channels) {
            for channel in 0..self.channels {
                self.put(group.get(channel).copied().unwrap_or(0.0));
            }
        }
        self.buffer.split().freeze()
    }

    fn put(&mut self, sample: f64) {
        match self.byte_order {
            ByteOrder::Little => self.buffer.put_f64_le(sample),
            ByteOrder::Big => self.buffer.put_f64(sample),
        }
    }
}
