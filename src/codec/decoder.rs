//! Datagram decoder
//!
//! Turns one received datagram into audio frames. Validation happens up
//! front so a malformed datagram yields no frames at all.

use bytes::Buf;

use crate::audio::buffer::AudioFrame;
use crate::codec::{ByteOrder, SAMPLE_SIZE};
use crate::constants::MAX_CHANNELS;
use crate::error::ReadError;

/// Decoder for raw f64 sample groups
#[derive(Debug, Clone, Copy)]
pub struct RawDecoder {
    channels: usize,
    byte_order: ByteOrder,
}

impl RawDecoder {
    pub fn new(channels: usize, byte_order: ByteOrder) -> Self {
        Self {
            channels: channels.clamp(1, MAX_CHANNELS),
            byte_order,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Bytes per sample group (one frame)
    pub fn group_size(&self) -> usize {
        self.channels * SAMPLE_SIZE
    }

    /// Validate `payload` and return an iterator over its frames.
    pub fn decode<'a>(&self, payload: &'a [u8]) -> Result<Frames<'a>, ReadError> {
        let group = self.group_size();

        if payload.is_empty() {
            return Err(ReadError::Empty);
        }
        if payload.len() % group != 0 {
            return Err(ReadError::MalformedLength {
                len: payload.len(),
                group,
            });
        }

        Ok(Frames {
            payload,
            channels: self.channels,
            byte_order: self.byte_order,
        })
    }
}

/// Iterator over the frames of a validated datagram
pub struct Frames<'a> {
    payload: &'a [u8],
    channels: usize,
    byte_order: ByteOrder,
}

impl Iterator for Frames<'_> {
    type Item = AudioFrame;

    fn next(&mut self) -> Option<AudioFrame> {
        if self.payload.remaining() < self.channels * SAMPLE_SIZE {
            return None;
        }

        let mut frame = AudioFrame::silence(self.channels);
        for sample in frame.samples_mut() {
            *sample = match self.byte_order {
                ByteOrder::Little => self.payload.get_f64_le(),
                ByteOrder::Big => self.payload.get_f64(),
            };
        }
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.payload.len() / (self.channels * SAMPLE_SIZE);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Frames<'_> {}
