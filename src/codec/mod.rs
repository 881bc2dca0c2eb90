//! Raw sample wire format
//!
//! A datagram is a sequence of sample groups, one group per frame, each
//! group being `channels` consecutive IEEE-754 doubles in a fixed byte
//! order. There is no header: the datagram length must be a whole number
//! of groups.

pub mod decoder;
pub mod encoder;

pub use decoder::RawDecoder;
pub use encoder::RawEncoder;

use serde::{Deserialize, Serialize};

/// Size of one encoded sample in bytes
pub const SAMPLE_SIZE: usize = std::mem::size_of::<f64>();

/// Byte order of samples on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}
