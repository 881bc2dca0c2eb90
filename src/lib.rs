//! # netreceive
//!
//! Real-time safe reception of raw multi-channel audio over UDP.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                         CONTROL THREAD (host)                         │
//! │      on_control(1) ──► Receiver::start     on_control(0) ──► stop     │
//! └───────────────────────────────┬───────────────────────────────────────┘
//!                                 │ spawn / join
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                   RECEIVER THREAD (network::session)                  │
//! │   UDP socket ──► event loop ──► RawDecoder ──► Producer::try_push     │
//! │   Datagrams: [f64 × channels] × N, fixed byte order, no header        │
//! └───────────────────────────────┬───────────────────────────────────────┘
//!                                 │ wait-free SPSC
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                    RING BUFFER (audio::buffer)                        │
//! │   fixed capacity, allocated once, overflow/underflow counters         │
//! └───────────────────────────────┬───────────────────────────────────────┘
//!                                 │ Consumer::try_pop, one frame per slot
//!                                 ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                 AUDIO THREAD (host, audio::render)                    │
//! │   Renderer::render(outputs, block_size): frames or silence            │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod network;
pub mod object;
pub mod stats;

pub use audio::{AudioFrame, Renderer};
pub use config::{EndpointConfig, ReceiverConfig};
pub use error::{ConfigError, Error, NetworkError, ReadError, Result};
pub use network::{Receiver, SessionState};
pub use object::{HostConfig, HostObject, NetReceive};
pub use stats::{Statistics, StatsSnapshot};

/// Application-wide constants
pub mod constants {
    /// Maximum number of audio channels per frame
    pub const MAX_CHANNELS: usize = 32;

    /// Default channel count
    pub const DEFAULT_CHANNELS: usize = 1;

    /// Default bind address (all interfaces)
    pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

    /// Default UDP port
    pub const DEFAULT_PORT: u16 = 8000;

    /// Default host block size in frames
    pub const DEFAULT_BLOCK_SIZE: usize = 1024;

    /// Default sample rate for hosts that don't supply one
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default ring buffer capacity, in blocks
    pub const DEFAULT_BUFFER_BLOCKS: usize = 8;

    /// Largest host block size in frames
    pub const MAX_BLOCK_SIZE: usize = 8192;

    /// Smallest ring buffer capacity, in blocks
    pub const MIN_BUFFER_BLOCKS: usize = 2;

    /// Largest ring buffer capacity, in blocks
    pub const MAX_BUFFER_BLOCKS: usize = 32;

    /// Largest datagram we read; also the default scratch buffer size
    pub const MAX_DATAGRAM_SIZE: usize = 65536;

    /// Payload size the sender aims for (MTU - IP/UDP headers)
    pub const MAX_PACKET_SIZE: usize = 1472;

    /// Default statistics report period
    pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 5000;

    /// Consecutive hard receive errors before a session is closed
    pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 8;
}
