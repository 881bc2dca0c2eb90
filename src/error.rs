//! Error types for the network audio receiver

use std::net::SocketAddr;
use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid or missing construction parameters.
///
/// These are recovered locally by falling back to defaults; they are
/// surfaced so the caller can report them.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("channel count {0:?} outside 1..=32")]
    InvalidChannels(String),

    #[error("invalid IP address {0:?}")]
    InvalidAddress(String),

    #[error("invalid port number {0:?}")]
    InvalidPort(String),

    #[error("{0} argument missing")]
    Missing(&'static str),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

/// Network subsystem errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind to {addr} failed: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Receive stream failed: {0}")]
    Stream(String),

    #[error("Event loop creation failed: {0}")]
    Runtime(std::io::Error),

    #[error("Worker thread spawn failed: {0}")]
    Spawn(std::io::Error),
}

/// Per-datagram decode failures. The datagram is dropped, the session continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("empty datagram")]
    Empty,

    #[error("datagram length {len} is not a multiple of the {group}-byte sample group")]
    MalformedLength { len: usize, group: usize },

    #[error("datagram exceeds {max} bytes")]
    Oversized { max: usize },
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
