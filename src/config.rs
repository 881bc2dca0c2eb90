//! Receiver configuration
//!
//! Configuration comes from positional construction arguments
//! (`channels address port`) or from a TOML file. Invalid or missing values
//! never fail construction: each one falls back to its default and is
//! reported as a [`ConfigError`].

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::codec::ByteOrder;
use crate::constants::*;
use crate::error::ConfigError;

/// Immutable, validated bind address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    address: String,
    ip: IpAddr,
    port: u16,
}

impl EndpointConfig {
    /// Validate an address/port pair. `localhost` is accepted as `127.0.0.1`.
    pub fn new(address: &str, port: u16) -> Result<Self, ConfigError> {
        let address = address.trim();
        let ip = parse_ip(address)?;
        Ok(Self {
            address: address.to_string(),
            ip,
            port,
        })
    }

    /// Build from optional textual arguments, defaulting whatever is missing or invalid.
    pub fn resolve(address: Option<&str>, port: Option<&str>) -> (Self, Vec<ConfigError>) {
        let mut fallbacks = Vec::new();

        let ip_text = match address.map(str::trim).filter(|a| !a.is_empty()) {
            Some(a) => match parse_ip(a) {
                Ok(_) => a,
                Err(e) => {
                    fallbacks.push(e);
                    DEFAULT_ADDRESS
                }
            },
            None => {
                fallbacks.push(ConfigError::Missing("IP address"));
                DEFAULT_ADDRESS
            }
        };

        let port = match port.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.parse::<u16>().unwrap_or_else(|_| {
                fallbacks.push(ConfigError::InvalidPort(p.to_string()));
                DEFAULT_PORT
            }),
            None => {
                fallbacks.push(ConfigError::Missing("port"));
                DEFAULT_PORT
            }
        };

        let endpoint = Self::new(ip_text, port).unwrap_or_default();
        (endpoint, fallbacks)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

fn parse_ip(address: &str) -> Result<IpAddr, ConfigError> {
    if address.eq_ignore_ascii_case("localhost") {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    address
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(address.to_string()))
}

/// Full receiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Channels per frame (1..=32)
    pub channels: usize,
    /// Local IP address to bind
    pub address: String,
    /// Local UDP port (0 lets the OS choose)
    pub port: u16,
    /// Expected host block size, used to size the ring buffer
    pub block_size: usize,
    /// Ring buffer capacity in blocks
    pub buffer_blocks: usize,
    /// Receive scratch buffer size in bytes
    pub max_datagram_size: usize,
    /// SO_RCVBUF override
    pub recv_buffer_size: Option<usize>,
    /// SO_REUSEADDR on the receive socket
    pub reuse_address: bool,
    /// Statistics report period while a session is live (0 disables)
    pub report_interval_ms: u64,
    /// Sample byte order on the wire
    pub byte_order: ByteOrder,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            block_size: DEFAULT_BLOCK_SIZE,
            buffer_blocks: DEFAULT_BUFFER_BLOCKS,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            recv_buffer_size: None,
            reuse_address: false,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            byte_order: ByteOrder::Little,
        }
    }
}

impl ReceiverConfig {
    /// Parse positional construction arguments: `[channels] [address] [port]`.
    ///
    /// Every fallback to a default is logged and returned.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> (Self, Vec<ConfigError>) {
        let arg = |i: usize| args.get(i).map(|s| s.as_ref());
        let mut config = Self::default();
        let mut fallbacks = Vec::new();

        match arg(0).map(str::trim).filter(|c| !c.is_empty()) {
            Some(text) => match parse_channels(text) {
                Some(channels) => config.channels = channels,
                None => fallbacks.push(ConfigError::InvalidChannels(text.to_string())),
            },
            None => fallbacks.push(ConfigError::Missing("channel")),
        }

        let (endpoint, endpoint_fallbacks) = EndpointConfig::resolve(arg(1), arg(2));
        config.address = endpoint.address().to_string();
        config.port = endpoint.port();
        fallbacks.extend(endpoint_fallbacks);

        report_fallbacks(&fallbacks);
        info!(
            "channels set to {}, address {}, port {}",
            config.channels, config.address, config.port
        );

        (config, fallbacks)
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Platform config file location (e.g. `~/.config/netreceive/receiver.toml`)
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "netreceive").map(|dirs| dirs.config_dir().join("receiver.toml"))
    }

    /// Load from [`default_path`](Self::default_path) if present, otherwise defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path().filter(|p| p.exists()) else {
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Replace every out-of-range field with its default.
    pub fn sanitize(mut self) -> (Self, Vec<ConfigError>) {
        let mut fallbacks = Vec::new();

        if !(1..=MAX_CHANNELS).contains(&self.channels) {
            fallbacks.push(ConfigError::InvalidChannels(self.channels.to_string()));
            self.channels = DEFAULT_CHANNELS;
        }

        if let Err(e) = parse_ip(self.address.trim()) {
            fallbacks.push(e);
            self.address = DEFAULT_ADDRESS.to_string();
        }

        if !(1..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            fallbacks.push(ConfigError::OutOfRange {
                field: "block_size",
                value: self.block_size.to_string(),
            });
            self.block_size = DEFAULT_BLOCK_SIZE;
        }

        if !(MIN_BUFFER_BLOCKS..=MAX_BUFFER_BLOCKS).contains(&self.buffer_blocks) {
            fallbacks.push(ConfigError::OutOfRange {
                field: "buffer_blocks",
                value: self.buffer_blocks.to_string(),
            });
            self.buffer_blocks = DEFAULT_BUFFER_BLOCKS;
        }

        let group = self.channels * crate::codec::SAMPLE_SIZE;
        if self.max_datagram_size < group || self.max_datagram_size > MAX_DATAGRAM_SIZE {
            fallbacks.push(ConfigError::OutOfRange {
                field: "max_datagram_size",
                value: self.max_datagram_size.to_string(),
            });
            self.max_datagram_size = MAX_DATAGRAM_SIZE;
        }

        report_fallbacks(&fallbacks);
        (self, fallbacks)
    }

    /// Bind address. Falls back to the default endpoint if `address` is invalid.
    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig::new(&self.address, self.port).unwrap_or_else(|e| {
            warn!("{}; using {}", e, DEFAULT_ADDRESS);
            EndpointConfig {
                port: self.port,
                ..EndpointConfig::default()
            }
        })
    }

    /// Ring buffer capacity in frames. An unsanitized config whose
    /// capacity is out of range gets the default capacity.
    pub fn buffer_capacity(&self) -> usize {
        self.block_size
            .max(1)
            .checked_mul(self.buffer_blocks.max(MIN_BUFFER_BLOCKS))
            .filter(|capacity| *capacity <= MAX_BLOCK_SIZE * MAX_BUFFER_BLOCKS)
            .unwrap_or(DEFAULT_BLOCK_SIZE * DEFAULT_BUFFER_BLOCKS)
    }
}

fn parse_channels(text: &str) -> Option<usize> {
    text.parse::<i64>()
        .ok()
        .filter(|c| (1..=MAX_CHANNELS as i64).contains(c))
        .map(|c| c as usize)
}

fn report_fallbacks(fallbacks: &[ConfigError]) {
    for e in fallbacks {
        warn!("{}, using default", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args_all_valid() {
        let (config, fallbacks) = ReceiverConfig::from_args(&["2", "127.0.0.1", "9000"]);
        assert!(fallbacks.is_empty());
        assert_eq!(config.channels, 2);
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_from_args_zero_channels_and_missing_endpoint() {
        let (config, fallbacks) = ReceiverConfig::from_args(&["0"]);

        assert_eq!(config.channels, 1);
        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(fallbacks.len(), 3);
        assert!(matches!(&fallbacks[0], ConfigError::InvalidChannels(c) if c == "0"));
        assert!(matches!(fallbacks[1], ConfigError::Missing("IP address")));
        assert!(matches!(fallbacks[2], ConfigError::Missing("port")));
    }

    #[test]
    fn test_from_args_no_args() {
        let (config, fallbacks) = ReceiverConfig::from_args::<&str>(&[]);
        assert_eq!(config, ReceiverConfig::default());
        assert_eq!(fallbacks.len(), 3);
    }

    #[test]
    fn test_from_args_invalid_values() {
        let (config, fallbacks) = ReceiverConfig::from_args(&["33", "not-an-ip", "99999"]);
        assert_eq!(config.channels, 1);
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(matches!(fallbacks[1], ConfigError::InvalidAddress(_)));
        assert!(matches!(fallbacks[2], ConfigError::InvalidPort(_)));
    }

    #[test]
    fn test_localhost_endpoint() {
        let endpoint = EndpointConfig::new("localhost", 9123).unwrap();
        assert_eq!(endpoint.socket_addr(), "127.0.0.1:9123".parse::<SocketAddr>().unwrap());
        assert_eq!(endpoint.address(), "localhost");
    }

    #[test]
    fn test_ipv6_endpoint() {
        let endpoint = EndpointConfig::new("::1", 0).unwrap();
        assert!(endpoint.ip().is_ipv6());
    }

    #[test]
    fn test_toml_partial_document() {
        let config = ReceiverConfig::from_toml_str(
            r#"
            channels = 4
            port = 9001
            byte_order = "big"
            "#,
        )
        .unwrap();

        assert_eq!(config.channels, 4);
        assert_eq!(config.port, 9001);
        assert_eq!(config.byte_order, ByteOrder::Big);
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_toml_rejects_bad_types() {
        let err = ReceiverConfig::from_toml_str("port = -1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_written_config_reloads() {
        let config = ReceiverConfig {
            channels: 8,
            recv_buffer_size: Some(1 << 20),
            ..ReceiverConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(ReceiverConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_sanitize() {
        let config = ReceiverConfig {
            channels: 0,
            address: "bogus".into(),
            block_size: 0,
            buffer_blocks: 1,
            max_datagram_size: 4,
            ..ReceiverConfig::default()
        };

        let (config, fallbacks) = config.sanitize();

        assert_eq!(fallbacks.len(), 5);
        assert_eq!(config, ReceiverConfig::default());
    }

    #[test]
    fn test_buffer_capacity() {
        let config = ReceiverConfig {
            block_size: 64,
            buffer_blocks: 4,
            ..ReceiverConfig::default()
        };
        assert_eq!(config.buffer_capacity(), 256);
    }

    #[test]
    fn test_sanitize_oversized_buffer() {
        let config = ReceiverConfig::from_toml_str("block_size = 4611686018427387904").unwrap();
        assert_eq!(config.buffer_capacity(), DEFAULT_BLOCK_SIZE * DEFAULT_BUFFER_BLOCKS);

        let (config, fallbacks) = ReceiverConfig {
            buffer_blocks: MAX_BUFFER_BLOCKS + 1,
            ..config
        }
        .sanitize();

        assert_eq!(fallbacks.len(), 2);
        assert!(matches!(
            fallbacks[0],
            ConfigError::OutOfRange { field: "block_size", .. }
        ));
        assert!(matches!(
            fallbacks[1],
            ConfigError::OutOfRange { field: "buffer_blocks", .. }
        ));
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.buffer_blocks, DEFAULT_BUFFER_BLOCKS);
    }

    #[test]
    fn test_buffer_capacity_unsanitized_overflow() {
        let config = ReceiverConfig {
            block_size: usize::MAX,
            buffer_blocks: usize::MAX,
            ..ReceiverConfig::default()
        };
        assert_eq!(config.buffer_capacity(), DEFAULT_BLOCK_SIZE * DEFAULT_BUFFER_BLOCKS);
    }
}
