//! UDP socket setup

use socket2::{Domain, Protocol, Socket, Type};
use std::net::UdpSocket;

use crate::config::EndpointConfig;
use crate::error::NetworkError;

/// Socket options applied before binding
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketOptions {
    pub recv_buffer_size: Option<usize>,
    pub reuse_address: bool,
}

/// Create a non-blocking UDP socket bound to `endpoint`.
pub fn create_socket(
    endpoint: &EndpointConfig,
    options: SocketOptions,
) -> Result<UdpSocket, NetworkError> {
    let addr = endpoint.socket_addr();
    let bind_err = |source| NetworkError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;

    if options.reuse_address {
        socket.set_reuse_address(true).map_err(bind_err)?;
    }

    if let Some(size) = options.recv_buffer_size {
        // The kernel may clamp this; not fatal
        if let Err(e) = socket.set_recv_buffer_size(size) {
            tracing::warn!("Failed to set receive buffer size to {}: {}", size, e);
        }
    }

    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;

    Ok(socket.into())
}

/// Errors that mean "nothing to read right now" rather than a broken socket
pub fn is_transient(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        kind,
        WouldBlock | Interrupted | TimedOut | ConnectionReset | ConnectionRefused
    )
}
