//! Network subsystem for UDP audio reception

pub mod receiver;
pub mod session;
pub mod udp;

pub use receiver::Receiver;
pub use session::{Session, SessionState};
pub use udp::{create_socket, SocketOptions};
