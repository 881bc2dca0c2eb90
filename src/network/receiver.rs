//! Network receiver control
//!
//! Owns the producer side of the ring buffer and at most one live
//! [`Session`]. Start and stop are driven from the host's control thread;
//! neither touches the ring buffer's structure.

use crossbeam_channel::{bounded, Receiver as ErrorReceiver, Sender};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::audio::buffer::{AudioFrame, Producer};
use crate::codec::RawDecoder;
use crate::config::{EndpointConfig, ReceiverConfig};
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::NetworkError;
use crate::network::session::{Session, SessionContext, SessionState, SharedState};
use crate::network::udp::SocketOptions;
use crate::stats::Statistics;

/// Control side of the network receiver
pub struct Receiver {
    endpoint: EndpointConfig,
    options: SocketOptions,
    decoder: RawDecoder,
    max_datagram_size: usize,
    report_interval: Option<Duration>,
    producer: Arc<Mutex<Producer<AudioFrame>>>,
    stats: Arc<Statistics>,
    state: SharedState,
    session: Option<Session>,
    error_tx: Sender<NetworkError>,
    error_rx: ErrorReceiver<NetworkError>,
}

impl Receiver {
    pub fn new(
        config: &ReceiverConfig,
        producer: Producer<AudioFrame>,
        stats: Arc<Statistics>,
    ) -> Self {
        let (error_tx, error_rx) = bounded(16);

        Self {
            endpoint: config.endpoint(),
            options: SocketOptions {
                recv_buffer_size: config.recv_buffer_size,
                reuse_address: config.reuse_address,
            },
            decoder: RawDecoder::new(config.channels, config.byte_order),
            max_datagram_size: config.max_datagram_size.clamp(1, MAX_DATAGRAM_SIZE),
            report_interval: (config.report_interval_ms > 0)
                .then(|| Duration::from_millis(config.report_interval_ms)),
            producer: Arc::new(Mutex::new(producer)),
            stats,
            state: SharedState::default(),
            session: None,
            error_tx,
            error_rx,
        }
    }

    /// Bind and start listening. A no-op while a session is live.
    ///
    /// On failure the receiver stays `Idle`; there is no automatic retry.
    pub fn start(&mut self) -> Result<(), NetworkError> {
        if let Some(session) = &self.session {
            if !session.is_finished() {
                debug!("Already listening on {}", session.local_addr());
                return Ok(());
            }
        }

        // Reap a session whose loop ended on a stream error
        if let Some(mut session) = self.session.take() {
            session.close();
        }

        match Session::start(&self.endpoint, self.options, self.session_context()) {
            Ok(session) => {
                info!(
                    "Session started: {} channel(s) on {}",
                    self.decoder.channels(),
                    session.local_addr()
                );
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                self.state.set(SessionState::Idle);
                error!("Failed to start session: {}", e);
                Err(e)
            }
        }
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            producer: self.producer.clone(),
            decoder: self.decoder,
            stats: self.stats.clone(),
            state: self.state.clone(),
            errors: self.error_tx.clone(),
            max_datagram_size: self.max_datagram_size,
            report_interval: self.report_interval,
        }
    }

    /// Stop the live session and join its worker. Idempotent.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        self.state.set(SessionState::Draining);
        session.close();
        self.state.set(SessionState::Idle);

        info!(
            "Session on {} stopped: {}",
            session.local_addr(),
            self.stats.snapshot()
        );
    }

    /// Nonzero starts a session, zero stops it.
    pub fn control(&mut self, value: i64) -> Result<(), NetworkError> {
        if value != 0 {
            self.start()
        } else {
            self.stop();
            Ok(())
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == SessionState::Listening
    }

    /// Address of the live session's socket
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session
            .as_ref()
            .filter(|s| !s.is_finished())
            .map(Session::local_addr)
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    pub fn stats(&self) -> &Arc<Statistics> {
        &self.stats
    }

    /// Errors that ended a session from the worker thread
    pub fn check_errors(&self) -> Option<NetworkError> {
        self.error_rx.try_recv().ok()
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::channel;
    use crate::network::session::tests::ScriptedSource;

    fn receiver(config: ReceiverConfig) -> Receiver {
        let (producer, _consumer) = channel::<AudioFrame>(config.buffer_capacity());
        let stats = Arc::new(Statistics::new(producer.monitor()));
        Receiver::new(&config, producer, stats)
    }

    fn loopback() -> ReceiverConfig {
        ReceiverConfig {
            address: "127.0.0.1".into(),
            port: 0,
            report_interval_ms: 0,
            ..ReceiverConfig::default()
        }
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut rx = receiver(loopback());
        rx.stop();
        rx.stop();
        assert_eq!(rx.state(), SessionState::Idle);
        assert!(rx.local_addr().is_none());
    }

    #[test]
    fn test_start_twice_keeps_session() {
        let mut rx = receiver(loopback());
        rx.start().unwrap();
        let addr = rx.local_addr().unwrap();

        rx.start().unwrap();
        assert_eq!(rx.local_addr(), Some(addr));
        assert!(rx.is_listening());

        rx.stop();
        assert_eq!(rx.state(), SessionState::Idle);
    }

    #[test]
    fn test_control_values() {
        let mut rx = receiver(loopback());
        rx.control(1).unwrap();
        assert!(rx.is_listening());
        rx.control(0).unwrap();
        assert_eq!(rx.state(), SessionState::Idle);
    }

    #[test]
    fn test_bind_failure_leaves_idle() {
        let holder = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut rx = receiver(ReceiverConfig {
            port: holder.local_addr().unwrap().port(),
            ..loopback()
        });

        assert!(matches!(rx.start(), Err(NetworkError::Bind { .. })));
        assert_eq!(rx.state(), SessionState::Idle);
        assert!(rx.local_addr().is_none());

        // Once the port is free a new start succeeds
        drop(holder);
        rx.start().unwrap();
        assert!(rx.is_listening());
    }

    #[test]
    fn test_stream_error_is_reported_and_restart_rebinds() {
        let mut rx = receiver(loopback());
        let failed_addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        rx.session = Some(
            Session::spawn(failed_addr, rx.session_context(), || {
                Ok(ScriptedSource::failing())
            })
            .unwrap(),
        );

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while (rx.state() != SessionState::Idle || rx.local_addr().is_some())
            && std::time::Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(rx.state(), SessionState::Idle);
        assert!(rx.local_addr().is_none());
        assert!(matches!(rx.check_errors(), Some(NetworkError::Stream(_))));
        assert!(rx.check_errors().is_none());

        // The dead session is reaped and a real socket is bound
        rx.start().unwrap();
        assert!(rx.is_listening());
        let addr = rx.local_addr().unwrap();
        assert_ne!(addr, failed_addr);
        assert_ne!(addr.port(), 0);

        rx.stop();
        assert_eq!(rx.state(), SessionState::Idle);
    }
}
