//! Receive session
//!
//! One bind-to-close lifecycle of the network receiver. The socket is bound
//! on the control thread so bind errors are reported synchronously; the
//! event loop then runs on a dedicated worker thread until it is told to
//! shut down or the socket fails persistently.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::audio::buffer::{AudioFrame, Producer};
use crate::codec::RawDecoder;
use crate::config::EndpointConfig;
use crate::constants::MAX_CONSECUTIVE_READ_ERRORS;
use crate::error::{NetworkError, ReadError};
use crate::network::udp::{create_socket, is_transient, SocketOptions};
use crate::stats::Statistics;

/// Receiver lifecycle: `Idle → Binding → Listening → Draining → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Binding = 1,
    Listening = 2,
    Draining = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Binding,
            2 => Self::Listening,
            3 => Self::Draining,
            _ => Self::Idle,
        }
    }
}

/// Session state readable from any thread
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Everything the worker thread needs besides the socket
pub(crate) struct SessionContext {
    pub producer: Arc<Mutex<Producer<AudioFrame>>>,
    pub decoder: RawDecoder,
    pub stats: Arc<Statistics>,
    pub state: SharedState,
    pub errors: Sender<NetworkError>,
    pub max_datagram_size: usize,
    pub report_interval: Option<Duration>,
}

impl SessionContext {
    fn fail(&self, err: NetworkError) {
        let _ = self.errors.try_send(err);
    }
}

/// A live receive session. Dropping it stops the worker and joins it.
pub struct Session {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Session {
    /// Bind `endpoint` and spawn the receive loop.
    pub(crate) fn start(
        endpoint: &EndpointConfig,
        options: SocketOptions,
        ctx: SessionContext,
    ) -> Result<Self, NetworkError> {
        ctx.state.set(SessionState::Binding);

        let socket = create_socket(endpoint, options)?;
        let local_addr = socket.local_addr().map_err(|source| NetworkError::Bind {
            addr: endpoint.socket_addr(),
            source,
        })?;
        info!("Bound receive socket to {}", local_addr);

        Self::spawn(local_addr, ctx, move || {
            tokio::net::UdpSocket::from_std(socket)
        })
    }

    /// Spawn the worker thread. `open` runs inside the worker's event loop
    /// and produces the datagram source for the session.
    pub(crate) fn spawn<S, F>(
        local_addr: SocketAddr,
        ctx: SessionContext,
        open: F,
    ) -> Result<Self, NetworkError>
    where
        S: DatagramSource,
        F: FnOnce() -> io::Result<S> + Send + 'static,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(NetworkError::Runtime)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        ctx.state.set(SessionState::Listening);

        let handle = thread::Builder::new()
            .name(format!("netreceive-{}", local_addr.port()))
            .spawn(move || {
                debug!("Opening receive loop on {}", local_addr);
                {
                    let mut producer = ctx.producer.lock();
                    runtime.block_on(async {
                        match open() {
                            Ok(source) => {
                                receive_loop(&source, &mut producer, &ctx, shutdown_rx).await
                            }
                            Err(e) => {
                                error!("Failed to register socket with event loop: {}", e);
                                ctx.state.set(SessionState::Draining);
                                ctx.fail(NetworkError::Stream(e.to_string()));
                            }
                        }
                    });
                }
                drop(runtime);
                ctx.state.set(SessionState::Idle);
                debug!("Receive loop on {} closed", local_addr);
            })
            .map_err(NetworkError::Spawn)?;

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True once the worker thread has exited on its own or been joined
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop the event loop and wait for the worker to exit. Blocking; never
    /// call from the render path.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Receive thread for {} panicked", self.local_addr);
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Where a session's datagrams come from
pub(crate) trait DatagramSource {
    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl DatagramSource for tokio::net::UdpSocket {
    async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.recv_from(buf).await
    }
}

async fn receive_loop<S: DatagramSource>(
    source: &S,
    producer: &mut Producer<AudioFrame>,
    ctx: &SessionContext,
    mut shutdown: oneshot::Receiver<()>,
) {
    // One byte of slack so an oversized datagram shows up as too long
    // instead of being silently truncated. Released when the session ends.
    let mut scratch = vec![0u8; ctx.max_datagram_size.saturating_add(1)];
    let mut report = ctx.report_interval.map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    let mut consecutive_errors = 0u32;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Shutdown requested");
                break;
            }
            _ = next_report(&mut report) => {
                info!("Receiver stats: {}", ctx.stats.snapshot());
            }
            result = source.recv_datagram(&mut scratch) => match result {
                Ok((len, peer)) => {
                    consecutive_errors = 0;
                    handle_datagram(&scratch[..len], peer, producer, ctx);
                }
                Err(e) if is_transient(e.kind()) => {
                    trace!("Transient receive error: {}", e);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        "Receive error ({}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_READ_ERRORS, e
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        error!("Receive stream failed, closing session: {}", e);
                        ctx.fail(NetworkError::Stream(e.to_string()));
                        break;
                    }
                }
            }
        }
    }

    ctx.state.set(SessionState::Draining);
}

async fn next_report(report: &mut Option<Interval>) {
    match report {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn handle_datagram(
    payload: &[u8],
    peer: SocketAddr,
    producer: &mut Producer<AudioFrame>,
    ctx: &SessionContext,
) {
    let decoded = if payload.len() > ctx.max_datagram_size {
        Err(ReadError::Oversized {
            max: ctx.max_datagram_size,
        })
    } else {
        ctx.decoder.decode(payload)
    };
    let frames = match decoded {
        Ok(frames) => frames,
        Err(e) => {
            ctx.stats.record_rejected(payload.len());
            debug!("Dropping datagram from {}: {}", peer, e);
            return;
        }
    };

    let total = frames.len();
    let mut accepted = 0;
    for frame in frames {
        if producer.try_push(frame) {
            accepted += 1;
        }
    }

    ctx.stats.record_datagram(payload.len(), accepted);
    if accepted < total {
        debug!(
            "Ring buffer overflow: dropped {} of {} frames from {}",
            total - accepted,
            total,
            peer
        );
    }
    trace!("{} bytes from {}: {} frames", payload.len(), peer, total);
}
