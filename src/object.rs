//! Host-facing audio object
//!
//! The audio host (plugin shell, DAW, test harness) is an external
//! collaborator. It configures the object, forwards control events and
//! calls the render function once per block. [`NetReceive`] wires the ring
//! buffer, receiver and renderer together behind that interface.

use std::sync::Arc;
use tracing::{info, warn};

use crate::audio::buffer::{channel, AudioFrame};
use crate::audio::render::Renderer;
use crate::config::ReceiverConfig;
use crate::network::Receiver;
use crate::stats::{Statistics, StatsSnapshot};

/// Stream parameters supplied by the host at DSP setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostConfig {
    pub channels: usize,
    pub sample_rate: f64,
    pub block_size: usize,
}

/// Lifecycle hooks an audio host drives
pub trait HostObject {
    fn on_configure(&mut self, config: HostConfig);

    fn on_start(&mut self);

    fn on_stop(&mut self);

    /// Integer control input: nonzero starts a session, zero stops it.
    fn on_control(&mut self, value: i64) {
        if value != 0 {
            self.on_start();
        } else {
            self.on_stop();
        }
    }

    /// Called on the host's real-time thread. Must not block.
    fn on_render_block(&mut self, outputs: &mut [&mut [f64]], block_size: usize);

    fn on_teardown(&mut self);
}

/// Network audio source: UDP datagrams in, planar f64 blocks out
pub struct NetReceive {
    config: ReceiverConfig,
    receiver: Receiver,
    renderer: Renderer,
    host: Option<HostConfig>,
}

impl NetReceive {
    /// Build the object. The ring buffer is allocated here, once, and never
    /// resized.
    pub fn new(config: ReceiverConfig) -> Self {
        let (config, _) = config.sanitize();
        let (producer, consumer) = channel::<AudioFrame>(config.buffer_capacity());
        let stats = Arc::new(Statistics::new(producer.monitor()));

        let receiver = Receiver::new(&config, producer, stats.clone());
        let renderer = Renderer::new(consumer, stats);

        info!(
            "Created receiver: {} channel(s), endpoint {}:{}, buffer {} frames",
            config.channels,
            receiver.endpoint().address(),
            receiver.endpoint().port(),
            config.buffer_capacity()
        );

        Self {
            config,
            receiver,
            renderer,
            host: None,
        }
    }

    /// Build from positional arguments `[channels] [address] [port]`,
    /// falling back to defaults for anything missing or invalid.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Self {
        let (config, _) = ReceiverConfig::from_args(args);
        Self::new(config)
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn channels(&self) -> usize {
        self.config.channels
    }

    pub fn host_config(&self) -> Option<HostConfig> {
        self.host
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut Receiver {
        &mut self.receiver
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.receiver.stats().snapshot()
    }

    /// Separate the control and render halves so they can live on different
    /// threads.
    pub fn split(self) -> (Receiver, Renderer) {
        (self.receiver, self.renderer)
    }
}

impl HostObject for NetReceive {
    fn on_configure(&mut self, config: HostConfig) {
        info!(
            "DSP setup: {} output channel(s), {} Hz, block size {}",
            config.channels, config.sample_rate, config.block_size
        );

        if config.channels != self.config.channels {
            warn!(
                "Host has {} output channel(s), stream has {}; extra outputs are silent, extra stream channels dropped",
                config.channels, self.config.channels
            );
        }

        let capacity = self.renderer.monitor().capacity();
        if config.block_size.saturating_mul(2) > capacity {
            warn!(
                "Block size {} leaves little jitter headroom in a {}-frame buffer",
                config.block_size, capacity
            );
        }

        self.host = Some(config);
    }

    fn on_start(&mut self) {
        // Failures are logged by the receiver, which stays idle
        let _ = self.receiver.start();
    }

    fn on_stop(&mut self) {
        self.receiver.stop();
    }

    fn on_render_block(&mut self, outputs: &mut [&mut [f64]], block_size: usize) {
        self.renderer.render(outputs, block_size);
    }

    fn on_teardown(&mut self) {
        self.receiver.stop();
        info!("Receiver torn down: {}", self.stats());
    }
}
