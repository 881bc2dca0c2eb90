//! Audio Receiver Application
//!
//! Receives raw audio datagrams and renders them the way an audio host
//! would: either on a real output device (feature `device-output`) or on a
//! simulated host clock that pulls one block per block period.
//!
//! Usage: `receiver [channels] [address] [port]`. Without arguments the
//! platform config file is used if present.

use anyhow::Result;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netreceive::{constants::*, HostConfig, HostObject, NetReceive, ReceiverConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting network audio receiver");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = if args.is_empty() {
        ReceiverConfig::load_or_default()
    } else {
        ReceiverConfig::from_args(&args).0
    };

    let mut object = NetReceive::new(config);
    let channels = object.channels();
    let block_size = object.config().block_size;

    object.on_configure(HostConfig {
        channels,
        sample_rate: DEFAULT_SAMPLE_RATE as f64,
        block_size,
    });
    object.on_control(1);

    if !object.receiver().is_listening() {
        anyhow::bail!(
            "Receiver failed to start on {}:{}",
            object.receiver().endpoint().address(),
            object.receiver().endpoint().port()
        );
    }

    let (mut receiver, renderer) = object.split();

    #[cfg(feature = "device-output")]
    let host = netreceive::audio::DevicePlayback::start(renderer, Some(DEFAULT_SAMPLE_RATE))?;
    #[cfg(not(feature = "device-output"))]
    let host = clock::SimulatedHost::spawn(renderer, channels, block_size, DEFAULT_SAMPLE_RATE)?;

    tracing::info!("Waiting for audio streams... (Ctrl-C to stop)");

    let mut poll = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            _ = poll.tick() => {
                if let Some(e) = receiver.check_errors() {
                    tracing::error!("Session ended: {}", e);
                    break;
                }
            }
        }
    }

    receiver.stop();
    drop(host);
    let stats = receiver.stats().snapshot();
    tracing::info!(
        "Final stats: {} ({:.1} ms buffered)",
        stats,
        stats.buffered_ms(DEFAULT_SAMPLE_RATE as f64)
    );

    Ok(())
}

#[cfg(not(feature = "device-output"))]
mod clock {
    //! Stand-in for an audio host: a thread that calls the render function
    //! once per block period and tracks the output peak level.

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::{Duration, Instant};

    use netreceive::{constants::MAX_CHANNELS, Renderer};

    pub struct SimulatedHost {
        running: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
    }

    impl SimulatedHost {
        pub fn spawn(
            mut renderer: Renderer,
            channels: usize,
            block_size: usize,
            sample_rate: u32,
        ) -> std::io::Result<Self> {
            let running = Arc::new(AtomicBool::new(true));
            let running_for_loop = running.clone();
            let period = Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

            let handle = thread::Builder::new()
                .name("host-clock".into())
                .spawn(move || {
                    let mut planar = vec![vec![0.0f64; block_size]; channels];
                    let mut next = Instant::now();
                    let mut peak = 0.0f64;
                    let mut blocks = 0u64;
                    let report_every = (sample_rate as usize / block_size.max(1)).max(1) as u64 * 5;

                    while running_for_loop.load(Ordering::Relaxed) {
                        {
                            let mut outputs: [&mut [f64]; MAX_CHANNELS] = Default::default();
                            for (out, buf) in outputs.iter_mut().zip(planar.iter_mut()) {
                                *out = buf.as_mut_slice();
                            }
                            renderer.render(&mut outputs[..channels], block_size);
                        }
                        peak = planar
                            .iter()
                            .flatten()
                            .fold(peak, |p, s| p.max(s.abs()));

                        blocks += 1;
                        if blocks % report_every == 0 {
                            tracing::info!("Output peak over last 5 s: {:.3}", peak);
                            peak = 0.0;
                        }

                        next += period;
                        let now = Instant::now();
                        if next > now {
                            thread::sleep(next - now);
                        } else {
                            next = now;
                        }
                    }
                })?;

            Ok(Self {
                running,
                handle: Some(handle),
            })
        }
    }

    impl Drop for SimulatedHost {
        fn drop(&mut self) {
            self.running.store(false, Ordering::SeqCst);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}
