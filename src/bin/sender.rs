//! Audio Sender Application
//!
//! Streams a sine tone as raw f64 datagrams at real-time pace. Useful for
//! exercising a receiver end to end.
//!
//! Usage: `sender [target] [channels] [frequency]`, e.g.
//! `sender 127.0.0.1:8000 2 440`.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use netreceive::{codec::ByteOrder, codec::RawEncoder, constants::*};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let target: SocketAddr = args
        .next()
        .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_PORT))
        .parse()
        .context("Invalid target address")?;
    let channels: usize = match args.next() {
        Some(c) => c.parse().context("Invalid channel count")?,
        None => 2,
    };
    let frequency: f64 = match args.next() {
        Some(f) => f.parse().context("Invalid frequency")?,
        None => 440.0,
    };
    anyhow::ensure!(
        (1..=MAX_CHANNELS).contains(&channels),
        "Channel count must be within 1..={}",
        MAX_CHANNELS
    );

    let socket = UdpSocket::bind(if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" }).await?;
    let mut encoder = RawEncoder::new(channels, ByteOrder::Little, MAX_PACKET_SIZE);
    let frames_per_packet = encoder.frames_per_datagram();
    let sample_rate = DEFAULT_SAMPLE_RATE as f64;

    tracing::info!(
        "Sending {} Hz tone to {}: {} channel(s), {} frames per datagram",
        frequency,
        target,
        channels,
        frames_per_packet
    );

    let period = Duration::from_secs_f64(frames_per_packet as f64 / sample_rate);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);

    let step = frequency * std::f64::consts::TAU / sample_rate;
    let mut phase = 0.0f64;
    let mut samples = Vec::with_capacity(frames_per_packet * channels);
    let mut packets: u64 = 0;
    let mut bytes_sent: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                samples.clear();
                for _ in 0..frames_per_packet {
                    let value = phase.sin() * 0.5;
                    samples.extend(std::iter::repeat(value).take(channels));
                    phase = (phase + step) % std::f64::consts::TAU;
                }

                let datagram = encoder.encode_interleaved(&samples);
                match socket.send_to(&datagram, target).await {
                    Ok(n) => {
                        packets += 1;
                        bytes_sent += n as u64;
                        if packets % 1000 == 0 {
                            tracing::info!(
                                "Stats: {} packets sent, {:.1} KB sent",
                                packets,
                                bytes_sent as f64 / 1024.0
                            );
                        }
                    }
                    Err(e) => tracing::warn!("Failed to send packet: {}", e),
                }
            }
        }
    }

    tracing::info!("Sent {} packets ({} bytes)", packets, bytes_sent);
    Ok(())
}
