//! End-to-end scenarios over real UDP on the loopback interface

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use netreceive::constants::DEFAULT_PORT;
use netreceive::{HostConfig, HostObject, NetReceive, ReceiverConfig, SessionState};

fn free_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn object(channels: usize, port: u16) -> NetReceive {
    let (mut config, fallbacks) =
        ReceiverConfig::from_args(&[channels.to_string(), "127.0.0.1".into(), port.to_string()]);
    assert!(fallbacks.is_empty());
    config.block_size = 64;
    config.report_interval_ms = 0;
    NetReceive::new(config)
}

fn send(target: SocketAddr, values: &[f64]) {
    let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    send_raw(target, &payload);
}

fn send_raw(target: SocketAddr, payload: &[u8]) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.send_to(payload, target).unwrap();
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn stereo_datagram_renders_in_order() {
    let port = free_port();
    let mut object = object(2, port);
    object.on_configure(HostConfig {
        channels: 2,
        sample_rate: 48_000.0,
        block_size: 4,
    });
    object.on_control(1);
    let target = object.receiver().local_addr().unwrap();
    assert_eq!(target.port(), port);

    send(target, &[1.0, 1.1, 2.0, 2.1, 3.0, 3.1, 4.0, 4.1]);
    assert!(wait_until(|| object.stats().queue_size == 4));

    let mut left = vec![0.0; 4];
    let mut right = vec![0.0; 4];
    object.on_render_block(&mut [&mut left[..], &mut right[..]], 4);

    assert_eq!(left, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(right, vec![1.1, 2.1, 3.1, 4.1]);
    assert_eq!(object.stats().underflows, 0);

    object.on_teardown();
}

#[test]
fn malformed_datagram_is_dropped() {
    let mut object = object(2, 0);
    object.on_control(1);
    let target = object.receiver().local_addr().unwrap();

    send_raw(target, &[0u8; 20]);
    assert!(wait_until(|| object.stats().datagrams_rejected == 1));

    let stats = object.stats();
    assert_eq!(stats.overflows, 0);
    assert_eq!(stats.underflows, 0);
    assert_eq!(stats.queue_size, 0);
    assert!(object.receiver().is_listening());

    // The session keeps going after a bad datagram
    send(target, &[0.5, -0.5]);
    assert!(wait_until(|| object.stats().queue_size == 1));

    object.on_teardown();
}

#[test]
fn oversized_datagram_is_rejected_whole() {
    let mut object = NetReceive::new(ReceiverConfig {
        channels: 1,
        address: "127.0.0.1".into(),
        port: 0,
        block_size: 16,
        max_datagram_size: 64,
        report_interval_ms: 0,
        ..ReceiverConfig::default()
    });
    object.on_control(1);
    let target = object.receiver().local_addr().unwrap();

    send(target, &[0.5; 10]);
    assert!(wait_until(|| object.stats().datagrams_rejected == 1));
    assert_eq!(object.stats().datagrams_received, 0);
    assert_eq!(object.stats().queue_size, 0);

    send(target, &[0.25; 8]);
    assert!(wait_until(|| object.stats().queue_size == 8));

    object.on_teardown();
}

#[test]
fn restart_binds_same_port_again() {
    let port = free_port();
    let mut object = object(1, port);

    object.on_start();
    assert!(object.receiver().is_listening());
    object.on_stop();
    assert_eq!(object.receiver().state(), SessionState::Idle);

    object.on_start();
    assert!(object.receiver().is_listening());
    let target = object.receiver().local_addr().unwrap();
    assert_eq!(target.port(), port);

    send(target, &[0.25, 0.5, 0.75]);
    assert!(wait_until(|| object.stats().queue_size == 3));

    let mut out = vec![0.0; 3];
    object.on_render_block(&mut [&mut out[..]], 3);
    assert_eq!(out, vec![0.25, 0.5, 0.75]);

    object.on_teardown();
}

#[test]
fn overflow_rejects_newest_frames() {
    let mut object = NetReceive::new(ReceiverConfig {
        channels: 1,
        address: "127.0.0.1".into(),
        port: 0,
        block_size: 2,
        buffer_blocks: 2,
        report_interval_ms: 0,
        ..ReceiverConfig::default()
    });
    object.on_control(1);
    let target = object.receiver().local_addr().unwrap();

    send(target, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert!(wait_until(|| object.stats().datagrams_received == 1));

    let stats = object.stats();
    assert_eq!(stats.queue_size, 4);
    assert_eq!(stats.overflows, 2);

    let mut out = vec![0.0; 4];
    object.on_render_block(&mut [&mut out[..]], 4);
    assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);

    object.on_teardown();
}

#[test]
fn bind_conflict_reports_and_stays_idle() {
    let holder = UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = holder.local_addr().unwrap().port();
    let mut object = object(1, port);

    object.on_control(1);

    assert_eq!(object.receiver().state(), SessionState::Idle);
    assert!(object.receiver().local_addr().is_none());

    // Rendering still works and produces silence
    let mut out = vec![1.0; 8];
    object.on_render_block(&mut [&mut out[..]], 8);
    assert!(out.iter().all(|s| *s == 0.0));
}

#[test]
fn defaults_when_arguments_missing() {
    let object = NetReceive::from_args(&["0"]);

    assert_eq!(object.channels(), 1);
    assert_eq!(object.config().address, "0.0.0.0");
    assert_eq!(object.config().port, DEFAULT_PORT);
    assert_eq!(object.receiver().state(), SessionState::Idle);
}

#[test]
fn split_halves_run_on_separate_threads() {
    let object = object(1, 0);
    let (mut receiver, mut renderer) = object.split();
    receiver.start().unwrap();
    let target = receiver.local_addr().unwrap();

    let audio = std::thread::spawn(move || {
        let mut collected = Vec::new();
        let mut block = vec![0.0; 16];
        let deadline = Instant::now() + Duration::from_secs(5);
        while collected.len() < 64 && Instant::now() < deadline {
            // Slots that underflowed are silent; the stream itself has no zeros
            renderer.render(&mut [&mut block[..]], 16);
            collected.extend(block.iter().copied().filter(|s| *s != 0.0));
            std::thread::sleep(Duration::from_millis(1));
        }
        collected
    });

    let values: Vec<f64> = (1..=64).map(f64::from).collect();
    for chunk in values.chunks(16) {
        send(target, chunk);
        std::thread::sleep(Duration::from_millis(2));
    }

    let collected = audio.join().unwrap();
    receiver.stop();

    assert_eq!(collected, values);
}
