use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use netreceive::audio::{channel, AudioFrame, Renderer};
use netreceive::Statistics;

fn bench_push_pop(c: &mut Criterion) {
    let (mut tx, mut rx) = channel::<AudioFrame>(1024);
    let frame = AudioFrame::from_samples(&[0.1, 0.2]);

    c.bench_function("push_pop_stereo_frame", |b| {
        b.iter(|| {
            tx.try_push(black_box(frame));
            black_box(rx.try_pop());
        })
    });
}

fn bench_render_block(c: &mut Criterion) {
    let (mut tx, rx) = channel::<AudioFrame>(8192);
    let stats = Arc::new(Statistics::new(tx.monitor()));
    let mut renderer = Renderer::new(rx, stats);
    let frame = AudioFrame::from_samples(&[0.1, 0.2]);
    let mut left = vec![0.0; 512];
    let mut right = vec![0.0; 512];

    c.bench_function("render_512_stereo", |b| {
        b.iter(|| {
            for _ in 0..512 {
                tx.try_push(frame);
            }
            renderer.render(&mut [&mut left[..], &mut right[..]], 512);
        })
    });

    c.bench_function("render_512_underflow", |b| {
        b.iter(|| renderer.render(&mut [&mut left[..], &mut right[..]], black_box(512)))
    });
}

criterion_group!(benches, bench_push_pop, bench_render_block);
criterion_main!(benches);
