//! Criterion benchmarks for the echo suppression window.
//!
//! Every frame sent on the link is recorded and every same-origin frame
//! received is checked, so both operations sit on the forwarding hot path
//! when suppression is enabled.
//!
//! Run with:
//! ```bash
//! cargo bench --package tapbridge-core --bench echo_bench
//! ```

use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tapbridge_core::EchoSuppressor;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_frame(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_add(seed)).collect()
}

fn full_window(window: usize, len: usize, now: Instant) -> EchoSuppressor {
    let mut echo = EchoSuppressor::new(window, Duration::from_secs(60));
    for seed in 0..window {
        echo.record_at(&make_frame(len, seed as u8), now);
    }
    echo
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("echo_record");
    for len in [64usize, 1500, 9000] {
        let frame = make_frame(len, 0);
        group.bench_with_input(BenchmarkId::from_parameter(len), &frame, |b, frame| {
            let now = Instant::now();
            let mut echo = full_window(64, len, now);
            b.iter(|| echo.record_at(black_box(frame), now));
        });
    }
    group.finish();
}

fn bench_miss(c: &mut Criterion) {
    // A genuine frame that matches nothing scans the whole window.
    let mut group = c.benchmark_group("echo_miss");
    for len in [64usize, 1500, 9000] {
        let frame = make_frame(len, 0xff);
        group.bench_with_input(BenchmarkId::from_parameter(len), &frame, |b, frame| {
            let now = Instant::now();
            let mut echo = full_window(64, len, now);
            b.iter(|| black_box(echo.take_echo_at(black_box(frame), now)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_record, bench_miss);
criterion_main!(benches);
