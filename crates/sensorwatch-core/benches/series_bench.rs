//! # Series Benchmarks
//!
//! Performance benchmarks for the sensorwatch-core ingestion path.
//!
//! Run with: `cargo bench -p sensorwatch-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ethers_core::types::Address;
use sensorwatch_core::{
    BlockMeta, BlockNumber, Delivery, DeviceId, DisplayClock, Lifecycle, LogEntry, Normalizer,
    RawEvent, SeriesSnapshot, data_recorded_topic, decode_data_recorded, encode_data_recorded,
};
use std::hint::black_box;

fn make_events(count: usize) -> Vec<(RawEvent, BlockMeta)> {
    (0..count)
        .map(|i| {
            let block = BlockNumber(i as u64);
            let raw = RawEvent::new(
                "device-01",
                (2000 + (i % 1000) as i64).to_string(),
                "6012",
                block,
                0,
            );
            (raw, BlockMeta::new(block, 1_700_000_000 + i as i64))
        })
        .collect()
}

fn make_lifecycle(window: usize) -> Lifecycle {
    let normalizer = Normalizer::new(DeviceId::new("device-01").expect("id"), DisplayClock::utc());
    Lifecycle::new(normalizer, window)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_deliver(c: &mut Criterion) {
    let mut group = c.benchmark_group("deliver");

    for size in [100, 1000, 10000].iter() {
        let events = make_events(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| {
                let mut lifecycle = make_lifecycle(128);
                let (ticket, _) = lifecycle.begin().expect("begin");
                lifecycle.activate(ticket).expect("activate");
                for (raw, block) in events {
                    black_box(lifecycle.deliver(ticket, raw, block));
                }
                black_box(lifecycle.snapshot())
            });
        });
    }

    group.finish();
}

fn bench_dedup_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup_window");
    let events = make_events(2000);

    for window in [16, 128, 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(window), window, |b, &window| {
            b.iter(|| {
                let mut lifecycle = make_lifecycle(window);
                let (ticket, _) = lifecycle.begin().expect("begin");
                lifecycle.activate(ticket).expect("activate");
                // Every event twice: the second pass is all duplicates.
                for (raw, block) in events.iter().chain(events.iter()) {
                    black_box(lifecycle.deliver(ticket, raw, block));
                }
            });
        });
    }

    group.finish();
}

/// Appends while a renderer holds the previously published snapshot, so no
/// append can mutate the series storage in place.
fn bench_append_while_published(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_while_published");

    for size in [1000, 10000, 50000].iter() {
        let mut lifecycle = make_lifecycle(128);
        let (ticket, _) = lifecycle.begin().expect("begin");
        lifecycle.activate(ticket).expect("activate");
        for (raw, block) in make_events(*size) {
            black_box(lifecycle.deliver(ticket, &raw, &block));
        }
        let mut published: SeriesSnapshot = lifecycle.snapshot();
        let mut next = *size as u64;

        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                let block = BlockNumber(next);
                next += 1;
                let raw = RawEvent::new("device-01", "2550", "6012", block, 0);
                let meta = BlockMeta::new(block, 1_700_000_000);
                if let Delivery::Appended(snapshot) = lifecycle.deliver(ticket, &raw, &meta) {
                    published = snapshot;
                }
                black_box(published.len())
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let log = LogEntry {
        address: Address::repeat_byte(0x5f),
        topics: vec![data_recorded_topic()],
        data: encode_data_recorded("device-01", 2550, 6012),
        block_number: BlockNumber(1),
        log_index: 0,
        removed: false,
    };

    c.bench_function("decode_data_recorded", |b| {
        b.iter(|| black_box(decode_data_recorded(&log)));
    });
}

criterion_group!(
    benches,
    bench_deliver,
    bench_dedup_window,
    bench_append_while_published,
    bench_decode
);

criterion_main!(benches);
