//! Clock Benchmarks
//!
//! Performance benchmarks for vector clock comparison and batch conflict
//! detection.
//!
//! Run with: `cargo bench --bench clock_compare`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use amnesia_sync::clock::{ClockManager, LogicalClock, MAX_DEVICES};
use amnesia_sync::events::{now_millis, EventPayload, HighlightChanges, HighlightUpdate};
use amnesia_sync::{ConflictDetector, SyncEvent};

/// Clock with `devices` entries, counters offset by `skew`
fn make_clock(devices: usize, skew: u64) -> LogicalClock {
    (0..devices)
        .map(|i| (format!("device-{}", i), (i as u64 % 7) + skew))
        .collect()
}

fn make_event(entity: usize, device: &str, vc: LogicalClock, ts: i64) -> SyncEvent {
    SyncEvent::with_timestamp(
        EventPayload::HighlightUpdated(HighlightUpdate {
            id: format!("hl-{}", entity),
            changes: HighlightChanges {
                color: Some("#ffeb3b".to_string()),
                ..Default::default()
            },
        }),
        device,
        "bench-user",
        vc,
        ts,
    )
    .unwrap()
}

/// Benchmark clock comparison and merge across clock sizes
fn bench_clock_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_ops");
    group.measurement_time(Duration::from_secs(5));

    for devices in [2usize, 10, 50, MAX_DEVICES] {
        let a = make_clock(devices, 0);
        let b = ClockManager::increment(&make_clock(devices, 1), "device-0").unwrap();

        group.bench_with_input(BenchmarkId::new("compare", devices), &devices, |bench, _| {
            bench.iter(|| ClockManager::compare(black_box(&a), black_box(&b)))
        });

        group.bench_with_input(BenchmarkId::new("merge", devices), &devices, |bench, _| {
            bench.iter(|| ClockManager::merge(black_box(&a), black_box(&b)))
        });
    }

    group.finish();
}

/// Benchmark detection over batches where every entity conflicts
fn bench_detect_conflicts(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("detect_conflicts");
    group.sample_size(50);

    for entities in [10usize, 100, 1000] {
        let now = now_millis();
        let local: Vec<SyncEvent> = (0..entities)
            .map(|i| make_event(i, "A", [("A", 2), ("B", 1)].into_iter().collect(), now))
            .collect();
        let remote: Vec<SyncEvent> = (0..entities)
            .map(|i| make_event(i, "B", [("A", 1), ("B", 2)].into_iter().collect(), now))
            .collect();

        group.throughput(Throughput::Elements(entities as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(entities),
            &entities,
            |bench, _| {
                let mut detector = ConflictDetector::new();
                bench.iter(|| {
                    let conflicts = runtime
                        .block_on(detector.detect_conflicts(black_box(&local), black_box(&remote)))
                        .unwrap();
                    black_box(conflicts)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_clock_ops, bench_detect_conflicts);
criterion_main!(benches);
