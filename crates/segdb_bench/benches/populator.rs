//! Bulk population benchmarks.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segdb_bench::{memory_store, quiet_sink, BENCH_SEED};
use segdb_core::{BulkPopulator, MonitorConfig, PopulatorConfig, StoreStrategy};
use std::time::Duration;

const DEVICES: u64 = 2_000;

/// Benchmark full populator runs across thread counts.
fn bench_populate(c: &mut Criterion) {
    let mut group = c.benchmark_group("populate");
    group.sample_size(10);
    group.throughput(Throughput::Elements(DEVICES));

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let config = PopulatorConfig::new(DEVICES, 10_000)
                    .avg_segments_per_device(20)
                    .num_threads(threads)
                    .seed(BENCH_SEED)
                    .monitor(MonitorConfig::default().interval(Duration::from_secs(60)));
                let report = BulkPopulator::new(memory_store(StoreStrategy::Native), config)
                    .unwrap()
                    .with_sink(quiet_sink())
                    .run()
                    .unwrap();
                assert_eq!(report.devices_inserted, DEVICES);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_populate);
criterion_main!(benches);
