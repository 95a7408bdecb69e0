//! Benchmark utilities.

use rand::rngs::StdRng;
use rand::SeedableRng;
use segdb_core::clock::now_millis;
use segdb_core::monitor::LineSink;
use segdb_core::populator::synthesize_device;
use segdb_core::{open_store, DeviceRecord, KvEngine, PopulatorConfig, SegmentStore, StoreStrategy};
use std::sync::Arc;

/// Seed shared by every benchmark so runs compare like with like.
pub const BENCH_SEED: u64 = 0x5e9d;

/// Opens an empty in-memory store.
pub fn memory_store(strategy: StoreStrategy) -> Arc<dyn SegmentStore> {
    let engine = KvEngine::open_in_memory().expect("in-memory engine");
    open_store(strategy, Arc::new(engine))
}

/// Generates `count` synthetic devices with about `avg_segments` segments each.
pub fn generate_devices(count: u64, avg_segments: u64) -> Vec<DeviceRecord> {
    let mut rng = StdRng::seed_from_u64(BENCH_SEED);
    let config = PopulatorConfig::new(count, 10_000).avg_segments_per_device(avg_segments);
    let now = now_millis();
    (0..count)
        .map(|n| synthesize_device(&mut rng, n, &config, now))
        .collect()
}

/// Opens a store already holding `count` synthetic devices.
pub fn populated_store(
    strategy: StoreStrategy,
    count: u64,
    avg_segments: u64,
) -> (Arc<dyn SegmentStore>, Vec<DeviceRecord>) {
    let store = memory_store(strategy);
    let devices = generate_devices(count, avg_segments);
    for device in &devices {
        store.save_device(device).expect("populate");
    }
    (store, devices)
}

/// A monitor sink that discards every line.
pub fn quiet_sink() -> LineSink {
    Arc::new(|_: &str| {})
}
