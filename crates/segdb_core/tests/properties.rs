//! Property tests for key derivation, partitioning and expiry ranges.

use proptest::prelude::*;
use segdb_core::populator::partition;
use segdb_core::{id_for, open_store, DeviceRecord, KvEngine, Segment, StoreStrategy};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Far enough from now that no expiry below crosses it during a test case.
const HOUR: i64 = 60 * 60 * 1000;

proptest! {
    #[test]
    fn id_for_is_injective(a in any::<u64>(), b in any::<u64>()) {
        prop_assert_eq!(id_for(a) == id_for(b), a == b);
        prop_assert_eq!(id_for(a), id_for(a));
    }

    #[test]
    fn partition_covers_space_exactly_once(devices in 0u64..10_000, threads in 1usize..64) {
        let ranges = partition(devices, threads);
        prop_assert_eq!(ranges.len(), threads);

        let mut next = 0;
        for range in &ranges {
            prop_assert_eq!(range.start, next);
            prop_assert!(range.end >= range.start);
            next = range.end;
        }
        prop_assert_eq!(next, devices);

        let sizes: Vec<u64> = ranges.iter().map(|r| r.end - r.start).collect();
        let min = sizes.iter().min().copied().unwrap_or(0);
        let max = sizes.iter().max().copied().unwrap_or(0);
        prop_assert!(max - min <= 1);
    }

    #[test]
    fn active_read_matches_filter(
        entries in prop::collection::btree_map(0u64..500, prop::option::of(-48i64..48), 0..40),
        mapper in any::<bool>(),
    ) {
        let strategy = if mapper { StoreStrategy::Mapper } else { StoreStrategy::Native };
        let engine = Arc::new(KvEngine::open_in_memory().unwrap());
        let store = open_store(strategy, engine);
        let now = segdb_core::clock::now_millis();

        let mut device = DeviceRecord::new(id_for(1));
        let expiries: BTreeMap<u64, Option<i64>> = entries
            .iter()
            .map(|(id, hours)| (*id, hours.map(|h| now + h * HOUR + HOUR / 2)))
            .collect();
        for (id, expiry) in &expiries {
            device.insert_segment(Segment::new(*id, *expiry, 0, "p"));
        }
        store.save_device(&device).unwrap();

        let expected: Vec<u64> = expiries
            .iter()
            .filter(|(_, e)| e.map_or(true, |e| e >= now))
            .map(|(id, _)| *id)
            .collect();
        let actual: Vec<u64> = store
            .get_active_segments(&device.id)
            .unwrap()
            .iter()
            .map(|s| s.segment_id)
            .collect();
        prop_assert_eq!(actual, expected.clone());

        let counts = store.get_count_of_active_and_expired_segments(&device.id).unwrap();
        prop_assert_eq!(counts.active, expected.len());
        prop_assert_eq!(counts.total(), expiries.len());
    }
}
