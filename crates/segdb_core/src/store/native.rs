//! Store strategy that builds engine operations directly.

use crate::clock::now_millis;
use crate::engine::{KvEngine, MapReturn, Operation};
use crate::error::CoreResult;
use crate::model::{DeviceRecord, Segment};
use crate::store::layout::{self, BIN_FINISHED, BIN_SEGMENTS};
use crate::store::{SegmentCounts, SegmentStore};
use std::sync::Arc;

/// Low-level [`SegmentStore`].
#[derive(Debug, Clone)]
pub struct NativeSegmentStore {
    engine: Arc<KvEngine>,
}

impl NativeSegmentStore {
    /// Creates a store over `engine`.
    #[must_use]
    pub fn new(engine: Arc<KvEngine>) -> Self {
        Self { engine }
    }

    /// Returns the ids of the device's active segments, ascending.
    ///
    /// # Errors
    ///
    /// Fails if the engine is closed or the stored record is malformed.
    pub fn get_active_segment_ids(&self, device_id: &str) -> CoreResult<Vec<u64>> {
        let key = self.engine.record_key(device_id);
        let op = Operation::map_get_by_value_range(
            BIN_SEGMENTS,
            layout::active_range(now_millis()),
            MapReturn::Key,
        );
        let mut results = self.engine.read(&key, &[op])?;
        Ok(results.pop().map(|r| r.into_keys()).unwrap_or_default())
    }
}

impl SegmentStore for NativeSegmentStore {
    fn name(&self) -> &'static str {
        "native"
    }

    fn save_device(&self, device: &DeviceRecord) -> CoreResult<()> {
        for segment_id in device.segments.keys() {
            layout::check_segment_id(*segment_id)?;
        }
        let key = self.engine.record_key(&device.id);

        let mut ops = Vec::with_capacity(device.segments.len() + 2);
        ops.push(Operation::put(BIN_FINISHED, device.finished));
        ops.push(Operation::map_clear(BIN_SEGMENTS));
        ops.extend(device.segments.values().map(|segment| {
            Operation::map_put(
                BIN_SEGMENTS,
                segment.segment_id,
                layout::encode_segment(segment),
            )
        }));

        self.engine.operate(&key, &ops)?;
        Ok(())
    }

    fn insert_segment_and_remove_expired(
        &self,
        device_id: &str,
        segment: &Segment,
    ) -> CoreResult<()> {
        layout::check_segment_id(segment.segment_id)?;
        let key = self.engine.record_key(device_id);
        let ops = [
            Operation::map_remove_by_value_range(
                BIN_SEGMENTS,
                layout::expired_range(now_millis()),
            ),
            Operation::map_put(
                BIN_SEGMENTS,
                segment.segment_id,
                layout::encode_segment(segment),
            ),
        ];

        let results = self.engine.operate(&key, &ops)?;
        let pruned = results.first().map_or(0, |r| r.count());
        tracing::debug!(device = device_id, segment = segment.segment_id, pruned, "segment inserted");
        Ok(())
    }

    fn get_active_segments(&self, device_id: &str) -> CoreResult<Vec<Segment>> {
        let key = self.engine.record_key(device_id);
        let op = Operation::map_get_by_value_range(
            BIN_SEGMENTS,
            layout::active_range(now_millis()),
            MapReturn::KeyValue,
        );
        let mut results = self.engine.read(&key, &[op])?;
        let entries = results.pop().map(|r| r.into_entries()).unwrap_or_default();
        layout::decode_entries(entries)
    }

    fn get_count_of_active_and_expired_segments(
        &self,
        device_id: &str,
    ) -> CoreResult<SegmentCounts> {
        let key = self.engine.record_key(device_id);
        let now = now_millis();
        let results = self.engine.read(
            &key,
            &[
                Operation::map_count_by_value_range(BIN_SEGMENTS, layout::active_range(now)),
                Operation::map_count_by_value_range(BIN_SEGMENTS, layout::expired_range(now)),
            ],
        )?;

        Ok(SegmentCounts {
            active: results.first().map_or(0, |r| r.count()),
            expired: results.get(1).map_or(0, |r| r.count()),
        })
    }
}
