//! Segment storage.
//!
//! A [`SegmentStore`] keeps one record per device. Expiry is part of each
//! segment entry's value rather than a TTL, so pruning, active reads and
//! active/expired counts are all value-range operations on one map.
//!
//! Two interchangeable strategies implement the contract over a
//! [`KvEngine`]:
//!
//! - [`NativeSegmentStore`] builds engine operations directly
//! - [`MappedSegmentStore`] goes through the [`RecordMapping`] layer

pub mod layout;
mod mapped;
mod native;

pub use mapped::{BackedMap, MappedSegmentStore, Mapper, RecordMapping};
pub use native::NativeSegmentStore;

use crate::config::StoreStrategy;
use crate::engine::KvEngine;
use crate::error::CoreResult;
use crate::model::{DeviceRecord, Segment};
use std::sync::Arc;

/// Active and expired segment counts of one device, taken at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentCounts {
    /// Entries with expiry `>= now` or no expiry.
    pub active: usize,
    /// Entries with expiry `< now`.
    pub expired: usize,
}

impl SegmentCounts {
    /// Total number of entries.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.active + self.expired
    }
}

/// Durable storage of device segment memberships.
///
/// Implementations are shared by all populator workers, so every method
/// takes `&self`.
pub trait SegmentStore: Send + Sync {
    /// Short strategy name.
    fn name(&self) -> &'static str;

    /// Writes the completion flag and the whole segment map in one
    /// transaction, replacing whatever map was stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriteFailure`](crate::CoreError::WriteFailure)
    /// if the engine rejects the write; nothing is applied.
    fn save_device(&self, device: &DeviceRecord) -> CoreResult<()>;

    /// Removes every entry that expired before now, then upserts `segment`,
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriteFailure`](crate::CoreError::WriteFailure)
    /// if the engine rejects the write; nothing is applied.
    fn insert_segment_and_remove_expired(&self, device_id: &str, segment: &Segment)
        -> CoreResult<()>;

    /// Returns the active segments of a device in ascending segment id order.
    ///
    /// An unknown device has no segments.
    ///
    /// # Errors
    ///
    /// Fails if the stored record is malformed or the engine is closed.
    fn get_active_segments(&self, device_id: &str) -> CoreResult<Vec<Segment>>;

    /// Counts active and expired segments under one consistent view.
    ///
    /// # Errors
    ///
    /// Fails if the stored record is malformed or the engine is closed.
    fn get_count_of_active_and_expired_segments(&self, device_id: &str)
        -> CoreResult<SegmentCounts>;
}

/// Opens the store implementation selected by `strategy`.
#[must_use]
pub fn open_store(strategy: StoreStrategy, engine: Arc<KvEngine>) -> Arc<dyn SegmentStore> {
    match strategy {
        StoreStrategy::Native => Arc::new(NativeSegmentStore::new(engine)),
        StoreStrategy::Mapper => Arc::new(MappedSegmentStore::new(engine)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_selects_strategy() {
        let engine = Arc::new(KvEngine::open_in_memory().unwrap());
        assert_eq!(open_store(StoreStrategy::Native, engine.clone()).name(), "native");
        assert_eq!(open_store(StoreStrategy::Mapper, engine).name(), "mapper");
    }

    #[test]
    fn counts_total() {
        let counts = SegmentCounts {
            active: 3,
            expired: 2,
        };
        assert_eq!(counts.total(), 5);
    }
}
