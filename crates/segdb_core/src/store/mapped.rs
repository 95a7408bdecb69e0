//! Store strategy built on a declarative record mapping.
//!
//! Types describe how they map to bins by implementing [`RecordMapping`];
//! a [`Mapper`] turns those bins into engine writes and back. Nested map
//! bins can be worked on in place through a [`BackedMap`] view, which can
//! batch several mutations into one transaction:
//!
//! ```rust,ignore
//! let mut segments = mapper.backed_map(&device_id, BIN_SEGMENTS);
//! segments.begin_multi();
//! segments.remove_by_value_range(layout::expired_range(now))?;
//! segments.put(7, value)?;
//! segments.end()?;
//! ```

use crate::clock::now_millis;
use crate::engine::{Bin, KvEngine, MapReturn, OpResult, Operation, OrderedMap, Record};
use crate::error::{CoreError, CoreResult};
use crate::model::{DeviceRecord, Segment};
use crate::store::layout::{self, BIN_FINISHED, BIN_SEGMENTS};
use crate::store::{SegmentCounts, SegmentStore};
use segdb_codec::{Value, ValueRange};
use std::sync::Arc;

/// Declares how a type is stored as one engine record.
///
/// `to_bins` must list every bin the type owns: a [`Mapper`] replaces
/// listed map bins wholesale on save.
pub trait RecordMapping: Sized {
    /// The user key the record is stored under.
    fn record_key(&self) -> &str;

    /// Converts the object into named bins.
    ///
    /// # Errors
    ///
    /// Fails if a field cannot be represented.
    fn to_bins(&self) -> CoreResult<Vec<(&'static str, Bin)>>;

    /// Rebuilds the object from a stored record.
    ///
    /// # Errors
    ///
    /// Fails if a bin is missing or has the wrong shape.
    fn from_bins(key: &str, record: &Record) -> CoreResult<Self>;
}

impl RecordMapping for DeviceRecord {
    fn record_key(&self) -> &str {
        &self.id
    }

    fn to_bins(&self) -> CoreResult<Vec<(&'static str, Bin)>> {
        let mut segments = OrderedMap::new();
        for (id, segment) in &self.segments {
            layout::check_segment_id(*id)?;
            segments.insert(*id, layout::encode_segment(segment));
        }
        Ok(vec![
            (BIN_FINISHED, Bin::Scalar(Value::Bool(self.finished))),
            (BIN_SEGMENTS, Bin::Map(segments)),
        ])
    }

    fn from_bins(key: &str, record: &Record) -> CoreResult<Self> {
        let finished = match record.bin(BIN_FINISHED) {
            None => false,
            Some(Bin::Scalar(v)) => v.as_bool().ok_or_else(|| {
                CoreError::invalid_format(format!("{BIN_FINISHED} of {key} is not a bool"))
            })?,
            Some(Bin::Map(_)) => {
                return Err(CoreError::invalid_format(format!(
                    "{BIN_FINISHED} of {key} is a map"
                )))
            }
        };

        let mut device = DeviceRecord::new(key);
        device.finished = finished;
        for (id, value) in record.map(BIN_SEGMENTS)?.into_iter().flatten() {
            device.insert_segment(layout::decode_segment(*id, value)?);
        }
        Ok(device)
    }
}

/// Saves and loads [`RecordMapping`] types.
#[derive(Debug, Clone)]
pub struct Mapper {
    engine: Arc<KvEngine>,
}

impl Mapper {
    /// Creates a mapper over `engine`.
    #[must_use]
    pub fn new(engine: Arc<KvEngine>) -> Self {
        Self { engine }
    }

    /// Writes every bin of `object` in one transaction.
    ///
    /// # Errors
    ///
    /// Fails if the object cannot be mapped or the write is rejected.
    pub fn save<T: RecordMapping>(&self, object: &T) -> CoreResult<()> {
        let key = self.engine.record_key(object.record_key());

        let mut ops = Vec::new();
        for (name, bin) in object.to_bins()? {
            match bin {
                Bin::Scalar(value) => ops.push(Operation::put(name, value)),
                Bin::Map(entries) => {
                    ops.push(Operation::map_clear(name));
                    ops.extend(
                        entries
                            .into_iter()
                            .map(|(k, v)| Operation::map_put(name, k, v)),
                    );
                }
            }
        }

        self.engine.operate(&key, &ops)?;
        Ok(())
    }

    /// Loads the object stored under `user_key`.
    ///
    /// # Errors
    ///
    /// Fails if the stored record does not map back to `T`.
    pub fn load<T: RecordMapping>(&self, user_key: &str) -> CoreResult<Option<T>> {
        let key = self.engine.record_key(user_key);
        self.engine
            .get(&key)?
            .map(|record| T::from_bins(user_key, &record))
            .transpose()
    }

    /// Returns a view of one map bin of the record under `user_key`.
    #[must_use]
    pub fn backed_map(&self, user_key: &str, bin: &'static str) -> BackedMap<'_> {
        BackedMap {
            engine: &self.engine,
            key: self.engine.record_key(user_key),
            bin,
            pending: None,
        }
    }
}

/// A live view of one map bin.
///
/// Mutations run immediately, unless [`BackedMap::begin_multi`] was called,
/// in which case they queue up until [`BackedMap::end`] commits them as one
/// transaction.
#[derive(Debug)]
pub struct BackedMap<'a> {
    engine: &'a KvEngine,
    key: String,
    bin: &'static str,
    pending: Option<Vec<Operation>>,
}

impl BackedMap<'_> {
    /// Starts batching mutations.
    pub fn begin_multi(&mut self) {
        self.pending.get_or_insert_with(Vec::new);
    }

    /// Inserts or replaces one entry.
    ///
    /// # Errors
    ///
    /// Fails if the write is rejected (immediate mode only).
    pub fn put(&mut self, key: u64, value: Value) -> CoreResult<()> {
        self.mutate(Operation::map_put(self.bin, key, value))
    }

    /// Removes entries whose value lies in `range`.
    ///
    /// # Errors
    ///
    /// Fails if the write is rejected (immediate mode only).
    pub fn remove_by_value_range(&mut self, range: ValueRange) -> CoreResult<()> {
        self.mutate(Operation::map_remove_by_value_range(self.bin, range))
    }

    /// Commits the queued mutations as one transaction.
    ///
    /// Calling `end` without a batch is a no-op.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is rejected; nothing is applied.
    pub fn end(&mut self) -> CoreResult<Vec<OpResult>> {
        match self.pending.take() {
            Some(ops) if !ops.is_empty() => self.engine.operate(&self.key, &ops),
            _ => Ok(Vec::new()),
        }
    }

    /// Returns the entries whose value lies in `range`, in key order.
    ///
    /// # Errors
    ///
    /// Fails if the engine is closed or the bin is not a map.
    pub fn get_by_value_range(&self, range: ValueRange) -> CoreResult<Vec<(u64, Value)>> {
        let op = Operation::map_get_by_value_range(self.bin, range, MapReturn::KeyValue);
        let mut results = self.engine.read(&self.key, &[op])?;
        Ok(results.pop().map(OpResult::into_entries).unwrap_or_default())
    }

    /// Counts the entries in each range, all against one consistent view.
    ///
    /// # Errors
    ///
    /// Fails if the engine is closed or the bin is not a map.
    pub fn count_by_value_ranges(&self, ranges: Vec<ValueRange>) -> CoreResult<Vec<usize>> {
        let ops: Vec<_> = ranges
            .into_iter()
            .map(|range| Operation::map_count_by_value_range(self.bin, range))
            .collect();
        Ok(self
            .engine
            .read(&self.key, &ops)?
            .iter()
            .map(OpResult::count)
            .collect())
    }

    fn mutate(&mut self, op: Operation) -> CoreResult<()> {
        match &mut self.pending {
            Some(ops) => ops.push(op),
            None => {
                self.engine.operate(&self.key, &[op])?;
            }
        }
        Ok(())
    }
}

/// Mapping-layer [`SegmentStore`].
#[derive(Debug, Clone)]
pub struct MappedSegmentStore {
    mapper: Mapper,
}

impl MappedSegmentStore {
    /// Creates a store over `engine`.
    #[must_use]
    pub fn new(engine: Arc<KvEngine>) -> Self {
        Self {
            mapper: Mapper::new(engine),
        }
    }

    /// Returns the underlying mapper.
    #[must_use]
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }
}

impl SegmentStore for MappedSegmentStore {
    fn name(&self) -> &'static str {
        "mapper"
    }

    fn save_device(&self, device: &DeviceRecord) -> CoreResult<()> {
        self.mapper.save(device)
    }

    fn insert_segment_and_remove_expired(
        &self,
        device_id: &str,
        segment: &Segment,
    ) -> CoreResult<()> {
        layout::check_segment_id(segment.segment_id)?;
        let mut segments = self.mapper.backed_map(device_id, BIN_SEGMENTS);
        segments.begin_multi();
        segments.remove_by_value_range(layout::expired_range(now_millis()))?;
        segments.put(segment.segment_id, layout::encode_segment(segment))?;
        segments.end()?;
        Ok(())
    }

    fn get_active_segments(&self, device_id: &str) -> CoreResult<Vec<Segment>> {
        let segments = self.mapper.backed_map(device_id, BIN_SEGMENTS);
        layout::decode_entries(segments.get_by_value_range(layout::active_range(now_millis()))?)
    }

    fn get_count_of_active_and_expired_segments(
        &self,
        device_id: &str,
    ) -> CoreResult<SegmentCounts> {
        let now = now_millis();
        let segments = self.mapper.backed_map(device_id, BIN_SEGMENTS);
        let counts = segments
            .count_by_value_ranges(vec![layout::active_range(now), layout::expired_range(now)])?;

        Ok(SegmentCounts {
            active: counts.first().copied().unwrap_or(0),
            expired: counts.get(1).copied().unwrap_or(0),
        })
    }
}
