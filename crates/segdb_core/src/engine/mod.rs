//! Embedded ordered key-value engine.
//!
//! Records live in memory, ordered by key, and every committed write is
//! appended to a [`StorageBackend`] log so the engine can be rebuilt by
//! replaying it.
//!
//! # Concurrency
//!
//! Writes are serialized by a single write lock. Each write batch runs
//! against a private copy of the record, and the copy replaces the stored
//! record only after every operation succeeded and the log append went
//! through. Read batches share a read lock, so all operations of one batch
//! observe the same state.

mod log;
mod ops;
mod record;
mod stats;

pub use log::compute_crc32;
pub use ops::{MapReturn, OpResult, Operation};
pub use record::{Bin, OrderedMap, Record};
pub use stats::{EngineStats, StatsSnapshot};

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use log::LogFrame;
use parking_lot::RwLock;
use segdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Name of the log file inside an engine directory.
pub const LOG_FILE_NAME: &str = "records.log";

/// Outcome of [`KvEngine::compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    /// Live records written to the new log.
    pub records: usize,
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
}

/// The key-value engine.
pub struct KvEngine {
    config: EngineConfig,
    backend: Arc<dyn StorageBackend>,
    records: RwLock<BTreeMap<String, Record>>,
    /// Last sequence written; only advanced under the records write lock.
    sequence: AtomicU64,
    is_open: RwLock<bool>,
    stats: EngineStats,
}

impl KvEngine {
    /// Opens an engine over `backend`, replaying its log.
    ///
    /// A torn trailing frame left by an interrupted append is cut off.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChecksumMismatch`] or [`CoreError::Corruption`]
    /// if an intact-looking frame is damaged, or a storage error.
    pub fn open(backend: Arc<dyn StorageBackend>, config: EngineConfig) -> CoreResult<Self> {
        let replay = log::replay(backend.as_ref())?;

        if replay.torn_bytes > 0 {
            tracing::warn!(
                valid_len = replay.valid_len,
                torn_bytes = replay.torn_bytes,
                "dropping torn frame at end of log"
            );
            backend.truncate(replay.valid_len)?;
        }

        let records: BTreeMap<String, Record> = replay
            .records
            .into_iter()
            .map(|(key, (_, record))| (key, record))
            .collect();

        tracing::info!(
            frames = replay.frames,
            records = records.len(),
            "engine opened"
        );

        let stats = EngineStats::new();
        stats.record_replay(replay.frames);

        Ok(Self {
            config,
            backend,
            records: RwLock::new(records),
            sequence: AtomicU64::new(replay.last_sequence),
            is_open: RwLock::new(true),
            stats,
        })
    }

    /// Opens an engine that keeps its log in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`KvEngine::open`].
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(Arc::new(InMemoryBackend::new()), EngineConfig::default())
    }

    /// Opens an engine whose log is [`LOG_FILE_NAME`] inside `dir`.
    ///
    /// The directory is created if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be opened or replayed.
    pub fn open_dir(dir: &Path, config: EngineConfig) -> CoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(&dir.join(LOG_FILE_NAME))?;
        tracing::debug!(path = %backend.path().display(), "opening log");
        Self::open(Arc::new(backend), config)
    }

    /// Builds the full record key for a user key: `namespace/set/user_key`.
    #[must_use]
    pub fn record_key(&self, user_key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.namespace, self.config.set_name, user_key
        )
    }

    /// Applies `ops` to the record at `key` as one atomic transaction.
    ///
    /// A batch without write operations is evaluated as a read. A missing
    /// record is treated as empty and created by the first write.
    ///
    /// # Errors
    ///
    /// - [`CoreError::WriteFailure`] if the engine is closed or the log
    ///   append fails
    /// - [`CoreError::InvalidFormat`] if an operation does not fit the
    ///   record's shape
    ///
    /// On any error nothing is applied.
    pub fn operate(&self, key: &str, ops: &[Operation]) -> CoreResult<Vec<OpResult>> {
        if !ops.iter().any(Operation::is_write) {
            return self.read(key, ops);
        }

        let mut records = self.records.write();
        self.commit(&mut records, key, ops)
            .inspect_err(|_| self.stats.record_failed_write())
    }

    fn commit(
        &self,
        records: &mut BTreeMap<String, Record>,
        key: &str,
        ops: &[Operation],
    ) -> CoreResult<Vec<OpResult>> {
        if !self.is_open() {
            return Err(CoreError::write_failure(key, "engine is closed"));
        }

        let mut working = records.get(key).cloned().unwrap_or_default();
        let results = ops
            .iter()
            .map(|op| ops::apply(&mut working, op))
            .collect::<CoreResult<Vec<_>>>()?;

        let sequence = self.sequence.load(Ordering::Acquire) + 1;
        let frame = LogFrame::for_record(sequence, key, &working)?.encode()?;
        self.append_durably(&frame)
            .map_err(|e| CoreError::write_failure(key, e.to_string()))?;

        self.sequence.store(sequence, Ordering::Release);
        records.insert(key.to_string(), working);
        self.stats.record_write(frame.len() as u64);
        Ok(results)
    }

    /// Appends one frame, cutting the log back if the append or sync fails.
    fn append_durably(&self, frame: &[u8]) -> CoreResult<()> {
        let before = self.backend.size()?;
        let written = self.backend.append(frame).and_then(|_| {
            if self.config.sync_on_commit {
                self.backend.sync()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            if let Err(undo) = self.backend.truncate(before) {
                tracing::warn!(error = %undo, "could not remove partial frame");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Evaluates read-only `ops` against one consistent view of `key`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EngineClosed`] if the engine is closed
    /// - [`CoreError::InvalidFormat`] if a write operation is included or an
    ///   operation does not fit the record's shape
    pub fn read(&self, key: &str, ops: &[Operation]) -> CoreResult<Vec<OpResult>> {
        let records = self.records.read();
        self.ensure_open()?;

        let empty = Record::new();
        let record = records.get(key).unwrap_or(&empty);
        let results = ops
            .iter()
            .map(|op| ops::evaluate(record, op))
            .collect::<CoreResult<Vec<_>>>()?;

        self.stats.record_read();
        Ok(results)
    }

    /// Returns a copy of the record at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineClosed`] if the engine is closed.
    pub fn get(&self, key: &str) -> CoreResult<Option<Record>> {
        let records = self.records.read();
        self.ensure_open()?;
        Ok(records.get(key).cloned())
    }

    /// Returns whether a record exists at `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.records.read().contains_key(key)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns whether the engine holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Rewrites the log so it holds exactly one frame per live record.
    ///
    /// Writers are blocked for the duration. The new log replaces the old
    /// one atomically; if the rewrite fails the old log stays in place and
    /// the engine keeps appending to it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineClosed`] if the engine is closed, or a
    /// storage error.
    pub fn compact(&self) -> CoreResult<CompactionReport> {
        let records = self.records.write();
        self.ensure_open()?;

        let bytes_before = self.backend.size()?;
        let mut buf = Vec::new();
        let mut sequence = 0u64;
        for (key, record) in records.iter() {
            sequence += 1;
            buf.extend_from_slice(&LogFrame::for_record(sequence, key, record)?.encode()?);
        }

        self.backend.replace(&buf)?;
        self.sequence.store(sequence, Ordering::Release);

        let report = CompactionReport {
            records: records.len(),
            bytes_before,
            bytes_after: buf.len() as u64,
        };
        self.stats.record_compaction(report.bytes_after);
        tracing::info!(
            records = report.records,
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            "log compacted"
        );
        Ok(report)
    }

    /// Returns a snapshot of the engine counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Syncs the log and closes the engine. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.backend.sync()?;
        *is_open = false;
        tracing::debug!("engine closed");
        Ok(())
    }

    /// Checks if the engine is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::EngineClosed)
        }
    }
}

impl std::fmt::Debug for KvEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvEngine")
            .field("is_open", &self.is_open())
            .field("records", &self.len())
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Drop for KvEngine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segdb_codec::{Value, ValueRange};
    use segdb_storage::{StorageError, StorageResult};
    use std::sync::atomic::AtomicBool;

    /// Memory backend whose appends can be switched to fail.
    #[derive(Default)]
    struct FlakyBackend {
        inner: InMemoryBackend,
        fail: AtomicBool,
    }

    impl StorageBackend for FlakyBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&self, data: &[u8]) -> StorageResult<u64> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk unplugged")));
            }
            self.inner.append(data)
        }

        fn sync(&self) -> StorageResult<()> {
            self.inner.sync()
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn truncate(&self, new_size: u64) -> StorageResult<()> {
            self.inner.truncate(new_size)
        }

        fn replace(&self, data: &[u8]) -> StorageResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk unplugged")));
            }
            self.inner.replace(data)
        }
    }

    fn entry(expiry: i64) -> Value {
        Value::Array(vec![Value::Integer(expiry), Value::Integer(0), Value::from("p")])
    }

    fn seed(engine: &KvEngine, key: &str) {
        engine
            .operate(
                key,
                &[
                    Operation::put("isFinished", false),
                    Operation::map_put("segments", 1, entry(10)),
                    Operation::map_put("segments", 2, entry(20)),
                ],
            )
            .unwrap();
    }

    #[test]
    fn operate_creates_record() {
        let engine = KvEngine::open_in_memory().unwrap();
        assert!(engine.is_empty());
        seed(&engine, "k");

        assert!(engine.contains_key("k"));
        let counts = engine
            .read(
                "k",
                &[Operation::map_count_by_value_range("segments", ValueRange::all())],
            )
            .unwrap();
        assert_eq!(counts[0].count(), 2);
        assert_eq!(engine.stats().writes, 1);
    }

    #[test]
    fn read_of_missing_key_is_empty() {
        let engine = KvEngine::open_in_memory().unwrap();
        let results = engine
            .read(
                "nope",
                &[
                    Operation::get("isFinished"),
                    Operation::map_get_by_value_range(
                        "segments",
                        ValueRange::all(),
                        MapReturn::KeyValue,
                    ),
                ],
            )
            .unwrap();
        assert_eq!(results[0], OpResult::Value(None));
        assert_eq!(results[1], OpResult::Entries(Vec::new()));
        assert!(!engine.contains_key("nope"));
    }

    #[test]
    fn failed_operation_applies_nothing() {
        let engine = KvEngine::open_in_memory().unwrap();
        seed(&engine, "k");
        let before = engine.get("k").unwrap();

        let err = engine
            .operate(
                "k",
                &[
                    Operation::map_clear("segments"),
                    Operation::map_put("isFinished", 3, Value::Null),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidFormat { .. }));
        assert_eq!(engine.get("k").unwrap(), before);
        assert_eq!(engine.stats().failed_writes, 1);
    }

    #[test]
    fn append_failure_is_write_failure() {
        let backend = Arc::new(FlakyBackend::default());
        let engine = KvEngine::open(backend.clone(), EngineConfig::default()).unwrap();
        seed(&engine, "k");
        let size = backend.size().unwrap();

        backend.fail.store(true, Ordering::SeqCst);
        let err = engine
            .operate("k", &[Operation::map_clear("segments")])
            .unwrap_err();
        assert!(err.is_write_failure());
        assert_eq!(backend.size().unwrap(), size);

        backend.fail.store(false, Ordering::SeqCst);
        let count = engine
            .read(
                "k",
                &[Operation::map_count_by_value_range("segments", ValueRange::all())],
            )
            .unwrap();
        assert_eq!(count[0].count(), 2);
    }

    #[test]
    fn closed_engine_rejects_work() {
        let engine = KvEngine::open_in_memory().unwrap();
        engine.close().unwrap();
        engine.close().unwrap();

        assert!(engine
            .operate("k", &[Operation::put("isFinished", true)])
            .unwrap_err()
            .is_write_failure());
        assert!(matches!(
            engine.read("k", &[Operation::get("isFinished")]),
            Err(CoreError::EngineClosed)
        ));
    }

    #[test]
    fn reopen_replays_log() {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        {
            let engine = KvEngine::open(backend.clone(), EngineConfig::default()).unwrap();
            seed(&engine, "a");
            seed(&engine, "b");
            engine
                .operate("a", &[Operation::map_clear("segments")])
                .unwrap();
        }

        let engine = KvEngine::open(backend, EngineConfig::default()).unwrap();
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.stats().replayed_frames, 3);
        let a = engine.get("a").unwrap().unwrap();
        assert!(a.map("segments").unwrap().unwrap().is_empty());
    }

    #[test]
    fn compact_keeps_latest_state() {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
        let engine = KvEngine::open(backend.clone(), EngineConfig::default()).unwrap();
        for _ in 0..5 {
            seed(&engine, "a");
        }
        let report = engine.compact().unwrap();
        assert_eq!(report.records, 1);
        assert!(report.bytes_after < report.bytes_before);
        seed(&engine, "b");
        drop(engine);

        let engine = KvEngine::open(backend, EngineConfig::default()).unwrap();
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.stats().replayed_frames, 2);
    }

    #[test]
    fn failed_compaction_leaves_log_intact() {
        let backend = Arc::new(FlakyBackend::default());
        let engine = KvEngine::open(backend.clone(), EngineConfig::default()).unwrap();
        seed(&engine, "a");
        seed(&engine, "b");
        let before = backend.inner.data();

        backend.fail.store(true, Ordering::SeqCst);
        assert!(engine.compact().is_err());
        assert_eq!(backend.inner.data(), before);
        assert_eq!(engine.len(), 2);

        backend.fail.store(false, Ordering::SeqCst);
        seed(&engine, "c");
        drop(engine);

        let reopened = KvEngine::open(
            Arc::new(InMemoryBackend::with_data(backend.inner.data())),
            EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(reopened.len(), 3);
        assert!(reopened.contains_key("a"));
        assert!(reopened.contains_key("b"));
    }

    #[test]
    fn record_key_layout() {
        let engine = KvEngine::open_in_memory().unwrap();
        assert_eq!(engine.record_key("abc"), "test/devices/abc");
    }

    #[test]
    fn concurrent_writers_on_distinct_keys() {
        let engine = Arc::new(KvEngine::open_in_memory().unwrap());
        std::thread::scope(|s| {
            for t in 0..4 {
                let engine = &engine;
                s.spawn(move || {
                    for i in 0..50 {
                        seed(engine, &format!("{t}-{i}"));
                    }
                });
            }
        });
        assert_eq!(engine.len(), 200);
        assert_eq!(engine.stats().writes, 200);
    }
}
