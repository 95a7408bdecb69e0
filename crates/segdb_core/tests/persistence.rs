//! Durability of file-backed engines.

use segdb_core::clock::{days_to_millis, now_millis};
use segdb_core::engine::LOG_FILE_NAME;
use segdb_core::{
    id_for, open_store, CoreError, DeviceRecord, EngineConfig, KvEngine, Segment, StoreStrategy,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use tempfile::tempdir;

fn sample_device(n: u64) -> DeviceRecord {
    let mut device = DeviceRecord::new(id_for(n));
    device.finished = n % 2 == 0;
    device.insert_segment(Segment::new(1, Some(now_millis() + days_to_millis(3)), 0, "a.com"));
    device.insert_segment(Segment::new(2, None, 1, "b.com"));
    device
}

#[test]
fn segments_survive_reopen() {
    let dir = tempdir().unwrap();

    {
        let engine = Arc::new(KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap());
        let store = open_store(StoreStrategy::Native, engine);
        for n in 0..10 {
            store.save_device(&sample_device(n)).unwrap();
        }
    }

    let engine = Arc::new(KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap());
    assert_eq!(engine.len(), 10);
    let store = open_store(StoreStrategy::Mapper, engine);
    let active = store.get_active_segments(&id_for(4)).unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[1].expiry, None);
}

#[test]
fn torn_tail_is_dropped_on_open() {
    let dir = tempdir().unwrap();
    let log = dir.path().join(LOG_FILE_NAME);

    {
        let engine = Arc::new(
            KvEngine::open_dir(dir.path(), EngineConfig::default().sync_on_commit(true)).unwrap(),
        );
        let store = open_store(StoreStrategy::Native, engine);
        store.save_device(&sample_device(1)).unwrap();
        store.save_device(&sample_device(2)).unwrap();
    }
    let intact = fs::metadata(&log).unwrap().len();

    // Half a frame: a plausible length prefix with nothing after it.
    let mut file = OpenOptions::new().append(true).open(&log).unwrap();
    file.write_all(&[200, 0, 0, 0, 1, 2, 3]).unwrap();
    drop(file);

    let engine = KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap();
    assert_eq!(engine.len(), 2);
    drop(engine);
    assert_eq!(fs::metadata(&log).unwrap().len(), intact);
}

#[test]
fn corrupted_frame_fails_open() {
    let dir = tempdir().unwrap();
    let log = dir.path().join(LOG_FILE_NAME);

    {
        let engine = Arc::new(KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap());
        let store = open_store(StoreStrategy::Native, engine);
        store.save_device(&sample_device(1)).unwrap();
        store.save_device(&sample_device(2)).unwrap();
    }

    let mut bytes = fs::read(&log).unwrap();
    bytes[20] ^= 0x55;
    fs::write(&log, &bytes).unwrap();

    let err = KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap_err();
    assert!(
        matches!(err, CoreError::ChecksumMismatch { .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn compaction_shrinks_log_and_keeps_state() {
    let dir = tempdir().unwrap();
    let log = dir.path().join(LOG_FILE_NAME);

    let engine = Arc::new(KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap());
    let store = open_store(StoreStrategy::Native, Arc::clone(&engine));
    for round in 0..5 {
        for n in 0..4 {
            store
                .insert_segment_and_remove_expired(
                    &id_for(n),
                    &Segment::new(round, Some(now_millis() + days_to_millis(1)), 0, "p"),
                )
                .unwrap();
        }
    }
    let before = fs::metadata(&log).unwrap().len();

    let report = engine.compact().unwrap();
    assert_eq!(report.records, 4);
    assert_eq!(report.bytes_before, before);
    assert_eq!(fs::metadata(&log).unwrap().len(), report.bytes_after);
    assert!(report.bytes_after < before);
    drop(store);
    drop(engine);

    let engine = Arc::new(KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap());
    let store = open_store(StoreStrategy::Native, engine);
    for n in 0..4 {
        assert_eq!(store.get_active_segments(&id_for(n)).unwrap().len(), 5);
    }
}

#[test]
fn writes_after_compaction_land_in_new_log() {
    let dir = tempdir().unwrap();
    {
        let engine = Arc::new(KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap());
        let store = open_store(StoreStrategy::Native, Arc::clone(&engine));
        store.save_device(&sample_device(1)).unwrap();
        store.save_device(&sample_device(1)).unwrap();
        engine.compact().unwrap();
        store.save_device(&sample_device(2)).unwrap();
    }

    let engine = KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap();
    assert_eq!(engine.len(), 2);
    assert_eq!(engine.stats().replayed_frames, 2);
}

#[test]
fn failed_compaction_keeps_every_record_on_disk() {
    let dir = tempdir().unwrap();
    let log = dir.path().join(LOG_FILE_NAME);
    {
        let engine = Arc::new(KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap());
        let store = open_store(StoreStrategy::Mapper, Arc::clone(&engine));
        for n in 0..3 {
            store.save_device(&sample_device(n)).unwrap();
        }
        let before = fs::read(&log).unwrap();

        // Occupy the replacement file name so the rewrite cannot be written.
        let mut blocked = log.clone().into_os_string();
        blocked.push(".compact");
        fs::create_dir(&blocked).unwrap();

        assert!(engine.compact().is_err());
        assert_eq!(fs::read(&log).unwrap(), before);
        store.save_device(&sample_device(3)).unwrap();
    }

    let engine = KvEngine::open_dir(dir.path(), EngineConfig::default()).unwrap();
    assert_eq!(engine.len(), 4);
}
