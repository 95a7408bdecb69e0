//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A byte store held entirely in memory.
///
/// Used by in-memory engines and by tests that need to inspect or corrupt
/// the raw log.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `data`, as if it had been appended.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.checked_add(len as u64);

        match end {
            Some(end) if end <= size => Ok(data[offset as usize..end as usize].to_vec()),
            _ => Err(StorageError::ReadPastEnd { offset, len, size }),
        }
    }

    fn append(&self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn sync(&self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }

    fn replace(&self, bytes: &[u8]) -> StorageResult<()> {
        *self.data.write() = bytes.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn appends_are_contiguous() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"abc").unwrap(), 0);
        assert_eq!(backend.append(b"de").unwrap(), 3);
        assert_eq!(backend.read_all().unwrap(), b"abcde");
    }

    #[test]
    fn read_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { size: 5, .. })
        ));
        assert!(matches!(
            backend.read_at(u64::MAX, 1),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn truncate_drops_tail() {
        let backend = InMemoryBackend::with_data(b"frame-torn".to_vec());
        backend.truncate(5).unwrap();
        assert_eq!(backend.data(), b"frame");
        assert!(matches!(
            backend.truncate(50),
            Err(StorageError::TruncateBeyondEnd { requested: 50, size: 5 })
        ));
    }

    #[test]
    fn replace_swaps_contents() {
        let backend = InMemoryBackend::with_data(b"old-old-old".to_vec());
        backend.replace(b"new").unwrap();
        assert_eq!(backend.data(), b"new");
        assert_eq!(backend.append(b"!").unwrap(), 3);
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let backend = Arc::new(InMemoryBackend::new());
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let offset = backend.append(&[t; 8]).unwrap();
                        assert_eq!(offset % 8, 0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let data = backend.data();
        assert_eq!(data.len(), 4 * 100 * 8);
        for chunk in data.chunks(8) {
            assert!(chunk.iter().all(|b| *b == chunk[0]));
        }
    }
}
