//! Append-only record log.
//!
//! Every committed write appends one frame holding the full new state of a
//! single record:
//!
//! ```text
//! | len u32 | sequence u64 | key_len u16 | key | CBOR record | crc32 |
//! ```
//!
//! All integers are little-endian. `len` counts the whole frame including
//! itself, and the CRC covers every byte before it.

use crate::engine::record::Record;
use crate::error::{CoreError, CoreResult};
use segdb_codec::{from_cbor, to_cbor};
use segdb_storage::StorageBackend;
use std::collections::HashMap;

/// len (4) + sequence (8) + key_len (2)
const HEADER_SIZE: usize = 14;
const CRC_SIZE: usize = 4;

/// One decoded log frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogFrame {
    pub sequence: u64,
    pub key: String,
    pub payload: Vec<u8>,
}

impl LogFrame {
    /// Builds a frame carrying the CBOR form of `record`.
    pub fn for_record(sequence: u64, key: &str, record: &Record) -> CoreResult<Self> {
        Ok(Self {
            sequence,
            key: key.to_string(),
            payload: to_cbor(&record.to_value()?)?,
        })
    }

    /// Decodes the payload back into a record.
    pub fn record(&self) -> CoreResult<Record> {
        Record::from_value(&from_cbor(&self.payload)?)
    }

    /// Serializes the frame.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let key_len = u16::try_from(self.key.len())
            .map_err(|_| CoreError::invalid_format(format!("key too long: {}", self.key)))?;
        let frame_len = HEADER_SIZE + self.key.len() + self.payload.len() + CRC_SIZE;
        let frame_len_u32 = u32::try_from(frame_len)
            .map_err(|_| CoreError::invalid_format("record too large for one frame"))?;

        let mut buf = Vec::with_capacity(frame_len);
        buf.extend_from_slice(&frame_len_u32.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&key_len.to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(&self.payload);

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes the frame at the start of `data`, given its declared length.
    fn decode(data: &[u8]) -> CoreResult<Self> {
        let len = data.len();
        let stored_crc = u32::from_le_bytes([
            data[len - 4],
            data[len - 3],
            data[len - 2],
            data[len - 1],
        ]);
        let computed_crc = compute_crc32(&data[..len - CRC_SIZE]);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let mut seq = [0u8; 8];
        seq.copy_from_slice(&data[4..12]);
        let sequence = u64::from_le_bytes(seq);
        let key_len = u16::from_le_bytes([data[12], data[13]]) as usize;

        let key_end = HEADER_SIZE + key_len;
        if key_end > len - CRC_SIZE {
            return Err(CoreError::corruption("key extends past frame"));
        }
        let key = std::str::from_utf8(&data[HEADER_SIZE..key_end])
            .map_err(|_| CoreError::corruption("key is not UTF-8"))?
            .to_string();

        Ok(Self {
            sequence,
            key,
            payload: data[key_end..len - CRC_SIZE].to_vec(),
        })
    }
}

/// State rebuilt from a log.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    /// Latest state of every key with the sequence that produced it.
    pub records: HashMap<String, (u64, Record)>,
    /// Highest sequence seen, `0` for an empty log.
    pub last_sequence: u64,
    /// Number of intact frames.
    pub frames: u64,
    /// Length of the intact prefix of the log.
    pub valid_len: u64,
    /// Bytes of a torn trailing frame, if any.
    pub torn_bytes: u64,
}

/// Scans the whole log and rebuilds the latest record per key.
///
/// A frame that runs past the end of the log is a torn tail and ends the
/// scan; the caller decides whether to truncate it. A frame whose checksum
/// does not match fails the replay.
pub(crate) fn replay(backend: &dyn StorageBackend) -> CoreResult<Replay> {
    let data = backend.read_all()?;
    let mut replay = Replay::default();
    let mut offset = 0usize;

    while offset < data.len() {
        let remaining = data.len() - offset;
        if remaining < 4 {
            break;
        }
        let frame_len = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;

        if frame_len < HEADER_SIZE + CRC_SIZE {
            return Err(CoreError::corruption(format!(
                "frame at offset {offset} declares length {frame_len}"
            )));
        }
        if frame_len > remaining {
            break;
        }

        let frame = LogFrame::decode(&data[offset..offset + frame_len])?;
        let record = frame.record()?;

        replay.last_sequence = replay.last_sequence.max(frame.sequence);
        match replay.records.get(&frame.key) {
            Some((seq, _)) if *seq > frame.sequence => {}
            _ => {
                replay.records.insert(frame.key, (frame.sequence, record));
            }
        }
        replay.frames += 1;
        offset += frame_len;
    }

    replay.valid_len = offset as u64;
    replay.torn_bytes = (data.len() - offset) as u64;
    Ok(replay)
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = !0u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}
