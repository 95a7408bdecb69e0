//! Record operations.
//!
//! An engine call takes a list of operations and applies them in order to a
//! single record. Value-range operations select nested map entries by
//! value, using [`Value::cmp_range`] order.

use crate::engine::record::{Bin, Record};
use crate::error::{CoreError, CoreResult};
use segdb_codec::{Value, ValueRange};

/// What a map range read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapReturn {
    /// Key/value pairs in key order.
    KeyValue,
    /// Keys only, in key order.
    Key,
}

/// A single operation on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Set a scalar bin.
    Put {
        /// Bin name.
        bin: String,
        /// New value.
        value: Value,
    },
    /// Read a scalar bin.
    Get {
        /// Bin name.
        bin: String,
    },
    /// Remove every entry of a map bin.
    MapClear {
        /// Bin name.
        bin: String,
    },
    /// Insert or replace one map entry.
    MapPut {
        /// Bin name.
        bin: String,
        /// Entry key.
        key: u64,
        /// Entry value.
        value: Value,
    },
    /// Remove the map entries whose value lies in `range`.
    MapRemoveByValueRange {
        /// Bin name.
        bin: String,
        /// Selected values.
        range: ValueRange,
    },
    /// Read the map entries whose value lies in `range`.
    MapGetByValueRange {
        /// Bin name.
        bin: String,
        /// Selected values.
        range: ValueRange,
        /// Shape of the result.
        returns: MapReturn,
    },
    /// Count the map entries whose value lies in `range`.
    MapCountByValueRange {
        /// Bin name.
        bin: String,
        /// Selected values.
        range: ValueRange,
    },
}

impl Operation {
    /// Builds a [`Operation::Put`].
    pub fn put(bin: &str, value: impl Into<Value>) -> Self {
        Self::Put {
            bin: bin.to_string(),
            value: value.into(),
        }
    }

    /// Builds a [`Operation::Get`].
    pub fn get(bin: &str) -> Self {
        Self::Get {
            bin: bin.to_string(),
        }
    }

    /// Builds a [`Operation::MapClear`].
    pub fn map_clear(bin: &str) -> Self {
        Self::MapClear {
            bin: bin.to_string(),
        }
    }

    /// Builds a [`Operation::MapPut`].
    pub fn map_put(bin: &str, key: u64, value: Value) -> Self {
        Self::MapPut {
            bin: bin.to_string(),
            key,
            value,
        }
    }

    /// Builds a [`Operation::MapRemoveByValueRange`].
    pub fn map_remove_by_value_range(bin: &str, range: ValueRange) -> Self {
        Self::MapRemoveByValueRange {
            bin: bin.to_string(),
            range,
        }
    }

    /// Builds a [`Operation::MapGetByValueRange`].
    pub fn map_get_by_value_range(bin: &str, range: ValueRange, returns: MapReturn) -> Self {
        Self::MapGetByValueRange {
            bin: bin.to_string(),
            range,
            returns,
        }
    }

    /// Builds a [`Operation::MapCountByValueRange`].
    pub fn map_count_by_value_range(bin: &str, range: ValueRange) -> Self {
        Self::MapCountByValueRange {
            bin: bin.to_string(),
            range,
        }
    }

    /// Returns whether this operation modifies the record.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Put { .. }
                | Self::MapClear { .. }
                | Self::MapPut { .. }
                | Self::MapRemoveByValueRange { .. }
        )
    }
}

/// Result of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    /// The operation returns nothing.
    None,
    /// A scalar read; `None` when the bin is missing.
    Value(Option<Value>),
    /// Map entries in key order.
    Entries(Vec<(u64, Value)>),
    /// Map keys in key order.
    Keys(Vec<u64>),
    /// A count of entries (or removed entries).
    Count(usize),
}

impl OpResult {
    /// Returns the count, or `0` for non-count results.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Count(n) => *n,
            _ => 0,
        }
    }

    /// Returns the entries, or an empty list for non-entry results.
    #[must_use]
    pub fn into_entries(self) -> Vec<(u64, Value)> {
        match self {
            Self::Entries(entries) => entries,
            _ => Vec::new(),
        }
    }

    /// Returns the keys, or an empty list for non-key results.
    #[must_use]
    pub fn into_keys(self) -> Vec<u64> {
        match self {
            Self::Keys(keys) => keys,
            _ => Vec::new(),
        }
    }

    /// Returns the scalar value, if any.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => v,
            _ => None,
        }
    }
}

/// Applies one operation to a record that may be modified.
pub(crate) fn apply(record: &mut Record, op: &Operation) -> CoreResult<OpResult> {
    match op {
        Operation::Put { bin, value } => {
            record.put(bin, value.clone());
            Ok(OpResult::None)
        }
        Operation::MapClear { bin } => {
            record.map_mut(bin)?.clear();
            Ok(OpResult::None)
        }
        Operation::MapPut { bin, key, value } => {
            record.map_mut(bin)?.insert(*key, value.clone());
            Ok(OpResult::None)
        }
        Operation::MapRemoveByValueRange { bin, range } => {
            let map = record.map_mut(bin)?;
            let before = map.len();
            map.retain(|_, v| !range.contains(v));
            Ok(OpResult::Count(before - map.len()))
        }
        read => evaluate(record, read),
    }
}

/// Evaluates a read-only operation.
pub(crate) fn evaluate(record: &Record, op: &Operation) -> CoreResult<OpResult> {
    match op {
        Operation::Get { bin } => match record.bin(bin) {
            None => Ok(OpResult::Value(None)),
            Some(Bin::Scalar(v)) => Ok(OpResult::Value(Some(v.clone()))),
            Some(Bin::Map(_)) => Err(CoreError::invalid_format(format!(
                "bin '{bin}' is a map, not a scalar"
            ))),
        },
        Operation::MapGetByValueRange {
            bin,
            range,
            returns,
        } => {
            let selected = record
                .map(bin)?
                .into_iter()
                .flatten()
                .filter(|(_, v)| range.contains(v));
            Ok(match returns {
                MapReturn::KeyValue => {
                    OpResult::Entries(selected.map(|(k, v)| (*k, v.clone())).collect())
                }
                MapReturn::Key => OpResult::Keys(selected.map(|(k, _)| *k).collect()),
            })
        }
        Operation::MapCountByValueRange { bin, range } => {
            let count = record
                .map(bin)?
                .map_or(0, |m| m.values().filter(|v| range.contains(v)).count());
            Ok(OpResult::Count(count))
        }
        write => Err(CoreError::invalid_format(format!(
            "write operation {write:?} in a read-only batch"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: i64) -> Value {
        Value::Array(vec![Value::Integer(n)])
    }

    fn entry(expiry: Option<i64>) -> Value {
        Value::Array(vec![Value::from(expiry), Value::Integer(0), Value::from("p")])
    }

    fn sample() -> Record {
        let mut record = Record::new();
        let map = record.map_mut("segments").unwrap();
        map.insert(5, entry(Some(100)));
        map.insert(1, entry(Some(300)));
        map.insert(3, entry(None));
        map.insert(4, entry(Some(50)));
        record
    }

    #[test]
    fn remove_by_value_range_counts_removed() {
        let mut record = sample();
        let op = Operation::map_remove_by_value_range(
            "segments",
            ValueRange::new(Some(ts(0)), Some(ts(200))),
        );
        assert_eq!(apply(&mut record, &op).unwrap(), OpResult::Count(2));
        let keys: Vec<_> = record.map("segments").unwrap().unwrap().keys().copied().collect();
        assert_eq!(keys, vec![1, 3]);
    }

    #[test]
    fn get_by_value_range_is_key_ordered() {
        let record = sample();
        let op = Operation::map_get_by_value_range(
            "segments",
            ValueRange::from(ts(100)),
            MapReturn::Key,
        );
        assert_eq!(evaluate(&record, &op).unwrap(), OpResult::Keys(vec![1, 3, 5]));
    }

    #[test]
    fn count_on_missing_bin_is_zero() {
        let record = Record::new();
        let op = Operation::map_count_by_value_range("segments", ValueRange::all());
        assert_eq!(evaluate(&record, &op).unwrap(), OpResult::Count(0));
    }

    #[test]
    fn write_rejected_in_read_batch() {
        let record = Record::new();
        assert!(evaluate(&record, &Operation::map_clear("segments")).is_err());
    }

    #[test]
    fn get_scalar() {
        let mut record = Record::new();
        apply(&mut record, &Operation::put("isFinished", true)).unwrap();
        assert_eq!(
            evaluate(&record, &Operation::get("isFinished")).unwrap(),
            OpResult::Value(Some(Value::Bool(true)))
        );
        assert!(evaluate(&sample(), &Operation::get("segments")).is_err());
    }

    #[test]
    fn classification() {
        assert!(Operation::put("a", 1i64).is_write());
        assert!(!Operation::get("a").is_write());
        assert!(!Operation::map_count_by_value_range("a", ValueRange::all()).is_write());
    }
}
