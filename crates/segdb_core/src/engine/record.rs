//! Records and bins.

use crate::error::{CoreError, CoreResult};
use segdb_codec::Value;
use std::collections::BTreeMap;

/// Ordered nested map stored in a map bin.
pub type OrderedMap = BTreeMap<u64, Value>;

/// A named field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bin {
    /// A single value.
    Scalar(Value),
    /// An ordered map keyed by unsigned integer.
    Map(OrderedMap),
}

/// Bin kind tags in the encoded form.
const KIND_SCALAR: i64 = 0;
const KIND_MAP: i64 = 1;

/// A stored record: a set of named bins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    bins: BTreeMap<String, Bin>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a bin by name.
    #[must_use]
    pub fn bin(&self, name: &str) -> Option<&Bin> {
        self.bins.get(name)
    }

    /// Sets a scalar bin, replacing whatever was there.
    pub fn put(&mut self, name: &str, value: Value) {
        self.bins.insert(name.to_string(), Bin::Scalar(value));
    }

    /// Returns the map stored in `name`, if any.
    ///
    /// # Errors
    ///
    /// Fails if the bin holds a scalar.
    pub fn map(&self, name: &str) -> CoreResult<Option<&OrderedMap>> {
        match self.bins.get(name) {
            None => Ok(None),
            Some(Bin::Map(map)) => Ok(Some(map)),
            Some(Bin::Scalar(_)) => Err(not_a_map(name)),
        }
    }

    /// Returns the map stored in `name`, creating an empty one if missing.
    ///
    /// # Errors
    ///
    /// Fails if the bin holds a scalar.
    pub fn map_mut(&mut self, name: &str) -> CoreResult<&mut OrderedMap> {
        let bin = self
            .bins
            .entry(name.to_string())
            .or_insert_with(|| Bin::Map(OrderedMap::new()));
        match bin {
            Bin::Map(map) => Ok(map),
            Bin::Scalar(_) => Err(not_a_map(name)),
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Returns whether the record has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Converts the record into its encoded value form.
    ///
    /// Each bin becomes `name => [kind, payload]`, where kind `0` is a
    /// scalar and kind `1` an ordered map with integer keys.
    ///
    /// # Errors
    ///
    /// Fails if a map key does not fit in an `i64`.
    pub fn to_value(&self) -> CoreResult<Value> {
        let mut bins = Vec::with_capacity(self.bins.len());
        for (name, bin) in &self.bins {
            let encoded = match bin {
                Bin::Scalar(v) => Value::Array(vec![Value::Integer(KIND_SCALAR), v.clone()]),
                Bin::Map(map) => {
                    let mut entries = Vec::with_capacity(map.len());
                    for (k, v) in map {
                        let key = i64::try_from(*k).map_err(|_| {
                            CoreError::invalid_format(format!("map key {k} exceeds i64 range"))
                        })?;
                        entries.push((Value::Integer(key), v.clone()));
                    }
                    Value::Array(vec![Value::Integer(KIND_MAP), Value::Map(entries)])
                }
            };
            bins.push((Value::Text(name.clone()), encoded));
        }
        Ok(Value::Map(bins))
    }

    /// Rebuilds a record from its encoded value form.
    ///
    /// # Errors
    ///
    /// Fails if the value does not have the shape produced by [`Record::to_value`].
    pub fn from_value(value: &Value) -> CoreResult<Self> {
        let pairs = value
            .as_map()
            .ok_or_else(|| CoreError::invalid_format("record is not a map"))?;

        let mut bins = BTreeMap::new();
        for (name, encoded) in pairs {
            let name = name
                .as_text()
                .ok_or_else(|| CoreError::invalid_format("bin name is not text"))?;
            let parts = encoded
                .as_array()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| CoreError::invalid_format(format!("bin '{name}' is malformed")))?;

            let bin = match parts[0].as_integer() {
                Some(KIND_SCALAR) => Bin::Scalar(parts[1].clone()),
                Some(KIND_MAP) => {
                    let entries = parts[1].as_map().ok_or_else(|| {
                        CoreError::invalid_format(format!("map bin '{name}' holds no map"))
                    })?;
                    let mut map = OrderedMap::new();
                    for (k, v) in entries {
                        let key = k
                            .as_integer()
                            .and_then(|k| u64::try_from(k).ok())
                            .ok_or_else(|| {
                                CoreError::invalid_format(format!("bad key in map bin '{name}'"))
                            })?;
                        map.insert(key, v.clone());
                    }
                    Bin::Map(map)
                }
                _ => {
                    return Err(CoreError::invalid_format(format!(
                        "bin '{name}' has unknown kind"
                    )))
                }
            };
            bins.insert(name.to_string(), bin);
        }

        Ok(Self { bins })
    }
}

fn not_a_map(name: &str) -> CoreError {
    CoreError::invalid_format(format!("bin '{name}' is not a map"))
}
