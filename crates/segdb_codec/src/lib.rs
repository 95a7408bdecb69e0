//! # SegDB Codec
//!
//! Value model and CBOR encoding for SegDB.
//!
//! This crate provides:
//! - [`Value`], the dynamic value stored in record bins and nested maps
//! - [`Value::cmp_range`], the total order used by value-range operations
//! - [`ValueRange`], a half-open `[begin, end)` interval over that order
//! - CBOR encoding/decoding of values (backed by `ciborium`)
//!
//! ## Range Ordering
//!
//! Value-range operations compare values with a fixed type order:
//!
//! `Bool < Integer < Text < Bytes < Array < Map < Null`
//!
//! Arrays compare element by element, and a strict prefix sorts first.
//! `Null` sorts last, so an array whose leading element is `Null` lies
//! above every bounded range that starts with an integer.
//!
//! ## Usage
//!
//! ```
//! use segdb_codec::{from_cbor, to_cbor, Value, ValueRange};
//!
//! let entry = Value::Array(vec![Value::Integer(1_700_000_000_000), Value::Integer(0)]);
//! let bytes = to_cbor(&entry).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), entry);
//!
//! let active = ValueRange::from(Value::Array(vec![Value::Integer(1_600_000_000_000)]));
//! assert!(active.contains(&entry));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod range;
mod value;

pub use cbor::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use range::ValueRange;
pub use value::Value;
