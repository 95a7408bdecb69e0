//! CBOR encoding of [`Value`]s.
//!
//! Encoding goes through `ciborium`'s dynamic value so the wire format is
//! plain RFC 8949 CBOR. Map entries keep their insertion order; callers that
//! need deterministic bytes build maps in a fixed order.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::{Integer, Value as Cbor};

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(&to_wire(value), &mut buf)
        .map_err(|e| CodecError::encoding_failed(format!("{e:?}")))?;
    Ok(buf)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or contain constructs
/// outside the value model (floats, integers beyond `i64`).
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let wire: Cbor =
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(format!("{e:?}")))?;
    from_wire(wire)
}

fn to_wire(value: &Value) -> Cbor {
    match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Integer(n) => Cbor::Integer(Integer::from(*n)),
        Value::Bytes(b) => Cbor::Bytes(b.clone()),
        Value::Text(s) => Cbor::Text(s.clone()),
        Value::Array(items) => Cbor::Array(items.iter().map(to_wire).collect()),
        Value::Map(pairs) => Cbor::Map(
            pairs
                .iter()
                .map(|(k, v)| (to_wire(k), to_wire(v)))
                .collect(),
        ),
    }
}

fn from_wire(wire: Cbor) -> CodecResult<Value> {
    Ok(match wire {
        Cbor::Null => Value::Null,
        Cbor::Bool(b) => Value::Bool(b),
        Cbor::Integer(n) => {
            Value::Integer(i64::try_from(n).map_err(|_| CodecError::IntegerOverflow)?)
        }
        Cbor::Bytes(b) => Value::Bytes(b),
        Cbor::Text(s) => Value::Text(s),
        Cbor::Array(items) => Value::Array(
            items
                .into_iter()
                .map(from_wire)
                .collect::<CodecResult<_>>()?,
        ),
        Cbor::Map(pairs) => Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| Ok((from_wire(k)?, from_wire(v)?)))
                .collect::<CodecResult<_>>()?,
        ),
        // Tags carry no meaning for SegDB; keep the tagged payload.
        Cbor::Tag(_, inner) => from_wire(*inner)?,
        Cbor::Float(_) => return Err(CodecError::FloatForbidden),
        _ => return Err(CodecError::unsupported_type("unknown CBOR item")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_integer_uses_single_byte() {
        assert_eq!(to_cbor(&Value::Integer(7)).unwrap(), vec![0x07]);
        assert_eq!(to_cbor(&Value::Null).unwrap(), vec![0xf6]);
    }

    #[test]
    fn reject_float() {
        // 1.5 as a double-precision float
        let bytes = [0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0];
        assert_eq!(from_cbor(&bytes), Err(CodecError::FloatForbidden));
    }

    #[test]
    fn reject_integer_beyond_i64() {
        // u64::MAX
        let bytes = [0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(from_cbor(&bytes), Err(CodecError::IntegerOverflow));
    }

    #[test]
    fn truncated_input_fails() {
        assert!(matches!(
            from_cbor(&[0x82, 0x01]),
            Err(CodecError::DecodingFailed { .. })
        ));
    }

    #[test]
    fn map_preserves_entry_order() {
        let map = Value::Map(vec![
            (Value::Integer(9), Value::Null),
            (Value::Integer(2), Value::Null),
        ]);
        assert_eq!(from_cbor(&to_cbor(&map).unwrap()).unwrap(), map);
    }

    proptest! {
        #[test]
        fn segment_entries_decode_to_themselves(
            expiry in proptest::option::of(any::<i64>()),
            flags in any::<i64>(),
            partner in "[a-z.]{0,24}",
        ) {
            let value = Value::Array(vec![
                Value::from(expiry),
                Value::Integer(flags),
                Value::Text(partner),
            ]);
            prop_assert_eq!(from_cbor(&to_cbor(&value).unwrap()).unwrap(), value);
        }
    }
}
