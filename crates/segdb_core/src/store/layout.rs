//! Persisted device layout.
//!
//! One record per device with two bins:
//!
//! - `isFinished`: boolean
//! - `segments`: ordered map `segment_id -> [expiry_millis | null, flags, partner_id]`
//!
//! Putting the expiry first in the entry value lets active/expired splits be
//! expressed as value ranges over the map: `[[now], +inf)` is active and
//! everything below `[now]` is expired. A null expiry sorts above every
//! integer, so never-expiring entries land in the active range.

use crate::error::{CoreError, CoreResult};
use crate::model::{Segment, MAX_SEGMENT_ID};
use segdb_codec::{Value, ValueRange};

/// Bin holding the completion flag.
pub const BIN_FINISHED: &str = "isFinished";

/// Bin holding the segment map.
pub const BIN_SEGMENTS: &str = "segments";

/// Encodes a segment as its map entry value.
#[must_use]
pub fn encode_segment(segment: &Segment) -> Value {
    Value::Array(vec![
        Value::from(segment.expiry),
        Value::Integer(segment.flags),
        Value::Text(segment.partner_id.clone()),
    ])
}

/// Decodes a map entry back into a segment.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFormat`] if the entry is not a
/// `[expiry | null, flags, partner]` triple.
pub fn decode_segment(segment_id: u64, value: &Value) -> CoreResult<Segment> {
    let malformed = || CoreError::invalid_format(format!("segment {segment_id} entry is malformed"));

    let parts = value.as_array().ok_or_else(malformed)?;
    let [expiry, flags, partner] = parts else {
        return Err(malformed());
    };

    let expiry = if expiry.is_null() {
        None
    } else {
        Some(expiry.as_integer().ok_or_else(malformed)?)
    };
    let flags = flags.as_integer().ok_or_else(malformed)?;
    let partner = partner.as_text().ok_or_else(malformed)?;

    Ok(Segment::new(segment_id, expiry, flags, partner))
}

/// Decodes a list of `(segment_id, entry)` pairs, keeping their order.
///
/// # Errors
///
/// Fails on the first malformed entry.
pub fn decode_entries(entries: Vec<(u64, Value)>) -> CoreResult<Vec<Segment>> {
    entries
        .into_iter()
        .map(|(id, value)| decode_segment(id, &value))
        .collect()
}

/// Rejects segment ids that cannot be stored as map keys.
///
/// # Errors
///
/// Returns [`CoreError::Configuration`] for ids above [`MAX_SEGMENT_ID`].
pub fn check_segment_id(segment_id: u64) -> CoreResult<()> {
    if segment_id > MAX_SEGMENT_ID {
        return Err(CoreError::configuration(format!(
            "segment id {segment_id} exceeds {MAX_SEGMENT_ID}"
        )));
    }
    Ok(())
}

/// Entries active at `now`: expiry `>= now` or absent.
#[must_use]
pub fn active_range(now: i64) -> ValueRange {
    ValueRange::from(Value::Array(vec![Value::Integer(now)]))
}

/// Entries expired at `now`: expiry `< now`.
#[must_use]
pub fn expired_range(now: i64) -> ValueRange {
    ValueRange::below(Value::Array(vec![Value::Integer(now)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_shape() {
        let segment = Segment::new(4, Some(1_000), 1, "p.com");
        assert_eq!(
            encode_segment(&segment),
            Value::Array(vec![
                Value::Integer(1_000),
                Value::Integer(1),
                Value::from("p.com")
            ])
        );
        assert_eq!(decode_segment(4, &encode_segment(&segment)).unwrap(), segment);
    }

    #[test]
    fn absent_expiry_is_null() {
        let segment = Segment::new(4, None, 0, "p");
        let value = encode_segment(&segment);
        assert!(value.as_array().unwrap()[0].is_null());
        assert_eq!(decode_segment(4, &value).unwrap().expiry, None);
    }

    #[test]
    fn ranges_split_at_now() {
        let now = 500;
        let at = |e: Option<i64>| encode_segment(&Segment::new(1, e, 0, "p"));

        assert!(expired_range(now).contains(&at(Some(499))));
        assert!(!expired_range(now).contains(&at(Some(500))));
        assert!(active_range(now).contains(&at(Some(500))));
        assert!(active_range(now).contains(&at(None)));
        assert!(!expired_range(now).contains(&at(None)));
        assert!(expired_range(now).contains(&at(Some(-5))));
    }

    #[test]
    fn malformed_entries() {
        assert!(decode_segment(1, &Value::Integer(3)).is_err());
        assert!(decode_segment(1, &Value::Array(vec![Value::Null, Value::Integer(0)])).is_err());
        let bad_partner = Value::Array(vec![Value::Null, Value::Integer(0), Value::Integer(9)]);
        assert!(decode_segment(1, &bad_partner).is_err());
    }

    #[test]
    fn segment_id_bound() {
        assert!(check_segment_id(0).is_ok());
        assert!(check_segment_id(MAX_SEGMENT_ID).is_ok());
        assert!(matches!(
            check_segment_id(MAX_SEGMENT_ID + 1),
            Err(CoreError::Configuration { .. })
        ));
    }
}
