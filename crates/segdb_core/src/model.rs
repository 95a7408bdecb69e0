//! Device and segment data model.

use crate::clock::{days_to_millis, now_millis};
use std::collections::BTreeMap;
use std::fmt;

/// How long generated and inserted segments stay active, in days.
pub const DAYS_TO_KEEP_SEGMENTS: i64 = 30;

/// Partner id given to synthetic segments.
pub const DEFAULT_PARTNER_ID: &str = "www.google.com";

/// Largest segment id a store accepts. Map keys are persisted as signed integers.
pub const MAX_SEGMENT_ID: u64 = i64::MAX as u64;

/// Maps a numeric device seed to its UUID-shaped device key.
///
/// The mapping is deterministic and injective: the last group renders `n`
/// in full (twelve hex digits, wider when `n` needs more), so distinct seeds
/// never share a key.
///
/// ```
/// use segdb_core::id_for;
///
/// assert_eq!(id_for(1), "73dacfc7-cd3a-2620-8c43-000000000001");
/// ```
#[must_use]
pub fn id_for(n: u64) -> String {
    format!("73dacfc7-cd3a-{:04x}-8c43-{:012x}", n ^ 0x2621, n)
}

/// One segment membership of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Segment identifier, unique within one device.
    pub segment_id: u64,
    /// Expiry in epoch milliseconds; `None` never expires.
    pub expiry: Option<i64>,
    /// Opaque flags.
    pub flags: i64,
    /// Partner that contributed the membership.
    pub partner_id: String,
}

impl Segment {
    /// Creates a segment.
    pub fn new(
        segment_id: u64,
        expiry: Option<i64>,
        flags: i64,
        partner_id: impl Into<String>,
    ) -> Self {
        Self {
            segment_id,
            expiry,
            flags,
            partner_id: partner_id.into(),
        }
    }

    /// Creates a segment that expires `days` days from now.
    pub fn expiring_in(
        segment_id: u64,
        partner_id: impl Into<String>,
        flags: i64,
        days: i64,
    ) -> Self {
        Self::new(
            segment_id,
            Some(now_millis() + days_to_millis(days)),
            flags,
            partner_id,
        )
    }

    /// Returns whether the segment is active at `now` (epoch millis).
    #[must_use]
    pub fn is_active_at(&self, now: i64) -> bool {
        self.expiry.map_or(true, |expiry| expiry >= now)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment {} (", self.segment_id)?;
        match self.expiry {
            Some(expiry) => write!(f, "expires {expiry}")?,
            None => f.write_str("never expires")?,
        }
        write!(f, ", flags {}, partner {})", self.flags, self.partner_id)
    }
}

/// A device with its completion flag and segment memberships.
///
/// Records are transient: they are built in memory, written to a
/// [`SegmentStore`](crate::store::SegmentStore) and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceRecord {
    /// Device key, usually produced by [`id_for`].
    pub id: String,
    /// Completion flag, independent of the segment data.
    pub finished: bool,
    /// Segment memberships keyed by segment id.
    pub segments: BTreeMap<u64, Segment>,
}

impl DeviceRecord {
    /// Creates an empty, unfinished device record.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            finished: false,
            segments: BTreeMap::new(),
        }
    }

    /// Adds a segment, replacing any earlier entry with the same id.
    pub fn insert_segment(&mut self, segment: Segment) -> Option<Segment> {
        self.segments.insert(segment.segment_id, segment)
    }

    /// Number of segment memberships.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn id_for_is_uuid_shaped() {
        for n in [0, 1, 0x2621, 123_456_789, (1 << 48) - 1] {
            let id = id_for(n);
            assert!(Uuid::parse_str(&id).is_ok(), "{id} is not a UUID");
        }
    }

    #[test]
    fn id_for_known_values() {
        assert_eq!(id_for(0), "73dacfc7-cd3a-2621-8c43-000000000000");
        assert_eq!(id_for(0x2621), "73dacfc7-cd3a-0000-8c43-000000002621");
    }

    #[test]
    fn id_for_keeps_large_seeds_distinct() {
        let a = id_for(1 << 48);
        let b = id_for(0);
        assert_ne!(a, b);
        assert!(a.ends_with("1000000000000"));
    }

    #[test]
    fn reinsertion_overwrites() {
        let mut device = DeviceRecord::new(id_for(1));
        device.insert_segment(Segment::new(7, Some(10), 0, "a.com"));
        let old = device.insert_segment(Segment::new(7, Some(20), 1, "b.com"));
        assert_eq!(old.map(|s| s.partner_id), Some("a.com".to_string()));
        assert_eq!(device.segment_count(), 1);
        assert_eq!(device.segments[&7].expiry, Some(20));
    }

    #[test]
    fn activity_boundaries() {
        let segment = Segment::new(1, Some(1_000), 0, "p");
        assert!(segment.is_active_at(999));
        assert!(segment.is_active_at(1_000));
        assert!(!segment.is_active_at(1_001));
        assert!(Segment::new(1, None, 0, "p").is_active_at(i64::MAX));
    }

    #[test]
    fn expiring_in_is_in_the_future() {
        let segment = Segment::expiring_in(3, "p.com", 1, DAYS_TO_KEEP_SEGMENTS);
        assert!(segment.expiry.unwrap() > now_millis());
        assert_eq!(segment.flags, 1);
    }

    #[test]
    fn display_rendering() {
        assert_eq!(
            Segment::new(7, None, 1, "p.com").to_string(),
            "segment 7 (never expires, flags 1, partner p.com)"
        );
        assert_eq!(
            Segment::new(2, Some(5), 0, "q").to_string(),
            "segment 2 (expires 5, flags 0, partner q)"
        );
    }
}
