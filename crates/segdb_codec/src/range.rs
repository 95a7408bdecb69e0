//! Half-open value ranges.

use crate::value::Value;
use std::cmp::Ordering;

/// A half-open interval `[begin, end)` in [`Value::cmp_range`] order.
///
/// A missing bound is unbounded on that side, so `ValueRange::all()`
/// contains every value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueRange {
    /// Inclusive lower bound.
    pub begin: Option<Value>,
    /// Exclusive upper bound.
    pub end: Option<Value>,
}

impl ValueRange {
    /// Creates a range from optional bounds.
    pub fn new(begin: Option<Value>, end: Option<Value>) -> Self {
        Self { begin, end }
    }

    /// The unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    /// Range of values strictly below `end`.
    pub fn below(end: Value) -> Self {
        Self {
            begin: None,
            end: Some(end),
        }
    }

    /// Returns whether `value` lies in this range.
    pub fn contains(&self, value: &Value) -> bool {
        let above_begin = self
            .begin
            .as_ref()
            .map_or(true, |b| value.cmp_range(b) != Ordering::Less);
        let below_end = self
            .end
            .as_ref()
            .map_or(true, |e| value.cmp_range(e) == Ordering::Less);
        above_begin && below_end
    }
}

impl From<Value> for ValueRange {
    /// `[begin, +inf)`.
    fn from(begin: Value) -> Self {
        Self {
            begin: Some(begin),
            end: None,
        }
    }
}
