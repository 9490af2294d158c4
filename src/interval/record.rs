//! Interval records and query windows
//!
//! An [`Interval`] is the unit stored by the index: an identifier, a closed
//! range `[low, high]` over an ordered key domain, and a rank used only to
//! order results.

use std::cmp::Ordering;

use chrono::{DateTime, TimeZone, Utc};

/// An interval tagged with a rank
///
/// Equality is by `id` only. `low <= high` is the caller's responsibility.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval<K> {
    /// Unique identifier
    pub id: String,
    /// Low endpoint (inclusive)
    pub low: K,
    /// High endpoint (inclusive)
    pub high: K,
    /// Secondary ranking value, e.g. a timestamp
    pub rank: u64,
}

impl<K: Ord> Interval<K> {
    pub fn new(id: impl Into<String>, low: K, high: K, rank: u64) -> Self {
        Self {
            id: id.into(),
            low,
            high,
            rank,
        }
    }

    /// Build an interval whose rank is `at` in milliseconds since the epoch.
    /// Instants before the epoch clamp to rank 0.
    pub fn stamped(id: impl Into<String>, low: K, high: K, at: DateTime<Utc>) -> Self {
        let rank = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        Self::new(id, low, high, rank)
    }

    /// The rank read back as a millisecond timestamp
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.rank).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Point-touching intervals overlap.
    pub fn overlaps(&self, other: &Interval<K>) -> bool {
        self.overlaps_range(&other.low, &other.high)
    }

    pub fn overlaps_window(&self, window: &Window<K>) -> bool {
        self.overlaps_range(&window.low, &window.high)
    }

    /// Neither interval's high endpoint lies strictly below the other's low.
    pub fn overlaps_range(&self, low: &K, high: &K) -> bool {
        self.high >= *low && *high >= self.low
    }

    pub fn contains(&self, point: &K) -> bool {
        self.low <= *point && *point <= self.high
    }

    /// Ordering used for ranked output: higher rank first
    pub fn rank_order(&self, other: &Interval<K>) -> Ordering {
        other.rank.cmp(&self.rank)
    }
}

impl<K> PartialEq for Interval<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K> Eq for Interval<K> {}

/// A closed query range `[low, high]`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct Window<K> {
    pub low: K,
    pub high: K,
}

impl<K: Ord> Window<K> {
    pub fn new(low: K, high: K) -> Self {
        Self { low, high }
    }

    pub fn overlaps(&self, interval: &Interval<K>) -> bool {
        interval.overlaps_window(self)
    }
}
