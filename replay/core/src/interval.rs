//! Sorted, non-overlapping lists of ranges.
//!
//! A `U64RangeList` keeps its members ordered by base address and never lets
//! two members overlap. Insertion through [`U64RangeList::merge`] coalesces
//! anything the new range touches, and [`U64RangeList::remove`] carves a span
//! out of whichever members it overlaps, splitting them where needed.

use crate::range::Range;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct U64RangeList(Vec<Range>);

impl U64RangeList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Range] {
        self.0.as_slice()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.0.iter()
    }

    /// Total number of bytes covered by the list.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|r| r.size).sum()
    }

    /// Indices of the members that overlap `span`.
    ///
    /// With `adjacent` set, members that merely touch `span` on either side are
    /// included as well.
    pub fn search(&self, span: Range, adjacent: bool) -> std::ops::Range<usize> {
        let start = self.0.partition_point(|r| {
            if adjacent {
                r.end() < span.base
            } else {
                r.end() <= span.base
            }
        });
        let end = self.0.partition_point(|r| {
            if adjacent {
                r.base <= span.end()
            } else {
                r.base < span.end()
            }
        });
        start..end.max(start)
    }

    /// Adds `span`, coalescing it with every member it overlaps (and every
    /// member it touches when `join_adjacent` is set).
    pub fn merge(&mut self, span: Range, join_adjacent: bool) {
        if span.is_empty() {
            return;
        }
        let found = self.search(span, join_adjacent);
        if found.is_empty() {
            self.0.insert(found.start, span);
            return;
        }
        let first = self.0[found.start];
        let last = self.0[found.end - 1];
        let merged = Range::from_bounds(first.base.min(span.base), last.end().max(span.end()));
        self.0.splice(found, std::iter::once(merged));
    }

    /// Removes `span`, trimming or splitting the members it overlaps.
    pub fn remove(&mut self, span: Range) {
        if span.is_empty() {
            return;
        }
        let found = self.search(span, false);
        if found.is_empty() {
            return;
        }
        let first = self.0[found.start];
        let last = self.0[found.end - 1];
        let mut keep = Vec::with_capacity(2);
        if first.base < span.base {
            keep.push(Range::from_bounds(first.base, span.base));
        }
        if last.end() > span.end() {
            keep.push(Range::from_bounds(span.end(), last.end()));
        }
        self.0.splice(found, keep);
    }

    /// Returns true if `span` lies entirely inside one member.
    pub fn covers(&self, span: Range) -> bool {
        let found = self.search(span, false);
        found.len() == 1 && self.0[found.start].includes(span)
    }
}

impl From<Vec<Range>> for U64RangeList {
    /// Builds a list from arbitrary ranges, sorting and coalescing overlaps.
    fn from(ranges: Vec<Range>) -> Self {
        let mut list = Self::new();
        for r in ranges {
            list.merge(r, false);
        }
        list
    }
}

impl<'a> IntoIterator for &'a U64RangeList {
    type Item = &'a Range;
    type IntoIter = std::slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Range> for U64RangeList {
    fn from_iter<I: IntoIterator<Item = Range>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(v: &[(u64, u64)]) -> U64RangeList {
        U64RangeList(v.iter().map(|&(b, s)| Range::new(b, s)).collect())
    }

    #[test]
    fn test_merge_disjoint_keeps_order() {
        let mut l = U64RangeList::new();
        l.merge(Range::new(10, 2), false);
        l.merge(Range::new(0, 2), false);
        l.merge(Range::new(5, 1), false);
        assert_eq!(l, list(&[(0, 2), (5, 1), (10, 2)]));
    }

    #[test]
    fn test_merge_overlapping_coalesces() {
        let mut l = list(&[(0, 2), (5, 1), (10, 2)]);
        l.merge(Range::new(1, 10), false);
        assert_eq!(l, list(&[(0, 12)]));
    }

    #[test]
    fn test_merge_adjacent_only_when_asked() {
        let mut l = list(&[(0, 2), (4, 2)]);
        l.merge(Range::new(2, 2), false);
        assert_eq!(l, list(&[(0, 2), (2, 2), (4, 2)]));

        let mut l = list(&[(0, 2), (4, 2)]);
        l.merge(Range::new(2, 2), true);
        assert_eq!(l, list(&[(0, 6)]));
    }

    #[test]
    fn test_remove_splits() {
        let mut l = list(&[(0, 10), (20, 10)]);
        l.remove(Range::new(4, 2));
        assert_eq!(l, list(&[(0, 4), (6, 4), (20, 10)]));
        l.remove(Range::new(8, 14));
        assert_eq!(l, list(&[(0, 4), (6, 2), (22, 8)]));
        l.remove(Range::new(40, 4));
        assert_eq!(l, list(&[(0, 4), (6, 2), (22, 8)]));
    }

    #[test]
    fn test_covers() {
        let l = list(&[(0, 4), (4, 4)]);
        assert!(l.covers(Range::new(1, 3)));
        assert!(!l.covers(Range::new(2, 4)));
    }
}
