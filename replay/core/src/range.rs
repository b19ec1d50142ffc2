use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open span of bytes `[base, base + size)` in a pool's address space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub base: u64,
    pub size: u64,
}

impl Range {
    #[inline]
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    /// Builds the range covering `[start, end)`.
    #[inline]
    pub fn from_bounds(start: u64, end: u64) -> Self {
        assert!(start <= end, "range start {start:#x} is past its end {end:#x}");
        Self {
            base: start,
            size: end - start,
        }
    }

    #[inline]
    pub const fn first(&self) -> u64 {
        self.base
    }

    /// Last address inside the range. Meaningless for empty ranges.
    #[inline]
    pub const fn last(&self) -> u64 {
        self.base.wrapping_add(self.size).wrapping_sub(1)
    }

    /// One past the last address. Saturates at the top of the address space so
    /// that "to infinity" ranges handed out by `Pool::at` stay well formed.
    #[inline]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn span(&self) -> std::ops::Range<u64> {
        self.base..self.end()
    }

    /// Grows the range so that it includes `addr`.
    pub fn expand(&mut self, addr: u64) {
        if self.size == 0 {
            self.base = addr;
            self.size = 1;
            return;
        }
        if addr < self.base {
            self.size += self.base - addr;
            self.base = addr;
        }
        if addr >= self.end() {
            self.size = addr - self.base + 1;
        }
    }

    #[inline]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Returns true if `other` lies entirely inside this range.
    #[inline]
    pub fn includes(&self, other: Range) -> bool {
        other.base >= self.base && other.end() <= self.end()
    }

    /// Empty ranges overlap nothing.
    #[inline]
    pub fn overlaps(&self, other: Range) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.base < other.end()
            && other.base < self.end()
    }

    /// Returns the span shared by both ranges.
    ///
    /// # Panics
    ///
    /// Intersecting disjoint ranges is a logic error; check `overlaps` first.
    pub fn intersect(&self, other: Range) -> Range {
        if !self.overlaps(other) {
            panic!("cannot intersect disjoint ranges {self} and {other}");
        }
        let start = self.base.max(other.base);
        let end = self.end().min(other.end());
        Range::from_bounds(start, end)
    }

    /// Intersects with `win` and expresses the result relative to `win.base`.
    pub fn window(&self, win: Range) -> Range {
        let isect = self.intersect(win);
        Range::new(isect.base - win.base, isect.size)
    }

    /// Drops the first `count` bytes of the range.
    pub fn trim_left(&mut self, count: u64) {
        assert!(count <= self.size, "cannot trim {count} bytes from {self}");
        self.base += count;
        self.size -= count;
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, +{:#x})", crate::Hex(self.base), self.size)
    }
}

impl From<std::ops::Range<u64>> for Range {
    fn from(r: std::ops::Range<u64>) -> Self {
        Range::from_bounds(r.start, r.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_expand_grows_both_ways() {
        let mut r = Range::new(10, 2);
        r.expand(15);
        assert_eq!(r, Range::new(10, 6));
        r.expand(4);
        assert_eq!(r, Range::new(4, 12));
        r.expand(8);
        assert_eq!(r, Range::new(4, 12));
    }

    #[test]
    fn ensure_overlap_is_half_open() {
        let a = Range::new(0, 4);
        assert!(a.overlaps(Range::new(3, 1)));
        assert!(!a.overlaps(Range::new(4, 1)));
        assert!(!a.overlaps(Range::new(2, 0)));
        assert!(a.includes(Range::new(1, 3)));
        assert!(!a.includes(Range::new(1, 4)));
    }

    #[test]
    fn ensure_window_rebases() {
        let write = Range::new(8, 8);
        let slice = Range::new(12, 16);
        assert_eq!(write.window(slice), Range::new(0, 4));
        assert_eq!(slice.window(write), Range::new(4, 4));
    }

    #[test]
    #[should_panic]
    fn ensure_disjoint_intersect_panics() {
        Range::new(0, 4).intersect(Range::new(8, 4));
    }

    #[test]
    fn ensure_top_of_space_tolerated() {
        let addr = 0x1000;
        let r = Range::new(addr, u64::MAX - addr);
        assert_eq!(r.end(), u64::MAX);
        assert!(r.contains(u64::MAX - 1));
        assert_eq!(r.intersect(Range::new(0, 0x1004)), Range::new(addr, 4));
    }

    #[test]
    fn ensure_trim_left() {
        let mut r = Range::new(2, 6);
        r.trim_left(2);
        assert_eq!(r, Range::new(4, 4));
    }
}
