//! Lazy byte-write log over an unbounded address space.
//!
//! A [`Pool`] never holds a flat image of memory. It keeps the writes made to
//! it as an ordered list of [`Record`]s whose destination ranges never
//! overlap. A new write clips or removes whatever older records it covers, and
//! reads resolve against the records that survive, treating every gap as
//! zeroes.

pub mod reader;
pub mod slice;

use crate::data::{Data, MemoryError};
use crate::interval::U64RangeList;
use crate::range::Range;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use reader::PoolSliceReader;
pub use slice::{PoolSlice, TempSlice};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u32);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One write: `src` was written at `dst.base` and occupies `dst`.
#[derive(Clone, Debug)]
pub struct Record {
    pub dst: Range,
    pub src: Data,
}

#[derive(Clone, Debug, Default)]
pub struct Pool {
    writes: Vec<Record>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `src` at `dst`, masking anything previously written there.
    pub fn write(&mut self, dst: u64, src: Data) {
        let rng = Range::new(dst, src.size());
        if rng.is_empty() {
            return;
        }
        tracing::trace!(dst = %crate::Hex(dst), size = rng.size, "pool write");

        let found = overlapping(&self.writes, rng);
        let mut spliced = Vec::with_capacity(3);

        if let Some(head) = self.writes[found.clone()].first() {
            if head.dst.base < rng.base {
                let keep = Range::new(0, rng.base - head.dst.base);
                spliced.push(Record {
                    dst: Range::new(head.dst.base, keep.size),
                    src: head.src.slice(keep),
                });
            }
        }

        let tail = self.writes[found.clone()]
            .last()
            .filter(|tail| tail.dst.end() > rng.end())
            .map(|tail| {
                let cut = rng.end() - tail.dst.base;
                Record {
                    dst: Range::from_bounds(rng.end(), tail.dst.end()),
                    src: tail.src.slice(Range::new(cut, tail.dst.size - cut)),
                }
            });

        spliced.push(Record { dst: rng, src });
        spliced.extend(tail);
        self.writes.splice(found, spliced);
    }

    pub fn write_bytes(&mut self, dst: u64, bytes: &[u8]) {
        self.write(dst, Data::from(bytes));
    }

    /// Fills `out` with the bytes starting at `addr`.
    pub fn read(&self, addr: u64, out: &mut [u8]) -> Result<(), MemoryError> {
        read_records(&self.writes, Range::new(addr, out.len() as u64), 0, out)
    }

    /// Returns the bytes in `rng` as a `Data`.
    ///
    /// When a single record matches or contains `rng`, its source is reused
    /// directly. Otherwise the result is a lazy slice over the intersecting
    /// records.
    pub fn slice(&self, rng: Range) -> Data {
        slice_records(&self.writes, rng)
    }

    /// Borrowing variant of [`Pool::slice`] that avoids cloning records.
    pub fn temp_slice(&self, rng: Range) -> TempSlice<'_> {
        let found = overlapping(&self.writes, rng);
        TempSlice::new(rng, &self.writes[found])
    }

    /// A view that starts at `addr` and runs to the top of the address space.
    pub fn at(&self, addr: u64) -> Data {
        self.slice(Range::new(addr, u64::MAX - addr))
    }

    /// Counts the bytes from `ptr` up to the first zero byte.
    ///
    /// Returns `None` when no terminator exists before the end of the address
    /// space.
    pub fn strlen(&self, ptr: u64) -> Result<Option<u64>, MemoryError> {
        strlen_records(&self.writes, Range::new(ptr, u64::MAX - ptr))
    }

    /// Every written range, in absolute addresses.
    pub fn valid_ranges(&self) -> U64RangeList {
        let mut list = U64RangeList::new();
        for rec in &self.writes {
            for valid in &rec.src.valid_ranges() {
                list.merge(Range::new(rec.dst.base + valid.base, valid.size), true);
            }
        }
        list
    }

    #[inline]
    pub fn record_count(&self) -> usize {
        self.writes.len()
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.writes
    }
}

/// Indices of the records whose destination overlaps `rng`.
pub(crate) fn overlapping(records: &[Record], rng: Range) -> std::ops::Range<usize> {
    if rng.is_empty() {
        return 0..0;
    }
    let start = records.partition_point(|r| r.dst.end() <= rng.base);
    let end = records.partition_point(|r| r.dst.base < rng.end());
    start..end.max(start)
}

pub(crate) fn slice_records(records: &[Record], rng: Range) -> Data {
    let found = overlapping(records, rng);
    if found.len() == 1 {
        let rec = &records[found.start];
        if rec.dst == rng {
            return rec.src.clone();
        }
        if rec.dst.includes(rng) {
            return rec.src.slice(Range::new(rng.base - rec.dst.base, rng.size));
        }
    }
    Data::Pool(PoolSlice::new(rng, records[found].to_vec()))
}

/// Copies the bytes of `rng`, starting `offset` bytes in, into `out`.
pub(crate) fn read_records(
    records: &[Record],
    rng: Range,
    offset: u64,
    out: &mut [u8],
) -> Result<(), MemoryError> {
    if offset >= rng.size || out.is_empty() {
        return Ok(());
    }
    let count = (rng.size - offset).min(out.len() as u64) as usize;
    let out = &mut out[..count];
    out.fill(0);

    let want = Range::new(rng.base + offset, count as u64);
    for rec in &records[overlapping(records, want)] {
        let isect = rec.dst.intersect(want);
        let at = (isect.base - want.base) as usize;
        rec.src
            .get(isect.base - rec.dst.base, &mut out[at..at + isect.size as usize])?;
    }
    Ok(())
}

pub(crate) fn strlen_records(records: &[Record], rng: Range) -> Result<Option<u64>, MemoryError> {
    let mut pos = rng.base;
    for rec in &records[overlapping(records, rng)] {
        if rec.dst.base > pos {
            // unwritten memory reads as zero
            return Ok(Some(pos - rng.base));
        }
        let visible = rec.dst.intersect(rng);
        let src = rec
            .src
            .slice(Range::new(visible.base - rec.dst.base, visible.size));
        if let Some(n) = src.strlen()? {
            return Ok(Some(visible.base - rng.base + n));
        }
        pos = visible.end();
    }
    if pos < rng.end() {
        Ok(Some(pos - rng.base))
    } else {
        Ok(None)
    }
}

/// Written ranges inside `rng`, relative to `rng.base`.
pub(crate) fn valid_records(records: &[Record], rng: Range) -> U64RangeList {
    let mut list = U64RangeList::new();
    for rec in &records[overlapping(records, rng)] {
        let visible = rec.dst.intersect(rng);
        let local = Range::new(visible.base - rec.dst.base, visible.size);
        for valid in rec.src.valid_ranges().iter().filter(|v| v.overlaps(local)) {
            let part = valid.intersect(local);
            list.merge(
                Range::new(rec.dst.base + part.base - rng.base, part.size),
                true,
            );
        }
    }
    list
}
