use super::{read_records, slice_records, strlen_records, valid_records, PoolSliceReader, Record};
use crate::data::{Data, MemoryError};
use crate::interval::U64RangeList;
use crate::range::Range;

use std::sync::Arc;

/// A window over the records of a pool that intersect `range`.
///
/// The records keep their absolute destinations, so the slice can be cut
/// again without rebasing anything.
#[derive(Clone, Debug)]
pub struct PoolSlice {
    range: Range,
    records: Arc<[Record]>,
}

impl PoolSlice {
    pub(crate) fn new(range: Range, records: Vec<Record>) -> Self {
        Self {
            range,
            records: records.into(),
        }
    }

    #[inline]
    pub fn range(&self) -> Range {
        self.range
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, offset: u64, out: &mut [u8]) -> Result<(), MemoryError> {
        read_records(&self.records, self.range, offset, out)
    }

    /// Slices relative to the start of this window.
    pub fn slice(&self, rng: Range) -> Data {
        slice_records(
            &self.records,
            Range::new(self.range.base + rng.base, rng.size),
        )
    }

    pub fn strlen(&self) -> Result<Option<u64>, MemoryError> {
        strlen_records(&self.records, self.range)
    }

    pub fn valid_ranges(&self) -> U64RangeList {
        valid_records(&self.records, self.range)
    }

    pub fn reader(&self) -> PoolSliceReader {
        PoolSliceReader::new(self.clone())
    }
}

/// A pool slice that borrows its records from the pool.
#[derive(Copy, Clone, Debug)]
pub struct TempSlice<'a> {
    range: Range,
    records: &'a [Record],
}

impl<'a> TempSlice<'a> {
    pub(crate) fn new(range: Range, records: &'a [Record]) -> Self {
        Self { range, records }
    }

    #[inline]
    pub fn range(&self) -> Range {
        self.range
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.range.size
    }

    pub fn get(&self, offset: u64, out: &mut [u8]) -> Result<(), MemoryError> {
        read_records(self.records, self.range, offset, out)
    }

    pub fn bytes(&self) -> Result<Vec<u8>, MemoryError> {
        let mut out = vec![0; self.range.size as usize];
        self.get(0, &mut out)?;
        Ok(out)
    }

    pub fn strlen(&self) -> Result<Option<u64>, MemoryError> {
        strlen_records(self.records, self.range)
    }

    pub fn valid_ranges(&self) -> U64RangeList {
        valid_records(self.records, self.range)
    }

    /// Detaches the slice from the pool.
    pub fn to_data(&self) -> Data {
        slice_records(self.records, self.range)
    }
}
