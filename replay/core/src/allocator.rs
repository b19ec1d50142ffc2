//! First-fit allocator over a 64-bit address space.

use crate::interval::U64RangeList;
use crate::range::Range;

use hashbrown::HashMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("insufficient contiguous space for {count:#x} bytes aligned to {align:#x}")]
    OutOfSpace { count: u64, align: u64 },

    #[error("no allocation starts at {0:#x}")]
    UnknownAllocation(u64),
}

/// Hands out aligned ranges from a list of free chunks.
///
/// The free list is kept sorted and coalesced. Allocated and free ranges never
/// overlap, and freeing an allocation returns its exact range to the free
/// list.
#[derive(Debug, Clone, Default)]
pub struct BasicAllocator {
    free: U64RangeList,
    allocations: HashMap<u64, u64>,
}

impl BasicAllocator {
    /// Creates an allocator whose free space is `free`.
    pub fn new(free: U64RangeList) -> Self {
        let mut list = U64RangeList::new();
        for r in &free {
            list.merge(*r, true);
        }
        Self {
            free: list,
            allocations: HashMap::new(),
        }
    }

    /// Allocates `count` bytes aligned to `align`.
    ///
    /// Chunks are scanned in ascending address order and the first chunk that
    /// can hold the aligned request is used. An alignment of zero is treated
    /// as one.
    pub fn alloc(&mut self, count: u64, align: u64) -> Result<u64, AllocError> {
        let align = align.max(1);
        let found = self.free.iter().find_map(|chunk| {
            let pad = (align - chunk.base % align) % align;
            let base = chunk.base.checked_add(pad)?;
            let end = base.checked_add(count)?;
            (end <= chunk.end()).then_some(base)
        });
        let Some(base) = found else {
            tracing::debug!(count, align, "allocation failed");
            return Err(AllocError::OutOfSpace { count, align });
        };
        self.free.remove(Range::new(base, count));
        self.allocations.insert(base, count);
        tracing::trace!(base = %crate::Hex(base), count, align, "allocated");
        Ok(base)
    }

    /// Releases the allocation starting at `base`.
    ///
    /// Freeing an address that was never returned by `alloc`, or that was
    /// already freed, fails the same way.
    pub fn free(&mut self, base: u64) -> Result<(), AllocError> {
        let size = self
            .allocations
            .remove(&base)
            .ok_or(AllocError::UnknownAllocation(base))?;
        self.free.merge(Range::new(base, size), true);
        tracing::trace!(base = %crate::Hex(base), size, "freed");
        Ok(())
    }

    pub fn free_list(&self) -> &U64RangeList {
        &self.free
    }

    /// Live allocations sorted by base.
    pub fn alloc_list(&self) -> Vec<Range> {
        let mut list: Vec<_> = self
            .allocations
            .iter()
            .map(|(&base, &size)| Range::new(base, size))
            .collect();
        list.sort_unstable_by_key(|r| r.base);
        list
    }

    /// Marks `rng` as used without recording an allocation for it.
    pub fn reserve(&mut self, rng: Range) {
        self.free.remove(rng);
    }
}

/// Returns the gaps between `used` over `[0, u64::MAX)`.
pub fn invert_memory_ranges(used: &U64RangeList) -> U64RangeList {
    let mut out = Vec::with_capacity(used.len() + 1);
    let mut last = 0;
    for r in used {
        if r.base > last {
            out.push(Range::from_bounds(last, r.base));
        }
        last = last.max(r.end());
    }
    if last < u64::MAX {
        out.push(Range::from_bounds(last, u64::MAX));
    }
    U64RangeList::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(v: &[(u64, u64)]) -> U64RangeList {
        v.iter().map(|&(b, s)| Range::new(b, s)).collect()
    }

    #[test]
    fn ensure_first_fit_with_padding() {
        let mut a = BasicAllocator::new(list(&[(1, 3), (10, 20)]));
        assert_eq!(a.alloc(2, 4), Ok(12));
        assert_eq!(a.free_list(), &list(&[(1, 3), (10, 2), (14, 16)]));
        assert_eq!(a.alloc(2, 0), Ok(1));
    }

    #[test]
    fn ensure_free_coalesces() {
        let mut a = BasicAllocator::new(list(&[(0, 16)]));
        let x = a.alloc(4, 1).unwrap();
        let y = a.alloc(4, 1).unwrap();
        a.free(x).unwrap();
        a.free(y).unwrap();
        assert_eq!(a.free_list(), &list(&[(0, 16)]));
        assert!(a.alloc_list().is_empty());
    }

    #[test]
    fn ensure_double_free_rejected() {
        let mut a = BasicAllocator::new(list(&[(0, 16)]));
        let x = a.alloc(4, 1).unwrap();
        a.free(x).unwrap();
        assert_eq!(a.free(x), Err(AllocError::UnknownAllocation(x)));
    }

    #[test]
    fn ensure_invert() {
        let used = list(&[(0, 4), (8, 2)]);
        assert_eq!(
            invert_memory_ranges(&used),
            list(&[(4, 4), (10, u64::MAX - 10)])
        );
        assert_eq!(invert_memory_ranges(&U64RangeList::new()), list(&[(0, u64::MAX)]));
    }
}
