use crate::allocator::{AllocError, BasicAllocator};
use crate::api::ApiRegistry;
use crate::data::Data;
use crate::interval::U64RangeList;
use crate::layout::MemoryLayout;
use crate::pools::Pools;
use crate::range::Range;

use std::sync::Arc;

/// Addresses below this are never handed out.
pub const NULL_PAGE_SIZE: u64 = 0x1000;

/// Everything a command can observe or change while it is replayed.
#[derive(Debug, Clone)]
pub struct GlobalState {
    pub pools: Pools,
    pub layout: MemoryLayout,
    pub allocator: BasicAllocator,
    pub apis: Arc<ApiRegistry>,
}

impl GlobalState {
    pub fn new(layout: MemoryLayout, apis: Arc<ApiRegistry>) -> Self {
        let mut free = U64RangeList::new();
        free.merge(Range::from_bounds(NULL_PAGE_SIZE, u64::MAX), false);
        Self {
            pools: Pools::new(),
            layout,
            allocator: BasicAllocator::new(free),
            apis,
        }
    }

    /// Allocates room for `data` in the application pool and writes it there.
    pub fn alloc_data(&mut self, data: Data, align: u64) -> Result<u64, AllocError> {
        let base = self.allocator.alloc(data.size(), align)?;
        self.pools.application_mut().write(base, data);
        Ok(base)
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new(MemoryLayout::default(), Arc::new(ApiRegistry::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_data_skips_null_page() {
        let mut state = GlobalState::default();
        let a = state.alloc_data(Data::from_bytes(b"abc".to_vec()), 16).unwrap();
        assert_eq!(a, NULL_PAGE_SIZE);
        let b = state.alloc_data(Data::from_bytes(b"d".to_vec()), 16).unwrap();
        assert_eq!(b, NULL_PAGE_SIZE + 16);
        assert_eq!(state.pools.application().strlen(a).unwrap(), Some(3));
    }
}
