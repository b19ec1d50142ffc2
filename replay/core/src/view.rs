//! Typed views over pool memory.

use crate::codec::{CodecError, Decoder, Encoder, Type, Value};
use crate::data::{Data, MemoryError};
use crate::layout::MemoryLayout;
use crate::pool::PoolId;
use crate::pools::Pools;
use crate::range::Range;

#[derive(thiserror::Error, Debug)]
pub enum ViewError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// An address in a pool together with the type stored there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    pub address: u64,
    pub pool: PoolId,
    pub elem: Type,
}

impl Pointer {
    pub fn new(address: u64, pool: PoolId, elem: Type) -> Self {
        Self {
            address,
            pool,
            elem,
        }
    }

    /// The pointer `n` elements further on.
    pub fn offset(&self, n: u64, layout: &MemoryLayout) -> Pointer {
        Pointer {
            address: self.address + n * self.elem.size_of(layout),
            ..self.clone()
        }
    }

    /// Elements `[start, end)` counted from this pointer.
    pub fn slice(&self, start: u64, end: u64, layout: &MemoryLayout) -> Slice {
        assert!(start <= end, "slice start {start} is past its end {end}");
        let size = self.elem.size_of(layout);
        Slice {
            root: self.address,
            base: self.address + start * size,
            count: end - start,
            pool: self.pool,
            elem: self.elem.clone(),
        }
    }

    pub fn read(&self, pools: &Pools, layout: &MemoryLayout) -> Result<Value, ViewError> {
        let range = Range::new(self.address, self.elem.size_of(layout));
        let data = pools.get(self.pool)?.slice(range);
        decode_one(&data, &self.elem, layout)
    }

    pub fn write(
        &self,
        pools: &mut Pools,
        layout: &MemoryLayout,
        value: &Value,
    ) -> Result<(), ViewError> {
        let mut e = Encoder::new(Vec::new(), *layout);
        e.encode_value(&self.elem, value)?;
        pools.write(self.pool, self.address, Data::from(e.into_inner()))?;
        Ok(())
    }
}

/// A run of `count` elements starting at `base`. `root` is the address the
/// slice was first cut from and survives re-slicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub root: u64,
    pub base: u64,
    pub count: u64,
    pub pool: PoolId,
    pub elem: Type,
}

impl Slice {
    pub fn new(base: u64, count: u64, pool: PoolId, elem: Type) -> Self {
        Self {
            root: base,
            base,
            count,
            pool,
            elem,
        }
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Byte range covered by the slice.
    pub fn range(&self, layout: &MemoryLayout) -> Range {
        Range::new(self.base, self.count * self.elem.size_of(layout))
    }

    /// Cuts elements `[start, end)` out of the slice.
    ///
    /// # Panics
    ///
    /// Panics if the bounds are reversed or exceed the slice.
    pub fn islice(&self, start: u64, end: u64, layout: &MemoryLayout) -> Slice {
        assert!(
            start <= end && end <= self.count,
            "islice [{start}, {end}) out of bounds of {} elements",
            self.count
        );
        Slice {
            root: self.root,
            base: self.base + start * self.elem.size_of(layout),
            count: end - start,
            pool: self.pool,
            elem: self.elem.clone(),
        }
    }

    /// Pointer to element `index`.
    pub fn element(&self, index: u64, layout: &MemoryLayout) -> Pointer {
        assert!(index < self.count, "index {index} out of bounds of {} elements", self.count);
        Pointer::new(
            self.base + index * self.elem.size_of(layout),
            self.pool,
            self.elem.clone(),
        )
    }

    pub fn read(&self, pools: &Pools, layout: &MemoryLayout) -> Result<Vec<Value>, ViewError> {
        let data = pools.get(self.pool)?.slice(self.range(layout));
        let ty = Type::array(self.elem.clone(), self.count);
        match decode_one(&data, &ty, layout)? {
            Value::Array(items) => Ok(items),
            _ => unreachable!(),
        }
    }

    pub fn write(
        &self,
        pools: &mut Pools,
        layout: &MemoryLayout,
        values: &[Value],
    ) -> Result<(), ViewError> {
        let ty = Type::array(self.elem.clone(), self.count);
        let mut e = Encoder::new(Vec::new(), *layout);
        e.encode_value(&ty, &Value::Array(values.to_vec()))?;
        pools.write(self.pool, self.base, Data::from(e.into_inner()))?;
        Ok(())
    }
}

fn decode_one(data: &Data, ty: &Type, layout: &MemoryLayout) -> Result<Value, ViewError> {
    let mut d = Decoder::new(data.reader()?, *layout);
    Ok(d.decode_value(ty)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PrimitiveKind;
    use crate::pools::APPLICATION_POOL;

    #[test]
    fn test_pointer_read_write() {
        let layout = MemoryLayout::x86_64();
        let mut pools = Pools::new();
        let p = Pointer::new(0x100, APPLICATION_POOL, PrimitiveKind::U32.into());
        p.offset(1, &layout)
            .write(&mut pools, &layout, &Value::Unsigned(0xabcd))
            .unwrap();
        assert_eq!(p.read(&pools, &layout).unwrap(), Value::Unsigned(0));
        assert_eq!(
            p.offset(1, &layout).read(&pools, &layout).unwrap(),
            Value::Unsigned(0xabcd)
        );
    }

    #[test]
    fn test_islice_scales_by_element_size() {
        let layout = MemoryLayout::x86();
        let s = Slice::new(0x1000, 8, APPLICATION_POOL, PrimitiveKind::Pointer.into());
        let sub = s.islice(2, 5, &layout);
        assert_eq!(sub.base, 0x1008);
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.root, 0x1000);
        assert_eq!(sub.range(&layout), Range::new(0x1008, 12));
        let wide = s.islice(2, 5, &MemoryLayout::x86_64());
        assert_eq!(wide.base, 0x1010);
    }

    #[test]
    #[should_panic]
    fn test_islice_out_of_bounds() {
        let s = Slice::new(0, 2, APPLICATION_POOL, PrimitiveKind::U8.into());
        s.islice(1, 3, &MemoryLayout::x86());
    }

    #[test]
    fn test_slice_round_trip() {
        let layout = MemoryLayout::armv7a();
        let mut pools = Pools::new();
        let (pool, _) = pools.new_pool();
        let s = Slice::new(0x20, 3, pool, PrimitiveKind::S16.into());
        let values = vec![Value::Signed(-1), Value::Signed(2), Value::Signed(300)];
        s.write(&mut pools, &layout, &values).unwrap();
        assert_eq!(s.read(&pools, &layout).unwrap(), values);
        assert_eq!(
            s.element(2, &layout).read(&pools, &layout).unwrap(),
            Value::Signed(300)
        );
        assert!(matches!(
            s.read(&Pools::new(), &layout),
            Err(ViewError::Memory(MemoryError::PoolNotFound(_)))
        ));
    }
}
