use super::{align_up, CodecError, PrimitiveKind, Type, Value};
use crate::layout::MemoryLayout;

use std::io::Write;

/// Writes values in the byte order and alignment of a target.
pub struct Encoder<W> {
    inner: W,
    layout: MemoryLayout,
    offset: u64,
}

impl<W: Write> Encoder<W> {
    pub fn new(inner: W, layout: MemoryLayout) -> Self {
        Self {
            inner,
            layout,
            offset: 0,
        }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn data(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.inner.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    pub fn pad(&mut self, count: u64) -> Result<(), CodecError> {
        const ZEROS: [u8; 64] = [0; 64];
        let mut left = count;
        while left > 0 {
            let n = left.min(ZEROS.len() as u64) as usize;
            self.data(&ZEROS[..n])?;
            left -= n as u64;
        }
        Ok(())
    }

    /// Pads with zeroes until the offset is a multiple of `to`.
    pub fn align(&mut self, to: u64) -> Result<(), CodecError> {
        self.pad(align_up(self.offset, to) - self.offset)
    }

    /// Writes the low `size` bytes of `bits` in target byte order.
    fn sized(&mut self, bits: u64, size: u64) -> Result<(), CodecError> {
        let n = size as usize;
        if self.layout.is_little_endian() {
            self.data(&bits.to_le_bytes()[..n])
        } else {
            self.data(&bits.to_be_bytes()[8 - n..])
        }
    }

    pub fn bool(&mut self, v: bool) -> Result<(), CodecError> {
        self.primitive(PrimitiveKind::Bool, &Value::Bool(v))
    }

    pub fn u8(&mut self, v: u8) -> Result<(), CodecError> {
        self.data(&[v])
    }

    pub fn i8(&mut self, v: i8) -> Result<(), CodecError> {
        self.data(&v.to_ne_bytes())
    }

    pub fn u16(&mut self, v: u16) -> Result<(), CodecError> {
        self.sized(v.into(), 2)
    }

    pub fn i16(&mut self, v: i16) -> Result<(), CodecError> {
        self.sized(v as u16 as u64, 2)
    }

    pub fn u32(&mut self, v: u32) -> Result<(), CodecError> {
        self.sized(v.into(), 4)
    }

    pub fn i32(&mut self, v: i32) -> Result<(), CodecError> {
        self.sized(v as u32 as u64, 4)
    }

    pub fn u64(&mut self, v: u64) -> Result<(), CodecError> {
        self.sized(v, 8)
    }

    pub fn i64(&mut self, v: i64) -> Result<(), CodecError> {
        self.sized(v as u64, 8)
    }

    pub fn f32(&mut self, v: f32) -> Result<(), CodecError> {
        self.sized(v.to_bits().into(), 4)
    }

    pub fn f64(&mut self, v: f64) -> Result<(), CodecError> {
        self.sized(v.to_bits(), 8)
    }

    /// Writes a pointer-sized address.
    pub fn pointer(&mut self, v: u64) -> Result<(), CodecError> {
        self.primitive(PrimitiveKind::Pointer, &Value::Pointer(v))
    }

    /// Writes a `size_t`.
    pub fn size(&mut self, v: u64) -> Result<(), CodecError> {
        self.primitive(PrimitiveKind::Size, &Value::Unsigned(v))
    }

    /// Writes `s` followed by a null terminator.
    pub fn string(&mut self, s: &str) -> Result<(), CodecError> {
        self.data(s.as_bytes())?;
        self.data(&[0])
    }

    /// Writes a single primitive without aligning first.
    pub fn primitive(&mut self, kind: PrimitiveKind, value: &Value) -> Result<(), CodecError> {
        let size = kind.layout(&self.layout).size;
        let mismatch = || CodecError::TypeMismatch {
            expected: format!("{kind:?}"),
            found: value.describe(),
        };
        let unsupported = CodecError::UnsupportedSize { kind, size };

        match kind {
            PrimitiveKind::F16 => match (value, size) {
                (Value::F16(bits), 2) => self.sized((*bits).into(), 2),
                (Value::F16(_), _) => Err(unsupported),
                _ => Err(mismatch()),
            },
            PrimitiveKind::F32 => match (value, size) {
                (Value::F32(v), 4) => self.f32(*v),
                (Value::F32(_), _) => Err(unsupported),
                _ => Err(mismatch()),
            },
            PrimitiveKind::F64 => match (value, size) {
                (Value::F64(v), 8) => self.f64(*v),
                (Value::F64(_), _) => Err(unsupported),
                _ => Err(mismatch()),
            },
            _ if size == 0 || size > 8 => Err(unsupported),
            PrimitiveKind::Bool => match value {
                Value::Bool(b) => self.sized(*b as u64, size),
                _ => Err(mismatch()),
            },
            _ => {
                let wide: i128 = match value {
                    Value::Signed(v) => (*v).into(),
                    Value::Unsigned(v) | Value::Pointer(v) => (*v).into(),
                    _ => return Err(mismatch()),
                };
                let bits = size * 8;
                let fits = if kind.is_signed() {
                    let min = -(1i128 << (bits - 1));
                    let max = (1i128 << (bits - 1)) - 1;
                    (min..=max).contains(&wide)
                } else {
                    (0..(1i128 << bits)).contains(&wide)
                };
                if !fits {
                    return Err(CodecError::OutOfRange { value: wide, size });
                }
                self.sized(wide as u64, size)
            }
        }
    }

    /// Aligns to `ty` and writes `value` in its C layout.
    pub fn encode_value(&mut self, ty: &Type, value: &Value) -> Result<(), CodecError> {
        self.align(ty.align_of(&self.layout))?;
        self.encode_aligned(ty, value)
    }

    fn encode_aligned(&mut self, ty: &Type, value: &Value) -> Result<(), CodecError> {
        match (ty, value) {
            (Type::Primitive(kind), _) => self.primitive(*kind, value),
            (Type::Array { elem, count }, Value::Array(items)) => {
                if items.len() as u64 != *count {
                    return Err(CodecError::Length {
                        ty: ty.to_string(),
                        expected: *count,
                        actual: items.len() as u64,
                    });
                }
                items
                    .iter()
                    .try_for_each(|item| self.encode_value(elem, item))
            }
            (Type::Struct(st), Value::Struct(items)) => {
                if items.len() != st.fields.len() {
                    return Err(CodecError::Length {
                        ty: ty.to_string(),
                        expected: st.fields.len() as u64,
                        actual: items.len() as u64,
                    });
                }
                let start = self.offset;
                for (field, item) in st.fields.iter().zip(items) {
                    self.encode_value(&field.ty, item)?;
                }
                let size = st.layout(&self.layout).size;
                self.pad(start + size - self.offset)
            }
            _ => Err(CodecError::TypeMismatch {
                expected: ty.to_string(),
                found: value.describe(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StructType;
    use crate::layout::Endian;

    fn encode(layout: MemoryLayout, ty: &Type, v: &Value) -> Vec<u8> {
        let mut e = Encoder::new(Vec::new(), layout);
        e.encode_value(ty, v).unwrap();
        e.into_inner()
    }

    #[test]
    fn test_endianness() {
        let mut big = MemoryLayout::armv7a();
        big.endian = Endian::Big;
        let ty = Type::from(PrimitiveKind::U32);
        let v = Value::Unsigned(0x01020304);
        assert_eq!(encode(MemoryLayout::armv7a(), &ty, &v), vec![4, 3, 2, 1]);
        assert_eq!(encode(big, &ty, &v), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_struct_is_padded() {
        let ty: Type = StructType::new("s")
            .field("a", PrimitiveKind::U8)
            .field("b", PrimitiveKind::S16)
            .into();
        let v = Value::Struct(vec![Value::Unsigned(7), Value::Signed(-2)]);
        assert_eq!(
            encode(MemoryLayout::x86_64(), &ty, &v),
            vec![7, 0, 0xfe, 0xff]
        );
    }

    #[test]
    fn test_range_and_type_checks() {
        let mut e = Encoder::new(Vec::new(), MemoryLayout::x86());
        assert!(matches!(
            e.primitive(PrimitiveKind::U8, &Value::Unsigned(256)),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(matches!(
            e.primitive(PrimitiveKind::S8, &Value::Signed(-129)),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(matches!(
            e.primitive(PrimitiveKind::F32, &Value::Bool(true)),
            Err(CodecError::TypeMismatch { .. })
        ));
        assert!(matches!(
            e.encode_value(
                &Type::array(PrimitiveKind::U8.into(), 2),
                &Value::Array(vec![Value::Unsigned(1)])
            ),
            Err(CodecError::Length { expected: 2, actual: 1, .. })
        ));
        assert_eq!(e.offset(), 0);
    }

    #[test]
    fn test_pointer_follows_layout() {
        let mut e = Encoder::new(Vec::new(), MemoryLayout::x86());
        e.pointer(0x1000).unwrap();
        e.string("hi").unwrap();
        assert_eq!(e.into_inner(), vec![0, 0x10, 0, 0, b'h', b'i', 0]);
    }
}
