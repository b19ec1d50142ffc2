use super::{align_up, CodecError, PrimitiveKind, Type, Value};
use crate::layout::MemoryLayout;

use std::io::Read;

/// Reads values written by an [`Encoder`](super::Encoder) for the same
/// layout.
pub struct Decoder<R> {
    inner: R,
    layout: MemoryLayout,
    offset: u64,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R, layout: MemoryLayout) -> Self {
        Self {
            inner,
            layout,
            offset: 0,
        }
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn data(&mut self, out: &mut [u8]) -> Result<(), CodecError> {
        self.inner.read_exact(out)?;
        self.offset += out.len() as u64;
        Ok(())
    }

    pub fn skip(&mut self, count: u64) -> Result<(), CodecError> {
        let skipped = std::io::copy(&mut (&mut self.inner).take(count), &mut std::io::sink())?;
        self.offset += skipped;
        if skipped != count {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }

    /// Skips bytes until the offset is a multiple of `to`.
    pub fn align(&mut self, to: u64) -> Result<(), CodecError> {
        self.skip(align_up(self.offset, to) - self.offset)
    }

    fn sized(&mut self, size: u64) -> Result<u64, CodecError> {
        let n = size as usize;
        let mut buf = [0u8; 8];
        if self.layout.is_little_endian() {
            self.data(&mut buf[..n])?;
            Ok(u64::from_le_bytes(buf))
        } else {
            self.data(&mut buf[8 - n..])?;
            Ok(u64::from_be_bytes(buf))
        }
    }

    fn signed(&mut self, size: u64) -> Result<i64, CodecError> {
        let shift = 64 - size as u32 * 8;
        Ok(((self.sized(size)? << shift) as i64) >> shift)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.sized(1)? as u8)
    }

    pub fn i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.signed(1)? as i8)
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(self.sized(2)? as u16)
    }

    pub fn i16(&mut self) -> Result<i16, CodecError> {
        Ok(self.signed(2)? as i16)
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(self.sized(4)? as u32)
    }

    pub fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(self.signed(4)? as i32)
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        self.sized(8)
    }

    pub fn i64(&mut self) -> Result<i64, CodecError> {
        self.signed(8)
    }

    pub fn f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_bits(self.u32()?))
    }

    pub fn f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_bits(self.u64()?))
    }

    pub fn pointer(&mut self) -> Result<u64, CodecError> {
        match self.primitive(PrimitiveKind::Pointer)? {
            Value::Pointer(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    pub fn size(&mut self) -> Result<u64, CodecError> {
        match self.primitive(PrimitiveKind::Size)? {
            Value::Unsigned(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    pub fn bool(&mut self) -> Result<bool, CodecError> {
        match self.primitive(PrimitiveKind::Bool)? {
            Value::Bool(b) => Ok(b),
            _ => unreachable!(),
        }
    }

    /// Reads a null terminated string. The terminator is consumed but not
    /// returned.
    pub fn string(&mut self) -> Result<String, CodecError> {
        let mut bytes = Vec::new();
        loop {
            match self.u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(String::from_utf8(bytes)?)
    }

    /// Reads a single primitive without aligning first.
    pub fn primitive(&mut self, kind: PrimitiveKind) -> Result<Value, CodecError> {
        let size = kind.layout(&self.layout).size;
        let unsupported = CodecError::UnsupportedSize { kind, size };
        Ok(match kind {
            PrimitiveKind::F16 if size == 2 => Value::F16(self.u16()?),
            PrimitiveKind::F32 if size == 4 => Value::F32(self.f32()?),
            PrimitiveKind::F64 if size == 8 => Value::F64(self.f64()?),
            PrimitiveKind::F16 | PrimitiveKind::F32 | PrimitiveKind::F64 => {
                return Err(unsupported)
            }
            _ if size == 0 || size > 8 => return Err(unsupported),
            PrimitiveKind::Bool => match self.sized(size)? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(CodecError::InvalidBool(other as u8)),
            },
            PrimitiveKind::Pointer => Value::Pointer(self.sized(size)?),
            k if k.is_signed() => Value::Signed(self.signed(size)?),
            _ => Value::Unsigned(self.sized(size)?),
        })
    }

    /// Aligns to `ty` and reads a value in its C layout.
    pub fn decode_value(&mut self, ty: &Type) -> Result<Value, CodecError> {
        self.align(ty.align_of(&self.layout))?;
        match ty {
            Type::Primitive(kind) => self.primitive(*kind),
            Type::Array { elem, count } => (0..*count)
                .map(|_| self.decode_value(elem))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Type::Struct(st) => {
                let start = self.offset;
                let fields = st
                    .fields
                    .iter()
                    .map(|field| self.decode_value(&field.ty))
                    .collect::<Result<Vec<_>, _>>()?;
                let size = st.layout(&self.layout).size;
                self.skip(start + size - self.offset)?;
                Ok(Value::Struct(fields))
            }
        }
    }
}
