//! Binary encoding of typed values under a [`MemoryLayout`].
//!
//! Sizes and alignments follow the C ABI of the target: primitives take their
//! layout from the table, arrays are `count` back-to-back elements, and
//! structs pad each field to its alignment and the whole struct to its largest
//! field alignment.

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;

use crate::layout::{DataTypeLayout, MemoryLayout};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Bool,
    S8,
    U8,
    S16,
    U16,
    F16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
    /// The target's `void*`.
    Pointer,
    /// The target's `char`, read as unsigned.
    Char,
    /// The target's `int`.
    Int,
    /// The target's `unsigned int`.
    Uint,
    /// The target's `size_t`.
    Size,
}

impl PrimitiveKind {
    pub fn layout(self, layout: &MemoryLayout) -> DataTypeLayout {
        use PrimitiveKind::*;
        match self {
            Bool | S8 | U8 => layout.i8,
            S16 | U16 => layout.i16,
            F16 => layout.f16,
            S32 | U32 => layout.i32,
            S64 | U64 => layout.i64,
            F32 => layout.f32,
            F64 => layout.f64,
            Pointer => layout.pointer,
            Char => layout.char,
            Int | Uint => layout.integer,
            Size => layout.size,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveKind::S8
                | PrimitiveKind::S16
                | PrimitiveKind::S32
                | PrimitiveKind::S64
                | PrimitiveKind::Int
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Primitive(PrimitiveKind),
    Array { elem: Box<Type>, count: u64 },
    Struct(StructType),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Type {
    pub fn array(elem: Type, count: u64) -> Self {
        Type::Array {
            elem: Box::new(elem),
            count,
        }
    }

    pub fn size_of(&self, layout: &MemoryLayout) -> u64 {
        match self {
            Type::Primitive(kind) => kind.layout(layout).size,
            Type::Array { elem, count } => elem.size_of(layout).saturating_mul(*count),
            Type::Struct(st) => st.layout(layout).size,
        }
    }

    pub fn align_of(&self, layout: &MemoryLayout) -> u64 {
        match self {
            Type::Primitive(kind) => kind.layout(layout).alignment.max(1),
            Type::Array { elem, .. } => elem.align_of(layout),
            Type::Struct(st) => st.align_of(layout),
        }
    }
}

impl From<PrimitiveKind> for Type {
    fn from(kind: PrimitiveKind) -> Self {
        Type::Primitive(kind)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(kind) => write!(f, "{kind:?}"),
            Type::Array { elem, count } => write!(f, "{elem}[{count}]"),
            Type::Struct(st) => write!(f, "struct {}", st.name),
        }
    }
}

/// Resolved placement of a struct's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub offsets: Vec<u64>,
    pub size: u64,
    pub alignment: u64,
}

impl StructType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: impl Into<Type>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    pub fn align_of(&self, layout: &MemoryLayout) -> u64 {
        self.fields
            .iter()
            .map(|f| f.ty.align_of(layout))
            .max()
            .unwrap_or(1)
    }

    pub fn layout(&self, layout: &MemoryLayout) -> StructLayout {
        let mut offsets = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for field in &self.fields {
            offset = align_up(offset, field.ty.align_of(layout));
            offsets.push(offset);
            offset = offset.saturating_add(field.ty.size_of(layout));
        }
        let alignment = self.align_of(layout);
        StructLayout {
            offsets,
            size: align_up(offset, alignment),
            alignment,
        }
    }
}

impl From<StructType> for Type {
    fn from(st: StructType) -> Self {
        Type::Struct(st)
    }
}

#[inline]
pub fn align_up(offset: u64, align: u64) -> u64 {
    let align = align.max(1);
    match offset % align {
        0 => offset,
        rem => offset.saturating_add(align - rem),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Signed(i64),
    Unsigned(u64),
    /// Raw IEEE 754 half precision bits.
    F16(u16),
    F32(f32),
    F64(f64),
    Pointer(u64),
    Array(Vec<Value>),
    Struct(Vec<Value>),
}

impl Value {
    fn describe(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Signed(_) => "signed integer",
            Value::Unsigned(_) => "unsigned integer",
            Value::F16(_) => "f16",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Pointer(_) => "pointer",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot encode a {found} as {expected}")]
    TypeMismatch { expected: String, found: &'static str },

    #[error("value {value} does not fit in {size} bytes")]
    OutOfRange { value: i128, size: u64 },

    #[error("{ty} expects {expected} elements but {actual} were given")]
    Length {
        ty: String,
        expected: u64,
        actual: u64,
    },

    #[error("{0:#04x} is not a boolean")]
    InvalidBool(u8),

    #[error("{size}-byte {kind:?} is not supported")]
    UnsupportedSize { kind: PrimitiveKind, size: u64 },

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use PrimitiveKind::*;

    #[test]
    fn test_struct_padding() {
        let st = StructType::new("s")
            .field("a", U8)
            .field("b", U32)
            .field("c", U16);
        let l = st.layout(&MemoryLayout::x86_64());
        assert_eq!(l.offsets, vec![0, 4, 8]);
        assert_eq!(l.size, 12);
        assert_eq!(l.alignment, 4);
    }

    #[test]
    fn test_layout_dependent_sizes() {
        let st: Type = StructType::new("node")
            .field("flag", Bool)
            .field("next", Pointer)
            .field("len", Size)
            .field("v", S64)
            .into();
        assert_eq!(st.size_of(&MemoryLayout::x86()), 20);
        assert_eq!(st.align_of(&MemoryLayout::x86()), 4);
        assert_eq!(st.size_of(&MemoryLayout::armv7a()), 24);
        assert_eq!(st.size_of(&MemoryLayout::x86_64()), 32);
    }

    #[test]
    fn test_arrays_and_empty_structs() {
        let l = MemoryLayout::arm64();
        let inner: Type = StructType::new("p").field("x", U16).field("y", U8).into();
        assert_eq!(inner.size_of(&l), 4);
        assert_eq!(Type::array(inner.clone(), 3).size_of(&l), 12);
        assert_eq!(Type::array(inner, 3).align_of(&l), 2);
        assert_eq!(Type::from(StructType::new("e")).size_of(&l), 0);
    }

    #[test]
    fn test_huge_arrays_saturate() {
        let l = MemoryLayout::x86_64();
        let huge = Type::array(U64.into(), u64::MAX / 2);
        assert_eq!(huge.size_of(&l), u64::MAX);
        let st: Type = StructType::new("big")
            .field("a", huge.clone())
            .field("b", U8)
            .into();
        assert_eq!(st.size_of(&l), u64::MAX);
        assert_eq!(align_up(u64::MAX - 1, 8), u64::MAX);
    }

    #[test]
    fn test_type_json() {
        let ty = Type::array(U32.into(), 4);
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, r#"{"array":{"elem":{"primitive":"u32"},"count":4}}"#);
        assert_eq!(serde_json::from_str::<Type>(&json).unwrap(), ty);
    }
}
